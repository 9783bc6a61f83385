/// Flow fields over generated terrain.
mod common;

use common::init_tracing;
use peregrine_nav::structures::build_flow_field;
use peregrine_nav::world::{ChunkManager, Walkable};
use peregrine_nav::{NavConfig, NavError, Vec2};

#[test]
fn test_field_over_generated_terrain_descends_to_target() {
    init_tracing();
    let chunks = ChunkManager::from_config(&NavConfig::default());
    let min = Vec2::new(-40, -40);
    let max = Vec2::new(40, 40);
    let field = build_flow_field(&chunks, min, max).unwrap();

    assert_eq!(field.target, max);
    assert!(field.len() > 81 * 81 / 2, "most of a 12% field is reachable");
    for (&cell, &dir) in &field.directions {
        assert!(field.contains(cell));
        assert!(chunks.is_walkable(cell), "blocked cell {:?} has a direction", cell);
        let next = cell + dir;
        let here = field.cost_at(cell).unwrap();
        let there = field.cost_at(next).unwrap();
        assert_eq!(there + 1, here, "{:?} does not step downhill", cell);
    }
}

#[test]
fn test_every_reached_cell_traces_to_target() {
    let chunks = ChunkManager::from_config(&NavConfig::default());
    let field = build_flow_field(&chunks, Vec2::new(100, -20), Vec2::new(140, 10)).unwrap();
    for &cell in field.directions.keys() {
        let path = field.trace(cell).expect("directions never loop");
        assert_eq!(path.len() as u32, field.cost_at(cell).unwrap() + 1);
        assert!(path.len() as u32 > cell.manhattan(field.target));
    }
}

#[test]
fn test_fields_are_reproducible() {
    let a = ChunkManager::from_config(&NavConfig::default());
    let b = ChunkManager::from_config(&NavConfig::default());
    let fa = build_flow_field(&a, Vec2::new(-10, -10), Vec2::new(30, 25)).unwrap();
    let fb = build_flow_field(&b, Vec2::new(-10, -10), Vec2::new(30, 25)).unwrap();
    assert_eq!(fa.directions, fb.directions);
    assert_eq!(fa.costs, fb.costs);
}

#[test]
fn test_empty_region_is_bad() {
    let chunks = ChunkManager::from_config(&NavConfig::default());
    for (min, max) in [((1, 0), (0, 0)), ((0, 5), (5, 4))] {
        let err = build_flow_field(&chunks, Vec2::new(min.0, min.1), Vec2::new(max.0, max.1)).unwrap_err();
        assert!(matches!(err, NavError::BadRegion { .. }), "{err}");
    }
}
