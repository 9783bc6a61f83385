mod chunk;
mod grid;
mod manager;
#[cfg(test)]
mod tests;

pub use chunk::Chunk;
pub use grid::Grid;
pub use manager::ChunkManager;

use crate::math::Vec2;

/// Anything that can answer "may an agent stand on this world tile?".
///
/// Implemented by `ChunkManager` for the procedurally generated world; search
/// strategies are generic over it so tests can supply hand-made maps.
pub trait Walkable {
    fn is_walkable(&self, p: Vec2) -> bool;
}

impl<W: Walkable + ?Sized> Walkable for &W {
    fn is_walkable(&self, p: Vec2) -> bool {
        (**self).is_walkable(p)
    }
}

impl<W: Walkable + ?Sized> Walkable for std::sync::Arc<W> {
    fn is_walkable(&self, p: Vec2) -> bool {
        (**self).is_walkable(p)
    }
}
