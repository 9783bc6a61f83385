use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::astar::SearchStrategy;
use super::heap::MinHeap;
use crate::math::Vec2;
use crate::world::Walkable;

const INF: u32 = u32::MAX;

type Key = (u32, u32);

/// Incremental planner over a bounded rectangle of any `Walkable` world.
///
/// Searches backwards from the goal so that moving the start and changing a
/// handful of tiles only repairs the affected part of the search tree instead
/// of starting over. Repeated `find_path` calls with the same goal reuse all
/// prior work; a new goal resets the state.
///
/// Step cost is 1 between 4-adjacent enterable tiles. The current start and
/// the goal are always enterable, everything else asks the world.
pub struct DStarLite<W: Walkable> {
    world: W,
    min: Vec2,
    max: Vec2,
    max_expansions: usize,

    start: Vec2,
    goal: Option<Vec2>,
    last: Vec2,
    km: u32,
    g: FxHashMap<Vec2, u32>,
    rhs: FxHashMap<Vec2, u32>,
    open: MinHeap<(Key, Vec2), Vec2>,
    /// Current key of every cell in `open`; heap entries with any other key are stale.
    open_keys: FxHashMap<Vec2, Key>,
    expansions: usize,
}

impl<W: Walkable> DStarLite<W> {
    /// Planner limited to the inclusive rectangle spanned by `a` and `b`.
    pub fn new(world: W, a: Vec2, b: Vec2) -> Self {
        Self {
            world,
            min: Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vec2::new(a.x.max(b.x), a.y.max(b.y)),
            max_expansions: super::astar::DEFAULT_MAX_LOCAL_EXPANSIONS,
            start: Vec2::ZERO,
            goal: None,
            last: Vec2::ZERO,
            km: 0,
            g: FxHashMap::default(),
            rhs: FxHashMap::default(),
            open: MinHeap::new(),
            open_keys: FxHashMap::default(),
            expansions: 0,
        }
    }

    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions.max(1);
        self
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Vertices expanded since the current goal was set, across every replan.
    ///
    /// The expansion cap applies to each `find_path` call on its own.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    #[inline]
    fn in_bounds(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    fn enterable(&self, p: Vec2) -> bool {
        self.in_bounds(p) && (p == self.start || Some(p) == self.goal || self.world.is_walkable(p))
    }

    fn cost(&self, a: Vec2, b: Vec2) -> u32 {
        if self.enterable(a) && self.enterable(b) {
            1
        } else {
            INF
        }
    }

    #[inline]
    fn g(&self, p: Vec2) -> u32 {
        self.g.get(&p).copied().unwrap_or(INF)
    }

    #[inline]
    fn rhs(&self, p: Vec2) -> u32 {
        self.rhs.get(&p).copied().unwrap_or(INF)
    }

    fn calculate_key(&self, p: Vec2) -> Key {
        let m = self.g(p).min(self.rhs(p));
        (m.saturating_add(self.start.manhattan(p)).saturating_add(self.km), m)
    }

    fn neighbors(&self, p: Vec2) -> impl Iterator<Item = Vec2> + '_ {
        p.neighbors4().into_iter().filter(move |&n| self.in_bounds(n))
    }

    fn initialize(&mut self, start: Vec2, goal: Vec2) {
        self.start = start;
        self.last = start;
        self.goal = Some(goal);
        self.km = 0;
        self.g.clear();
        self.rhs.clear();
        self.open.clear();
        self.open_keys.clear();
        self.expansions = 0;

        self.rhs.insert(goal, 0);
        let key = self.calculate_key(goal);
        self.open_keys.insert(goal, key);
        self.open.push((key, goal), goal);
    }

    fn update_vertex(&mut self, u: Vec2) {
        if Some(u) != self.goal {
            let best = self
                .neighbors(u)
                .map(|s| self.cost(u, s).saturating_add(self.g(s)))
                .min()
                .unwrap_or(INF);
            self.rhs.insert(u, best);
        }

        self.open_keys.remove(&u);
        if self.g(u) != self.rhs(u) {
            let key = self.calculate_key(u);
            self.open_keys.insert(u, key);
            self.open.push((key, u), u);
        }
    }

    /// Smallest live key in the open list, discarding stale heap entries.
    fn top_key(&mut self) -> Option<Key> {
        while let Some((&(key, _), &u)) = self.open.peek() {
            if self.open_keys.get(&u) == Some(&key) {
                return Some(key);
            }
            self.open.pop();
        }
        None
    }

    fn compute_shortest_path(&mut self) -> bool {
        let mut budget = self.max_expansions;
        loop {
            let Some(k_old) = self.top_key() else {
                return true;
            };
            let start_key = self.calculate_key(self.start);
            if k_old >= start_key && self.rhs(self.start) == self.g(self.start) {
                return true;
            }

            if budget == 0 {
                warn!("[LOCAL] D* Lite exceeded {} expansions", self.max_expansions);
                return false;
            }
            budget -= 1;
            self.expansions += 1;

            let Some((_, u)) = self.open.pop() else {
                return true;
            };
            let k_new = self.calculate_key(u);
            let (g_u, rhs_u) = (self.g(u), self.rhs(u));

            if k_old < k_new {
                self.open_keys.insert(u, k_new);
                self.open.push((k_new, u), u);
            } else if g_u > rhs_u {
                self.g.insert(u, rhs_u);
                self.open_keys.remove(&u);
                let preds: Vec<Vec2> = self.neighbors(u).collect();
                for p in preds {
                    self.update_vertex(p);
                }
            } else {
                self.g.insert(u, INF);
                let preds: Vec<Vec2> = self.neighbors(u).collect();
                for p in preds {
                    self.update_vertex(p);
                }
                self.update_vertex(u);
            }
        }
    }

    /// Tell the planner these tiles may have changed walkability.
    ///
    /// Only the edges touching the given cells are re-evaluated; the next
    /// `find_path` call repairs the search from there.
    pub fn notify_changed(&mut self, cells: &[Vec2]) {
        if self.goal.is_none() {
            return;
        }
        for &c in cells {
            if !self.in_bounds(c) {
                continue;
            }
            self.update_vertex(c);
            let around: Vec<Vec2> = self.neighbors(c).collect();
            for n in around {
                self.update_vertex(n);
            }
        }
    }

    /// Move the agent without invalidating the search.
    pub fn move_start(&mut self, new_start: Vec2) {
        if self.goal.is_none() || new_start == self.start {
            self.start = new_start;
            self.last = new_start;
            return;
        }

        let old = self.start;
        self.km = self.km.saturating_add(self.last.manhattan(new_start));
        self.last = new_start;
        self.start = new_start;

        // The old start loses its exemption and the new one gains it.
        if !self.world.is_walkable(old) {
            self.notify_changed(&[old]);
        }
        if !self.world.is_walkable(new_start) {
            self.notify_changed(&[new_start]);
        }
    }

    /// Walk the repaired search tree greedily from start to goal.
    fn extract_path(&self, goal: Vec2) -> Option<Vec<Vec2>> {
        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as usize;
        let limit = span(self.min.x, self.max.x).saturating_mul(span(self.min.y, self.max.y));
        let mut path = vec![self.start];
        let mut current = self.start;
        while current != goal {
            if path.len() > limit {
                warn!("[LOCAL] D* Lite path extraction looped at {:?}", current);
                return None;
            }
            let (best_cost, next) = self
                .neighbors(current)
                .map(|s| (self.cost(current, s).saturating_add(self.g(s)), s))
                .min()?;
            if best_cost == INF {
                return None;
            }
            path.push(next);
            current = next;
        }
        Some(path)
    }
}

impl<W: Walkable> SearchStrategy for DStarLite<W> {
    fn find_path(&mut self, start: Vec2, goal: Vec2) -> Option<Vec<Vec2>> {
        if !self.in_bounds(start) || !self.in_bounds(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        if self.goal != Some(goal) {
            self.initialize(start, goal);
        } else if start != self.start {
            self.move_start(start);
        }

        if !self.compute_shortest_path() {
            return None;
        }
        if self.g(self.start) == INF {
            debug!("[LOCAL] D* Lite: no path {:?} -> {:?}", start, goal);
            return None;
        }
        self.extract_path(goal)
    }
}
