//! Shared data structures built on top of the chunked world.
//!
//! Flow fields live here rather than in `pathfinding` because they bypass the
//! scheduler and are called directly by whoever steers a group of agents.
mod flow_field;

pub use flow_field::{build_flow_field, FlowField};
