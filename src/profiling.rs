//! Performance profiling utilities
//!
//! Only active with the `perf_stats` feature; without it `#[profile]` adds no
//! code and `profile_log!` does not evaluate its arguments.

// Re-export the profile macro
pub use peregrine_nav_macros::profile;
