//! Integration tests for lane_dispatch
//!
//! Every test starts its own pool, so they run in parallel without
//! sharing threads or identifiers.
//!
//! Run with: cargo test --test pool

mod helpers;

mod correlation;
mod end_to_end;
mod lifecycle;
mod ordering;
