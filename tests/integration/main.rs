//! Cross-crate integration tests for quadmem
//!
//! These drive the public `quadmem` API end to end: the reference scenario,
//! snapshot visibility under random workloads and persistence round trips.

#[path = "../common/mod.rs"]
mod common;

mod persistence;
mod scenario;
mod visibility;
mod workload;
