//! Arbitration Integration Tests
//!
//! End-to-end tests of optimistic concurrency through the `Database` facade.

#[path = "../common/mod.rs"]
mod common;

mod commit_semantics;
mod conflict_reporting;
mod contention;
mod detached_merge;
