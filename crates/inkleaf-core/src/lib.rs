//! Content pipeline for a memory-constrained e-ink reader.
//!
//! The crate turns a ZIP-based document into pre-paginated chapters cached on
//! removable storage and drives a single background render worker:
//!
//! - [`archive`] extracts one entry at a time, either wholly or through a
//!   fixed 32 KiB inflate window.
//! - [`section`] persists one chapter's pages plus a versioned metadata record
//!   and rebuilds the whole chapter whenever that record is stale.
//! - [`scheduler`] owns the active chapter cache and serializes rendering
//!   against input-driven teardown with a single lock.
//!
//! Storage, display, layout, battery, and input are capability traits so the
//! device drivers (or in-memory fakes) are injected by the caller.

pub mod archive;
pub mod book;
pub mod config;
pub mod display;
pub mod input;
pub mod layout;
pub mod power;
pub mod progress;
pub mod scheduler;
pub mod section;
pub mod storage;

#[cfg(test)]
mod test_support;
