//! # cadence-store
//!
//! Client-local persistence for the tracker.  State lives in memory in a
//! [`TrackerStore`] and is persisted as four independent keyed JSON blobs
//! (tasks, cell data, collapsed categories, change log) in a small SQLite
//! database, so a failed write to one blob can never corrupt the others.

pub mod blobs;
pub mod database;
pub mod migrations;
pub mod tracker;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use tracker::TrackerStore;
