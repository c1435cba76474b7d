//! One-shot importer from an Asana project export into Phabricator
//! Maniphest, driven through `arc call-conduit`.
//!
//! The walk is depth-first and pre-order: every task is created in
//! Maniphest before its subtasks and comments, with the fresh PHID
//! threaded down to the children. Any remote failure aborts the whole
//! run; reruns start over and will duplicate already-imported tasks.

pub mod conduit;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod model;
pub mod output;
pub mod progress;
pub mod users;
