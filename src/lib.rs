//! Mission-control core for an autonomous agent.
//!
//! Owns the operational data model behind the dashboard: the activity ledger
//! (hot tier), the tiered retention pipeline (hot → warm archive → cold daily
//! summaries), the human-approval queue, the sales deal pipeline, and the
//! visual event feed the frontend polls. Presentation, auth, and scheduling
//! live outside this crate; retention jobs are invoked externally via the
//! `missionctl-jobs` binary.

pub mod db;
pub mod error;
mod migrations;
pub mod services;
pub mod settings;
pub mod types;
pub mod util;
