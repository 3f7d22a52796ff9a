//! Business logic over the db layer.
//!
//! Services are free functions taking `&LedgerDb`. Anything that must hold a
//! cross-row invariant (approval resolution, stage moves, retention sweeps)
//! runs under `LedgerDb::with_transaction`.

pub mod activities;
pub mod approvals;
pub mod deals;
pub mod feed;
pub mod retention;
