//! `cohort-recon` — Cancellation-to-purchase reconciliation engine.
//!
//! Pure engine crate: receives a pre-loaded transaction ledger, allocates
//! cancelled quantities against earlier purchases of the same customer and
//! product, and returns classified results. No CLI dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod ingest;
pub mod model;
pub mod report;

pub use config::ReconConfig;
pub use engine::{reconcile, run};
pub use error::ReconError;
pub use ingest::load_csv_ledger;
pub use model::{Classification, Ledger, MatchBucket, ReconReport, TransactionRecord};
