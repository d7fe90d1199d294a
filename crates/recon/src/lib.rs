//! `soa-recon`: statement-of-account reconciliation engine.
//!
//! Pure engine crate: receives raw statement lines and invoice candidates,
//! pairs them through an ordered cascade of matching passes and explains
//! whatever is left as typed discrepancies. No CLI or IO dependencies.

pub mod builder;
pub mod canonical;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod group;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod pool;

pub use config::MatchConfig;
pub use engine::{load_csv_records, load_json_records, run_reconciliation};
pub use error::{ConfigError, ReconError, ShapeError};
pub use model::{
    CanonicalInvoice, CanonicalStatementLine, Discrepancy, DiscrepancyType, MatchPair, RawRecord,
    ReconSummary, ReconciliationResult, ReconciliationRun, Severity,
};
