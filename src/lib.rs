//! Bilbo Engine - On-device strength-progression engine
//!
//! Estimates one-rep maxes from logged sets and runs the BILBO progressive
//! overload protocol: train at 50% of the 1RM, add 2.5 kg once a session goes
//! past 15 reps, hold otherwise. The data flow is:
//! logged sets → 1RM estimation → progression update → derived statistics.
//!
//! ## Modules
//!
//! - **Estimation**: [`formulas`] (per-formula math) and [`one_rm`] (selection, rounding)
//! - **Progression**: [`progression`] (BILBO state and advancement rule)
//! - **Reporting**: [`stats`] (aggregates over a session history), [`units`] (display units)
//! - **Integration**: [`pipeline`] (stateful processor, JSON I/O) and [`ffi`] (C ABI)

pub mod config;
pub mod error;
pub mod formulas;
pub mod one_rm;
pub mod pipeline;
pub mod progression;
pub mod stats;
pub mod types;
pub mod units;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::PolicyConfig;
pub use error::{EngineError, ValidationError};
pub use formulas::{estimate_average_one_rm, estimate_max_reps, estimate_one_rm, Formula};
pub use one_rm::{
    calculate_bilbo_weight, compute_percentage, find_best_one_rm, find_recent_reliable_one_rm,
    round_to_increment,
};
pub use pipeline::{BilboProcessor, ProgressReport};
pub use progression::ProgressionTracker;
pub use stats::{bilbo_stats, improvement, progress_percentage, progress_series};
pub use types::{
    BilboSessionRecord, Estimate, OneRmSource, TrackedExerciseState, TrackingPhase, WorkoutSample,
};
pub use units::{UnitConverter, WeightUnit};

/// Engine version embedded in reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports and diagnostics
pub const PRODUCER_NAME: &str = "bilbo-engine";
