//! Error types for solver construction, configuration, and evolution.

use thiserror::Error;

/// All failure modes of the crate.
///
/// Every error is raised at the point of detection (construction or call
/// site), never deferred into the integration loop.
#[derive(Debug, Error)]
pub enum FlimeError {
    #[error("hamiltonian must evaluate to a {expected}x{expected} matrix; got {rows}x{cols}")]
    BadHamiltonian { expected: usize, rows: usize, cols: usize },

    #[error("drive period must be positive and finite; got {0}")]
    BadPeriod(f64),

    #[error("collapse operator must be a {dim}x{dim} matrix; got {rows}x{cols}")]
    BadCollapseShape { dim: usize, rows: usize, cols: usize },

    #[error("collapse rate must be non-negative; got {0}")]
    BadRate(f64),

    #[error("secular cutoff must be non-negative; got {0}")]
    BadCutoff(f64),

    #[error("initial state must be a length-{dim} ket or a {dim}x{dim} density matrix")]
    BadState { dim: usize },

    #[error("at least one output time is required")]
    NoTimes,

    #[error("`step` requires a preceding call to `start`")]
    NotStarted,

    #[error("step times must be non-decreasing; got {t} after {last}")]
    TimeReversed { t: f64, last: f64 },

    #[error("`steadystate` requires the fully secular limit (time_sense = 0); got {0}")]
    NonSecular(f64),

    #[error("no steady state: smallest rate-matrix eigenvalue has magnitude {0:.3e}")]
    NoSteadyState(f64),

    #[error("the diag method requires a time-independent generator")]
    DiagNonstatic,

    #[error("step size underflow at t = {0:.6e}")]
    StepUnderflow(f64),

    #[error("unrecognized option key '{0}'")]
    BadOptionKey(String),

    #[error("option '{key}' expects a {expected} value")]
    BadOptionValue { key: String, expected: &'static str },

    #[error("linear algebra error: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),

    #[error("toml parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
