use thiserror::Error;

/// Failure classes the core can produce, per the error handling design.
///
/// Most routines inside the linear-algebra kernel and the closed-form pose
/// solvers do *not* escalate to this type directly — a singular pivot or a
/// negative focal-length radicand is expected and handled locally by the
/// strategy evaluators (see `crate::strategy`). This enum is reserved for
/// conditions the orchestrator or solver consider fatal (or diagnostic-only)
/// at the top level.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Scene lacks anchors/scale to determine gauge.
    #[error("insufficient constraints to determine scene gauge: {0}")]
    InsufficientConstraints(String),

    /// No initialization strategy succeeded for one or more cameras.
    #[error("initialization failed for camera {camera}: last strategy `{last_strategy}` ({reason})")]
    InitializationFailed {
        camera: String,
        last_strategy: String,
        reason: String,
    },

    /// Every available strategy failed due to a singular matrix.
    #[error("numerical singularity: {0}")]
    NumericalSingular(String),

    /// A strategy succeeded but failed its quality bound.
    #[error("unreliable result for camera {camera}: {reason}")]
    UnreliableResult { camera: String, reason: String },

    /// Solver hit the iteration cap without meeting tolerance.
    #[error("solver did not converge after {iterations} iterations (final residual {final_residual:.6})")]
    NotConverged { iterations: u32, final_residual: f64 },

    /// The caller's abort flag was observed.
    #[error("solve cancelled after {iterations} iterations")]
    Cancelled { iterations: u32 },

    /// The input scene is structurally invalid (unknown id references, wrong
    /// constraint arity, etc). Detected at the boundary, before any solving.
    #[error("invalid scene: {0}")]
    InvalidScene(String),
}

pub type Result<T> = std::result::Result<T, Error>;
