use thiserror::Error;

/// Everything that can abort a halo realization.
#[derive(Error, Debug)]
pub enum HaloError {
    /// Unphysical or inconsistent input (non-positive mass, concentration, redshift...)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation invoked out of order, e.g. emitting before populating
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Numerical query outside the region where a function was sampled
    #[error("Domain error: {0}")]
    Domain(String),

    /// Upstream record is missing a field this pipeline needs
    #[error("Schema mismatch: `{record}` has no field `{field}`")]
    SchemaMismatch { field: String, record: String },

    /// External sampler broke its output contract
    #[error("Sampler returned {got} samples, expected {expected}")]
    SamplerContract { expected: usize, got: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),
}

impl HaloError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub fn missing_field(field: impl Into<String>, record: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            field: field.into(),
            record: record.into(),
        }
    }
}

pub type HaloResult<T> = Result<T, HaloError>;
