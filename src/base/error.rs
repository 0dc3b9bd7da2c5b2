use thiserror::Error;

/// Every failure the estimators can surface. Running out of iterations is not one of them.
#[derive(Debug, Error)]
pub enum PcaError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("the number of threads must be positive")]
    InvalidThreadCount,

    #[error("no sites retained after filtering by population allele frequency")]
    NoSitesRetained,

    #[error("a fixed number of eigenvectors must be positive")]
    InvalidComponentCount,

    #[error("requested {requested} eigenvectors but at most {maximum} can be used")]
    TooManyComponents { requested: usize, maximum: usize },

    #[error("row chunks do not cover the {n_rows} rows exactly once: {reason}")]
    InvalidChunking { n_rows: usize, reason: String },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("eigendecomposition of the covariance matrix failed: {0}")]
    Eigendecomposition(String),

    #[error("site {0} has a zero or non-finite standardisation denominator")]
    DegenerateSite(usize),

    #[error("unable to build the thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, PcaError>;
