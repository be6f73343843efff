//! FLANN control layer: typed index lifecycle, dispatch and clustering
//!
//! This crate owns the lifetime of native nearest-neighbor index handles,
//! validates and marshals point sets of four element types, translates
//! symbolic configuration into the engine's parameter record, and dispatches
//! every operation to the type-specialized engine entry point.
//!
//! The engine itself sits behind the [`engine::Engine`] trait. A pure Rust
//! [`engine::BruteForceEngine`] is the default backend; the system `libflann`
//! is available through `engine::ffi::FlannLibrary` with the `native` feature.

#![warn(missing_docs)]

/// Element types, borrowed point sets and owned matrices
pub mod types;

/// Parameter record with symbolic translation
pub mod params;

/// Native engine ABI, dispatch registry and backends
pub mod engine;

/// Index handle ownership
pub mod index;

/// Nearest-neighbor and radius search
pub mod search;

/// k-means and hierarchical k-means
pub mod cluster;

/// Ground truth and precision tuning
pub mod evaluation;

/// Vector file formats (fvecs, dvecs, bvecs, ivecs)
pub mod formats;

/// Command-line interface modules
pub mod cli;

/// CLI configuration structure
#[derive(Debug)]
pub struct Cli {
    /// Verbose logging
    pub verbose: bool,
    /// Suppress spinners and banners
    pub no_progress: bool,
}

// Re-export commonly used types
pub use engine::{BruteForceEngine, Distance, Engine};
pub use index::{Session, SharedSession};
pub use params::{Algorithm, BuildReport, CentersInit, IndexParams, LogLevel, ParamOverrides, ParamValue};
pub use search::{Neighbors, RadiusMatches};
pub use types::{Centers, Element, ElementType, Matrix, PointSet, Points};

/// Result type for FLANN operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for FLANN operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unsupported element type or malformed shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Element types of two arrays (or of an array and the index) disagree
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Type of the reference array or active index
        expected: ElementType,
        /// Type that was supplied
        actual: ElementType,
    },

    /// Query issued with no built or loaded index
    #[error("No active index: build_index or load_index must be called first")]
    NoActiveIndex,

    /// More neighbors requested than the reference set holds
    #[error("Insufficient data: requested {requested} neighbors from {available} points")]
    InsufficientData { requested: usize, available: usize },

    /// Parameter out of domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The clustering routine reported a non-positive cluster count
    #[error("Clustering failed: engine returned {0} clusters")]
    ClusteringFailed(i32),

    /// Element type outside the four supported types
    #[error("Unsupported element type: {0}")]
    UnsupportedType(String),

    /// The engine reported failure through its return value
    #[error("Native {operation} failed with status {status}")]
    NativeFailure { operation: &'static str, status: i32 },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::TypeMismatch {
            expected: ElementType::Float32,
            actual: ElementType::UInt8,
        };
        assert_eq!(err.to_string(), "Type mismatch: expected float32, got uint8");

        let err = Error::InsufficientData { requested: 5, available: 3 };
        assert!(err.to_string().contains("5 neighbors from 3 points"));
    }
}
