//! Errors
//!
//! Custom error types used throughout the `tree_ensemble` crate.
use thiserror::Error;

/// Errors that can occur while building or applying a tree ensemble.
#[derive(Debug, Error)]
pub enum TreeEnsembleError {
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Parameters are valid on their own but can't be combined, or don't fit the data.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The data handed to the learner can't be used.
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Learning was canceled through the progress monitor.
    #[error("Execution canceled.")]
    Canceled,
    /// A split needs more children than a node signature can address.
    #[error("Node {signature} can not have {children} children, at most {max} are supported.")]
    StructuralOverflow {
        signature: String,
        children: usize,
        max: usize,
    },
    /// Learning of a single tree in the ensemble failed.
    #[error("Learning tree {index} failed: {source}")]
    TreeFailed {
        index: usize,
        #[source]
        source: Box<TreeEnsembleError>,
    },
    /// Unable to write model or configuration.
    #[error("Unable to write model: {0}")]
    UnableToWrite(String),
    /// Unable to read model or configuration.
    #[error("Unable to read model: {0}")]
    UnableToRead(String),
}

impl TreeEnsembleError {
    /// True if this error is, or wraps, a cancellation.
    pub fn is_canceled(&self) -> bool {
        match self {
            TreeEnsembleError::Canceled => true,
            TreeEnsembleError::TreeFailed { source, .. } => source.is_canceled(),
            _ => false,
        }
    }
}
