//! Error taxonomy for package editing

use thiserror::Error;

/// Errors returned by the removal engine.
///
/// A target sheet that does not exist is not represented here: that case is a
/// successful no-op (see [`crate::RemovalReport::removed`]).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input is not a ZIP archive, or one of its entries cannot be read.
    #[error("invalid container: {0}")]
    InvalidContainer(String),

    /// A part the engine needs is not well-formed or lacks a required element.
    #[error("malformed xml in {part}: {reason}")]
    MalformedXml { part: String, reason: String },

    /// Removing the sheet would leave the workbook without any sheet.
    #[error("removing sheet '{sheet}' would leave the workbook without sheets")]
    EmptyResultPackage { sheet: String },

    /// A relationship or lookup points at a part that is not in the package.
    #[error("part not found: {0}")]
    PartNotFound(String),

    /// Post-removal verification reported critical differences.
    #[error("verification failed with {0} critical difference(s)")]
    VerificationFailed(usize),

    /// The external removal command failed or could not be run.
    #[error("external command failed: {0}")]
    ExternalCommand(String),
}

impl EngineError {
    pub(crate) fn malformed(part: &str, reason: impl Into<String>) -> Self {
        EngineError::MalformedXml {
            part: part.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<zip::result::ZipError> for EngineError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::FileNotFound => EngineError::PartNotFound(err.to_string()),
            other => EngineError::InvalidContainer(other.to_string()),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::InvalidContainer(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
