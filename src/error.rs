use thiserror::Error;

/// Fatal problems with a circuit design payload.
///
/// Structural issues inside an otherwise well-formed design (dangling
/// connections, mismatched signal types) are never errors; they surface as
/// [`crate::validate::Warning`]s instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    #[error("Failed to parse circuit design JSON: {0}")]
    Parse(String),

    #[error("Circuit design must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Circuit design is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Circuit design field '{field}' is invalid: {message}")]
    InvalidField { field: String, message: String },

    #[error("No JSON object found in design response")]
    NoJsonObject,
}
