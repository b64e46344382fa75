use thiserror::Error;

/// Error taxonomy shared by every stage of the setup pipeline.
///
/// `Syntax` covers malformed structured names and command fields,
/// `Structure` covers collection/object placement violations and
/// mid-merge geometry mismatches, `Profile` covers CSV profile files.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("structure error: {0}")]
    Structure(String),

    #[error("profile error: {0}")]
    Profile(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SetupError {
    pub fn syntax(message: impl Into<String>) -> Self {
        SetupError::Syntax(message.into())
    }

    pub fn structure(message: impl Into<String>) -> Self {
        SetupError::Structure(message.into())
    }

    pub fn profile(message: impl Into<String>) -> Self {
        SetupError::Profile(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;
