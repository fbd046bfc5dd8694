use std::io;

use thiserror::Error;

/// Errors surfaced by handles, providers and the permission codec.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("{op} is not supported by {variant} handles")]
    Unsupported {
        op: &'static str,
        variant: &'static str,
    },

    #[error("invalid permission string {input:?}: {reason}")]
    InvalidFormat { input: String, reason: String },

    #[error("invalid uri {input:?}: {reason}")]
    InvalidUri { input: String, reason: String },

    #[error("no capability provider for scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[cfg(unix)]
    #[error("system error: {0}")]
    Nix(#[from] nix::Error),
}

impl FileError {
    pub(crate) fn unsupported(op: &'static str, variant: &'static str) -> Self {
        FileError::Unsupported { op, variant }
    }

    pub(crate) fn invalid_uri(input: impl Into<String>, reason: impl Into<String>) -> Self {
        FileError::InvalidUri {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// True when the operation cannot work on this kind of handle at all,
    /// as opposed to failing on this particular file.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FileError::Unsupported { .. })
    }
}

pub type Result<T> = std::result::Result<T, FileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_operation_and_variant() {
        let err = FileError::unsupported("total_space", "capability");
        assert!(err.is_unsupported());
        assert_eq!(
            err.to_string(),
            "total_space is not supported by capability handles"
        );
    }

    #[test]
    fn test_io_errors_are_not_unsupported() {
        let err: FileError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(!err.is_unsupported());
    }
}
