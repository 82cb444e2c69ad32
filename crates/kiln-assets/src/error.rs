//! Error types for the resource system.

use std::any::TypeId;
use std::fmt;

/// Errors that can occur while resolving, decoding or finalizing resources.
#[derive(Debug)]
pub enum AssetError {
    /// The path could not be resolved or opened.
    NotFound {
        /// The path as requested.
        path: String,
    },

    /// Reading from a byte stream failed or returned short.
    Io {
        /// Path reported by the stream.
        path: String,
        /// What was being read.
        message: String,
    },

    /// No loader registered for this resource type and extension.
    NoLoader {
        /// The type ID of the resource.
        type_id: TypeId,
        /// Human-readable type name.
        type_name: &'static str,
        /// The file extension, if the path had one.
        extension: Option<String>,
    },

    /// The loader rejected the stream contents.
    Decode {
        /// The path being decoded.
        path: String,
        /// Description of the error.
        message: String,
    },

    /// Designated-thread finalization failed after decoding succeeded.
    Finalize {
        /// The resource GUID.
        guid: String,
        /// Description of the error.
        message: String,
    },

    /// The archive container is malformed.
    Archive {
        /// Description of the problem.
        message: String,
    },

    /// Type mismatch when accessing a resource.
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
    },
}

impl AssetError {
    /// Shorthand for [`AssetError::Decode`].
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        AssetError::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`AssetError::Finalize`].
    pub fn finalize(guid: impl Into<String>, message: impl Into<String>) -> Self {
        AssetError::Finalize {
            guid: guid.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { path } => {
                write!(f, "Resource not found: {}", path)
            }
            AssetError::Io { path, message } => {
                write!(f, "IO error reading '{}': {}", path, message)
            }
            AssetError::NoLoader {
                type_name,
                extension,
                ..
            } => match extension {
                Some(ext) => write!(f, "No {} loader registered for extension: .{}", type_name, ext),
                None => write!(f, "No {} loader registered for a path without extension", type_name),
            },
            AssetError::Decode { path, message } => {
                write!(f, "Failed to decode '{}': {}", path, message)
            }
            AssetError::Finalize { guid, message } => {
                write!(f, "Failed to finalize '{}': {}", guid, message)
            }
            AssetError::Archive { message } => {
                write!(f, "Invalid resource container: {}", message)
            }
            AssetError::TypeMismatch { expected } => {
                write!(f, "Type mismatch: expected {}", expected)
            }
        }
    }
}

impl std::error::Error for AssetError {}

/// Result type alias for resource operations.
pub type AssetResult<T> = Result<T, AssetError>;
