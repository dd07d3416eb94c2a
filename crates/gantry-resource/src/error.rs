//! Errors raised while reading, hashing, or reconstructing assets and archives.
//!
//! I/O errors are wrapped in `Arc` so the enum stays `Clone` and can be
//! carried through marshaling errors without losing its source chain.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors arising from asset and archive operations.
#[derive(Debug, Clone, Error)]
pub enum AssetError {
    /// A file backing an asset or archive could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A path asset pointed at a directory.
    #[error("asset path '{}' is a directory; try using an archive", path.display())]
    IsDirectory {
        /// Offending path.
        path: PathBuf,
    },

    /// A URI could not be parsed.
    #[error("invalid {kind} URI '{uri}': {message}")]
    InvalidUri {
        /// Either `asset` or `archive`.
        kind: &'static str,
        /// The URI text.
        uri: String,
        /// Parser message.
        message: String,
    },

    /// A URI used a scheme that cannot be read locally.
    #[error("unsupported URI scheme '{scheme}' in {kind} '{uri}'")]
    UnsupportedScheme {
        /// Either `asset` or `archive`.
        kind: &'static str,
        /// The URI text.
        uri: String,
        /// The rejected scheme.
        scheme: String,
    },

    /// The contents of an elided asset or archive were requested.
    #[error("{kind} contents were elided; only its hash is available")]
    Elided {
        /// Either `asset` or `archive`.
        kind: &'static str,
    },

    /// A flattened asset or archive carried none of its source fields.
    #[error("{kind} is missing one of {expected}")]
    MissingSource {
        /// Either `asset` or `archive`.
        kind: &'static str,
        /// Human-readable list of accepted fields.
        expected: &'static str,
    },

    /// A flattened asset or archive carried more than one source field.
    #[error("{kind} has more than one of {expected}")]
    AmbiguousSource {
        /// Either `asset` or `archive`.
        kind: &'static str,
        /// Human-readable list of accepted fields.
        expected: &'static str,
    },

    /// A field of a flattened asset or archive had the wrong type.
    #[error("malformed {kind}: field '{field}' must be {expected}, found {found}")]
    FieldKind {
        /// Either `asset` or `archive`.
        kind: &'static str,
        /// Offending field name.
        field: &'static str,
        /// Expected value type.
        expected: &'static str,
        /// Type actually found.
        found: String,
    },

    /// An archive member was neither an asset nor an archive.
    #[error("archive member '{name}' is not an asset or archive")]
    MemberKind {
        /// Name of the offending member.
        name: String,
    },

    /// A map did not carry the signature required for reconstruction.
    #[error("object is not a flattened {kind}")]
    Signature {
        /// Either `asset` or `archive`.
        kind: &'static str,
    },
}

impl AssetError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
