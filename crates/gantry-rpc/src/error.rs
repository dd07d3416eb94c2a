//! Errors raised while encoding or decoding property values.

use gantry_resource::AssetError;
use thiserror::Error;

/// Errors arising from [`marshal_value`](crate::marshal_value),
/// [`unmarshal_value`](crate::unmarshal_value), and their map variants.
#[derive(Debug, Clone, Error)]
pub enum MarshalError {
    /// An unknown value was met while `reject_unknowns` was set.
    #[error("unexpected unknown property value")]
    UnknownRejected,

    /// An asset or archive was met while `reject_assets` was set.
    #[error("unexpected {kind} property value")]
    AssetRejected {
        /// Either `asset` or `archive`.
        kind: &'static str,
    },

    /// A signature-tagged object lacked a required field.
    #[error("malformed {object}: missing {field}")]
    MissingField {
        /// The kind of tagged object.
        object: &'static str,
        /// The missing field.
        field: &'static str,
    },

    /// A field of a signature-tagged object had the wrong kind.
    #[error("malformed {object}: {field} not {expected}")]
    WrongFieldKind {
        /// The kind of tagged object.
        object: &'static str,
        /// The offending field.
        field: &'static str,
        /// The expected kind.
        expected: &'static str,
    },

    /// An object carried a signature this decoder does not recognise.
    #[error("unrecognized signature '{signature}' in property map")]
    UnrecognizedSignature {
        /// The signature text, or the wire kind if it was not a string.
        signature: String,
    },

    /// An asset or archive object could not be reconstructed.
    #[error("malformed {kind}: {source}")]
    InvalidAsset {
        /// Either `asset` or `archive`.
        kind: &'static str,
        /// The reconstruction failure.
        #[source]
        source: AssetError,
    },

    /// A missing asset or archive hash could not be computed.
    #[error("failed to compute {kind} hash: {source}")]
    AssetHash {
        /// Either `asset` or `archive`.
        kind: &'static str,
        /// The hashing failure.
        #[source]
        source: AssetError,
    },
}
