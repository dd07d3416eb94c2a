//! Reserved keys and signatures used to recover rich values from plain maps.
//!
//! When a rich value is flattened into an ordinary object for transmission,
//! the object carries [`SIG_KEY`] whose string value identifies the variant.
//! The constants are part of the wire protocol and must never change.

/// Key that marks an object as a flattened rich value.
pub const SIG_KEY: &str = "4dabf18193072939515e22adb298388d";

/// Signature of a flattened [`Asset`](crate::Asset).
pub const ASSET_SIG: &str = "c44067f5952c0a294b673a41bacd8c17";

/// Signature of a flattened [`Archive`](crate::Archive).
pub const ARCHIVE_SIG: &str = "0def7320c3a5731c473e5ecbe6d01bc7";

/// Signature of a flattened [`Secret`](crate::Secret).
pub const SECRET_SIG: &str = "1b47061264138c4ac30d75fd1eb44270";

/// Signature of a flattened [`ResourceReference`](crate::ResourceReference).
pub const RESOURCE_REFERENCE_SIG: &str = "5cf8f73096256a8f31e491e813e4eb8e";

/// Signature of a flattened [`Output`](crate::Output).
pub const OUTPUT_VALUE_SIG: &str = "d0e6a833031e9bbcd3f4e8bde6ca49a4";

/// Prefix reserved for engine-internal property keys.
pub const INTERNAL_KEY_PREFIX: &str = "__";

/// Field holding the content hash of an asset or archive.
pub const HASH_FIELD: &str = "hash";
/// Field holding the inline text of a text asset.
pub const TEXT_FIELD: &str = "text";
/// Field holding the filesystem path of a path asset or archive.
pub const PATH_FIELD: &str = "path";
/// Field holding the URI of a URI asset or archive.
pub const URI_FIELD: &str = "uri";
/// Field holding the member map of an assets archive.
pub const ASSETS_FIELD: &str = "assets";
