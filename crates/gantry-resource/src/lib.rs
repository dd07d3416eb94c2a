//! Property value model for the gantry plugin protocol.
//!
//! Every configuration or resource value that crosses the host/plugin
//! boundary is represented as a [`PropertyValue`]: a closed tagged union over
//! plain JSON-like data (null, booleans, numbers, strings, arrays, objects)
//! and the richer protocol values that need metadata preserved on the wire:
//!
//! - [`Asset`] and [`Archive`]: content-addressed blob references.
//! - [`Computed`]: a value that is not yet known but has a known shape.
//! - [`Output`]: a known or unknown value annotated with secrecy and the
//!   [`Urn`]s it depends on.
//! - [`Secret`]: a value that must be persisted securely.
//! - [`ResourceReference`]: a reference to a custom or component resource.
//!
//! Objects are held in a [`PropertyMap`], which always iterates its keys in a
//! stable sorted order so that equal maps produce identical encodings.
//!
//! The wire encoding of these values lives in the `gantry-rpc` crate; this
//! crate only owns the data model, the reserved [`sig`] constants, and the
//! content hashing used to address assets and archives.
//!
//! # Example
//!
//! ```
//! use gantry_resource::{PropertyMap, PropertyValue, ResourceReference, Urn};
//!
//! let mut props = PropertyMap::new();
//! props.insert("name", "bucket");
//! props.insert("password", PropertyValue::make_secret("hunter2".into()));
//! props.insert(
//!     "parent",
//!     ResourceReference::component(Urn::new("urn:pulumi:dev::proj::my:Component::parent"), ""),
//! );
//!
//! assert!(props.contains_secrets());
//! assert!(!props.contains_unknowns());
//! ```

mod asset;
mod error;
mod map;
mod reference;
pub mod sig;
mod value;

pub use self::asset::{Archive, ArchiveMember, ArchiveSource, Asset, AssetSource};
pub use self::error::AssetError;
pub use self::map::{PropertyKey, PropertyMap};
pub use self::reference::{ReferenceId, ResourceReference, Urn};
pub use self::value::{Computed, Output, PropertyValue, Secret};
