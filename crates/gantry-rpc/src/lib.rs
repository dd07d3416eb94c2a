//! Wire marshaling for gantry property values.
//!
//! Property values cross the host/plugin boundary as a generic structured
//! [`WireValue`]. This crate converts between the two representations under
//! the control of [`MarshalOptions`], which describe what the far endpoint
//! understands. Rich values are preserved where the endpoint supports them
//! and degraded predictably where it does not: secrets unwrap to their plain
//! value, resource references collapse to an ID or URN, and unknowns become
//! sentinel strings or are dropped.
//!
//! ```
//! use gantry_resource::{PropertyMap, PropertyValue};
//! use gantry_rpc::{MarshalOptions, marshal_properties, unmarshal_properties};
//!
//! let props = PropertyMap::new()
//!     .with("name", "bucket")
//!     .with("token", PropertyValue::make_secret("s3cr3t".into()));
//! let opts = MarshalOptions::default().keep_secrets(true);
//!
//! let wire = marshal_properties(&props, &opts)?;
//! assert_eq!(unmarshal_properties(&wire, &opts)?, props);
//! # Ok::<(), gantry_rpc::MarshalError>(())
//! ```

mod error;
mod marshal;
mod options;
pub mod sentinel;
mod wire;

pub use self::error::MarshalError;
pub use self::marshal::{marshal_properties, marshal_value, unmarshal_properties, unmarshal_value};
pub use self::options::MarshalOptions;
pub use self::wire::{WireStruct, WireValue};
