//! Converter authoring helpers for Transcast.
//!
//! A crate that ships converters describes each converter type with a
//! function returning a [`TypeDescriptor`] and submits them under a unit
//! name with [`declare_converters!`]. Discovery over that unit (or over
//! every unit, with `auto_initialize`) then registers them.
//!
//! ```ignore
//! use rhi_transcast_plugin::prelude::*;
//!
//! struct Lengths;
//!
//! fn lengths() -> TypeDescriptor {
//!     TypeDescriptor::of::<Lengths>()
//!         .method(MethodDescriptor::function("km_to_m", |km: &f64| km * 1000.0))
//! }
//!
//! declare_converters!("geo" => [lengths]);
//! ```

pub use rhi_transcast_core::{
    CastExt, ConvertError, ConverterDecl, ConverterModule, Discovery, MethodDescriptor, Registry,
    TransformOptions, TypeDescriptor, TypeKey, TypeMeta,
};

#[doc(hidden)]
pub use rhi_transcast_core::inventory;

/// Submit converter type descriptors under a unit name.
///
/// Each entry is a `fn() -> TypeDescriptor`.
#[macro_export]
macro_rules! declare_converters {
    ($unit:expr => [$($describe:path),* $(,)?]) => {
        $(
            $crate::inventory::submit! {
                $crate::ConverterDecl {
                    unit: $unit,
                    describe: $describe,
                }
            }
        )*
    };
}

pub mod prelude {
    pub use crate::declare_converters;
    pub use crate::{
        CastExt, ConvertError, ConverterModule, MethodDescriptor, Registry, TransformOptions,
        TypeDescriptor,
    };
}
