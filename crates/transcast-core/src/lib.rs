//! Transcast: a runtime type-conversion registry
//!
//! Converters are typed functions keyed by `(source, target, argument)` type
//! triples. The registry merges converters that fill complementary slots,
//! finds them through a tiered search, discovers them from declarations and
//! exposes cast, convert and transform entry points on top.

mod batch;
pub mod builtins;
mod discovery;
mod error;
mod factory;
mod global;
mod invoke;
mod lookup;
mod record;
mod registry;
mod settings;
mod types;

pub use batch::{AddBuilder, BatchReport, CancelToken};
pub use discovery::{
    Constructor, ConverterDecl, ConverterModule, DefaultInstanceFactory, Discovery,
    DuplicateInstance, InstanceFactory, InventoryProvider, ModuleHook, ReflectionProvider,
    StaticProvider, TypeDescriptor, TypeMeta, Visit,
};
pub use error::{BoxError, ConvertError, ErrorKind, classify};
pub use factory::{
    Callable, Instance, InstanceBinaryFn, InstanceCallable, InstanceUnaryFn, MethodBinding,
    MethodDescriptor, MethodMeta, RecordFactory, Signature,
};
pub use global::{global, reset_global, set_global};
pub use invoke::{Alias, CastExt, ConvertContext, Resolution, TransformOptions};
pub use lookup::{Lookup, Match, MatchTier, NamePattern, Query};
pub use record::{BinaryFn, Call, ConversionRecord, Fallback, UnaryFn};
pub use registry::{AddOutcome, Registry};
pub use settings::{DefaultPolicy, NumberFormat, Settings, SettingsError};
pub use types::{AnyType, Boxed, TypeHierarchy, TypeKey, are_similar};

#[doc(hidden)]
pub use inventory;
