//! Declaration-driven discovery of converter types.
//!
//! A converter type is described by a [`TypeDescriptor`]: its conversion
//! metadata, an optional [`ConverterModule`] hook, an optional constructor
//! and its declared methods. Descriptors come from a [`ReflectionProvider`],
//! by default [`InventoryProvider`], which reads the [`ConverterDecl`] items
//! submitted with `declare_converters!` in the plugin crate.
//!
//! Visiting a descriptor moves it through a small state machine:
//!
//! ```text
//! unvisited ─┬─ no metadata, no module ──────────────▶ Rejected
//!            ├─ load_on_demand ──────────────────────▶ Deferred
//!            ├─ needs_instance ─▶ instantiate ─▶ scan ▶ Registered(n)
//!            └─ otherwise ─────────────────────▶ scan ▶ Registered(n)
//! ```

use crate::error::ConvertError;
use crate::factory::{Instance, MethodDescriptor, RecordFactory};
use crate::registry::Registry;
use crate::types::TypeKey;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registers a type's converters by hand.
///
/// The default implementation reports that the contract was not fulfilled.
pub trait ConverterModule: Send + Sync {
    fn register(&self, registry: &Registry) -> Result<(), ConvertError> {
        let _ = registry;
        Err(ConvertError::ConverterNotImplemented(
            std::any::type_name::<Self>().to_string(),
        ))
    }
}

pub type ModuleHook = Arc<dyn Fn(&Registry) -> Result<(), ConvertError> + Send + Sync>;

pub type Constructor = Arc<dyn Fn(&Registry) -> Result<Instance, ConvertError> + Send + Sync>;

/// Type-level conversion metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMeta {
    /// Defer scanning until a lookup misses in `namespace`.
    pub load_on_demand: bool,
    /// Instantiate the type before scanning its methods.
    pub needs_instance: bool,
    /// Namespace label for the deferred index. Defaults to the type's module path.
    pub namespace: Option<String>,
    /// Alias applied to the type's records that have none of their own.
    pub alias: Option<String>,
}

/// Everything discovery needs to know about one declaring type.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub ty: TypeKey,
    pub meta: Option<TypeMeta>,
    pub module: Option<ModuleHook>,
    pub constructor: Option<Constructor>,
    pub methods: Vec<MethodDescriptor>,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("ty", &self.ty)
            .field("meta", &self.meta)
            .field("module", &self.module.is_some())
            .field("constructor", &self.constructor.is_some())
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl TypeDescriptor {
    /// A descriptor for `T` with converter metadata and nothing else.
    pub fn of<T: Any>() -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            meta: Some(TypeMeta::default()),
            module: None,
            constructor: None,
            methods: Vec::new(),
        }
    }

    /// A descriptor for `T` without converter metadata.
    pub fn plain<T: Any>() -> Self {
        Self {
            meta: None,
            ..Self::of::<T>()
        }
    }

    pub fn load_on_demand(mut self) -> Self {
        self.meta.get_or_insert_with(TypeMeta::default).load_on_demand = true;
        self
    }

    pub fn needs_instance(mut self) -> Self {
        self.meta.get_or_insert_with(TypeMeta::default).needs_instance = true;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.meta.get_or_insert_with(TypeMeta::default).namespace = Some(namespace.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.meta.get_or_insert_with(TypeMeta::default).alias = Some(alias.into());
        self
    }

    /// Mark the type as implementing [`ConverterModule`].
    pub fn module<M: ConverterModule + Default + 'static>(mut self) -> Self {
        self.module = Some(Arc::new(|registry: &Registry| M::default().register(registry)));
        self
    }

    pub fn constructor<C, F>(mut self, f: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&Registry) -> C + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move |registry: &Registry| {
            Ok(Arc::new(f(registry)) as Instance)
        }));
        self
    }

    pub fn default_constructor<C: Any + Default + Send + Sync>(self) -> Self {
        self.constructor(|_| C::default())
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    fn namespace_label(&self) -> String {
        self.meta
            .as_ref()
            .and_then(|m| m.namespace.clone())
            .unwrap_or_else(|| self.ty.namespace().to_string())
    }
}

/// A declaration submitted with `inventory`, grouped by code unit.
pub struct ConverterDecl {
    pub unit: &'static str,
    pub describe: fn() -> TypeDescriptor,
}

inventory::collect!(ConverterDecl);

/// Enumerates code units and the converter types declared in them.
pub trait ReflectionProvider: Send + Sync {
    fn units(&self) -> Vec<String>;

    /// Descriptors declared in `unit`, or `AssemblyFileNotFound`.
    fn types(&self, unit: &str) -> Result<Vec<TypeDescriptor>, ConvertError>;
}

/// Reads every linked [`ConverterDecl`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryProvider;

impl ReflectionProvider for InventoryProvider {
    fn units(&self) -> Vec<String> {
        let mut units: Vec<String> = Vec::new();
        for decl in inventory::iter::<ConverterDecl> {
            if !units.iter().any(|u| u == decl.unit) {
                units.push(decl.unit.to_string());
            }
        }
        units
    }

    fn types(&self, unit: &str) -> Result<Vec<TypeDescriptor>, ConvertError> {
        let types: Vec<TypeDescriptor> = inventory::iter::<ConverterDecl>
            .into_iter()
            .filter(|decl| decl.unit == unit)
            .map(|decl| (decl.describe)())
            .collect();
        if types.is_empty() {
            return Err(ConvertError::AssemblyFileNotFound(unit.to_string()));
        }
        Ok(types)
    }
}

/// Explicit unit → descriptor lists.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    units: IndexMap<String, Vec<TypeDescriptor>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(mut self, name: impl Into<String>, types: Vec<TypeDescriptor>) -> Self {
        self.units.entry(name.into()).or_default().extend(types);
        self
    }
}

impl ReflectionProvider for StaticProvider {
    fn units(&self) -> Vec<String> {
        self.units.keys().cloned().collect()
    }

    fn types(&self, unit: &str) -> Result<Vec<TypeDescriptor>, ConvertError> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| ConvertError::AssemblyFileNotFound(unit.to_string()))
    }
}

/// Creates live instances of converter types.
pub trait InstanceFactory: Send + Sync {
    fn create(&self, descriptor: &TypeDescriptor, registry: &Registry)
    -> Result<Instance, ConvertError>;

    /// Forget every instance created so far.
    fn reset(&self) {}
}

/// What [`DefaultInstanceFactory`] does when asked for a type twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateInstance {
    /// Fail with `InstanceExists`.
    #[default]
    Error,
    /// Hand back the instance created the first time.
    Ignore,
}

/// Builds instances with the descriptor's constructor.
#[derive(Default)]
pub struct DefaultInstanceFactory {
    duplicate: DuplicateInstance,
    created: Mutex<HashMap<TypeKey, Instance>>,
}

impl DefaultInstanceFactory {
    pub fn new(duplicate: DuplicateInstance) -> Self {
        Self {
            duplicate,
            created: Mutex::new(HashMap::new()),
        }
    }
}

impl InstanceFactory for DefaultInstanceFactory {
    fn create(
        &self,
        descriptor: &TypeDescriptor,
        registry: &Registry,
    ) -> Result<Instance, ConvertError> {
        if let Some(existing) = self.created.lock().get(&descriptor.ty) {
            return match self.duplicate {
                DuplicateInstance::Error => {
                    Err(ConvertError::InstanceExists(descriptor.ty.name().to_string()))
                }
                DuplicateInstance::Ignore => Ok(existing.clone()),
            };
        }

        let constructor = descriptor.constructor.as_ref().ok_or_else(|| {
            ConvertError::InstanceRequiresParameters(descriptor.ty.name().to_string())
        })?;
        let instance = constructor(registry)?;
        self.created.lock().insert(descriptor.ty, instance.clone());
        Ok(instance)
    }

    fn reset(&self) {
        self.created.lock().clear();
    }
}

/// Terminal state of visiting one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Not a converter type.
    Rejected,
    /// Parked in the registry's load-on-demand index.
    Deferred,
    /// Scanned; holds the net number of records added.
    Registered(usize),
    /// Seen before; skipped.
    AlreadyInitialized,
}

/// Drives discovery into a registry.
pub struct Discovery<'a> {
    registry: &'a Registry,
}

impl<'a> Discovery<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Discover every unit the provider knows about.
    pub fn discover_all(&self) -> Result<usize, ConvertError> {
        let provider = self.registry.provider();
        let mut total = 0;
        for unit in provider.units() {
            total += self.discover_unit(&unit)?;
        }
        Ok(total)
    }

    /// Discover one unit. A unit already discovered is skipped.
    pub fn discover_unit(&self, unit: &str) -> Result<usize, ConvertError> {
        self.registry.check_live()?;
        if !self.registry.mark_unit(unit) {
            debug!(unit, "unit already initialized");
            return Ok(0);
        }

        let result = self
            .registry
            .provider()
            .types(unit)
            .and_then(|types| self.visit_all(&types));
        match result {
            Ok(added) => {
                debug!(unit, added, "discovered unit");
                Ok(added)
            }
            Err(e) => {
                self.registry.unmark_unit(unit);
                Err(e)
            }
        }
    }

    /// Discover an explicit list of types.
    pub fn discover_types(&self, types: &[TypeDescriptor]) -> Result<usize, ConvertError> {
        self.registry.check_live()?;
        if types.is_empty() {
            return Err(ConvertError::CollectionIsNull("types".to_string()));
        }
        self.visit_all(types)
    }

    fn visit_all(&self, types: &[TypeDescriptor]) -> Result<usize, ConvertError> {
        let mut added = 0;
        for descriptor in types {
            if let Visit::Registered(n) = self.visit(descriptor)? {
                added += n;
            }
        }
        Ok(added)
    }

    pub fn visit(&self, descriptor: &TypeDescriptor) -> Result<Visit, ConvertError> {
        let meta = match (&descriptor.meta, &descriptor.module) {
            (Some(meta), _) => meta.clone(),
            (None, Some(_)) => TypeMeta::default(),
            (None, None) => {
                debug!(ty = %descriptor.ty, "rejected: no converter metadata");
                return Ok(Visit::Rejected);
            }
        };

        if !self.registry.mark_type(descriptor.ty) {
            return Ok(Visit::AlreadyInitialized);
        }

        if meta.load_on_demand {
            let namespace = descriptor.namespace_label();
            debug!(ty = %descriptor.ty, %namespace, "deferred converter type");
            self.registry.defer(namespace, descriptor.clone());
            return Ok(Visit::Deferred);
        }

        let scanned = if meta.needs_instance {
            self.registry
                .instance_for(descriptor)
                .and_then(|_| self.scan(descriptor))
        } else {
            self.scan(descriptor)
        };
        match scanned {
            Ok(added) => Ok(Visit::Registered(added)),
            Err(e) => {
                self.registry.unmark_type(descriptor.ty);
                Err(e)
            }
        }
    }

    /// Register every converter `descriptor` declares.
    ///
    /// Returns the net growth of the record list.
    pub(crate) fn scan(&self, descriptor: &TypeDescriptor) -> Result<usize, ConvertError> {
        let before = self.registry.len();

        // Bind every method before the first add.
        let type_alias = descriptor.meta.as_ref().and_then(|m| m.alias.as_deref());
        let records = descriptor
            .methods
            .iter()
            .filter(|m| m.meta.is_some())
            .map(|method| {
                let record = RecordFactory::from_method(descriptor.ty, method, || {
                    self.registry.instance_for(descriptor)
                })?;
                Ok(match (record.alias_label(), type_alias) {
                    (None, Some(alias)) => record.alias(alias),
                    _ => record,
                })
            })
            .collect::<Result<Vec<_>, ConvertError>>()?;

        if let Some(hook) = &descriptor.module {
            hook(self.registry)?;
        }
        for record in records {
            self.registry.add(record, Some(descriptor.ty), false)?;
        }

        let added = self.registry.len().saturating_sub(before);
        debug!(ty = %descriptor.ty, added, "scanned converter type");
        Ok(added)
    }
}
