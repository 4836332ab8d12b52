//! The record store.

use crate::batch::AddBuilder;
use crate::discovery::{
    DefaultInstanceFactory, Discovery, InstanceFactory, InventoryProvider, ReflectionProvider,
    TypeDescriptor,
};
use crate::error::{BoxError, ConvertError};
use crate::factory::{Instance, RecordFactory};
use crate::lookup::Query;
use crate::record::ConversionRecord;
use crate::settings::Settings;
use crate::types::{TypeHierarchy, TypeKey};
use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// What [`Registry::add`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// Folded into an existing standard record for the same type pair.
    Merged,
}

/// Registry of conversion records.
///
/// Reads go through an [`ArcSwap`] snapshot and never block. Every mutation
/// of the record list happens under a single write lock, so the
/// "find a standard record, merge or insert" sequence is atomic with
/// respect to other writers.
pub struct Registry {
    records: ArcSwap<Vec<Arc<ConversionRecord>>>,
    write: Mutex<()>,
    settings: ArcSwap<Settings>,
    hierarchy: RwLock<TypeHierarchy>,
    /// Deferred declaring types by namespace label.
    pending: Mutex<IndexMap<String, Vec<TypeDescriptor>>>,
    instances: Mutex<HashMap<TypeKey, Instance>>,
    initialized_types: RwLock<HashSet<TypeKey>>,
    initialized_units: RwLock<HashSet<String>>,
    provider: RwLock<Arc<dyn ReflectionProvider>>,
    factory: RwLock<Arc<dyn InstanceFactory>>,
    disposed: AtomicBool,
    bootstrapped: AtomicBool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.len())
            .field("pending", &self.pending.lock().len())
            .field("disposed", &self.disposed.load(Ordering::Acquire))
            .finish()
    }
}

impl Registry {
    /// Create an empty registry with default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Create an empty registry with `settings`.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            records: ArcSwap::from_pointee(Vec::new()),
            write: Mutex::new(()),
            settings: ArcSwap::from_pointee(settings),
            hierarchy: RwLock::new(TypeHierarchy::new()),
            pending: Mutex::new(IndexMap::new()),
            instances: Mutex::new(HashMap::new()),
            initialized_types: RwLock::new(HashSet::new()),
            initialized_units: RwLock::new(HashSet::new()),
            provider: RwLock::new(Arc::new(InventoryProvider)),
            factory: RwLock::new(Arc::new(DefaultInstanceFactory::default())),
            disposed: AtomicBool::new(false),
            bootstrapped: AtomicBool::new(false),
        }
    }

    /// Replace the source of declared converter types.
    pub fn with_provider(self, provider: impl ReflectionProvider + 'static) -> Self {
        *self.provider.write() = Arc::new(provider);
        self
    }

    /// Replace the factory used for instance-bound converter methods.
    pub fn with_instance_factory(self, factory: impl InstanceFactory + 'static) -> Self {
        *self.factory.write() = Arc::new(factory);
        self
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Edit a copy of the settings and swap it in.
    pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) {
        let mut settings = (**self.settings.load()).clone();
        f(&mut settings);
        self.settings.store(Arc::new(settings));
    }

    /// Declare that `D` is assignable to `B`.
    pub fn declare_upcast<D, B, F>(&self, upcast: F)
    where
        D: Any + Send + Sync,
        B: Any + Send + Sync,
        F: Fn(&D) -> B + Send + Sync + 'static,
    {
        self.hierarchy.write().declare::<D, B, F>(upcast);
    }

    /// Declared upcasts, read-locked.
    pub fn hierarchy(&self) -> RwLockReadGuard<'_, TypeHierarchy> {
        self.hierarchy.read()
    }

    /// Current record list, in registration order.
    pub fn records(&self) -> Arc<Vec<Arc<ConversionRecord>>> {
        self.records.load_full()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.load().len()
    }

    /// True when no record is registered.
    pub fn is_empty(&self) -> bool {
        self.records.load().is_empty()
    }

    /// True between [`Registry::dispose`] and [`Registry::reinitialize`].
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn check_live(&self) -> Result<(), ConvertError> {
        if self.is_disposed() {
            Err(ConvertError::RegistryDisposed)
        } else {
            Ok(())
        }
    }

    /// Add a record.
    ///
    /// A standard record that is not disambiguate-allowed merges into the
    /// first existing standard record for the same `(source, target)` pair;
    /// a slot filled on both sides is [`ConvertError::ConverterExists`].
    pub fn add(
        &self,
        mut record: ConversionRecord,
        declaring: Option<TypeKey>,
        allow_disambiguates: bool,
    ) -> Result<AddOutcome, ConvertError> {
        if let Some(ty) = declaring {
            record.stamp_declaring(ty);
        }
        if allow_disambiguates {
            record.set_disambiguate();
        }

        let settings = self.settings.load_full();
        check_policy(&record, &settings)?;
        if !record.has_any_function() {
            return Err(ConvertError::ConverterFunctionsNull {
                from: record.source().name().to_string(),
                to: record.target().name().to_string(),
            });
        }

        let _guard = self.write.lock();
        self.check_live()?;
        let current = self.records.load();

        if record.is_standard() && !record.allows_disambiguates() {
            let existing = current.iter().position(|r| {
                r.is_standard()
                    && !r.allows_disambiguates()
                    && r.source() == record.source()
                    && r.target() == record.target()
            });
            if let Some(idx) = existing {
                let merged = current[idx].merge(&record)?;
                let mut next = (**current).clone();
                next[idx] = Arc::new(merged);
                self.records.store(Arc::new(next));
                debug!(record = %record.describe(), "merged converter");
                return Ok(AddOutcome::Merged);
            }
        }

        if current.len() >= settings.capacity {
            return Err(ConvertError::CapacityExceeded(settings.capacity));
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        debug!(record = %record.describe(), "inserted converter");
        next.push(Arc::new(record));
        self.records.store(Arc::new(next));
        Ok(AddOutcome::Inserted)
    }

    /// Register `f: In → Out`.
    pub fn add_fn<In, Out, F>(&self, f: F) -> Result<AddOutcome, ConvertError>
    where
        In: Any,
        Out: Any + Send + Sync,
        F: Fn(&In) -> Out + Send + Sync + 'static,
    {
        self.add(RecordFactory::from_fn(f), None, false)
    }

    /// Register a fallible `f: In → Out`.
    pub fn try_add_fn<In, Out, E, F>(&self, f: F) -> Result<AddOutcome, ConvertError>
    where
        In: Any,
        Out: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&In) -> Result<Out, E> + Send + Sync + 'static,
    {
        self.add(RecordFactory::try_from_fn(f), None, false)
    }

    /// Register `f: In × Arg → Out`.
    pub fn add_fn_with_default<In, Arg, Out, F>(&self, f: F) -> Result<AddOutcome, ConvertError>
    where
        In: Any,
        Arg: Any,
        Out: Any + Send + Sync,
        F: Fn(&In, &Arg) -> Out + Send + Sync + 'static,
    {
        self.add(RecordFactory::from_fn_with_default(f), None, false)
    }

    /// Register a forward and a backward conversion together.
    pub fn add_pair<A, B, F, G>(
        &self,
        forward: F,
        backward: G,
    ) -> Result<(AddOutcome, AddOutcome), ConvertError>
    where
        A: Any + Send + Sync,
        B: Any + Send + Sync,
        F: Fn(&A) -> B + Send + Sync + 'static,
        G: Fn(&B) -> A + Send + Sync + 'static,
    {
        let fwd = self.add_fn(forward)?;
        let bwd = self.add_fn(backward)?;
        Ok((fwd, bwd))
    }

    /// Register a same-type transform distinguished by `alias`.
    pub fn add_transform<T, F>(&self, alias: &str, f: F) -> Result<AddOutcome, ConvertError>
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.add_transform_to::<T, T, F>(alias, f)
    }

    /// Register a transform between similar types, distinguished by `alias`.
    pub fn add_transform_to<T, Out, F>(&self, alias: &str, f: F) -> Result<AddOutcome, ConvertError>
    where
        T: Any,
        Out: Any + Send + Sync,
        F: Fn(&T) -> Out + Send + Sync + 'static,
    {
        let record = RecordFactory::from_fn(f).alias(alias).name(alias);
        self.add(record, None, true)
    }

    /// Start a batch of registrations committed together.
    pub fn batch(&self) -> AddBuilder<'_> {
        AddBuilder::new(self)
    }

    /// Whether some record converts `In` to `Out`.
    pub fn can_convert<In: Any, Out: Any>(&self) -> bool {
        self.probe(Query::pair::<In, Out>())
    }

    /// Whether some record converts from `In`.
    pub fn can_convert_from<In: Any>(&self) -> bool {
        self.probe(Query::new().source(TypeKey::of::<In>()))
    }

    /// Whether some record converts to `Out`.
    pub fn can_convert_to<Out: Any>(&self) -> bool {
        self.probe(Query::new().target(TypeKey::of::<Out>()))
    }

    fn probe(&self, query: Query) -> bool {
        !self.is_disposed() && self.lookup().find(&query.load_on_demand(true)).is_some()
    }

    /// Drop every record, the deferred index, cached instances and
    /// discovery marks. The registry refuses further use until
    /// [`Registry::reinitialize`].
    pub fn dispose(&self) {
        let _guard = self.write.lock();
        let dropped = self.records.swap(Arc::new(Vec::new())).len();
        self.pending.lock().clear();
        self.instances.lock().clear();
        self.initialized_types.write().clear();
        self.initialized_units.write().clear();
        self.factory.read().reset();
        self.bootstrapped.store(false, Ordering::Release);
        self.disposed.store(true, Ordering::Release);
        debug!(dropped, "disposed registry");
    }

    /// Make a disposed registry usable again, empty.
    pub fn reinitialize(&self) {
        let _guard = self.write.lock();
        self.disposed.store(false, Ordering::Release);
    }

    /// Run discovery over every declared unit if `auto_initialize` is set.
    ///
    /// Only the first call does any work.
    pub fn initialize(&self) -> Result<usize, ConvertError> {
        self.check_live()?;
        if !self.settings.load().auto_initialize {
            return Ok(0);
        }
        if self.bootstrapped.swap(true, Ordering::AcqRel) {
            return Ok(0);
        }
        Discovery::new(self)
            .discover_all()
            .map_err(|e| ConvertError::AutoInitializationFailed(e.to_string()))
    }

    pub(crate) fn ensure_initialized(&self) {
        if self.bootstrapped.load(Ordering::Acquire) || !self.settings.load().auto_initialize {
            return;
        }
        if let Err(e) = self.initialize() {
            warn!(error = %e, "auto-initialization failed");
        }
    }

    /// Scan every deferred type whose namespace covers `target`'s.
    ///
    /// The matching namespaces leave the index before scanning starts, so a
    /// concurrent caller for the same namespace gets 0. Returns the number
    /// of types attempted.
    pub fn load_on_demand(&self, target: TypeKey) -> usize {
        let batches: Vec<(String, Vec<TypeDescriptor>)> = {
            let mut pending = self.pending.lock();
            let keys: Vec<String> = pending
                .keys()
                .filter(|ns| namespace_covers(ns, target.namespace()))
                .cloned()
                .collect();
            keys.iter()
                .filter_map(|k| pending.shift_remove_entry(k))
                .collect()
        };

        let discovery = Discovery::new(self);
        let mut attempted = 0;
        for (namespace, types) in batches {
            debug!(%namespace, types = types.len(), "loading deferred converters");
            for descriptor in &types {
                attempted += 1;
                if let Err(e) = discovery.scan(descriptor) {
                    warn!(ty = %descriptor.ty, error = %e, "deferred converter failed to load");
                }
            }
        }
        attempted
    }

    pub(crate) fn defer(&self, namespace: String, descriptor: TypeDescriptor) {
        self.pending
            .lock()
            .entry(namespace)
            .or_default()
            .push(descriptor);
    }

    /// Namespaces with deferred types still waiting.
    pub fn pending_namespaces(&self) -> Vec<String> {
        self.pending.lock().keys().cloned().collect()
    }

    pub(crate) fn provider(&self) -> Arc<dyn ReflectionProvider> {
        self.provider.read().clone()
    }

    /// Mark a type as scanned. Returns false if it already was.
    pub(crate) fn mark_type(&self, ty: TypeKey) -> bool {
        self.initialized_types.write().insert(ty)
    }

    pub(crate) fn unmark_type(&self, ty: TypeKey) {
        self.initialized_types.write().remove(&ty);
    }

    pub(crate) fn mark_unit(&self, unit: &str) -> bool {
        self.initialized_units.write().insert(unit.to_string())
    }

    pub(crate) fn unmark_unit(&self, unit: &str) {
        self.initialized_units.write().remove(unit);
    }

    /// Whether discovery has visited `ty`.
    pub fn is_type_initialized(&self, ty: TypeKey) -> bool {
        self.initialized_types.read().contains(&ty)
    }

    /// Whether discovery has run for `unit`.
    pub fn is_unit_initialized(&self, unit: &str) -> bool {
        self.initialized_units.read().contains(unit)
    }

    /// The cached instance of `descriptor`'s type, created on first use.
    pub(crate) fn instance_for(&self, descriptor: &TypeDescriptor) -> Result<Instance, ConvertError> {
        let mut instances = self.instances.lock();
        if let Some(instance) = instances.get(&descriptor.ty) {
            return Ok(instance.clone());
        }
        let factory = self.factory.read().clone();
        let instance = factory.create(descriptor, self)?;
        debug!(ty = %descriptor.ty, "instantiated converter type");
        instances.insert(descriptor.ty, instance.clone());
        Ok(instance)
    }
}

fn check_policy(record: &ConversionRecord, settings: &Settings) -> Result<(), ConvertError> {
    if !settings.allow_generic_types {
        for ty in [record.source(), record.target(), record.argument()] {
            if ty.is_generic() {
                return Err(ConvertError::ArgumentGenericType(ty.name().to_string()));
            }
        }
    }
    if !settings.allow_explicit_any_type && (record.source().is_any() || record.target().is_any())
    {
        return Err(ConvertError::ArgumentWrongType {
            what: "converter type",
            expected: "a concrete type".to_string(),
            found: TypeKey::any().name().to_string(),
        });
    }
    Ok(())
}

/// Whether namespace label `key` covers `namespace` (equal, or a parent path).
fn namespace_covers(key: &str, namespace: &str) -> bool {
    namespace == key
        || (namespace.starts_with(key) && namespace[key.len()..].starts_with("::"))
}
