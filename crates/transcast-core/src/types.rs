//! Type identity: keys for the record index and declared assignability.
//!
//! Rust has no runtime inheritance, so the relationships the lookup layer
//! needs ("is this argument type assignable to that one", "do these two
//! types share a base") are declared explicitly in a [`TypeHierarchy`].

use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An owned, type-erased value.
pub type Boxed = Box<dyn Any + Send + Sync>;

/// Marker type behind the "any" sentinel.
///
/// A record whose argument type is `AnyType` accepts any model (or none);
/// a record whose source type is `AnyType` is an object-typed fallback
/// that accepts values of every type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnyType;

/// Identity of a Rust type inside the registry.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The "any" sentinel.
    pub fn any() -> Self {
        Self::of::<AnyType>()
    }

    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<AnyType>()
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, generics included.
    pub fn short_name(&self) -> &'static str {
        let head = self.name.split('<').next().unwrap_or(self.name);
        match head.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }

    /// Module path of the type, with generic arguments stripped.
    ///
    /// Primitives and other unqualified names have an empty namespace.
    pub fn namespace(&self) -> &'static str {
        let head = self.name.split('<').next().unwrap_or(self.name);
        match head.rfind("::") {
            Some(idx) => &head[..idx],
            None => "",
        }
    }

    /// Whether the type carries type parameters.
    ///
    /// `Vec<T>` plays the role of a plain array and does not count.
    pub fn is_generic(&self) -> bool {
        self.name.contains('<') && !self.name.starts_with("alloc::vec::Vec<")
    }

    /// Whether `value` is an instance of this type.
    pub fn matches(&self, value: &dyn Any) -> bool {
        value.type_id() == self.id
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type UpcastFn = Arc<dyn Fn(&dyn Any) -> Option<Boxed> + Send + Sync>;

#[derive(Clone)]
struct Upcast {
    base: TypeKey,
    cast: UpcastFn,
}

/// Declared "derived is assignable to base" relationships.
#[derive(Clone, Default)]
pub struct TypeHierarchy {
    parents: IndexMap<TypeKey, Vec<Upcast>>,
}

impl fmt::Debug for TypeHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (ty, ups) in &self.parents {
            let bases: Vec<_> = ups.iter().map(|u| u.base.name()).collect();
            map.entry(&ty.name(), &bases);
        }
        map.finish()
    }
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `D` is assignable to `B`, converting with `upcast`.
    pub fn declare<D, B, F>(&mut self, upcast: F)
    where
        D: Any + Send + Sync,
        B: Any + Send + Sync,
        F: Fn(&D) -> B + Send + Sync + 'static,
    {
        let cast: UpcastFn = Arc::new(move |value: &dyn Any| {
            value
                .downcast_ref::<D>()
                .map(|d| Box::new(upcast(d)) as Boxed)
        });
        self.parents.entry(TypeKey::of::<D>()).or_default().push(Upcast {
            base: TypeKey::of::<B>(),
            cast,
        });
    }

    /// First declared base of `ty`, if any.
    pub fn base_of(&self, ty: TypeKey) -> Option<TypeKey> {
        self.parents.get(&ty)?.first().map(|u| u.base)
    }

    /// Whether a value of type `from` may stand in for `to`.
    pub fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool {
        from == to || self.path(from, to).is_some()
    }

    /// Convert `value` (of type `from`) into an owned value of type `to`.
    ///
    /// Returns `None` when no declared chain links the two types.
    pub fn upcast(&self, value: &dyn Any, from: TypeKey, to: TypeKey) -> Option<Boxed> {
        let path = self.path(from, to)?;
        let mut iter = path.into_iter();
        let mut current = (iter.next()?.cast)(value)?;
        for step in iter {
            current = (step.cast)(&*current)?;
        }
        Some(current)
    }

    /// Breadth-first search for the shortest upcast chain.
    fn path(&self, from: TypeKey, to: TypeKey) -> Option<Vec<Upcast>> {
        if from == to {
            return None;
        }
        let mut seen = HashSet::new();
        let mut queue: VecDeque<(TypeKey, Vec<Upcast>)> = VecDeque::new();
        queue.push_back((from, Vec::new()));
        seen.insert(from);

        while let Some((ty, chain)) = queue.pop_front() {
            let Some(ups) = self.parents.get(&ty) else {
                continue;
            };
            for up in ups {
                let mut next = chain.clone();
                next.push(up.clone());
                if up.base == to {
                    return Some(next);
                }
                if seen.insert(up.base) {
                    queue.push_back((up.base, next));
                }
            }
        }
        None
    }
}

/// Whether two types are "similar": same namespace and same declared base.
///
/// Two types without a declared base count as sharing the implicit root.
pub fn are_similar(a: TypeKey, b: TypeKey, hierarchy: &TypeHierarchy) -> bool {
    a == b || (a.namespace() == b.namespace() && hierarchy.base_of(a) == hierarchy.base_of(b))
}
