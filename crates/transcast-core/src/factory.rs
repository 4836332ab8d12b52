//! Building records from functions and declared methods.
//!
//! Three method shapes are supported, each with its own constructor on
//! [`MethodDescriptor`]:
//!
//! - **static**: a free function taking the value (and optionally a model);
//! - **receiver**: a method whose receiver *is* the value being converted,
//!   such as `fn to_label(&self) -> String` or a self-conversion operator;
//! - **instance**: a method on a converter object that the discovery layer
//!   instantiates once and binds at registration time.

use crate::error::{BoxError, ConvertError, classify};
use crate::record::{BinaryFn, ConversionRecord, UnaryFn};
use crate::types::{Boxed, TypeKey};
use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// A live converter object produced by an instance factory.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// (instance, value) → target
pub type InstanceUnaryFn =
    Arc<dyn Fn(&dyn Any, &dyn Any) -> Result<Boxed, ConvertError> + Send + Sync>;

/// (instance, value, model) → target
pub type InstanceBinaryFn =
    Arc<dyn Fn(&dyn Any, &dyn Any, &dyn Any) -> Result<Boxed, ConvertError> + Send + Sync>;

/// Declared parameter and return types of a callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeKey>,
    pub ret: TypeKey,
}

impl Signature {
    pub fn new(params: Vec<TypeKey>, ret: TypeKey) -> Self {
        Self { params, ret }
    }

    pub fn unary<In: ?Sized + 'static, Out: 'static>() -> Self {
        Self::new(vec![TypeKey::of::<In>()], TypeKey::of::<Out>())
    }

    pub fn binary<In: 'static, Arg: 'static, Out: 'static>() -> Self {
        Self::new(
            vec![TypeKey::of::<In>(), TypeKey::of::<Arg>()],
            TypeKey::of::<Out>(),
        )
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A type-erased free function.
#[derive(Clone)]
pub enum Callable {
    Unary(UnaryFn),
    Binary(BinaryFn),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Unary(_) => f.write_str("Callable::Unary"),
            Callable::Binary(_) => f.write_str("Callable::Binary"),
        }
    }
}

/// A type-erased method on a converter object.
#[derive(Clone)]
pub enum InstanceCallable {
    Unary(InstanceUnaryFn),
    Binary(InstanceBinaryFn),
}

/// How a declared method turns into a record.
#[derive(Clone)]
pub enum MethodBinding {
    Static {
        signature: Signature,
        callable: Callable,
    },
    /// `signature.params[0]` is the receiver and must be the declaring type.
    Receiver {
        signature: Signature,
        callable: UnaryFn,
    },
    /// `owner` is the converter object's type and must be the declaring type.
    Instance {
        owner: TypeKey,
        signature: Signature,
        callable: InstanceCallable,
    },
}

impl MethodBinding {
    pub fn signature(&self) -> &Signature {
        match self {
            MethodBinding::Static { signature, .. }
            | MethodBinding::Receiver { signature, .. }
            | MethodBinding::Instance { signature, .. } => signature,
        }
    }

    /// Whether binding this method needs a live instance of the declaring type.
    pub fn needs_instance(&self) -> bool {
        matches!(self, MethodBinding::Instance { .. })
    }
}

/// Per-method conversion metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodMeta {
    pub name: String,
    pub alias: Option<String>,
    /// Register with `allows_disambiguates` set.
    pub disambiguate: bool,
}

/// A method offered by a declaring type.
///
/// Only methods carrying [`MethodMeta`] are turned into records.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub meta: Option<MethodMeta>,
    pub binding: MethodBinding,
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("meta", &self.meta)
            .field("signature", self.binding.signature())
            .finish()
    }
}

impl MethodDescriptor {
    pub fn raw(name: impl Into<String>, binding: MethodBinding) -> Self {
        Self {
            meta: Some(MethodMeta {
                name: name.into(),
                ..Default::default()
            }),
            binding,
        }
    }

    /// A static function: `value → target`.
    pub fn function<In, Out, F>(name: impl Into<String>, f: F) -> Self
    where
        In: Any,
        Out: Any + Send + Sync,
        F: Fn(&In) -> Out + Send + Sync + 'static,
    {
        Self::try_function(name, move |v: &In| Ok::<_, Infallible>(f(v)))
    }

    pub fn try_function<In, Out, E, F>(name: impl Into<String>, f: F) -> Self
    where
        In: Any,
        Out: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&In) -> Result<Out, E> + Send + Sync + 'static,
    {
        Self::raw(
            name,
            MethodBinding::Static {
                signature: Signature::unary::<In, Out>(),
                callable: Callable::Unary(erase_unary(f)),
            },
        )
    }

    /// A static function: `value × model → target`.
    pub fn function_with_default<In, Arg, Out, F>(name: impl Into<String>, f: F) -> Self
    where
        In: Any,
        Arg: Any,
        Out: Any + Send + Sync,
        F: Fn(&In, &Arg) -> Out + Send + Sync + 'static,
    {
        Self::raw(
            name,
            MethodBinding::Static {
                signature: Signature::binary::<In, Arg, Out>(),
                callable: Callable::Binary(erase_binary(move |v: &In, a: &Arg| {
                    Ok::<_, Infallible>(f(v, a))
                })),
            },
        )
    }

    /// A method whose receiver is the value being converted.
    pub fn receiver<T, Out, F>(name: impl Into<String>, f: F) -> Self
    where
        T: Any,
        Out: Any + Send + Sync,
        F: Fn(&T) -> Out + Send + Sync + 'static,
    {
        Self::try_receiver(name, move |v: &T| Ok::<_, Infallible>(f(v)))
    }

    pub fn try_receiver<T, Out, E, F>(name: impl Into<String>, f: F) -> Self
    where
        T: Any,
        Out: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&T) -> Result<Out, E> + Send + Sync + 'static,
    {
        Self::raw(
            name,
            MethodBinding::Receiver {
                signature: Signature::unary::<T, Out>(),
                callable: erase_unary(f),
            },
        )
    }

    /// A method on converter object `C`: `(instance, value) → target`.
    pub fn instance<C, In, Out, F>(name: impl Into<String>, f: F) -> Self
    where
        C: Any,
        In: Any,
        Out: Any + Send + Sync,
        F: Fn(&C, &In) -> Out + Send + Sync + 'static,
    {
        Self::try_instance(name, move |c: &C, v: &In| Ok::<_, Infallible>(f(c, v)))
    }

    pub fn try_instance<C, In, Out, E, F>(name: impl Into<String>, f: F) -> Self
    where
        C: Any,
        In: Any,
        Out: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&C, &In) -> Result<Out, E> + Send + Sync + 'static,
    {
        let callable: InstanceUnaryFn = Arc::new(move |inst: &dyn Any, v: &dyn Any| {
            let owner = downcast::<C>(inst, "instance")?;
            let input = downcast::<In>(v, "value")?;
            f(owner, input)
                .map(|out| Box::new(out) as Boxed)
                .map_err(|e| classify(e.into()))
        });
        Self::raw(
            name,
            MethodBinding::Instance {
                owner: TypeKey::of::<C>(),
                signature: Signature::unary::<In, Out>(),
                callable: InstanceCallable::Unary(callable),
            },
        )
    }

    /// A method on converter object `C`: `(instance, value, model) → target`.
    pub fn instance_with_default<C, In, Arg, Out, F>(name: impl Into<String>, f: F) -> Self
    where
        C: Any,
        In: Any,
        Arg: Any,
        Out: Any + Send + Sync,
        F: Fn(&C, &In, &Arg) -> Out + Send + Sync + 'static,
    {
        let callable: InstanceBinaryFn =
            Arc::new(move |inst: &dyn Any, v: &dyn Any, a: &dyn Any| {
                let owner = downcast::<C>(inst, "instance")?;
                let input = downcast::<In>(v, "value")?;
                let arg = downcast::<Arg>(a, "model")?;
                Ok(Box::new(f(owner, input, arg)) as Boxed)
            });
        Self::raw(
            name,
            MethodBinding::Instance {
                owner: TypeKey::of::<C>(),
                signature: Signature::binary::<In, Arg, Out>(),
                callable: InstanceCallable::Binary(callable),
            },
        )
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        if let Some(meta) = self.meta.as_mut() {
            meta.alias = Some(alias.into());
        }
        self
    }

    pub fn disambiguate(mut self) -> Self {
        if let Some(meta) = self.meta.as_mut() {
            meta.disambiguate = true;
        }
        self
    }

    /// Strip the conversion metadata so scanning skips this method.
    pub fn unmarked(mut self) -> Self {
        self.meta = None;
        self
    }
}

/// Builds [`ConversionRecord`]s.
pub struct RecordFactory;

impl RecordFactory {
    /// Build a record from an erased callable, validating its arity.
    ///
    /// One parameter fills the single-argument slot with an "any" argument
    /// type; two parameters fill the default-taking slot with the second
    /// parameter as the argument type.
    pub fn from_callable(
        name: &str,
        signature: &Signature,
        callable: Callable,
    ) -> Result<ConversionRecord, ConvertError> {
        check_arity(name, signature)?;
        let source = signature.params[0];
        let record = ConversionRecord::new(source, signature.ret);

        match (signature.arity(), callable) {
            (1, Callable::Unary(f)) => Ok(record.primary(f)),
            (2, Callable::Binary(f)) => Ok(record.with_default(signature.params[1], f)),
            (arity, callable) => Err(ConvertError::DelegateArgumentWrongType(format!(
                "'{}' declares {} parameters but its callable is {:?}",
                name, arity, callable
            ))),
        }
    }

    /// `value → target` from an infallible function.
    pub fn from_fn<In, Out, F>(f: F) -> ConversionRecord
    where
        In: Any,
        Out: Any + Send + Sync,
        F: Fn(&In) -> Out + Send + Sync + 'static,
    {
        Self::try_from_fn(move |v: &In| Ok::<_, Infallible>(f(v)))
    }

    /// `value → target` from a fallible function.
    pub fn try_from_fn<In, Out, E, F>(f: F) -> ConversionRecord
    where
        In: Any,
        Out: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&In) -> Result<Out, E> + Send + Sync + 'static,
    {
        ConversionRecord::new(TypeKey::of::<In>(), TypeKey::of::<Out>()).primary(erase_unary(f))
    }

    /// `value × model → target` from an infallible function.
    pub fn from_fn_with_default<In, Arg, Out, F>(f: F) -> ConversionRecord
    where
        In: Any,
        Arg: Any,
        Out: Any + Send + Sync,
        F: Fn(&In, &Arg) -> Out + Send + Sync + 'static,
    {
        Self::try_from_fn_with_default(move |v: &In, a: &Arg| Ok::<_, Infallible>(f(v, a)))
    }

    /// `value × model → target` from a fallible function.
    pub fn try_from_fn_with_default<In, Arg, Out, E, F>(f: F) -> ConversionRecord
    where
        In: Any,
        Arg: Any,
        Out: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&In, &Arg) -> Result<Out, E> + Send + Sync + 'static,
    {
        ConversionRecord::new(TypeKey::of::<In>(), TypeKey::of::<Out>())
            .with_default(TypeKey::of::<Arg>(), erase_binary(f))
    }

    /// An object-typed fallback: accepts a value of any type.
    pub fn from_any_fn<Out, E, F>(f: F) -> ConversionRecord
    where
        Out: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&dyn Any) -> Result<Out, E> + Send + Sync + 'static,
    {
        let erased: UnaryFn = Arc::new(move |v: &dyn Any| {
            f(v).map(|out| Box::new(out) as Boxed)
                .map_err(|e| classify(e.into()))
        });
        ConversionRecord::new(TypeKey::any(), TypeKey::of::<Out>()).primary(erased)
    }

    /// Build a record from a declared method of `declaring`.
    ///
    /// `instance` is only called for instance-bound methods.
    pub fn from_method<I>(
        declaring: TypeKey,
        method: &MethodDescriptor,
        instance: I,
    ) -> Result<ConversionRecord, ConvertError>
    where
        I: FnOnce() -> Result<Instance, ConvertError>,
    {
        let name = method
            .meta
            .as_ref()
            .map(|m| m.name.clone())
            .unwrap_or_default();

        let record = match &method.binding {
            MethodBinding::Static {
                signature,
                callable,
            } => Self::from_callable(&name, signature, callable.clone())?,
            MethodBinding::Receiver {
                signature,
                callable,
            } => {
                check_arity(&name, signature)?;
                if signature.arity() != 1 || signature.params[0] != declaring {
                    return Err(ConvertError::DelegateArgumentWrongType(format!(
                        "receiver method '{}' must take only {}",
                        name, declaring
                    )));
                }
                ConversionRecord::new(declaring, signature.ret).primary(callable.clone())
            }
            MethodBinding::Instance {
                owner,
                signature,
                callable,
            } => {
                check_arity(&name, signature)?;
                if *owner != declaring {
                    return Err(ConvertError::DelegateArgumentWrongType(format!(
                        "method '{}' belongs to {}, not {}",
                        name, owner, declaring
                    )));
                }
                let bound = bind_instance(callable, instance()?);
                Self::from_callable(&name, signature, bound)?
            }
        };

        let mut record = record.declared_by(declaring);
        if let Some(meta) = &method.meta {
            if !meta.name.is_empty() {
                record = record.name(meta.name.clone());
            }
            if let Some(alias) = &meta.alias {
                record = record.alias(alias.clone());
            }
            if meta.disambiguate {
                record = record.disambiguate();
            }
        }
        Ok(record)
    }
}

fn check_arity(name: &str, signature: &Signature) -> Result<(), ConvertError> {
    match signature.arity() {
        0 => Err(ConvertError::ArgumentDelegateNoParameters(name.to_string())),
        1 | 2 => Ok(()),
        count => Err(ConvertError::ArgumentDelegateTooManyParameters {
            name: name.to_string(),
            count,
        }),
    }
}

fn bind_instance(callable: &InstanceCallable, instance: Instance) -> Callable {
    match callable {
        InstanceCallable::Unary(f) => {
            let f = f.clone();
            Callable::Unary(Arc::new(move |v: &dyn Any| f(&*instance, v)))
        }
        InstanceCallable::Binary(f) => {
            let f = f.clone();
            Callable::Binary(Arc::new(move |v: &dyn Any, a: &dyn Any| f(&*instance, v, a)))
        }
    }
}

fn downcast<'a, T: Any>(value: &'a dyn Any, what: &'static str) -> Result<&'a T, ConvertError> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| ConvertError::ArgumentWrongType {
            what,
            expected: std::any::type_name::<T>().to_string(),
            found: format!("{:?}", value.type_id()),
        })
}

fn erase_unary<In, Out, E, F>(f: F) -> UnaryFn
where
    In: Any,
    Out: Any + Send + Sync,
    E: Into<BoxError>,
    F: Fn(&In) -> Result<Out, E> + Send + Sync + 'static,
{
    Arc::new(move |v: &dyn Any| {
        let input = downcast::<In>(v, "value")?;
        f(input)
            .map(|out| Box::new(out) as Boxed)
            .map_err(|e| classify(e.into()))
    })
}

fn erase_binary<In, Arg, Out, E, F>(f: F) -> BinaryFn
where
    In: Any,
    Arg: Any,
    Out: Any + Send + Sync,
    E: Into<BoxError>,
    F: Fn(&In, &Arg) -> Result<Out, E> + Send + Sync + 'static,
{
    Arc::new(move |v: &dyn Any, a: &dyn Any| {
        let input = downcast::<In>(v, "value")?;
        let arg = downcast::<Arg>(a, "model")?;
        f(input, arg)
            .map(|out| Box::new(out) as Boxed)
            .map_err(|e| classify(e.into()))
    })
}
