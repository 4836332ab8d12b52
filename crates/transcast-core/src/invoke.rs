//! Cast, convert and transform entry points.
//!
//! Every entry point exists in three strengths:
//!
//! - `*_strict` returns the error;
//! - `try_*` returns `None` on any failure;
//! - the plain form returns the target's zero value on failure.
//!
//! Only [`Registry::convert_with`] and [`Registry::transform`] also consult
//! `Settings::strict`, along with their per-call throw flags.

use crate::error::{ConvertError, ErrorKind};
use crate::lookup::{Match, MatchTier, NamePattern, Query};
use crate::record::{Call, Fallback};
use crate::registry::Registry;
use crate::types::{Boxed, TypeKey, are_similar};
use std::any::Any;
use std::fmt;
use std::panic::Location;
use tracing::warn;

/// How the engine produced a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A registered record ran.
    Record { tier: MatchTier, record: String },
    /// No record; the value already had the target type.
    Identity,
    /// No record; a declared upcast produced the target.
    Upcast,
    /// The target's zero value was returned.
    Zero,
}

/// Diagnostics and policy for a single [`Registry::convert_with`] call.
#[derive(Debug, Clone)]
pub struct ConvertContext {
    pub source: Option<TypeKey>,
    pub target: Option<TypeKey>,
    pub argument: Option<TypeKey>,
    pub caller: &'static Location<'static>,
    /// An absent value yields the zero value instead of `ArgumentNull`.
    pub nullable: bool,
    pub throw_on_error: bool,
    pub resolution: Option<Resolution>,
    /// Kind of the failure absorbed by a non-throwing call.
    pub error: Option<ErrorKind>,
}

impl Default for ConvertContext {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl ConvertContext {
    #[track_caller]
    pub fn new() -> Self {
        Self {
            source: None,
            target: None,
            argument: None,
            caller: Location::caller(),
            nullable: false,
            throw_on_error: false,
            resolution: None,
            error: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn throw_on_error(mut self, throw: bool) -> Self {
        self.throw_on_error = throw;
        self
    }
}

/// Selects one of several transforms sharing a type pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias(String);

impl Alias {
    /// The alias named after an enum variant.
    pub fn variant<E: fmt::Debug>(value: &E) -> Self {
        Self(format!("{:?}", value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Alias {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Alias {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Refuse types that are neither equal nor similar before searching.
    pub strict_type_check: bool,
    pub alias: Option<Alias>,
    pub throw: bool,
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict_type_check(mut self) -> Self {
        self.strict_type_check = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<Alias>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn throwing(mut self) -> Self {
        self.throw = true;
        self
    }
}

type Model<'a> = Option<(&'a dyn Any, TypeKey)>;

impl Registry {
    /// Cast `value`, returning `Out`'s zero value on failure.
    pub fn cast<In: Any, Out: Any + Clone + Default>(&self, value: &In) -> Out {
        self.absorb(self.cast_strict(value))
    }

    pub fn cast_strict<In: Any, Out: Any + Clone>(&self, value: &In) -> Result<Out, ConvertError> {
        self.resolve::<Out>(value, TypeKey::of::<In>(), None, None)
            .map(|(out, _)| out)
    }

    pub fn try_cast<In: Any, Out: Any + Clone>(&self, value: &In) -> Option<Out> {
        self.cast_strict(value).ok()
    }

    /// Cast a value that may be absent. Absent yields the zero value.
    pub fn cast_option<In: Any, Out: Any + Clone + Default>(&self, value: Option<&In>) -> Out {
        value.map(|v| self.cast(v)).unwrap_or_default()
    }

    /// Cast a value that may be absent. Absent is `ArgumentNull`.
    pub fn cast_option_strict<In: Any, Out: Any + Clone>(
        &self,
        value: Option<&In>,
    ) -> Result<Out, ConvertError> {
        let value = value.ok_or_else(|| {
            ConvertError::ArgumentNull(format!("value of {}", TypeKey::of::<In>()))
        })?;
        self.cast_strict(value)
    }

    /// Convert `value` with `model` as the second argument.
    ///
    /// When `model` has the target type it is a default: a record with only
    /// a single-argument function runs that function and its zero result is
    /// replaced by `model` under [`DefaultPolicy::UseWrapper`].
    ///
    /// [`DefaultPolicy::UseWrapper`]: crate::settings::DefaultPolicy::UseWrapper
    pub fn convert<In, M, Out>(&self, value: &In, model: &M) -> Out
    where
        In: Any,
        M: Any,
        Out: Any + Clone + Default + PartialEq + Send + Sync,
    {
        self.absorb(self.convert_strict(value, model))
    }

    pub fn convert_strict<In, M, Out>(&self, value: &In, model: &M) -> Result<Out, ConvertError>
    where
        In: Any,
        M: Any,
        Out: Any + Clone + Default + PartialEq + Send + Sync,
    {
        let substitute = zero_substitute::<M, Out>(model);
        let fallback = substitute.as_ref().map(|f| f as Fallback<'_>);
        let model: Model<'_> = Some((model as &dyn Any, TypeKey::of::<M>()));
        self.resolve::<Out>(value, TypeKey::of::<In>(), model, fallback)
            .map(|(out, _)| out)
    }

    pub fn try_convert<In, M, Out>(&self, value: &In, model: &M) -> Option<Out>
    where
        In: Any,
        M: Any,
        Out: Any + Clone + Default + PartialEq + Send + Sync,
    {
        self.convert_strict(value, model).ok()
    }

    /// Convert with a default of the target type.
    ///
    /// A record without a default-taking function still serves the call:
    /// its result is replaced by `default` when it is the zero value, unless
    /// the registry's policy is `ThrowOnMissingDefault`. Any failure also
    /// yields `default`.
    pub fn convert_or<In, Out>(&self, value: &In, default: Out) -> Out
    where
        In: Any,
        Out: Any + Clone + Default + PartialEq + Send + Sync,
    {
        match self.convert_strict::<In, Out, Out>(value, &default) {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, "conversion failed, using default");
                default
            }
        }
    }

    /// Convert with a context that records what the engine decided.
    ///
    /// Failures are returned when `ctx.throw_on_error` or the registry's
    /// `strict` setting is on; otherwise they yield the zero value and are
    /// noted in `ctx.error`.
    pub fn convert_with<In, M, Out>(
        &self,
        value: Option<&In>,
        model: Option<&M>,
        ctx: &mut ConvertContext,
    ) -> Result<Out, ConvertError>
    where
        In: Any,
        M: Any,
        Out: Any + Clone + Default + PartialEq + Send + Sync,
    {
        let source = TypeKey::of::<In>();
        ctx.source = Some(source);
        ctx.target = Some(TypeKey::of::<Out>());
        ctx.argument = model.map(|_| TypeKey::of::<M>());
        ctx.resolution = None;
        ctx.error = None;

        let result = match value {
            None if ctx.nullable => Ok((Out::default(), Resolution::Zero)),
            None => Err(ConvertError::ArgumentNull(format!("value of {}", source))),
            Some(v) => {
                let substitute = model.and_then(zero_substitute::<M, Out>);
                let fallback = substitute.as_ref().map(|f| f as Fallback<'_>);
                let model: Model<'_> = model.map(|m| (m as &dyn Any, TypeKey::of::<M>()));
                self.resolve::<Out>(v, source, model, fallback)
            }
        };

        match result {
            Ok((out, resolution)) => {
                ctx.resolution = Some(resolution);
                Ok(out)
            }
            Err(e) => {
                ctx.error = Some(e.kind());
                if ctx.throw_on_error || self.settings().strict {
                    return Err(e);
                }
                warn!(caller = %ctx.caller, error = %e, "conversion failed, using zero value");
                ctx.resolution = Some(Resolution::Zero);
                Ok(Out::default())
            }
        }
    }

    /// Map `value` onto an equal or similar type.
    ///
    /// Errors surface when `options.throw` or the `strict` setting is on;
    /// otherwise a failure yields the zero value.
    pub fn transform<T: Any, Out: Any + Clone + Default>(
        &self,
        value: &T,
        options: &TransformOptions,
    ) -> Result<Out, ConvertError> {
        match self.transform_strict(value, options) {
            Ok(out) => Ok(out),
            Err(e) if options.throw || self.settings().strict => Err(e),
            Err(e) => {
                warn!(error = %e, "transform failed, using zero value");
                Ok(Out::default())
            }
        }
    }

    pub fn try_transform<T: Any, Out: Any + Clone>(
        &self,
        value: &T,
        options: &TransformOptions,
    ) -> Option<Out> {
        self.transform_strict(value, options).ok()
    }

    fn transform_strict<T: Any, Out: Any + Clone>(
        &self,
        value: &T,
        options: &TransformOptions,
    ) -> Result<Out, ConvertError> {
        self.check_live()?;
        let from = TypeKey::of::<T>();
        let to = TypeKey::of::<Out>();
        if options.strict_type_check && !are_similar(from, to, &self.hierarchy()) {
            return Err(ConvertError::TransformRequiresEqualInOutTypes {
                from: from.name().to_string(),
                to: to.name().to_string(),
            });
        }

        let Some(alias) = &options.alias else {
            return self.resolve::<Out>(value, from, None, None).map(|(out, _)| out);
        };

        let query = Query::new()
            .source(from)
            .name(NamePattern::Exact(alias.as_str().to_string()));
        let found = self
            .lookup()
            .find(&query)
            .ok_or_else(|| ConvertError::InvalidCast {
                from: from.name().to_string(),
                to: format!("{} [{}]", to, alias.as_str()),
            })?;
        if found.record.target() != to {
            return Err(ConvertError::DelegateArgumentWrongType(format!(
                "transform '{}' yields {}, not {}",
                alias.as_str(),
                found.record.target(),
                to
            )));
        }
        self.run::<Out>(&found, value, None, None).map(|(out, _)| out)
    }

    fn absorb<Out: Default>(&self, result: Result<Out, ConvertError>) -> Out {
        result.unwrap_or_else(|e| {
            warn!(error = %e, "conversion failed, using zero value");
            Out::default()
        })
    }

    /// Find a record and run it, falling back to identity and declared
    /// upcasts when no record matches.
    fn resolve<Out: Any + Clone>(
        &self,
        value: &dyn Any,
        source: TypeKey,
        model: Model<'_>,
        fallback: Option<Fallback<'_>>,
    ) -> Result<(Out, Resolution), ConvertError> {
        self.check_live()?;
        let target = TypeKey::of::<Out>();
        let query = Query::new()
            .source(source)
            .target(target)
            .load_on_demand(true);
        let query = match model {
            Some((_, ty)) => query.argument(ty).widen(true),
            None => query.standard(true),
        };

        if let Some(found) = self.lookup().find(&query) {
            return self.run::<Out>(&found, value, model, fallback);
        }

        if self.settings().allow_dynamic_fallback {
            if let Some(out) = value.downcast_ref::<Out>() {
                return Ok((out.clone(), Resolution::Identity));
            }
            let upcast = self.hierarchy().upcast(value, source, target);
            if let Some(out) = upcast.and_then(|b| b.downcast::<Out>().ok()) {
                return Ok((*out, Resolution::Upcast));
            }
        }

        Err(ConvertError::InvalidCast {
            from: source.name().to_string(),
            to: target.name().to_string(),
        })
    }

    fn run<Out: Any + Clone>(
        &self,
        found: &Match,
        value: &dyn Any,
        model: Model<'_>,
        fallback: Option<Fallback<'_>>,
    ) -> Result<(Out, Resolution), ConvertError> {
        let record = &found.record;
        let argument = record.argument();

        // A widened match takes the model in its declared argument type.
        let widened: Option<Boxed>;
        let model = match model {
            Some((m, ty)) if !argument.is_any() && argument != ty => {
                widened = self.hierarchy().upcast(m, ty, argument);
                let Some(m) = widened.as_deref() else {
                    return Err(ConvertError::ArgumentWrongType {
                        what: "model",
                        expected: argument.name().to_string(),
                        found: ty.name().to_string(),
                    });
                };
                Some(m as &dyn Any)
            }
            Some((m, _)) => Some(m),
            None => None,
        };

        let mut call = Call::new(value).policy(self.settings().default_policy);
        if let Some(m) = model {
            call = call.model(m);
        }
        if let Some(f) = fallback {
            call = call.fallback(f);
        }

        let out = record.invoke(call)?;
        let out = out
            .downcast::<Out>()
            .map_err(|_| ConvertError::ArgumentWrongType {
                what: "result",
                expected: std::any::type_name::<Out>().to_string(),
                found: record.target().name().to_string(),
            })?;
        Ok((
            *out,
            Resolution::Record {
                tier: found.tier,
                record: record.describe(),
            },
        ))
    }
}

/// Wrapper applied to a single-argument result when `model` is a default
/// of the target type: a zero result becomes `model`.
fn zero_substitute<M, Out>(model: &M) -> Option<impl Fn(Boxed) -> Boxed + '_>
where
    M: Any,
    Out: Any + Clone + Default + PartialEq + Send + Sync,
{
    let default = (model as &dyn Any).downcast_ref::<Out>()?;
    Some(move |out: Boxed| -> Boxed {
        match out.downcast::<Out>() {
            Ok(v) if *v == Out::default() => Box::new(default.clone()),
            Ok(v) => v,
            Err(other) => other,
        }
    })
}

#[cfg(feature = "parallel")]
impl Registry {
    /// Cast every element of `values` in parallel.
    pub fn cast_all<In, Out>(&self, values: &[In]) -> Vec<Out>
    where
        In: Any + Sync,
        Out: Any + Clone + Default + Send,
    {
        use rayon::prelude::*;
        values.par_iter().map(|v| self.cast(v)).collect()
    }
}

/// Method-call sugar over the global registry.
pub trait CastExt: Any + Sized {
    fn cast_to<Out: Any + Clone + Default>(&self) -> Out {
        crate::global().cast(self)
    }

    fn cast_strict_to<Out: Any + Clone>(&self) -> Result<Out, ConvertError> {
        crate::global().cast_strict(self)
    }

    fn try_cast_to<Out: Any + Clone>(&self) -> Option<Out> {
        crate::global().try_cast(self)
    }

    /// Cast through an explicit registry.
    fn cast_in<Out: Any + Clone + Default>(&self, registry: &Registry) -> Out {
        registry.cast(self)
    }

    fn convert_to<M, Out>(&self, model: &M) -> Out
    where
        M: Any,
        Out: Any + Clone + Default + PartialEq + Send + Sync,
    {
        crate::global().convert(self, model)
    }

    fn try_convert_to<M, Out>(&self, model: &M) -> Option<Out>
    where
        M: Any,
        Out: Any + Clone + Default + PartialEq + Send + Sync,
    {
        crate::global().try_convert(self, model)
    }

    fn transform_to<Out: Any + Clone + Default>(
        &self,
        options: &TransformOptions,
    ) -> Result<Out, ConvertError> {
        crate::global().transform(self, options)
    }

    fn try_transform_to<Out: Any + Clone>(&self, options: &TransformOptions) -> Option<Out> {
        crate::global().try_transform(self, options)
    }

    fn can_convert_to<Out: Any>(&self) -> bool {
        crate::global().can_convert::<Self, Out>()
    }
}

impl<T: Any> CastExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{DefaultPolicy, Settings};

    mod colors {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Rgb(pub u8, pub u8, pub u8);

        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Hsl(pub u16, pub u8, pub u8);
    }

    mod shapes {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Shape {
            pub sides: u32,
        }

        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Square;
    }

    use colors::{Hsl, Rgb};
    use shapes::{Shape, Square};

    #[derive(Debug)]
    enum Mode {
        Invert,
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .try_add_fn(|s: &String| s.trim().parse::<i32>())
            .unwrap();
        registry
            .add_fn_with_default(|s: &String, scale: &u32| s.len() as i32 * *scale as i32)
            .unwrap();
        registry
    }

    #[test]
    fn test_cast_strict_surfaces_bad_format() {
        let registry = registry();
        let err = registry
            .cast_strict::<String, i32>(&"not-a-number".to_string())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInputFormat);

        assert_eq!(registry.try_cast::<String, i32>(&"not-a-number".to_string()), None);
        assert_eq!(registry.cast::<String, i32>(&"not-a-number".to_string()), 0);
        assert_eq!(registry.cast::<String, i32>(&" 12 ".to_string()), 12);
    }

    #[test]
    fn test_missing_converter() {
        let registry = registry();
        let err = registry.cast_strict::<String, f64>(&"1".to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCast);
        assert_eq!(registry.cast::<String, f64>(&"1".to_string()), 0.0);
        assert_eq!(registry.cast_option::<String, i32>(None), 0);
    }

    #[test]
    fn test_dynamic_fallback() {
        let registry = Registry::new();
        registry.declare_upcast::<Square, Shape, _>(|_| Shape { sides: 4 });

        assert_eq!(registry.try_cast::<u8, u8>(&7), Some(7));
        assert_eq!(registry.try_cast::<Square, Shape>(&Square), Some(Shape { sides: 4 }));

        registry.update_settings(|s| s.allow_dynamic_fallback = false);
        assert_eq!(registry.try_cast::<u8, u8>(&7), None);
    }

    #[test]
    fn test_convert_with_model() {
        let registry = registry();
        let value = "abc".to_string();
        assert_eq!(registry.convert::<String, u32, i32>(&value, &2), 6);

        // A record with an any-typed argument accepts every model
        assert_eq!(
            registry.try_convert::<String, bool, i32>(&"7".to_string(), &true),
            Some(7)
        );

        let err = registry
            .convert_strict::<String, u32, u64>(&value, &2)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCast);
    }

    #[test]
    fn test_convert_with_widened_model() {
        let registry = Registry::new();
        registry.declare_upcast::<Square, Shape, _>(|_| Shape { sides: 4 });
        registry
            .add_fn_with_default(|n: &u32, s: &Shape| n * s.sides)
            .unwrap();

        assert_eq!(registry.try_convert::<u32, Square, u32>(&3, &Square), Some(12));
    }

    #[test]
    fn test_convert_or_wrapper() {
        let registry = registry();
        assert_eq!(registry.convert_or(&"0".to_string(), 5i32), 5);
        assert_eq!(registry.convert_or(&"8".to_string(), 5i32), 8);
        assert_eq!(registry.convert_or(&"junk".to_string(), 5i32), 5);

        registry.update_settings(|s| s.default_policy = DefaultPolicy::ThrowOnMissingDefault);
        assert_eq!(registry.convert_or(&"8".to_string(), 5i32), 5);
        let err = registry
            .convert_strict::<String, i32, i32>(&"8".to_string(), &5)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConverterFunctionDefaultNull);
    }

    #[test]
    fn test_every_convert_form_wraps_default() {
        let registry = registry();
        let zero = "0".to_string();
        assert_eq!(registry.convert::<String, i32, i32>(&zero, &5), 5);
        assert_eq!(registry.convert_strict::<String, i32, i32>(&zero, &5).unwrap(), 5);
        assert_eq!(registry.try_convert::<String, i32, i32>(&zero, &5), Some(5));

        let mut ctx = ConvertContext::new().throw_on_error(true);
        let out = registry
            .convert_with::<String, i32, i32>(Some(&zero), Some(&5), &mut ctx)
            .unwrap();
        assert_eq!(out, 5);

        // Non-zero results pass through untouched
        assert_eq!(registry.convert::<String, i32, i32>(&"8".to_string(), &5), 8);
        assert_eq!(
            registry.convert::<String, i32, i32>(&"0".to_string(), &5),
            registry.convert_or(&"0".to_string(), 5i32)
        );
    }

    #[test]
    fn test_convert_or_prefers_default_function() {
        let registry = registry();
        registry
            .add_fn_with_default(|s: &String, d: &i32| s.parse::<i32>().unwrap_or(*d * 10))
            .unwrap();
        assert_eq!(registry.convert_or(&"x".to_string(), 5i32), 50);
    }

    #[test]
    fn test_context_records_resolution() {
        let registry = registry();
        let mut ctx = ConvertContext::new();
        let line = line!() - 1;
        assert_eq!(ctx.caller.line(), line);
        assert_eq!(ctx.caller.file(), file!());

        let out: i32 = registry
            .convert_with::<String, (), i32>(Some(&"4".to_string()), None, &mut ctx)
            .unwrap();
        assert_eq!(out, 4);
        assert_eq!(ctx.source, Some(TypeKey::of::<String>()));
        assert_eq!(ctx.argument, None);
        assert!(matches!(
            ctx.resolution,
            Some(Resolution::Record {
                tier: MatchTier::Exact,
                ..
            })
        ));

        let out: i32 = registry
            .convert_with::<String, (), i32>(Some(&"x".to_string()), None, &mut ctx)
            .unwrap();
        assert_eq!(out, 0);
        assert_eq!(ctx.error, Some(ErrorKind::BadInputFormat));
        assert_eq!(ctx.resolution, Some(Resolution::Zero));
    }

    #[test]
    fn test_context_null_and_throw() {
        let registry = registry();

        let mut ctx = ConvertContext::new().throw_on_error(true);
        let err = registry
            .convert_with::<String, (), i32>(None, None, &mut ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentNull);

        let mut ctx = ConvertContext::new().nullable(true).throw_on_error(true);
        let out: i32 = registry
            .convert_with::<String, (), i32>(None, None, &mut ctx)
            .unwrap();
        assert_eq!(out, 0);
        assert_eq!(ctx.resolution, Some(Resolution::Zero));
    }

    #[test]
    fn test_cast_option_strict() {
        let registry = Registry::with_settings(Settings {
            strict: true,
            ..Settings::default()
        });
        registry
            .try_add_fn(|s: &String| s.parse::<i32>())
            .unwrap();

        // The lenient form ignores the strict setting
        assert_eq!(registry.cast_option::<String, i32>(None), 0);

        let err = registry.cast_option_strict::<String, i32>(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentNull);
        let out: i32 = registry
            .cast_option_strict(Some(&"3".to_string()))
            .unwrap();
        assert_eq!(out, 3);
        let err = registry
            .cast_option_strict::<String, i32>(Some(&"x".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInputFormat);
    }

    #[test]
    fn test_global_strict_setting() {
        let registry = Registry::with_settings(Settings {
            strict: true,
            ..Settings::default()
        });
        registry
            .try_add_fn(|s: &String| s.parse::<i32>())
            .unwrap();
        let mut ctx = ConvertContext::new();
        let err = registry
            .convert_with::<String, (), i32>(Some(&"x".to_string()), None, &mut ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInputFormat);
    }

    #[test]
    fn test_transform_type_guard() {
        let registry = Registry::new();
        registry
            .add_transform_to("to_hsl", |c: &Rgb| Hsl(u16::from(c.0), c.1, c.2))
            .unwrap();

        let options = TransformOptions::new().strict_type_check().throwing();
        let out: Hsl = registry.transform(&Rgb(1, 2, 3), &options).unwrap();
        assert_eq!(out, Hsl(1, 2, 3));

        let err = registry
            .transform::<Rgb, Shape>(&Rgb(1, 2, 3), &options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransformRequiresEqualInOutTypes);

        // Without throwing the failure becomes the zero value
        let lenient = TransformOptions::new().strict_type_check();
        let out: Shape = registry.transform(&Rgb(1, 2, 3), &lenient).unwrap();
        assert_eq!(out, Shape::default());
    }

    #[test]
    fn test_transform_alias() {
        let registry = Registry::new();
        registry
            .add_transform("Brighten", |c: &Rgb| {
                Rgb(c.0.saturating_add(10), c.1.saturating_add(10), c.2.saturating_add(10))
            })
            .unwrap();
        registry
            .add_transform("Invert", |c: &Rgb| Rgb(255 - c.0, 255 - c.1, 255 - c.2))
            .unwrap();
        registry
            .add_transform_to("Hue", |c: &Rgb| Hsl(u16::from(c.0), 0, 0))
            .unwrap();

        let color = Rgb(0, 100, 255);
        let options = TransformOptions::new().alias(Alias::variant(&Mode::Invert));
        let out: Option<Rgb> = registry.try_transform(&color, &options);
        assert_eq!(out, Some(Rgb(255, 155, 0)));

        let out: Option<Rgb> = registry.try_transform(&color, &TransformOptions::new());
        assert_eq!(out, Some(Rgb(10, 110, 255)));

        let err = registry
            .transform::<Rgb, Rgb>(&color, &TransformOptions::new().alias("Hue").throwing())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DelegateArgumentWrongType);
    }

    #[test]
    fn test_disposed_registry() {
        let registry = registry();
        registry.dispose();
        let err = registry.cast_strict::<String, i32>(&"1".to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegistryDisposed);
    }

    #[test]
    fn test_cast_in() {
        let registry = registry();
        let out: i32 = "21".to_string().cast_in(&registry);
        assert_eq!(out, 21);
    }
}
