//! Conversion records: one registered conversion and its callables.

use crate::error::ConvertError;
use crate::settings::DefaultPolicy;
use crate::types::{Boxed, TypeKey};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased single-argument conversion: source → target.
pub type UnaryFn = Arc<dyn Fn(&dyn Any) -> Result<Boxed, ConvertError> + Send + Sync>;

/// Type-erased two-argument conversion: source × default/model → target.
pub type BinaryFn = Arc<dyn Fn(&dyn Any, &dyn Any) -> Result<Boxed, ConvertError> + Send + Sync>;

/// Post-processing applied to a single-argument result when a default was
/// supplied but the record has no default-taking function.
pub type Fallback<'a> = &'a dyn Fn(Boxed) -> Boxed;

/// Arguments for a single [`ConversionRecord::invoke`].
#[derive(Clone, Copy)]
pub struct Call<'a> {
    pub value: Option<&'a dyn Any>,
    pub model: Option<&'a dyn Any>,
    pub policy: DefaultPolicy,
    pub fallback: Option<Fallback<'a>>,
}

impl<'a> Call<'a> {
    pub fn new(value: &'a dyn Any) -> Self {
        Self {
            value: Some(value),
            model: None,
            policy: DefaultPolicy::default(),
            fallback: None,
        }
    }

    /// A call without a value, for nullable inputs.
    pub fn missing() -> Self {
        Self {
            value: None,
            model: None,
            policy: DefaultPolicy::default(),
            fallback: None,
        }
    }

    pub fn model(mut self, model: &'a dyn Any) -> Self {
        self.model = Some(model);
        self
    }

    pub fn policy(mut self, policy: DefaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn fallback(mut self, fallback: Fallback<'a>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// One registered conversion.
///
/// Identity is the `(source, target, argument)` triple. A record holds a
/// single-argument function, a default-taking function, or both.
#[derive(Clone)]
pub struct ConversionRecord {
    source: TypeKey,
    target: TypeKey,
    argument: TypeKey,
    declaring: Option<TypeKey>,
    alias: Option<String>,
    name: Option<String>,
    allows_disambiguates: bool,
    primary: Option<UnaryFn>,
    with_default: Option<BinaryFn>,
}

impl fmt::Debug for ConversionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRecord")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("argument", &self.argument)
            .field("declaring", &self.declaring)
            .field("alias", &self.alias)
            .field("name", &self.name)
            .field("allows_disambiguates", &self.allows_disambiguates)
            .field("primary", &self.primary.is_some())
            .field("with_default", &self.with_default.is_some())
            .finish()
    }
}

impl ConversionRecord {
    /// Create a record with no callables yet.
    pub fn new(source: TypeKey, target: TypeKey) -> Self {
        Self {
            source,
            target,
            argument: TypeKey::any(),
            declaring: None,
            alias: None,
            name: None,
            allows_disambiguates: false,
            primary: None,
            with_default: None,
        }
    }

    /// Set the single-argument function.
    pub fn primary(mut self, f: UnaryFn) -> Self {
        self.primary = Some(f);
        self
    }

    /// Set the default-taking function and its argument type.
    pub fn with_default(mut self, argument: TypeKey, f: BinaryFn) -> Self {
        self.argument = argument;
        self.with_default = Some(f);
        self
    }

    /// Label selecting this record among same-pair transforms.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Display name, usually the declaring method's.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Record the type that declared this conversion.
    pub fn declared_by(mut self, ty: TypeKey) -> Self {
        self.declaring = Some(ty);
        self
    }

    /// Allow this record to coexist with others sharing its type pair.
    pub fn disambiguate(mut self) -> Self {
        self.allows_disambiguates = true;
        self
    }

    /// Type of the value converted from.
    pub fn source(&self) -> TypeKey {
        self.source
    }

    /// Type of the value produced.
    pub fn target(&self) -> TypeKey {
        self.target
    }

    /// Type of the second argument, or the any sentinel.
    pub fn argument(&self) -> TypeKey {
        self.argument
    }

    /// Type that declared the record, if any.
    pub fn declaring(&self) -> Option<TypeKey> {
        self.declaring
    }

    /// The alias set with [`ConversionRecord::alias`].
    pub fn alias_label(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The name set with [`ConversionRecord::name`].
    pub fn name_label(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the record may coexist with others on its type pair.
    pub fn allows_disambiguates(&self) -> bool {
        self.allows_disambiguates
    }

    /// Whether the single-argument slot is filled.
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Whether the default-taking slot is filled.
    pub fn has_default(&self) -> bool {
        self.with_default.is_some()
    }

    /// Whether either slot is filled.
    pub fn has_any_function(&self) -> bool {
        self.primary.is_some() || self.with_default.is_some()
    }

    /// A standard record takes no model, or takes a default of its target type.
    pub fn is_standard(&self) -> bool {
        self.argument.is_any() || self.argument == self.target
    }

    pub(crate) fn stamp_declaring(&mut self, ty: TypeKey) {
        if self.declaring.is_none() {
            self.declaring = Some(ty);
        }
    }

    pub(crate) fn set_disambiguate(&mut self) {
        self.allows_disambiguates = true;
    }

    /// Human-readable `source -> target` label.
    pub fn describe(&self) -> String {
        match &self.alias {
            Some(alias) => format!(
                "{} -> {} [{}]",
                self.source.short_name(),
                self.target.short_name(),
                alias
            ),
            None => format!(
                "{} -> {}",
                self.source.short_name(),
                self.target.short_name()
            ),
        }
    }

    /// Run the conversion.
    ///
    /// The default-taking function is used when a model is supplied or when
    /// it is the only function. A supplied model with only a single-argument
    /// function goes through `call.fallback` under [`DefaultPolicy::UseWrapper`].
    pub fn invoke(&self, call: Call<'_>) -> Result<Boxed, ConvertError> {
        let value = call
            .value
            .ok_or_else(|| ConvertError::ArgumentNull(format!("value for {}", self.describe())))?;

        if !self.source.is_any() && !self.source.matches(value) {
            return Err(ConvertError::ArgumentWrongType {
                what: "value",
                expected: self.source.name().to_string(),
                found: format!("{:?}", value.type_id()),
            });
        }

        if let Some(model) = call.model {
            if !self.argument.is_any() && !self.argument.matches(model) {
                return Err(ConvertError::ArgumentWrongType {
                    what: "model",
                    expected: self.argument.name().to_string(),
                    found: format!("{:?}", model.type_id()),
                });
            }
        }

        match (&self.primary, &self.with_default, call.model) {
            (_, Some(with_default), Some(model)) => with_default(value, model),
            (Some(primary), _, None) => primary(value),
            (Some(primary), None, Some(_)) => match call.policy {
                DefaultPolicy::UseWrapper => {
                    let out = primary(value)?;
                    Ok(match call.fallback {
                        Some(fallback) => fallback(out),
                        None => out,
                    })
                }
                DefaultPolicy::ThrowOnMissingDefault => {
                    Err(ConvertError::ConverterFunctionDefaultNull {
                        from: self.source.name().to_string(),
                        to: self.target.name().to_string(),
                    })
                }
            },
            (None, Some(_), None) => Err(ConvertError::ConverterFunctionNull {
                from: self.source.name().to_string(),
                to: self.target.name().to_string(),
            }),
            (None, None, _) => Err(ConvertError::ConverterFunctionsNull {
                from: self.source.name().to_string(),
                to: self.target.name().to_string(),
            }),
        }
    }

    /// Combine two records for the same type pair that fill different slots.
    ///
    /// The result keeps `self`'s identity and labels, taking whatever `self`
    /// lacks from `other`.
    pub fn merge(&self, other: &ConversionRecord) -> Result<ConversionRecord, ConvertError> {
        let primary_clash = self.primary.is_some() && other.primary.is_some();
        let default_clash = self.with_default.is_some() && other.with_default.is_some();
        if primary_clash || default_clash {
            return Err(ConvertError::ConverterExists {
                from: self.source.name().to_string(),
                to: self.target.name().to_string(),
            });
        }

        let mut merged = self.clone();
        if merged.primary.is_none() {
            merged.primary = other.primary.clone();
        }
        if merged.with_default.is_none() && other.with_default.is_some() {
            merged.with_default = other.with_default.clone();
            merged.argument = other.argument;
        }
        if merged.alias.is_none() {
            merged.alias = other.alias.clone();
        }
        if merged.name.is_none() {
            merged.name = other.name.clone();
        }
        Ok(merged)
    }
}
