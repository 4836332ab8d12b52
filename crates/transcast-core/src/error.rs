//! Error taxonomy for registration, lookup and invocation.

use std::error::Error as StdError;
use std::num::{IntErrorKind, ParseFloatError, ParseIntError, TryFromIntError};
use std::str::ParseBoolError;

/// Boxed error produced by user conversion functions.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Coarse classification of a [`ConvertError`], for catch-by-kind policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ArgumentNull,
    ArgumentWrongType,
    ArgumentGenericType,
    ArgumentDelegateNoParameters,
    ArgumentDelegateTooManyParameters,
    ConverterExists,
    ConverterFunctionsNull,
    ConverterFunctionNull,
    ConverterFunctionDefaultNull,
    ConvertFailed,
    BadInputFormat,
    LogicError,
    InvalidCast,
    DelegateArgumentWrongType,
    TransformRequiresEqualInOutTypes,
    ConverterNotImplemented,
    AutoInitializationFailed,
    AssemblyFileNotFound,
    CollectionIsNull,
    InstanceRequiresParameters,
    InstanceExists,
    RegistryDisposed,
    CapacityExceeded,
}

/// Errors raised by the registry and the invocation layer.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("required value is missing: {0}")]
    ArgumentNull(String),

    #[error("wrong type for {what}: expected {expected}, found {found}")]
    ArgumentWrongType {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("generic type not allowed: {0}")]
    ArgumentGenericType(String),

    #[error("converter function '{0}' takes no parameters")]
    ArgumentDelegateNoParameters(String),

    #[error("converter function '{name}' takes {count} parameters (at most 2 allowed)")]
    ArgumentDelegateTooManyParameters { name: String, count: usize },

    #[error("a standard converter from {from} to {to} already exists")]
    ConverterExists { from: String, to: String },

    #[error("converter from {from} to {to} has no functions")]
    ConverterFunctionsNull { from: String, to: String },

    #[error("converter from {from} to {to} has no single-argument function")]
    ConverterFunctionNull { from: String, to: String },

    #[error("converter from {from} to {to} has no default-taking function")]
    ConverterFunctionDefaultNull { from: String, to: String },

    #[error("conversion failed: {0}")]
    ConvertFailed(#[source] BoxError),

    #[error("bad input format: {0}")]
    BadInputFormat(#[source] BoxError),

    #[error("logic error during conversion: {0}")]
    LogicError(#[source] BoxError),

    #[error("invalid cast from {from} to {to}")]
    InvalidCast { from: String, to: String },

    #[error("delegate shape mismatch: {0}")]
    DelegateArgumentWrongType(String),

    #[error("transform requires equal or similar types, got {from} -> {to}")]
    TransformRequiresEqualInOutTypes { from: String, to: String },

    #[error("converter contract not implemented by {0}")]
    ConverterNotImplemented(String),

    #[error("auto-initialization failed: {0}")]
    AutoInitializationFailed(String),

    #[error("code unit not found: {0}")]
    AssemblyFileNotFound(String),

    #[error("collection is missing or empty: {0}")]
    CollectionIsNull(String),

    #[error("cannot create an instance of {0} without parameters")]
    InstanceRequiresParameters(String),

    #[error("an instance of {0} was already created")]
    InstanceExists(String),

    #[error("registry has been disposed")]
    RegistryDisposed,

    #[error("registry capacity of {0} records exceeded")]
    CapacityExceeded(usize),
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::ArgumentNull(_) => ErrorKind::ArgumentNull,
            ConvertError::ArgumentWrongType { .. } => ErrorKind::ArgumentWrongType,
            ConvertError::ArgumentGenericType(_) => ErrorKind::ArgumentGenericType,
            ConvertError::ArgumentDelegateNoParameters(_) => {
                ErrorKind::ArgumentDelegateNoParameters
            }
            ConvertError::ArgumentDelegateTooManyParameters { .. } => {
                ErrorKind::ArgumentDelegateTooManyParameters
            }
            ConvertError::ConverterExists { .. } => ErrorKind::ConverterExists,
            ConvertError::ConverterFunctionsNull { .. } => ErrorKind::ConverterFunctionsNull,
            ConvertError::ConverterFunctionNull { .. } => ErrorKind::ConverterFunctionNull,
            ConvertError::ConverterFunctionDefaultNull { .. } => {
                ErrorKind::ConverterFunctionDefaultNull
            }
            ConvertError::ConvertFailed(_) => ErrorKind::ConvertFailed,
            ConvertError::BadInputFormat(_) => ErrorKind::BadInputFormat,
            ConvertError::LogicError(_) => ErrorKind::LogicError,
            ConvertError::InvalidCast { .. } => ErrorKind::InvalidCast,
            ConvertError::DelegateArgumentWrongType(_) => ErrorKind::DelegateArgumentWrongType,
            ConvertError::TransformRequiresEqualInOutTypes { .. } => {
                ErrorKind::TransformRequiresEqualInOutTypes
            }
            ConvertError::ConverterNotImplemented(_) => ErrorKind::ConverterNotImplemented,
            ConvertError::AutoInitializationFailed(_) => ErrorKind::AutoInitializationFailed,
            ConvertError::AssemblyFileNotFound(_) => ErrorKind::AssemblyFileNotFound,
            ConvertError::CollectionIsNull(_) => ErrorKind::CollectionIsNull,
            ConvertError::InstanceRequiresParameters(_) => ErrorKind::InstanceRequiresParameters,
            ConvertError::InstanceExists(_) => ErrorKind::InstanceExists,
            ConvertError::RegistryDisposed => ErrorKind::RegistryDisposed,
            ConvertError::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
        }
    }

    /// Shorthand for a free-form conversion failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        ConvertError::ConvertFailed(msg.into().into())
    }

    /// Shorthand for a free-form input format failure.
    pub fn bad_format(msg: impl Into<String>) -> Self {
        ConvertError::BadInputFormat(msg.into().into())
    }
}

/// Map an error raised inside a conversion function onto the taxonomy.
///
/// Errors already in the taxonomy pass through. Parse failures become
/// [`ConvertError::BadInputFormat`], integer range failures become
/// [`ConvertError::LogicError`], anything else is [`ConvertError::ConvertFailed`].
pub fn classify(err: BoxError) -> ConvertError {
    let err = match err.downcast::<ConvertError>() {
        Ok(e) => return *e,
        Err(e) => e,
    };

    if let Some(overflow) = err.downcast_ref::<ParseIntError>().map(|e| {
        matches!(
            e.kind(),
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
        )
    }) {
        return if overflow {
            ConvertError::LogicError(err)
        } else {
            ConvertError::BadInputFormat(err)
        };
    }
    if err.is::<ParseFloatError>()
        || err.is::<ParseBoolError>()
        || err.is::<std::char::ParseCharError>()
    {
        return ConvertError::BadInputFormat(err);
    }
    if err.is::<TryFromIntError>() {
        return ConvertError::LogicError(err);
    }

    ConvertError::ConvertFailed(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_parse_errors() {
        let err = "abc".parse::<i32>().unwrap_err();
        assert_eq!(classify(Box::new(err)).kind(), ErrorKind::BadInputFormat);

        let err = "x".parse::<f64>().unwrap_err();
        assert_eq!(classify(Box::new(err)).kind(), ErrorKind::BadInputFormat);

        let err = "maybe".parse::<bool>().unwrap_err();
        assert_eq!(classify(Box::new(err)).kind(), ErrorKind::BadInputFormat);
    }

    #[test]
    fn test_classify_overflow() {
        let err = "99999999999".parse::<i32>().unwrap_err();
        assert_eq!(classify(Box::new(err)).kind(), ErrorKind::LogicError);

        let err = u8::try_from(300i32).unwrap_err();
        assert_eq!(classify(Box::new(err)).kind(), ErrorKind::LogicError);
    }

    #[test]
    fn test_classify_passthrough() {
        let err = ConvertError::InvalidCast {
            from: "a".into(),
            to: "b".into(),
        };
        assert_eq!(classify(Box::new(err)).kind(), ErrorKind::InvalidCast);

        let err: BoxError = "something odd".into();
        assert_eq!(classify(err).kind(), ErrorKind::ConvertFailed);
    }
}
