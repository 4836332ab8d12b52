//! Standard conversions between strings and primitives.

use crate::batch::BatchReport;
use crate::error::ConvertError;
use crate::factory::RecordFactory;
use crate::registry::Registry;

/// Register the built-in converters, honouring the registry's number format.
///
/// - `String` and `&'static str` parse into every integer and float type and `bool`;
/// - every integer, float and `bool` formats into `String`;
/// - lossless integer and float widenings;
/// - a few checked narrowings, failing with `LogicError` when out of range.
pub fn register(registry: &Registry) -> Result<BatchReport, ConvertError> {
    let format = registry.settings().number_format.clone();
    let mut batch = registry.batch();

    macro_rules! parse {
        ($($t:ty),* $(,)?) => {$(
            let fmt = format.clone();
            batch = batch.add(RecordFactory::try_from_fn(move |s: &String| {
                fmt.normalize(s).parse::<$t>()
            }));
            let fmt = format.clone();
            batch = batch.add(RecordFactory::try_from_fn(move |s: &&'static str| {
                fmt.normalize(s).parse::<$t>()
            }));
        )*};
    }

    macro_rules! display {
        ($($t:ty),* $(,)?) => {$(
            batch = batch.add_fn(|n: &$t| n.to_string());
        )*};
    }

    macro_rules! widen {
        ($($from:ty => $to:ty),* $(,)?) => {$(
            batch = batch.add_fn(|n: &$from| <$to>::from(*n));
        )*};
    }

    macro_rules! narrow {
        ($($from:ty => $to:ty),* $(,)?) => {$(
            batch = batch.add(RecordFactory::try_from_fn(|n: &$from| <$to>::try_from(*n)));
        )*};
    }

    parse!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);
    display!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool);

    let fmt = format.clone();
    batch = batch.add_fn(move |n: &f32| fmt.format_float(n));
    let fmt = format.clone();
    batch = batch.add_fn(move |n: &f64| fmt.format_float(n));

    batch = batch.add(RecordFactory::try_from_fn(|s: &String| {
        s.trim().to_ascii_lowercase().parse::<bool>()
    }));
    batch = batch.add(RecordFactory::try_from_fn(|s: &&'static str| {
        s.trim().to_ascii_lowercase().parse::<bool>()
    }));

    widen!(
        i8 => i16, i8 => i32, i8 => i64,
        i16 => i32, i16 => i64,
        i32 => i64,
        u8 => u16, u8 => u32, u8 => u64, u8 => i16, u8 => i32, u8 => i64,
        u16 => u32, u16 => u64, u16 => i32, u16 => i64,
        u32 => u64, u32 => i64,
        i32 => f64, u32 => f64, f32 => f64,
    );

    narrow!(
        i64 => i32, i32 => i16, i32 => u8,
        u64 => u32, i64 => u64, u64 => i64,
    );

    batch.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::settings::{NumberFormat, Settings};

    #[test]
    fn test_parse_and_display() {
        let registry = Registry::new();
        let report = register(&registry).unwrap();
        assert_eq!(report.applied, registry.len());

        assert_eq!(registry.cast::<String, i32>(&" 42 ".to_string()), 42);
        assert_eq!(registry.cast::<&'static str, u8>(&"7"), 7);
        assert!(registry.cast::<&'static str, bool>(&"TRUE"));
        assert_eq!(registry.cast::<i64, String>(&-5), "-5");
        assert_eq!(registry.cast::<f64, String>(&2.5), "2.5");
    }

    #[test]
    fn test_number_format() {
        let registry = Registry::with_settings(Settings {
            number_format: NumberFormat {
                decimal_separator: ',',
                thousands_separator: Some('.'),
            },
            ..Settings::default()
        });
        register(&registry).unwrap();

        assert_eq!(registry.cast::<String, f64>(&"1.234,5".to_string()), 1234.5);
        assert_eq!(registry.cast::<String, u32>(&"1.000".to_string()), 1000);
        assert_eq!(registry.cast::<f64, String>(&0.5), "0,5");
    }

    #[test]
    fn test_failures_are_classified() {
        let registry = Registry::new();
        register(&registry).unwrap();

        let err = registry
            .cast_strict::<String, i32>(&"forty".to_string())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInputFormat);

        let err = registry.cast_strict::<String, u8>(&"300".to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LogicError);

        let err = registry.cast_strict::<i64, i32>(&(1 << 40)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LogicError);
        assert_eq!(registry.cast::<i64, i32>(&12), 12);
    }

    #[test]
    fn test_widening() {
        let registry = Registry::new();
        register(&registry).unwrap();
        assert_eq!(registry.cast::<u8, i64>(&200), 200i64);
        assert_eq!(registry.cast::<i32, f64>(&-3), -3.0);
    }

    #[test]
    fn test_register_twice_conflicts() {
        let registry = Registry::new();
        register(&registry).unwrap();
        let err = register(&registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConverterExists);
    }
}
