//! Converter units bundled with the CLI.

use rhi_transcast_plugin::prelude::*;
use std::fmt;
use std::num::ParseFloatError;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Celsius(pub f64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kelvin(pub f64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fahrenheit(pub f64);

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°C", self.0)
    }
}

impl fmt::Display for Kelvin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}K", self.0)
    }
}

impl fmt::Display for Fahrenheit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°F", self.0)
    }
}

/// Parse "21.5", "21.5C" or "21.5°C" for unit symbol `C`.
fn parse_degrees(text: &str, symbol: char) -> Result<f64, ParseFloatError> {
    text.trim()
        .trim_end_matches(symbol)
        .trim_end_matches('°')
        .trim()
        .parse()
}

pub struct Temperature;

fn temperature() -> TypeDescriptor {
    TypeDescriptor::of::<Temperature>()
        .method(MethodDescriptor::try_function("parse_celsius", |s: &String| {
            parse_degrees(s, 'C').map(Celsius)
        }))
        .method(MethodDescriptor::try_function("parse_kelvin", |s: &String| {
            parse_degrees(s, 'K').map(Kelvin)
        }))
        .method(MethodDescriptor::try_function("parse_fahrenheit", |s: &String| {
            parse_degrees(s, 'F').map(Fahrenheit)
        }))
        .method(MethodDescriptor::function("celsius_to_kelvin", |c: &Celsius| {
            Kelvin(c.0 + 273.15)
        }))
        .method(MethodDescriptor::function("kelvin_to_celsius", |k: &Kelvin| {
            Celsius(k.0 - 273.15)
        }))
        .method(MethodDescriptor::function("celsius_to_fahrenheit", |c: &Celsius| {
            Fahrenheit(c.0 * 9.0 / 5.0 + 32.0)
        }))
        .method(MethodDescriptor::function("fahrenheit_to_celsius", |f: &Fahrenheit| {
            Celsius((f.0 - 32.0) * 5.0 / 9.0)
        }))
        .method(
            MethodDescriptor::function("round", |c: &Celsius| Celsius(c.0.round()))
                .alias("round")
                .disambiguate(),
        )
}

pub struct Text;

/// A `String → String` transform selected by `name`.
fn text_transform(name: &str, f: fn(&str) -> String) -> MethodDescriptor {
    MethodDescriptor::function(name, move |s: &String| f(s))
        .alias(name)
        .disambiguate()
}

fn text() -> TypeDescriptor {
    TypeDescriptor::of::<Text>()
        .method(text_transform("upper", str::to_uppercase))
        .method(text_transform("lower", str::to_lowercase))
        .method(text_transform("trim", |s| s.trim().to_string()))
}

declare_converters!("temperature" => [temperature]);
declare_converters!("text" => [text]);
