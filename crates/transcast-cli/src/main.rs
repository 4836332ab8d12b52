//! Transcast CLI - inspect and exercise a conversion registry

mod config;
mod units;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use config::Config;
use rhi_transcast_core::{
    Discovery, InventoryProvider, NamePattern, Query, ReflectionProvider, Registry, Settings,
    TransformOptions, TypeKey, builtins,
};
use std::any::Any;
use std::fmt::Display;
use std::path::PathBuf;
use units::{Celsius, Fahrenheit, Kelvin};

/// Names accepted wherever the CLI takes a type.
const TYPE_NAMES: &[&str] = &[
    "string",
    "bool",
    "i8",
    "i16",
    "i32",
    "i64",
    "u8",
    "u16",
    "u32",
    "u64",
    "f32",
    "f64",
    "celsius",
    "kelvin",
    "fahrenheit",
];

/// Bind the type named by `$name` to the alias `$t` and evaluate `$body`.
macro_rules! with_type {
    ($name:expr, $t:ident => $body:expr) => {
        match $name {
            "string" => { type $t = String; $body }
            "bool" => { type $t = bool; $body }
            "i8" => { type $t = i8; $body }
            "i16" => { type $t = i16; $body }
            "i32" => { type $t = i32; $body }
            "i64" => { type $t = i64; $body }
            "u8" => { type $t = u8; $body }
            "u16" => { type $t = u16; $body }
            "u32" => { type $t = u32; $body }
            "u64" => { type $t = u64; $body }
            "f32" => { type $t = f32; $body }
            "f64" => { type $t = f64; $body }
            "celsius" => { type $t = Celsius; $body }
            "kelvin" => { type $t = Kelvin; $body }
            "fahrenheit" => { type $t = Fahrenheit; $body }
            other => bail!("unknown type '{}' (see `transcast types`)", other),
        }
    };
}

/// Output verbosity level.
#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn info(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            println!("{msg}");
        }
    }

    fn debug(self, msg: &str) {
        if matches!(self, Verbosity::Verbose) {
            println!("[debug] {msg}");
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    fn log_filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "rhi_transcast_core=debug,info",
        }
    }
}

/// How `cast` reports a failed conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CastMode {
    /// Fail with the conversion error
    Strict,
    /// Print "(none)"
    Try,
    /// Print the target's zero value
    Lenient,
}

#[derive(Parser)]
#[command(name = "transcast")]
#[command(about = "Runtime type-conversion registry", long_about = None)]
struct Cli {
    /// Verbose output (show debug info)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (default: ~/.config/transcast/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry settings file (JSON, YAML or TOML), replacing the config's [settings]
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Surface conversion failures as errors
    #[arg(long, global = true)]
    strict: bool,

    /// Skip the built-in string and number converters
    #[arg(long, global = true)]
    no_builtins: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered converters
    List {
        /// Only converters whose name or alias contains this text
        #[arg(long)]
        filter: Option<String>,
        /// Only converters from this type
        #[arg(long)]
        from: Option<String>,
        /// Only converters to this type
        #[arg(long)]
        to: Option<String>,
    },

    /// List the type names the CLI understands
    Types,

    /// List declared converter units
    Units,

    /// Convert a value
    Cast {
        /// Value to convert, read as the --from type
        value: String,
        /// Source type
        #[arg(long, default_value = "string")]
        from: String,
        /// Target type
        #[arg(long)]
        to: String,
        /// Failure handling
        #[arg(long, value_enum, default_value_t = CastMode::Strict)]
        mode: CastMode,
        /// Fallback value, read as the --to type, used when the result is zero or the cast fails
        #[arg(long)]
        default: Option<String>,
    },

    /// Check whether a conversion is available
    Probe {
        /// Source type
        #[arg(long)]
        from: Option<String>,
        /// Target type
        #[arg(long)]
        to: Option<String>,
    },

    /// Apply a named same-type transform
    Transform {
        /// Value to transform
        value: String,
        /// Transform alias
        #[arg(long)]
        alias: String,
        /// Type of the value
        #[arg(long = "type", default_value = "string")]
        ty: String,
    },

    /// Print the effective registry settings
    Settings {
        /// Output format (toml, json, yaml)
        #[arg(long, default_value = "toml")]
        format: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man page
    Manpage,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config file
    let config = if let Some(ref path) = cli.config {
        Config::load_from_path(Some(path.clone()))
    } else {
        Config::load()
    };

    // Apply config defaults, CLI flags override
    let verbose = cli.verbose || config.defaults.verbose;
    let quiet = cli.quiet || config.defaults.quiet;
    let verbosity = Verbosity::from_flags(verbose, quiet);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| verbosity.log_filter().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => config.settings.clone(),
    };
    if cli.strict {
        settings.strict = true;
    }

    let builtins = config.defaults.builtins && !cli.no_builtins;
    let registry = build_registry(settings, builtins, &config.defaults.units, verbosity)?;

    match cli.command {
        Commands::List { filter, from, to } => cmd_list(&registry, filter, from, to, verbosity),
        Commands::Types => cmd_types(),
        Commands::Units => cmd_units(&registry),
        Commands::Cast {
            value,
            from,
            to,
            mode,
            default,
        } => {
            let out = with_type!(from.as_str(), F => with_type!(to.as_str(), O => {
                run_cast::<F, O>(&registry, &value, mode, default.as_deref())?
            }));
            println!("{}", out);
            Ok(())
        }
        Commands::Probe { from, to } => cmd_probe(&registry, from, to),
        Commands::Transform { value, alias, ty } => {
            let out = with_type!(ty.as_str(), T => run_transform::<T>(&registry, &value, &alias)?);
            println!("{}", out);
            Ok(())
        }
        Commands::Settings { format } => {
            let bytes = registry
                .settings()
                .to_bytes(&format)
                .map_err(|e| anyhow::anyhow!("Failed to serialize settings: {}", e))?;
            print!("{}", String::from_utf8_lossy(&bytes));
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "transcast", &mut std::io::stdout());
            Ok(())
        }
        Commands::Manpage => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut std::io::stdout())?;
            Ok(())
        }
    }
}

/// Create the registry, register built-ins and discover converter units.
fn build_registry(
    settings: Settings,
    builtins: bool,
    units: &[String],
    verbosity: Verbosity,
) -> Result<Registry> {
    let registry = Registry::with_settings(settings);

    if builtins {
        let report = builtins::register(&registry).context("Failed to register built-ins")?;
        verbosity.debug(&format!("registered {} built-in converters", report.applied));
    }

    let discovery = Discovery::new(&registry);
    if units.is_empty() {
        let added = discovery
            .discover_all()
            .context("Failed to discover converter units")?;
        verbosity.debug(&format!("discovered {} converters", added));
    } else {
        for unit in units {
            let added = discovery
                .discover_unit(unit)
                .with_context(|| format!("Failed to discover unit '{}'", unit))?;
            verbosity.debug(&format!("unit {}: {} converters", unit, added));
        }
    }

    Ok(registry)
}

fn type_key(name: &str) -> Result<TypeKey> {
    Ok(with_type!(name, T => TypeKey::of::<T>()))
}

fn cmd_list(
    registry: &Registry,
    filter: Option<String>,
    from: Option<String>,
    to: Option<String>,
    verbosity: Verbosity,
) -> Result<()> {
    let mut query = Query::new();
    if let Some(from) = &from {
        query = query.source(type_key(from)?);
    }
    if let Some(to) = &to {
        query = query.target(type_key(to)?);
    }
    if let Some(filter) = filter {
        query = query.name(NamePattern::Contains(filter));
    }

    let records = registry.lookup().find_all(&query);
    for record in &records {
        let mut line = format!("  {}", record.describe());
        if !record.argument().is_any() && record.argument() != record.target() {
            line.push_str(&format!(" (model: {})", record.argument().short_name()));
        }
        if let Some(name) = record.name_label() {
            line.push_str(&format!("  [{}]", name));
        }
        println!("{}", line);
        if let Some(declaring) = record.declaring() {
            verbosity.debug(&format!("    declared by {}", declaring));
        }
    }
    verbosity.info(&format!("\nTotal: {} converters", records.len()));
    Ok(())
}

fn cmd_types() -> Result<()> {
    for name in TYPE_NAMES {
        println!("  {:<12} {}", name, type_key(name)?);
    }
    Ok(())
}

fn cmd_units(registry: &Registry) -> Result<()> {
    for unit in InventoryProvider.units() {
        let state = if registry.is_unit_initialized(&unit) {
            "loaded"
        } else {
            "not loaded"
        };
        println!("  {:<16} {}", unit, state);
    }
    Ok(())
}

fn cmd_probe(registry: &Registry, from: Option<String>, to: Option<String>) -> Result<()> {
    if from.is_none() && to.is_none() {
        bail!("probe needs --from, --to or both");
    }

    let mut query = Query::new().load_on_demand(true);
    if let Some(from) = &from {
        query = query.source(type_key(from)?);
    }
    if let Some(to) = &to {
        query = query.target(type_key(to)?);
    }

    match registry.lookup().find(&query) {
        Some(found) => println!("yes: {} ({:?})", found.record.describe(), found.tier),
        None => println!("no"),
    }
    Ok(())
}

/// Read command-line text as a `T`, going through the registry unless `T` is `String`.
fn read_value<T: Any + Clone>(registry: &Registry, input: &str) -> Result<T> {
    let text = input.to_string();
    if let Some(value) = (&text as &dyn Any).downcast_ref::<T>() {
        return Ok(value.clone());
    }
    registry
        .cast_strict::<String, T>(&text)
        .with_context(|| format!("Cannot read '{}' as {}", input, std::any::type_name::<T>()))
}

fn run_cast<F, O>(
    registry: &Registry,
    input: &str,
    mode: CastMode,
    default: Option<&str>,
) -> Result<String>
where
    F: Any + Clone,
    O: Any + Clone + Default + PartialEq + Send + Sync + Display,
{
    let value: F = read_value(registry, input)?;

    if let Some(default) = default {
        let default: O = read_value(registry, default)?;
        return Ok(registry.convert_or(&value, default).to_string());
    }

    Ok(match mode {
        CastMode::Strict => registry.cast_strict::<F, O>(&value)?.to_string(),
        CastMode::Try => registry
            .try_cast::<F, O>(&value)
            .map_or_else(|| "(none)".to_string(), |out| out.to_string()),
        CastMode::Lenient => registry.cast::<F, O>(&value).to_string(),
    })
}

fn run_transform<T>(registry: &Registry, input: &str, alias: &str) -> Result<String>
where
    T: Any + Clone + Default + Display,
{
    let value: T = read_value(registry, input)?;
    let options = TransformOptions::new()
        .strict_type_check()
        .alias(alias)
        .throwing();
    Ok(registry.transform::<T, T>(&value, &options)?.to_string())
}
