//! Cross-module behaviour of the registry, lookup, discovery and invocation.

use rhi_transcast_core::{
    AddOutcome, CancelToken, CastExt, ConvertContext, ConvertError, Discovery, ErrorKind,
    MatchTier, MethodDescriptor, Query, RecordFactory, Registry, Resolution, Settings,
    StaticProvider, TransformOptions, TypeDescriptor, TypeKey, Visit, builtins, reset_global,
    set_global,
};
use std::thread;

mod geometry {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Shape {
        pub sides: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Square {
        pub side: f64,
    }

    pub struct Catalog;
}

mod thermo {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Celsius(pub f64);

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Kelvin(pub f64);

    pub struct Scales;
}

use geometry::{Catalog, Shape, Square};
use thermo::{Celsius, Kelvin, Scales};

fn parse_list(s: &String) -> Vec<i32> {
    s.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

fn join_list(v: &Vec<i32>) -> String {
    v.iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn scales() -> TypeDescriptor {
    TypeDescriptor::of::<Scales>()
        .method(MethodDescriptor::function("to_kelvin", |c: &Celsius| {
            Kelvin(c.0 + 273.15)
        }))
        .method(MethodDescriptor::function("to_celsius", |k: &Kelvin| {
            Celsius(k.0 - 273.15)
        }))
}

#[test]
fn test_list_round_trip() {
    let registry = Registry::new();
    registry.add_pair(join_list, parse_list).unwrap();

    assert!(registry.can_convert_from::<Vec<i32>>());
    assert!(registry.can_convert::<String, Vec<i32>>());

    let text: String = registry.cast(&vec![1, 2, 3]);
    assert_eq!(text, "1,2,3");
    let list: Vec<i32> = registry.cast(&"1,2,3".to_string());
    assert_eq!(list, vec![1, 2, 3]);
}

#[test]
fn test_dispose_then_reregister() {
    let registry = Registry::new();
    registry.add_fn(|n: &f64| format!("old {}", n)).unwrap();
    assert_eq!(registry.cast::<f64, String>(&1.5), "old 1.5");

    registry.dispose();
    assert!(registry.is_disposed());
    let err = registry.cast_strict::<f64, String>(&1.5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RegistryDisposed);
    let err = registry.add_fn(|n: &f64| n.to_string()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RegistryDisposed);

    registry.reinitialize();
    assert!(registry.is_empty());
    registry.add_fn(|n: &f64| format!("new {}", n)).unwrap();

    let query = Query::pair::<f64, String>();
    let all = registry.lookup().find_all(&query);
    assert_eq!(all.len(), 1);
    assert_eq!(registry.cast::<f64, String>(&1.5), "new 1.5");
}

#[test]
fn test_merge_is_symmetric() {
    let unary_first = Registry::new();
    unary_first.add_fn(|c: &Celsius| Kelvin(c.0)).unwrap();
    assert_eq!(
        unary_first
            .add_fn_with_default(|c: &Celsius, k: &Kelvin| Kelvin(c.0 + k.0))
            .unwrap(),
        AddOutcome::Merged
    );

    let binary_first = Registry::new();
    binary_first
        .add_fn_with_default(|c: &Celsius, k: &Kelvin| Kelvin(c.0 + k.0))
        .unwrap();
    assert_eq!(
        binary_first.add_fn(|c: &Celsius| Kelvin(c.0)).unwrap(),
        AddOutcome::Merged
    );

    for registry in [&unary_first, &binary_first] {
        assert_eq!(registry.len(), 1);
        let record = &registry.records()[0];
        assert!(record.has_primary() && record.has_default());
        assert_eq!(registry.cast::<Celsius, Kelvin>(&Celsius(1.0)), Kelvin(1.0));
        assert_eq!(
            registry.convert::<Celsius, Kelvin, Kelvin>(&Celsius(1.0), &Kelvin(2.0)),
            Kelvin(3.0)
        );
    }

    let err = unary_first.add_fn(|c: &Celsius| Kelvin(-c.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConverterExists);
    assert_eq!(unary_first.cast::<Celsius, Kelvin>(&Celsius(1.0)), Kelvin(1.0));
}

#[test]
fn test_earliest_registered_wins() {
    let registry = Registry::new();
    let first = RecordFactory::from_fn(|c: &Celsius| Kelvin(c.0)).name("first");
    let second = RecordFactory::from_fn(|c: &Celsius| Kelvin(c.0 * 2.0)).name("second");
    registry.add(first, None, true).unwrap();
    registry.add(second, None, true).unwrap();
    assert_eq!(registry.len(), 2);

    let found = registry
        .lookup()
        .find(&Query::pair::<Celsius, Kelvin>())
        .unwrap();
    assert_eq!(found.tier, MatchTier::Exact);
    assert_eq!(found.record.name_label(), Some("first"));
}

#[test]
fn test_assignable_model_widens() {
    let registry = Registry::new();
    registry.declare_upcast(|_: &Square| Shape { sides: 4 });
    registry
        .add_fn_with_default(|label: &String, shape: &Shape| format!("{} ({})", label, shape.sides))
        .unwrap();

    let query = Query::pair::<String, String>()
        .argument(TypeKey::of::<Square>())
        .widen(true);
    let found = registry.lookup().find(&query).unwrap();
    assert_eq!(found.tier, MatchTier::Assignable);

    let out: String = registry.convert(&"box".to_string(), &Square { side: 1.0 });
    assert_eq!(out, "box (4)");

    let mut ctx = ConvertContext::new().throw_on_error(true);
    let out: String = registry
        .convert_with(Some(&"box".to_string()), Some(&Square { side: 2.0 }), &mut ctx)
        .unwrap();
    assert_eq!(out, "box (4)");
    assert!(matches!(
        ctx.resolution,
        Some(Resolution::Record {
            tier: MatchTier::Assignable,
            ..
        })
    ));
}

#[test]
fn test_strict_and_lenient_parse_failures() {
    let registry = Registry::new();
    builtins::register(&registry).unwrap();

    let err = registry
        .cast_strict::<String, i32>(&"abc".to_string())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInputFormat);
    assert_eq!(registry.try_cast::<String, i32>(&"abc".to_string()), None);
    assert_eq!(registry.cast::<String, i32>(&"abc".to_string()), 0);

    let mut ctx = ConvertContext::new();
    let out: i32 = registry
        .convert_with::<String, (), i32>(Some(&"abc".to_string()), None, &mut ctx)
        .unwrap();
    assert_eq!(out, 0);
    assert_eq!(ctx.error, Some(ErrorKind::BadInputFormat));
    assert_eq!(ctx.resolution, Some(Resolution::Zero));

    registry.update_settings(|s| s.strict = true);
    let mut ctx = ConvertContext::new();
    let err = registry
        .convert_with::<String, (), i32>(Some(&"abc".to_string()), None, &mut ctx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInputFormat);
}

#[test]
fn test_transform_type_guard() {
    let registry = Registry::new();
    registry
        .add_transform_to::<Celsius, Kelvin, _>("absolute", |c: &Celsius| Kelvin(c.0 + 273.15))
        .unwrap();
    registry
        .add_transform::<Celsius, _>("negate", |c: &Celsius| Celsius(-c.0))
        .unwrap();

    let strict = TransformOptions::new().strict_type_check().throwing();
    let err = registry
        .transform::<Celsius, String>(&Celsius(1.0), &strict)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformRequiresEqualInOutTypes);

    let negate = TransformOptions::new().strict_type_check().alias("negate");
    let out: Celsius = registry.transform(&Celsius(2.0), &negate).unwrap();
    assert_eq!(out, Celsius(-2.0));

    let mismatched = TransformOptions::new().alias("absolute").throwing();
    let err = registry
        .transform::<Celsius, Celsius>(&Celsius(0.0), &mismatched)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DelegateArgumentWrongType);

    let similar = TransformOptions::new().strict_type_check().alias("absolute");
    assert_eq!(
        registry.try_transform::<Celsius, Kelvin>(&Celsius(0.0), &similar),
        Some(Kelvin(273.15))
    );
}

#[test]
fn test_discovery_is_idempotent() {
    let provider = StaticProvider::new().unit("thermo", vec![scales()]);
    let registry = Registry::new().with_provider(provider);
    let discovery = Discovery::new(&registry);

    assert_eq!(discovery.discover_all().unwrap(), 2);
    assert_eq!(discovery.discover_all().unwrap(), 0);
    assert_eq!(
        discovery.visit(&scales()).unwrap(),
        Visit::AlreadyInitialized
    );
    assert_eq!(registry.len(), 2);
    assert!(
        registry
            .records()
            .iter()
            .all(|r| r.declaring() == Some(TypeKey::of::<Scales>()))
    );
}

#[test]
fn test_auto_initialize_on_first_lookup() {
    let provider = StaticProvider::new().unit("thermo", vec![scales()]);
    let registry = Registry::with_settings(Settings {
        auto_initialize: true,
        ..Settings::default()
    })
    .with_provider(provider);

    assert!(registry.is_empty());
    assert_eq!(registry.cast::<Celsius, Kelvin>(&Celsius(0.0)), Kelvin(273.15));
    assert!(registry.is_unit_initialized("thermo"));
    assert_eq!(registry.initialize().unwrap(), 0);
}

#[test]
fn test_failed_auto_initialize_is_reported() {
    let broken = TypeDescriptor::of::<Catalog>().needs_instance();
    let provider = StaticProvider::new().unit("geometry", vec![broken]);
    let registry = Registry::with_settings(Settings {
        auto_initialize: true,
        ..Settings::default()
    })
    .with_provider(provider);

    let err = registry.initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AutoInitializationFailed);
}

#[test]
fn test_concurrent_adds() {
    let registry = Registry::new();

    let outcomes: Vec<Result<AddOutcome, ConvertError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = &registry;
                s.spawn(move || {
                    registry
                        .add_transform::<i64, _>(&format!("plus{}", i), move |n: &i64| n + i)
                        .unwrap();
                    registry.add_fn(|n: &i64| n.to_string())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let inserted = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(AddOutcome::Inserted)))
        .count();
    let conflicts = outcomes
        .iter()
        .filter(|o| matches!(o, Err(e) if e.kind() == ErrorKind::ConverterExists))
        .count();
    assert_eq!(inserted, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(registry.len(), 9);
}

#[test]
fn test_concurrent_load_on_demand_runs_once() {
    let registry = Registry::new();
    let namespace = TypeKey::of::<Kelvin>().namespace();
    Discovery::new(&registry)
        .visit(&scales().load_on_demand().namespace(namespace))
        .unwrap();

    let attempted: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| registry.load_on_demand(TypeKey::of::<Kelvin>())))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(attempted, 1);
    assert_eq!(registry.len(), 2);
    assert!(registry.pending_namespaces().is_empty());
}

#[test]
fn test_cancelled_batch() {
    let registry = Registry::new();
    let token = CancelToken::new();
    token.cancel();

    let report = registry
        .batch()
        .cancel_token(token)
        .add_fn(|c: &Celsius| Kelvin(c.0))
        .add_fn(|k: &Kelvin| Celsius(k.0))
        .end()
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 2);
    assert!(registry.is_empty());
}

#[test]
fn test_global_extension_methods() {
    let registry = Registry::new();
    builtins::register(&registry).unwrap();
    registry.add_pair(join_list, parse_list).unwrap();
    set_global(registry);

    assert!(5i32.can_convert_to::<String>());
    assert_eq!("42".to_string().cast_to::<i32>(), 42);
    assert_eq!(vec![4, 5].cast_to::<String>(), "4,5");
    assert_eq!("x".to_string().try_cast_to::<u8>(), None);
    assert!(!Celsius(1.0).can_convert_to::<Kelvin>());

    reset_global();
    assert!(!5i32.can_convert_to::<String>());
}
