//! The process-wide convenience registry used by [`CastExt`](crate::CastExt).
//!
//! Every operation also works on an explicit [`Registry`]; this handle only
//! saves passing one around. Tests can swap it with [`set_global`] and
//! restore a fresh one with [`reset_global`].

use crate::registry::Registry;
use arc_swap::ArcSwap;
use std::sync::{Arc, LazyLock};

static GLOBAL: LazyLock<ArcSwap<Registry>> =
    LazyLock::new(|| ArcSwap::from_pointee(Registry::new()));

/// The current global registry.
pub fn global() -> Arc<Registry> {
    GLOBAL.load_full()
}

/// Install `registry` as the global one and return it.
pub fn set_global(registry: Registry) -> Arc<Registry> {
    let registry = Arc::new(registry);
    GLOBAL.store(registry.clone());
    registry
}

/// Replace the global registry with an empty one.
pub fn reset_global() {
    GLOBAL.store(Arc::new(Registry::new()));
}
