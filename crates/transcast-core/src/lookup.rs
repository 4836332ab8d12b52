//! Tiered record search.

use crate::record::ConversionRecord;
use crate::registry::Registry;
use crate::types::{TypeHierarchy, TypeKey};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// A predicate over a record's alias or name label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePattern {
    Exact(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

impl NamePattern {
    /// Whether `label` fits the pattern.
    pub fn matches(&self, label: &str) -> bool {
        match self {
            NamePattern::Exact(s) => label == s,
            NamePattern::Contains(s) => label.contains(s.as_str()),
            NamePattern::StartsWith(s) => label.starts_with(s.as_str()),
            NamePattern::EndsWith(s) => label.ends_with(s.as_str()),
        }
    }

    /// Whether the record's alias or name matches.
    pub fn matches_record(&self, record: &ConversionRecord) -> bool {
        record.alias_label().is_some_and(|a| self.matches(a))
            || record.name_label().is_some_and(|n| self.matches(n))
    }
}

/// Which search tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    /// The record's argument type is assignable from the requested one.
    Assignable,
    /// An object-typed fallback whose source is the any sentinel.
    AnySource,
    /// Found after loading a deferred namespace.
    LoadedOnDemand,
}

/// A search over the registry. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub source: Option<TypeKey>,
    pub target: Option<TypeKey>,
    pub argument: Option<TypeKey>,
    pub declaring: Option<TypeKey>,
    pub standard: Option<bool>,
    pub name: Option<NamePattern>,
    pub widen: bool,
    pub load_on_demand: bool,
}

impl Query {
    /// A query matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source `In`, target `Out`.
    pub fn pair<In: Any, Out: Any>() -> Self {
        Self::new()
            .source(TypeKey::of::<In>())
            .target(TypeKey::of::<Out>())
    }

    /// Require the record's source type.
    pub fn source(mut self, ty: TypeKey) -> Self {
        self.source = Some(ty);
        self
    }

    /// Require the record's target type.
    pub fn target(mut self, ty: TypeKey) -> Self {
        self.target = Some(ty);
        self
    }

    /// Require the record's argument type.
    pub fn argument(mut self, ty: TypeKey) -> Self {
        self.argument = Some(ty);
        self
    }

    /// Require the declaring type.
    pub fn declaring(mut self, ty: TypeKey) -> Self {
        self.declaring = Some(ty);
        self
    }

    /// Keep only standard, or only non-standard, records.
    pub fn standard(mut self, standard: bool) -> Self {
        self.standard = Some(standard);
        self
    }

    /// Filter by alias or name.
    pub fn name(mut self, pattern: NamePattern) -> Self {
        self.name = Some(pattern);
        self
    }

    /// Fall back to records whose argument type is assignable from the
    /// requested one.
    pub fn widen(mut self, widen: bool) -> Self {
        self.widen = widen;
        self
    }

    /// On a miss, load deferred converters for the target's namespace.
    pub fn load_on_demand(mut self, load: bool) -> Self {
        self.load_on_demand = load;
        self
    }

    fn pair_matches(&self, record: &ConversionRecord) -> bool {
        self.source.is_none_or(|s| record.source() == s)
            && self.target.is_none_or(|t| record.target() == t)
    }

    fn filters_match(&self, record: &ConversionRecord) -> bool {
        self.declaring.is_none_or(|d| record.declaring() == Some(d))
            && self.standard.is_none_or(|s| record.is_standard() == s)
            && self.name.as_ref().is_none_or(|p| p.matches_record(record))
    }

    fn argument_exact(&self, record: &ConversionRecord) -> bool {
        self.argument.is_none_or(|a| record.argument() == a)
    }

    fn argument_widened(&self, record: &ConversionRecord, hierarchy: &TypeHierarchy) -> bool {
        match self.argument {
            None => true,
            Some(a) => record.argument().is_any() || hierarchy.is_assignable(a, record.argument()),
        }
    }
}

/// A record selected by [`Lookup::find`].
#[derive(Debug, Clone)]
pub struct Match {
    pub record: Arc<ConversionRecord>,
    pub tier: MatchTier,
}

/// Read-only search over a registry's current records.
pub struct Lookup<'a> {
    registry: &'a Registry,
}

impl Registry {
    /// Search over the current records.
    pub fn lookup(&self) -> Lookup<'_> {
        Lookup { registry: self }
    }
}

impl<'a> Lookup<'a> {
    /// Run the tiered search. The first tier with any match wins, and within
    /// a tier the earliest-registered record wins.
    ///
    /// 1. exact source, target and argument;
    /// 2. with `widen`, an argument type assignable from the requested one;
    /// 3. any-source fallbacks for the target;
    /// 4. with `load_on_demand`, load the target's deferred namespace and
    ///    search by source and target only.
    pub fn find(&self, query: &Query) -> Option<Match> {
        self.registry.ensure_initialized();
        let records = self.registry.records();
        let found = self.search(&records, query);
        if found.is_some() || !query.load_on_demand {
            return found;
        }

        let target = query.target?;
        if self.registry.load_on_demand(target) == 0 {
            return None;
        }
        let records = self.registry.records();
        let record = records.iter().find(|r| query.pair_matches(r))?;
        trace!(record = %record.describe(), "lookup matched after load-on-demand");
        Some(Match {
            record: record.clone(),
            tier: MatchTier::LoadedOnDemand,
        })
    }

    fn search(&self, records: &[Arc<ConversionRecord>], query: &Query) -> Option<Match> {
        let hit = |record: &Arc<ConversionRecord>, tier| {
            trace!(record = %record.describe(), ?tier, "lookup matched");
            Some(Match {
                record: record.clone(),
                tier,
            })
        };

        if let Some(r) = records
            .iter()
            .find(|r| query.pair_matches(r) && query.argument_exact(r) && query.filters_match(r))
        {
            return hit(r, MatchTier::Exact);
        }

        let hierarchy = self.registry.hierarchy();
        if query.widen && query.argument.is_some() {
            if let Some(r) = records.iter().find(|r| {
                query.pair_matches(r)
                    && query.argument_widened(r, &hierarchy)
                    && query.filters_match(r)
            }) {
                return hit(r, MatchTier::Assignable);
            }
        }

        let any_source = records.iter().find(|r| {
            r.source().is_any()
                && query.target.is_none_or(|t| r.target() == t)
                && (query.argument_exact(r) || (query.widen && query.argument_widened(r, &hierarchy)))
                && query.filters_match(r)
        });
        if let Some(r) = any_source {
            return hit(r, MatchTier::AnySource);
        }

        trace!(?query, "lookup missed");
        None
    }

    /// Every exact-tier match, in registration order.
    pub fn find_all(&self, query: &Query) -> Vec<Arc<ConversionRecord>> {
        self.registry.ensure_initialized();
        self.registry
            .records()
            .iter()
            .filter(|r| query.pair_matches(r) && query.argument_exact(r) && query.filters_match(r))
            .cloned()
            .collect()
    }
}
