//! Component dependency resolution.
//!
//! A physical URI's component prefix (the scheme before the first `:`) maps to
//! the packages needed to use that component at runtime. Resolvers are kept in
//! an ordered [`DependencyResolverChain`]; the first resolver that supports a
//! component answers for it. A component nobody supports needs no extra
//! packages.

mod configured;
mod probe;

use std::collections::HashMap;
use std::fmt;

use hodos_core::uri;
use hodos_core::DependencySet;
use parking_lot::RwLock;
use tracing::debug;

pub use configured::{ComponentDependencies, ConfiguredDependencyResolver};
pub use probe::{CamelProbeResolver, ProbeConfig};

/// A strategy mapping a component prefix to package coordinates.
pub trait DependencyResolver: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns true if this resolver knows the component.
    fn supports(&self, component: &str) -> bool;

    /// Returns the coordinates required by the component.
    ///
    /// Only meaningful when [`supports`](Self::supports) returned true.
    fn dependencies(&self, component: &str) -> DependencySet;
}

/// Ordered list of resolvers with a per-component result cache.
///
/// Probing resolvers may touch the filesystem, and the same component recurs
/// across every policy of a build, so answers (including "nothing needed")
/// are cached for the life of the chain.
///
/// # Examples
///
/// ```rust
/// use hodos_core::Dependency;
/// use hodos_generator::dependency::{
///     ComponentDependencies, ConfiguredDependencyResolver, DependencyResolverChain,
/// };
///
/// let table = ComponentDependencies::default()
///     .with_component("jms", Dependency::new("org.apache.camel", "camel-jms", "2.15.0"));
/// let chain = DependencyResolverChain::new()
///     .with_resolver(ConfiguredDependencyResolver::new(table));
///
/// assert_eq!(chain.dependencies_for_uri("jms:queue:orders").len(), 1);
/// assert!(chain.dependencies_for("direct").is_empty());
/// ```
#[derive(Default)]
pub struct DependencyResolverChain {
    resolvers: Vec<Box<dyn DependencyResolver>>,
    cache: RwLock<HashMap<String, DependencySet>>,
}

impl DependencyResolverChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resolver; earlier resolvers take precedence.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl DependencyResolver + 'static) -> Self {
        self.push(Box::new(resolver));
        self
    }

    /// Appends a boxed resolver.
    pub fn push(&mut self, resolver: Box<dyn DependencyResolver>) {
        self.resolvers.push(resolver);
        self.cache.write().clear();
    }

    /// Returns the number of resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if the chain has no resolvers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Returns the coordinates for a component from the first resolver that
    /// supports it, or an empty set.
    pub fn dependencies_for(&self, component: &str) -> DependencySet {
        if let Some(cached) = self.cache.read().get(component) {
            return cached.clone();
        }

        let resolved = self
            .resolvers
            .iter()
            .find(|r| r.supports(component))
            .map_or_else(DependencySet::new, |r| {
                debug!(component, resolver = r.name(), "Resolved component dependencies");
                r.dependencies(component)
            });

        self.cache
            .write()
            .entry(component.to_string())
            .or_insert(resolved)
            .clone()
    }

    /// Returns the coordinates for a physical URI's component prefix.
    pub fn dependencies_for_uri(&self, physical_uri: &str) -> DependencySet {
        self.dependencies_for(uri::component_prefix(physical_uri))
    }

    /// Returns the union of every supporting resolver's coordinates.
    ///
    /// Unlike [`dependencies_for`](Self::dependencies_for) this consults all
    /// resolvers and bypasses the cache.
    pub fn merged_dependencies_for(&self, component: &str) -> DependencySet {
        self.resolvers
            .iter()
            .filter(|r| r.supports(component))
            .flat_map(|r| r.dependencies(component))
            .collect()
    }
}

impl fmt::Debug for DependencyResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyResolverChain")
            .field(
                "resolvers",
                &self.resolvers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("cached", &self.cache.read().len())
            .finish()
    }
}
