//! The transformation engine.
//!
//! For one policy, the generator parses the route definition, resolves every
//! logical endpoint reference on `from`, then `to`, then `inOnly` elements,
//! applies the referenced endpoint's characteristics right after each
//! resolution, and collects the packages the result needs.
//!
//! Characteristic processors restructure the tree (wrapping elements,
//! moving siblings), so after each rewrite the scan restarts from the root
//! instead of continuing over the mutated tree. Each rewrite removes exactly
//! one logical reference, so the loop ends after as many passes as there are
//! references.

use std::collections::BTreeMap;

use hodos_core::uri::{self, Marker};
use hodos_core::{DependencySet, Issue, Policy, PolicyGroupSnapshot};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::characteristic::{CharacteristicRegistry, CharacteristicType, ProcessContext};
use crate::config::GeneratorConfig;
use crate::dependency::{
    CamelProbeResolver, ComponentDependencies, ConfiguredDependencyResolver,
    DependencyResolverChain,
};
use crate::endpoint;
use crate::error::{GeneratorError, Result};
use crate::tree::{Document, NodeId};

/// Output of generating one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPolicy {
    /// Policy name.
    pub policy: String,
    /// Rewritten route definition.
    pub definition: String,
    /// Every package the definition needs, de-duplicated.
    pub dependencies: DependencySet,
    /// Resource content keyed by resource name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, String>,
    /// Advisory issues, such as unsupported characteristics.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

/// Compiles route definitions against a snapshot.
///
/// A generator is immutable after construction and can be shared across
/// threads.
///
/// # Examples
///
/// ```rust
/// use hodos_core::{Endpoint, Policy, PolicyGroup, PolicyGroupSnapshot};
/// use hodos_generator::{Generator, GeneratorConfig};
///
/// let generator = Generator::new(&GeneratorConfig::builder().without_probe().build()).unwrap();
/// let snapshot = PolicyGroupSnapshot::new(
///     PolicyGroup::new("g").with_endpoint(Endpoint::new("out", "direct:out")),
/// );
/// let policy = Policy::new("p");
///
/// let generated = generator
///     .generate(&snapshot, &policy, r#"<route><to uri="logical:out"/></route>"#)
///     .unwrap();
/// assert_eq!(generated.definition, "<route>\n  <to uri=\"direct:out\"/>\n</route>\n");
/// ```
#[derive(Debug)]
pub struct Generator {
    registry: CharacteristicRegistry,
    resolvers: DependencyResolverChain,
    base_dependencies: DependencySet,
}

impl Generator {
    /// Creates a generator with the built-in processors and the configured
    /// dependency resolvers.
    ///
    /// # Errors
    ///
    /// Returns an error if a component dependency table cannot be loaded or
    /// a built-in processor fails to initialize.
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let mut table = ComponentDependencies::built_in()?;
        if let Some(path) = &config.component_dependencies {
            table.merge(ComponentDependencies::from_file(path)?);
        }

        let mut resolvers =
            DependencyResolverChain::new().with_resolver(ConfiguredDependencyResolver::new(table));
        if let Some(probe) = &config.probe {
            resolvers.push(Box::new(CamelProbeResolver::new(probe.clone())));
        }

        Ok(Self::from_parts(
            CharacteristicRegistry::with_defaults()?,
            resolvers,
            config.base_dependencies.clone(),
        ))
    }

    /// Assembles a generator from explicit parts.
    #[must_use]
    pub const fn from_parts(
        registry: CharacteristicRegistry,
        resolvers: DependencyResolverChain,
        base_dependencies: DependencySet,
    ) -> Self {
        Self {
            registry,
            resolvers,
            base_dependencies,
        }
    }

    /// Returns the supported characteristic types, sorted by name.
    #[must_use]
    pub fn characteristic_types(&self) -> Vec<CharacteristicType> {
        self.registry.types()
    }

    /// Returns the dependency resolver chain.
    #[must_use]
    pub const fn resolvers(&self) -> &DependencyResolverChain {
        &self.resolvers
    }

    /// Generates every policy in a snapshot, in order.
    ///
    /// The snapshot's consistency (unique endpoints, a definition per policy,
    /// agreeing shared resources) is checked before any policy is rewritten.
    ///
    /// # Errors
    ///
    /// Returns the first error; no partial results are returned.
    #[instrument(skip_all, fields(group = %snapshot.group.name))]
    pub fn generate_snapshot(&self, snapshot: &PolicyGroupSnapshot) -> Result<Vec<GeneratedPolicy>> {
        snapshot.check_consistency()?;

        let generated = snapshot
            .policies
            .iter()
            .map(|policy| {
                let definition = snapshot.definition(&policy.name).ok_or_else(|| {
                    hodos_core::Error::MissingDefinition {
                        policy: policy.name.clone(),
                    }
                })?;
                self.generate(snapshot, policy, definition)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(policies = generated.len(), "Generated snapshot");
        Ok(generated)
    }

    /// Generates one policy's routing configuration.
    ///
    /// # Errors
    ///
    /// Returns an input error if the definition is malformed, a marker has no
    /// `uri`, a reference names an unknown endpoint, a referenced resource has
    /// no content, or a characteristic property is unusable.
    #[instrument(skip_all, fields(policy = %policy.name))]
    pub fn generate(
        &self,
        snapshot: &PolicyGroupSnapshot,
        policy: &Policy,
        definition: &str,
    ) -> Result<GeneratedPolicy> {
        let resources = snapshot.resource_definitions(policy)?;
        let mut doc = Document::parse(definition, &policy.name)?;
        let mut dependencies = DependencySet::new();
        let mut issues = Vec::new();

        for marker in Marker::ALL {
            while let Some(element) = next_logical(&doc, marker, &policy.name)? {
                self.resolve_element(
                    snapshot,
                    policy,
                    &mut doc,
                    element,
                    marker,
                    &mut dependencies,
                    &mut issues,
                )?;
            }
        }

        dependencies.extend(policy.dependencies.iter().cloned());
        for resource in &policy.resources {
            dependencies.extend(resource.dependencies.iter().cloned());
        }
        dependencies.extend(self.base_dependencies.iter().cloned());

        debug!(
            dependencies = dependencies.len(),
            issues = issues.len(),
            "Generated policy"
        );

        Ok(GeneratedPolicy {
            policy: policy.name.clone(),
            definition: doc.serialize(),
            dependencies,
            resources,
            issues,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_element(
        &self,
        snapshot: &PolicyGroupSnapshot,
        policy: &Policy,
        doc: &mut Document,
        element: NodeId,
        marker: Marker,
        dependencies: &mut DependencySet,
        issues: &mut Vec<Issue>,
    ) -> Result<()> {
        let logical = doc
            .attribute(element, uri::URI_ATTRIBUTE)
            .unwrap_or_default()
            .to_string();
        let resolution = endpoint::resolve(snapshot, marker.tag_name(), &logical)
            .map_err(|e| e.in_policy(&policy.name))?
            .ok_or_else(|| hodos_core::Error::InvalidInput {
                reason: format!("'{logical}' is not a logical reference"),
            })?;
        let endpoint = resolution.endpoint;

        if uri::is_logical(&resolution.uri) {
            return Err(hodos_core::Error::InvalidInput {
                reason: format!(
                    "endpoint '{}' resolves to another logical reference",
                    endpoint.name
                ),
            }
            .into());
        }

        debug!(
            endpoint = %endpoint.name,
            marker = %marker,
            uri = %resolution.uri,
            "Resolved logical endpoint"
        );
        doc.set_attribute(element, uri::URI_ATTRIBUTE, resolution.uri.as_str());

        for characteristic in &endpoint.characteristics {
            let Some(processor) = self.registry.get(&characteristic.characteristic_type) else {
                warn!(
                    endpoint = %endpoint.name,
                    characteristic = %characteristic.characteristic_type,
                    "Characteristic type not supported; not applied"
                );
                let issue = Issue::warning(format!(
                    "characteristic '{}' is not supported and was not applied",
                    characteristic.characteristic_type
                ))
                .with_policy(&policy.name)
                .with_endpoint(&endpoint.name);
                if !issues.contains(&issue) {
                    issues.push(issue);
                }
                continue;
            };

            let ctx = ProcessContext {
                policy: &policy.name,
                snapshot,
                endpoint,
                characteristic,
            };
            processor
                .process(&ctx, doc, element)
                .map_err(|e| e.in_policy(&policy.name))?;
            dependencies.extend(processor.dependencies().iter().cloned());
        }

        dependencies.extend(endpoint.dependencies.iter().cloned());
        dependencies.extend(self.resolvers.dependencies_for_uri(&resolution.uri));
        Ok(())
    }
}

/// Finds the first `marker` element in document order with a logical URI.
fn next_logical(doc: &Document, marker: Marker, policy: &str) -> Result<Option<NodeId>> {
    for node in doc.descendants(doc.root()) {
        if !doc.is_element(node, marker.tag_name()) {
            continue;
        }
        match doc.attribute(node, uri::URI_ATTRIBUTE) {
            None => {
                return Err(GeneratorError::MissingUri {
                    policy: policy.to_string(),
                    element: marker.tag_name().to_string(),
                })
            }
            Some(value) if uri::is_logical(value) => return Ok(Some(node)),
            Some(_) => {}
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hodos_core::{Characteristic, Dependency, Endpoint, PolicyGroup, Resource};

    fn generator() -> Generator {
        Generator::from_parts(
            CharacteristicRegistry::with_defaults().unwrap(),
            DependencyResolverChain::new().with_resolver(ConfiguredDependencyResolver::new(
                ComponentDependencies::default().with_component(
                    "jms",
                    Dependency::new("org.apache.camel", "camel-jms", "2.15.0"),
                ),
            )),
            DependencySet::from([Dependency::new("base", "base", "1")]),
        )
    }

    fn snapshot() -> PolicyGroupSnapshot {
        PolicyGroupSnapshot::new(
            PolicyGroup::new("g")
                .with_endpoint(
                    Endpoint::new("in", "jms:queue:in")
                        .with_consumer_option("concurrentConsumers", "4")
                        .with_dependency(Dependency::new("ep", "in", "1")),
                )
                .with_endpoint(Endpoint::new("out", "direct:out").with_producer_option("p", "1")),
        )
    }

    #[test]
    fn test_resolves_all_markers() {
        let generated = generator()
            .generate(
                &snapshot(),
                &Policy::new("p"),
                r#"<route><from uri="logical:in"/><to uri="logical:out"/><inOnly uri="logical:out?x=y"/></route>"#,
            )
            .unwrap();

        assert_eq!(
            generated.definition,
            "<route>\n  <from uri=\"jms:queue:in?concurrentConsumers=4\"/>\n  <to uri=\"direct:out?p=1\"/>\n  <inOnly uri=\"direct:out?p=1\"/>\n</route>\n"
        );
        assert!(generated.issues.is_empty());
    }

    #[test]
    fn test_dependency_union() {
        let policy = Policy::new("p")
            .with_dependency(Dependency::new("pol", "p", "1"))
            .with_resource(Resource::new("r").with_dependency(Dependency::new("res", "r", "1")));
        let snapshot = snapshot().with_resource_content("p", "r", "content");

        let generated = generator()
            .generate(&snapshot, &policy, r#"<route><from uri="logical:in"/></route>"#)
            .unwrap();

        let artifacts: Vec<_> = generated
            .dependencies
            .iter()
            .map(|d| d.artifact_id.as_str())
            .collect();
        assert_eq!(artifacts, vec!["base", "in", "camel-jms", "p", "r"]);
        assert_eq!(generated.resources.get("r").map(String::as_str), Some("content"));
    }

    #[test]
    fn test_missing_uri() {
        let err = generator()
            .generate(&snapshot(), &Policy::new("p"), "<route><to/></route>")
            .unwrap_err();
        assert!(
            matches!(err, GeneratorError::MissingUri { ref policy, ref element } if policy == "p" && element == "to")
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_unknown_endpoint_names_policy() {
        let err = generator()
            .generate(
                &snapshot(),
                &Policy::new("p"),
                r#"<route><to uri="logical:nowhere"/></route>"#,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::UnknownEndpoint { ref policy, ref endpoint } if policy == "p" && endpoint == "nowhere"
        ));
    }

    #[test]
    fn test_unsupported_characteristic_is_advisory() {
        let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("g").with_endpoint(
            Endpoint::new("out", "direct:out")
                .with_characteristic(Characteristic::new("Throttled")),
        ));
        let generated = generator()
            .generate(
                &snapshot,
                &Policy::new("p"),
                r#"<route><to uri="logical:out"/><to uri="logical:out"/></route>"#,
            )
            .unwrap();

        assert_eq!(generated.issues.len(), 1);
        assert_eq!(generated.issues[0].endpoint.as_deref(), Some("out"));
        assert!(generated.definition.contains("direct:out"));
    }

    #[test]
    fn test_logical_endpoint_uri_rejected() {
        let mut endpoint = Endpoint::new("loop", "direct:x");
        endpoint.uri = "logical:loop".to_string();
        let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("g").with_endpoint(endpoint));
        assert!(generator()
            .generate(&snapshot, &Policy::new("p"), r#"<route><to uri="logical:loop"/></route>"#)
            .is_err());
    }

    #[test]
    fn test_generate_snapshot_checks_resources_first() {
        let snapshot = snapshot()
            .with_policy(
                Policy::new("a").with_resource(Resource::new("r")),
                r#"<route><to uri="logical:nowhere"/></route>"#,
            )
            .with_policy(
                Policy::new("b").with_resource(Resource::new("r")),
                r#"<route><to uri="logical:out"/></route>"#,
            )
            .with_resource_content("a", "r", "one")
            .with_resource_content("b", "r", "two");

        let err = generator().generate_snapshot(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Core(hodos_core::Error::ResourceConflict { .. })
        ));
    }
}
