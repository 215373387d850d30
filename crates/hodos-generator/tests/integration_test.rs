//! End-to-end tests for the generator against sample policy groups.
//!
//! The fixture in `tests/fixtures/activity-group.yaml` models a REST intake
//! policy feeding a batching queue and a consumer that batches onward.

use hodos_core::{
    Characteristic, Dependency, DependencySet, Endpoint, Policy, PolicyGroup, PolicyGroupSnapshot,
    Resource,
};
use hodos_generator::characteristic::CharacteristicRegistry;
use hodos_generator::dependency::{
    ComponentDependencies, ConfiguredDependencyResolver, DependencyResolverChain,
};
use hodos_generator::tree::Document;
use hodos_generator::{Generator, GeneratorConfig, GeneratorError};

const ACTIVITY_GROUP: &str = "tests/fixtures/activity-group.yaml";

fn fixture_path(relative: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("{manifest_dir}/{relative}")
}

fn generator() -> Generator {
    Generator::new(&GeneratorConfig::builder().without_probe().build())
        .expect("generator should initialize")
}

fn batching_endpoint(name: &str, uri: &str) -> Endpoint {
    Endpoint::new(name, uri).with_characteristic(
        Characteristic::new("BatchWithRetryOnFailure")
            .with_property("batchSize", "111")
            .with_property("batchInterval", "2222"),
    )
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

// =============================================================================
// Endpoint resolution
// =============================================================================

#[test]
fn test_option_merge_law() {
    for (physical, expected) in [("U", "U?a=1&b=2"), ("U?z=9", "U?z=9&a=1&b=2")] {
        let snapshot = PolicyGroupSnapshot::new(
            PolicyGroup::new("g").with_endpoint(
                Endpoint::new("e", physical)
                    .with_consumer_option("b", "2")
                    .with_consumer_option("a", "1"),
            ),
        );

        let generated = generator()
            .generate(
                &snapshot,
                &Policy::new("p"),
                r#"<route><from uri="logical:e"/></route>"#,
            )
            .unwrap();

        let doc = Document::parse(&generated.definition, "p").unwrap();
        let from = doc.find_descendant(doc.root(), "from").unwrap();
        assert_eq!(doc.attribute(from, "uri"), Some(expected));
        assert!(generated.definition.contains("&amp;"));
    }
}

#[test]
fn test_physical_uris_left_alone() {
    let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("g"));
    let source = "<route>\n  <from uri=\"direct:a\"/>\n  <to uri=\"direct:b\"/>\n</route>\n";
    let generated = generator()
        .generate(&snapshot, &Policy::new("p"), source)
        .unwrap();
    assert_eq!(generated.definition, source);
}

// =============================================================================
// Batching characteristic
// =============================================================================

#[test]
fn test_batching_producer_scenario() {
    let snapshot = PolicyGroupSnapshot::new(
        PolicyGroup::new("g").with_endpoint(batching_endpoint("q", "direct:out")),
    );

    let generated = generator()
        .generate(
            &snapshot,
            &Policy::new("p"),
            r#"<camelContext>
                 <route><from uri="direct:a"/><inOnly uri="logical:q"/></route>
                 <route><from uri="direct:b"/><inOnly uri="logical:q"/></route>
               </camelContext>"#,
        )
        .unwrap();

    let out = &generated.definition;
    assert_eq!(count(out, "<aggregate strategyRef=\"aggregatorStrategy\" completionSize=\"111\" completionInterval=\"2222\">"), 2);
    assert_eq!(count(out, "<correlationExpression>"), 2);
    assert_eq!(count(out, "<setHeader headerName=\"retryCount\">\n        <constant>0</constant>"), 2);
    assert_eq!(count(out, "<inOnly uri=\"direct:out\"/>"), 2);
    assert_eq!(count(out, "<bean id=\"aggregatorStrategy\""), 1);
    assert!(!out.contains("logical:"));

    let doc = Document::parse(out, "out").unwrap();
    for in_only in doc
        .descendants(doc.root())
        .into_iter()
        .filter(|&n| doc.is_element(n, "inOnly"))
    {
        let parent = doc.parent(in_only).unwrap();
        assert!(doc.is_element(parent, "aggregate"));
    }

    assert!(generated
        .dependencies
        .iter()
        .any(|d| d.artifact_id == "hodos-runtime"));
}

#[test]
fn test_chained_consumer_scenario() {
    let snapshot = PolicyGroupSnapshot::new(
        PolicyGroup::new("g")
            .with_endpoint(batching_endpoint("in", "seda:in"))
            .with_endpoint(batching_endpoint("next", "seda:next"))
            .with_endpoint(Endpoint::new("plain", "log:plain")),
    );

    let generated = generator()
        .generate(
            &snapshot,
            &Policy::new("p"),
            r#"<camelContext><route>
                 <from uri="logical:in"/>
                 <log message="work"/>
                 <inOnly uri="logical:plain"/>
                 <inOnly uri="logical:next"/>
               </route></camelContext>"#,
        )
        .unwrap();

    let doc = Document::parse(&generated.definition, "out").unwrap();
    let root = doc.root();

    // Chained action: inside the multicast, wrapped in an aggregator.
    let multicast = doc.find_descendant(root, "multicast").expect("consumer-producer template");
    let chained = doc
        .descendants(multicast)
        .into_iter()
        .find(|&n| doc.attribute(n, "uri") == Some("seda:next"))
        .expect("next action spliced into the multicast");
    assert!(doc.is_element(doc.parent(chained).unwrap(), "aggregate"));

    // Non-batching trailing action stays in the contained body.
    let do_try = doc.find_descendant(root, "doTry").unwrap();
    assert!(doc
        .descendants(do_try)
        .into_iter()
        .any(|n| doc.attribute(n, "uri") == Some("log:plain")));

    // Retry continuation points back at the consumer's physical URI.
    assert!(doc
        .descendants(multicast)
        .into_iter()
        .any(|n| doc.is_element(n, "inOnly") && doc.attribute(n, "uri") == Some("seda:in")));

    let out = &generated.definition;
    assert_eq!(count(out, "<bean id=\"aggregatorStrategy\""), 1);
    assert_eq!(count(out, "<bean id=\"retrySupport\""), 1);
    for slot in ["<ACTIONS", "<NEXT", "<RETRY", "<MAX_RETRY"] {
        assert!(!out.contains(slot), "unfilled slot {slot}");
    }
}

#[test]
fn test_consumer_without_next_actions_uses_simple_template() {
    let snapshot = PolicyGroupSnapshot::new(
        PolicyGroup::new("g")
            .with_endpoint(batching_endpoint("in", "seda:in"))
            .with_endpoint(Endpoint::new("plain", "log:plain")),
    );

    let generated = generator()
        .generate(
            &snapshot,
            &Policy::new("p"),
            r#"<camelContext><route><from uri="logical:in"/><inOnly uri="logical:plain"/></route></camelContext>"#,
        )
        .unwrap();

    assert!(!generated.definition.contains("<multicast>"));
    assert!(generated.definition.contains("<inOnly uri=\"log:plain\"/>"));
    assert!(generated.definition.contains("<inOnly uri=\"seda:in\"/>"));
}

// =============================================================================
// Whole-snapshot generation
// =============================================================================

#[test]
fn test_generate_activity_fixture() {
    let snapshot = PolicyGroupSnapshot::from_file(fixture_path(ACTIVITY_GROUP)).unwrap();
    let generated = generator().generate_snapshot(&snapshot).unwrap();

    assert_eq!(generated.len(), 2);
    assert_eq!(generated[0].policy, "ActivityServer");
    assert_eq!(generated[1].policy, "ServiceDefinition");

    let server = &generated[0].definition;
    assert!(server.contains("<from uri=\"jetty:http://0.0.0.0:8080/activity\"/>"));
    assert!(server.contains("completionSize=\"111\""));
    assert!(server.contains("<inOnly uri=\"activemq:queue:activityunits\"/>"));

    let service = &generated[1].definition;
    assert!(service.contains("<from uri=\"activemq:queue:activityunits?maxConcurrentConsumers=30\"/>"));
    assert!(service.contains("completionSize=\"100\" completionInterval=\"1000\""));
    assert!(service.contains("<inOnly uri=\"log:audit\"/>"));
    assert_eq!(
        generated[1].resources.get("mapping.json").map(String::as_str),
        Some(r#"{"type":"servicedefn"}"#)
    );

    let activemq = Dependency::new("org.apache.activemq", "activemq-camel", "5.11.1");
    let spring = Dependency::new("org.springframework", "spring-web", "4.1.1.RELEASE");
    for policy in &generated {
        assert!(policy.dependencies.contains(&activemq));
        assert!(policy.dependencies.contains(&spring));
        assert!(!policy.definition.contains("logical:"));
    }
}

#[test]
fn test_generation_is_deterministic() {
    let snapshot = PolicyGroupSnapshot::from_file(fixture_path(ACTIVITY_GROUP)).unwrap();
    let first = generator().generate_snapshot(&snapshot).unwrap();
    let second = generator().generate_snapshot(&snapshot).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_output_is_fixed_point() {
    let snapshot = PolicyGroupSnapshot::from_file(fixture_path(ACTIVITY_GROUP)).unwrap();
    let generator = generator();

    for generated in generator.generate_snapshot(&snapshot).unwrap() {
        let policy = snapshot.policy(&generated.policy).unwrap();
        let again = generator
            .generate(&snapshot, policy, &generated.definition)
            .unwrap();
        assert_eq!(again.definition, generated.definition);
    }
}

#[test]
fn test_resource_conflict_fails_before_rewrite() {
    let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("g"))
        .with_policy(
            Policy::new("a").with_resource(Resource::new("shared.xsl")),
            "<route/>",
        )
        .with_policy(
            Policy::new("b").with_resource(Resource::new("shared.xsl")),
            "<route/>",
        )
        .with_resource_content("a", "shared.xsl", "<xsl:one/>")
        .with_resource_content("b", "shared.xsl", "<xsl:two/>");

    let err = generator().generate_snapshot(&snapshot).unwrap_err();
    assert!(err.is_input_error());
    let issue = err.to_issue();
    assert_eq!(issue.resource.as_deref(), Some("shared.xsl"));
}

// =============================================================================
// Error cases
// =============================================================================

#[test]
fn test_malformed_definition() {
    let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("g"));
    let err = generator()
        .generate(&snapshot, &Policy::new("p"), "<route><to uri=\"x\"></route>")
        .unwrap_err();
    assert!(matches!(err, GeneratorError::Parse { ref policy, .. } if policy == "p"));
}

#[test]
fn test_unknown_endpoint_aborts_policy() {
    let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("g"))
        .with_policy(Policy::new("p"), r#"<route><inOnly uri="logical:ghost"/></route>"#);
    let err = generator().generate_snapshot(&snapshot).unwrap_err();
    assert!(matches!(err, GeneratorError::UnknownEndpoint { ref endpoint, .. } if endpoint == "ghost"));
}

#[test]
fn test_missing_uri_is_input_error() {
    let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("g"));
    let err = generator()
        .generate(&snapshot, &Policy::new("p"), "<route><from/></route>")
        .unwrap_err();
    assert!(err.is_input_error());
}

// =============================================================================
// Dependency resolution
// =============================================================================

#[test]
fn test_configured_resolver_precedes_probe() {
    let repo = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(repo.path().join("org/apache/camel/camel-jms/2.15.0")).unwrap();
    std::fs::create_dir_all(repo.path().join("org/apache/camel/camel-kafka/2.15.0")).unwrap();

    let table_path = repo.path().join("components.json");
    std::fs::write(
        &table_path,
        r#"{"dependencies":{"jms":[{"groupId":"com.example","artifactId":"jms-bundle","version":"9"}]}}"#,
    )
    .unwrap();

    let config = GeneratorConfig::builder()
        .base_dependencies(DependencySet::new())
        .component_dependencies(table_path.clone())
        .probe(hodos_generator::dependency::ProbeConfig {
            repository_root: repo.path().to_path_buf(),
            camel_version: "2.15.0".to_string(),
        })
        .build();
    let generator = Generator::new(&config).unwrap();

    let snapshot = PolicyGroupSnapshot::new(
        PolicyGroup::new("g")
            .with_endpoint(Endpoint::new("j", "jms:queue:a"))
            .with_endpoint(Endpoint::new("k", "kafka:topic"))
            .with_endpoint(Endpoint::new("d", "direct:x")),
    );
    let generated = generator
        .generate(
            &snapshot,
            &Policy::new("p"),
            r#"<route><from uri="logical:j"/><to uri="logical:k"/><to uri="logical:d"/></route>"#,
        )
        .unwrap();

    let expected: DependencySet = [
        Dependency::new("com.example", "jms-bundle", "9"),
        Dependency::new("org.apache.camel", "camel-kafka", "2.15.0"),
    ]
    .into_iter()
    .collect();
    assert_eq!(generated.dependencies, expected);
}

#[test]
fn test_empty_registry_reports_unsupported_characteristic() {
    let generator = Generator::from_parts(
        CharacteristicRegistry::new(),
        DependencyResolverChain::new()
            .with_resolver(ConfiguredDependencyResolver::new(ComponentDependencies::default())),
        DependencySet::new(),
    );
    let snapshot = PolicyGroupSnapshot::new(
        PolicyGroup::new("g").with_endpoint(batching_endpoint("q", "direct:out")),
    );

    let generated = generator
        .generate(&snapshot, &Policy::new("p"), r#"<route><inOnly uri="logical:q"/></route>"#)
        .unwrap();

    assert!(generated.dependencies.is_empty());
    assert_eq!(generated.issues.len(), 1);
    assert!(!generated.definition.contains("aggregate"));
    assert!(generator.characteristic_types().is_empty());
}
