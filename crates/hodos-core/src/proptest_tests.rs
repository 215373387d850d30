//! Property-based tests for hodos-core types.
//!
//! These tests use proptest to verify invariants across many randomly generated inputs.

use proptest::prelude::*;

use crate::uri::{self, Marker};
use crate::{BuildStatus, Dependency, DependencySet, Endpoint};

/// Strategy for generating endpoint names.
fn endpoint_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_.-]{0,30}"
}

/// Strategy for generating coordinate parts (no `:` allowed).
fn coordinate_part_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.-]{0,20}"
}

fn dependency_strategy() -> impl Strategy<Value = Dependency> {
    (
        coordinate_part_strategy(),
        coordinate_part_strategy(),
        "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
    )
        .prop_map(|(g, a, v)| Dependency::new(g, a, v))
}

fn status_strategy() -> impl Strategy<Value = BuildStatus> {
    prop_oneof![
        Just(BuildStatus::Created),
        Just(BuildStatus::Scheduled),
        Just(BuildStatus::Building),
        Just(BuildStatus::Successful),
        Just(BuildStatus::Failed),
    ]
}

proptest! {
    /// The endpoint name survives the logical prefix and any ignored query.
    #[test]
    fn logical_uri_yields_endpoint_name(
        name in endpoint_name_strategy(),
        query in proptest::option::of("[a-z]{1,5}=[a-z0-9]{1,5}"),
    ) {
        let logical = match &query {
            Some(q) => format!("{}{name}?{q}", uri::LOGICAL_PREFIX),
            None => format!("{}{name}", uri::LOGICAL_PREFIX),
        };
        prop_assert!(uri::is_logical(&logical));
        prop_assert_eq!(uri::endpoint_name(&logical), Some(name.as_str()));
    }

    /// Physical URIs are never mistaken for logical references.
    #[test]
    fn physical_uri_is_not_logical(scheme in "(direct|jms|activemq|seda|file)", rest in "[a-z:/]{0,20}") {
        let physical = format!("{scheme}:{rest}");
        prop_assert_eq!(uri::endpoint_name(&physical), None);
        prop_assert_eq!(uri::component_prefix(&physical), scheme.as_str());
    }

    #[test]
    fn dependency_display_parses_back(dep in dependency_strategy()) {
        let parsed: Dependency = dep.to_string().parse().unwrap();
        prop_assert_eq!(parsed, dep);
    }

    /// Inserting the same coordinates in any order yields the same set.
    #[test]
    fn dependency_set_is_order_independent(deps in proptest::collection::vec(dependency_strategy(), 0..12)) {
        let forward: DependencySet = deps.iter().cloned().collect();
        let backward: DependencySet = deps.iter().rev().cloned().collect();
        prop_assert_eq!(&forward, &backward);
        prop_assert!(forward.len() <= deps.len());
    }

    /// Only terminal or fresh tags can be scheduled.
    #[test]
    fn scheduled_only_from_idle_states(status in status_strategy()) {
        prop_assert_eq!(
            status.can_transition_to(BuildStatus::Scheduled),
            !status.is_in_flight()
        );
    }

    /// No transition leaves a terminal state except a fresh submission.
    #[test]
    fn terminal_states_absorb(from in status_strategy(), to in status_strategy()) {
        if from.is_terminal() && to != BuildStatus::Scheduled {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn endpoint_roundtrip(
        name in endpoint_name_strategy(),
        options in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..5),
    ) {
        let mut endpoint = Endpoint::new(name, "direct:out");
        endpoint.consumer_options = options;
        let json = serde_json::to_string(&endpoint).unwrap();
        let back: Endpoint = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, endpoint);
    }
}

#[test]
fn test_marker_tag_names_are_distinct() {
    let names: std::collections::HashSet<_> = Marker::ALL.iter().map(Marker::tag_name).collect();
    assert_eq!(names.len(), Marker::ALL.len());
}
