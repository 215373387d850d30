//! The `BatchWithRetryOnFailure` characteristic.
//!
//! Producing to a batching endpoint aggregates messages into batches.
//! Consuming from one splits each batch, runs the route's actions per
//! message, and sends failed messages back to the endpoint for retry, up to
//! `maxRetry` attempts. Successful batches may be forwarded to further
//! batching endpoints ("next actions").

use hodos_core::uri::{self, Marker};
use hodos_core::{Dependency, DependencySet, PolicyGroupSnapshot};
use tracing::debug;

use super::{ensure_bean, CharacteristicProcessor, CharacteristicType, ProcessContext};
use crate::error::{GeneratorError, Result};
use crate::tree::{Document, NodeId};

/// Type name this processor is registered under.
pub const TYPE_NAME: &str = "BatchWithRetryOnFailure";

const AGGREGATOR_BEAN: &str = "aggregatorStrategy";
const AGGREGATOR_CLASS: &str = "io.hodos.runtime.ListAggregator";
const RETRY_BEAN: &str = "retrySupport";
const RETRY_CLASS: &str = "io.hodos.runtime.RetrySupport";

const CONSUMER_ONLY: (&str, &str) = (
    "batch-retry-consumer-only",
    include_str!("../../templates/batch-retry-consumer-only.xml"),
);
const CONSUMER_PRODUCER: (&str, &str) = (
    "batch-retry-consumer-producer",
    include_str!("../../templates/batch-retry-consumer-producer.xml"),
);

const ACTIONS_SLOT: &str = "ACTIONS";
const NEXT_SLOT: &str = "NEXT";
const RETRY_SLOT: &str = "RETRY";
const MAX_RETRY_SLOT: &str = "MAX_RETRY";

/// Processor for `BatchWithRetryOnFailure`.
///
/// Both consumer templates are parsed once at construction and shared by
/// every call.
#[derive(Debug)]
pub struct BatchWithRetryOnFailure {
    ty: CharacteristicType,
    dependencies: DependencySet,
    consumer_only: Document,
    consumer_producer: Document,
}

fn load_template((name, text): (&str, &str), required_slots: &[&str]) -> Result<Document> {
    let doc = Document::parse(text, name).map_err(|e| GeneratorError::InvalidTemplate {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    for slot in required_slots {
        if doc.find_descendant(doc.root(), slot).is_none() {
            return Err(GeneratorError::InvalidTemplate {
                name: name.to_string(),
                message: format!("missing {slot} slot"),
            });
        }
    }
    Ok(doc)
}

impl BatchWithRetryOnFailure {
    /// Creates the processor, parsing its templates.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::InvalidTemplate`] if an embedded template is
    /// malformed or lacks a slot.
    pub fn new() -> Result<Self> {
        let ty = CharacteristicType::new(TYPE_NAME)
            .with_description("Batches produced messages and retries failed ones on consumption")
            .with_property("batchInterval", true, Some("1000"))
            .with_property("batchSize", true, Some("100"))
            .with_property("maxRetry", true, Some("3"));

        let dependencies = DependencySet::from([Dependency::new(
            "io.hodos",
            "hodos-runtime",
            env!("CARGO_PKG_VERSION"),
        )]);

        Ok(Self {
            ty,
            dependencies,
            consumer_only: load_template(
                CONSUMER_ONLY,
                &[ACTIONS_SLOT, RETRY_SLOT, MAX_RETRY_SLOT],
            )?,
            consumer_producer: load_template(
                CONSUMER_PRODUCER,
                &[ACTIONS_SLOT, NEXT_SLOT, RETRY_SLOT, MAX_RETRY_SLOT],
            )?,
        })
    }

    /// Wraps a one-way producer in an aggregator.
    fn process_producer(
        &self,
        ctx: &ProcessContext<'_>,
        doc: &mut Document,
        element: NodeId,
    ) -> Result<()> {
        let batch_size = self
            .ty
            .positive_property(ctx.endpoint, ctx.characteristic, "batchSize")?;
        let batch_interval = self
            .ty
            .positive_property(ctx.endpoint, ctx.characteristic, "batchInterval")?;

        let aggregate = doc.create_element("aggregate");
        doc.set_attribute(aggregate, "strategyRef", AGGREGATOR_BEAN);
        doc.set_attribute(aggregate, "completionSize", batch_size.to_string());
        doc.set_attribute(aggregate, "completionInterval", batch_interval.to_string());

        let correlation = doc.create_element("correlationExpression");
        let always = constant(doc, "true");
        doc.append_child(correlation, always);
        doc.append_child(aggregate, correlation);

        let set_header = doc.create_element("setHeader");
        doc.set_attribute(set_header, "headerName", "retryCount");
        let zero = constant(doc, "0");
        doc.append_child(set_header, zero);
        doc.append_child(aggregate, set_header);

        doc.replace(element, aggregate);
        doc.append_child(aggregate, element);

        ensure_bean(doc, AGGREGATOR_BEAN, AGGREGATOR_CLASS);
        Ok(())
    }

    /// Splices the consumer template into the route the element starts.
    fn process_consumer(
        &self,
        ctx: &ProcessContext<'_>,
        doc: &mut Document,
        element: NodeId,
    ) -> Result<()> {
        let Some(route) = doc.parent(element) else {
            return Ok(());
        };
        let top_level = doc.is_element(route, "route")
            && doc
                .parent(route)
                .is_some_and(|context| doc.is_element(context, "camelContext"));
        if !top_level {
            debug!(
                policy = ctx.policy,
                endpoint = %ctx.endpoint.name,
                "Consumer is not inside a top-level route; skipping"
            );
            return Ok(());
        }
        if doc.element_children(route).next() != Some(element) {
            debug!(
                policy = ctx.policy,
                endpoint = %ctx.endpoint.name,
                "Consumer is not the first action of its route; skipping"
            );
            return Ok(());
        }

        let max_retry = self
            .ty
            .positive_property(ctx.endpoint, ctx.characteristic, "maxRetry")?;

        let (contained, next) = partition_trailing_actions(doc, ctx.snapshot, route, element);
        let template = if next.is_empty() {
            &self.consumer_only
        } else {
            &self.consumer_producer
        };

        let children: Vec<NodeId> = template.children(template.root()).to_vec();
        let mut spliced = Vec::with_capacity(children.len());
        for child in children {
            let copy = doc.import(template, child);
            doc.append_child(route, copy);
            spliced.push(copy);
        }

        fill_slot(doc, &spliced, ACTIONS_SLOT, &contained);
        fill_slot(doc, &spliced, NEXT_SLOT, &next);

        if let Some(slot) = find_in(doc, &spliced, MAX_RETRY_SLOT) {
            let value = constant(doc, &max_retry.to_string());
            doc.replace(slot, value);
        }
        if let Some(slot) = find_in(doc, &spliced, RETRY_SLOT) {
            let retry = doc.create_element(Marker::OneWayProducer.tag_name());
            let physical = doc
                .attribute(element, uri::URI_ATTRIBUTE)
                .unwrap_or_default()
                .to_string();
            doc.set_attribute(retry, uri::URI_ATTRIBUTE, physical);
            doc.replace(slot, retry);
        }

        ensure_bean(doc, AGGREGATOR_BEAN, AGGREGATOR_CLASS);
        ensure_bean(doc, RETRY_BEAN, RETRY_CLASS);
        Ok(())
    }
}

impl CharacteristicProcessor for BatchWithRetryOnFailure {
    fn characteristic_type(&self) -> &CharacteristicType {
        &self.ty
    }

    fn process(&self, ctx: &ProcessContext<'_>, doc: &mut Document, element: NodeId) -> Result<()> {
        match doc.name(element).and_then(Marker::from_tag_name) {
            Some(Marker::OneWayProducer) => self.process_producer(ctx, doc, element),
            Some(Marker::Consumer) => self.process_consumer(ctx, doc, element),
            _ => {
                debug!(
                    policy = ctx.policy,
                    endpoint = %ctx.endpoint.name,
                    "Batching applies to one-way producers and consumers only"
                );
                Ok(())
            }
        }
    }

    fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }
}

fn constant(doc: &mut Document, value: &str) -> NodeId {
    let constant = doc.create_element("constant");
    let text = doc.create_text(value);
    doc.append_child(constant, text);
    constant
}

/// Splits the actions after `element` in `route` into the contained body and
/// the chained next actions.
///
/// Next actions are the longest run of trailing one-way producers whose
/// logical URIs name endpoints that also batch. Every other action, in
/// order, is contained.
fn partition_trailing_actions(
    doc: &Document,
    snapshot: &PolicyGroupSnapshot,
    route: NodeId,
    element: NodeId,
) -> (Vec<NodeId>, Vec<NodeId>) {
    let siblings = doc.children(route);
    let start = siblings
        .iter()
        .position(|&n| n == element)
        .map_or(siblings.len(), |i| i + 1);
    let trailing = &siblings[start..];

    let chained = trailing
        .iter()
        .rev()
        .take_while(|&&n| {
            doc.is_element(n, Marker::OneWayProducer.tag_name())
                && doc
                    .attribute(n, uri::URI_ATTRIBUTE)
                    .and_then(uri::endpoint_name)
                    .and_then(|name| snapshot.endpoint(name))
                    .is_some_and(|ep| ep.has_characteristic(TYPE_NAME))
        })
        .count();

    let split = trailing.len() - chained;
    (trailing[..split].to_vec(), trailing[split..].to_vec())
}

fn find_in(doc: &Document, roots: &[NodeId], name: &str) -> Option<NodeId> {
    roots.iter().find_map(|&r| {
        if doc.is_element(r, name) {
            Some(r)
        } else {
            doc.find_descendant(r, name)
        }
    })
}

fn fill_slot(doc: &mut Document, roots: &[NodeId], slot: &str, nodes: &[NodeId]) {
    if let Some(target) = find_in(doc, roots, slot) {
        doc.replace_with_many(target, nodes);
    }
}
