//! Wire-format literals for route definitions.
//!
//! Route definitions reference endpoints indirectly through *logical* URIs
//! of the form `logical:<endpointName>[?ignored]`, placed on one of three
//! marker elements. The literals in this module are part of the wire format
//! and must not change.

use std::fmt;

/// Scheme prefix identifying a logical endpoint reference.
pub const LOGICAL_PREFIX: &str = "logical:";

/// Attribute carrying the endpoint URI on a marker element.
pub const URI_ATTRIBUTE: &str = "uri";

/// Returns the endpoint name referenced by a logical URI.
///
/// Anything after `?` is discarded. Returns `None` if the URI does not use the
/// logical scheme prefix.
///
/// # Examples
///
/// ```rust
/// use hodos_core::uri::endpoint_name;
///
/// assert_eq!(endpoint_name("logical:orders"), Some("orders"));
/// assert_eq!(endpoint_name("logical:orders?ignored=1"), Some("orders"));
/// assert_eq!(endpoint_name("jms:queue:orders"), None);
/// ```
#[must_use]
pub fn endpoint_name(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix(LOGICAL_PREFIX)?;
    Some(rest.split_once('?').map_or(rest, |(name, _)| name))
}

/// Returns true if the URI is a logical endpoint reference.
#[must_use]
pub fn is_logical(uri: &str) -> bool {
    uri.starts_with(LOGICAL_PREFIX)
}

/// Returns the component prefix of a physical URI (the scheme before the first `:`).
///
/// A URI without a `:` is its own component name.
///
/// # Examples
///
/// ```rust
/// use hodos_core::uri::component_prefix;
///
/// assert_eq!(component_prefix("activemq:queue:test"), "activemq");
/// assert_eq!(component_prefix("direct"), "direct");
/// ```
#[must_use]
pub fn component_prefix(uri: &str) -> &str {
    uri.split_once(':').map_or(uri, |(component, _)| component)
}

/// The option role an endpoint reference plays in a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The route consumes from the endpoint; consumer options apply.
    Consumer,
    /// The route produces to the endpoint; producer options apply.
    Producer,
}

impl Role {
    /// Returns a string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Producer => "producer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route-definition element that references an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// `from`: consumes messages.
    Consumer,
    /// `to`: produces messages, possibly request/reply.
    Producer,
    /// `inOnly`: produces messages without awaiting a reply.
    OneWayProducer,
}

impl Marker {
    /// All markers, in the order the generator resolves them.
    pub const ALL: [Self; 3] = [Self::Consumer, Self::Producer, Self::OneWayProducer];

    /// Returns the element tag name used on the wire.
    #[must_use]
    pub const fn tag_name(&self) -> &'static str {
        match self {
            Self::Consumer => "from",
            Self::Producer => "to",
            Self::OneWayProducer => "inOnly",
        }
    }

    /// Classifies an element tag name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hodos_core::uri::{Marker, Role};
    ///
    /// assert_eq!(Marker::from_tag_name("inOnly"), Some(Marker::OneWayProducer));
    /// assert_eq!(Marker::from_tag_name("inOnly").map(|m| m.role()), Some(Role::Producer));
    /// assert_eq!(Marker::from_tag_name("log"), None);
    /// ```
    #[must_use]
    pub fn from_tag_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.tag_name() == name)
    }

    /// Returns the option role this marker selects.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Consumer => Role::Consumer,
            Self::Producer | Self::OneWayProducer => Role::Producer,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}
