//! # Hodos Core
//!
//! Core model types for the Hodos integration policy compiler.
//!
//! This crate provides the data structures shared by the generator, the build
//! orchestrator and the CLI:
//!
//! - [`PolicyGroupSnapshot`] - the immutable compile input for one tag
//! - [`Endpoint`] and [`Characteristic`] - named physical destinations and
//!   the behavioral patterns attached to them
//! - [`Policy`] and [`Resource`] - units of integration behavior
//! - [`Dependency`] - package coordinates required by generated output
//! - [`Tag`] and [`BuildStatus`] - tag records and the build state machine
//! - [`uri`] - logical-URI and marker wire literals
//!
//! ## Example
//!
//! ```rust
//! use hodos_core::{Characteristic, Endpoint, Policy, PolicyGroup, PolicyGroupSnapshot};
//!
//! let group = PolicyGroup::new("activity").with_endpoint(
//!     Endpoint::new("q", "direct:out").with_characteristic(
//!         Characteristic::new("BatchWithRetryOnFailure").with_property("batchSize", "111"),
//!     ),
//! );
//!
//! let snapshot = PolicyGroupSnapshot::new(group).with_policy(
//!     Policy::new("ActivityServer"),
//!     r#"<camelContext><route><from uri="direct:in"/><inOnly uri="logical:q"/></route></camelContext>"#,
//! );
//!
//! assert!(snapshot.check_consistency().is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dependency;
pub mod endpoint;
pub mod error;
pub mod policy;
pub mod snapshot;
pub mod tag;
pub mod uri;
pub mod validation;

#[cfg(test)]
mod proptest_tests;

pub use dependency::{Dependency, DependencySet};
pub use endpoint::{Characteristic, Endpoint};
pub use error::{Error, Result};
pub use policy::{Policy, Resource};
pub use snapshot::{PolicyGroup, PolicyGroupSnapshot, MASTER_TAG};
pub use tag::{BuildStatus, Issue, Severity, Tag, TagKey};
pub use uri::{Marker, Role};
pub use validation::{Validate, ValidationError, ValidationErrors};
