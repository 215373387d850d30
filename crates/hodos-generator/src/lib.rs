//! # Hodos Generator
//!
//! Compiles logical route definitions into deployable routing configuration.
//!
//! This crate provides:
//!
//! - [`tree`] - a mutable route-definition tree with stable serialization
//! - [`endpoint`] - logical endpoint resolution with ordered option merging
//! - [`characteristic`] - characteristic processors, including
//!   `BatchWithRetryOnFailure`
//! - [`dependency`] - the component dependency resolver chain
//! - [`Generator`] - the transformation engine tying them together
//!
//! ## Example
//!
//! ```rust
//! use hodos_core::{Characteristic, Endpoint, Policy, PolicyGroup, PolicyGroupSnapshot};
//! use hodos_generator::{Generator, GeneratorConfig};
//!
//! let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("activity").with_endpoint(
//!     Endpoint::new("q", "direct:out").with_characteristic(
//!         Characteristic::new("BatchWithRetryOnFailure")
//!             .with_property("batchSize", "111")
//!             .with_property("batchInterval", "2222"),
//!     ),
//! ));
//!
//! let generator = Generator::new(&GeneratorConfig::builder().without_probe().build())?;
//! let generated = generator.generate(
//!     &snapshot,
//!     &Policy::new("ActivityServer"),
//!     r#"<camelContext><route><from uri="direct:in"/><inOnly uri="logical:q"/></route></camelContext>"#,
//! )?;
//!
//! assert!(generated.definition.contains(r#"completionSize="111""#));
//! # Ok::<(), hodos_generator::GeneratorError>(())
//! ```

pub mod characteristic;
pub mod config;
pub mod dependency;
pub mod endpoint;
pub mod error;
pub mod generator;
pub mod tree;

pub use characteristic::{
    BatchWithRetryOnFailure, CharacteristicProcessor, CharacteristicRegistry, CharacteristicType,
    PropertyDescriptor,
};
pub use config::GeneratorConfig;
pub use dependency::{DependencyResolver, DependencyResolverChain};
pub use error::{GeneratorError, Result};
pub use generator::{GeneratedPolicy, Generator};
