//! A reconciliation engine for hierarchical multi-account cloud
//! organizations: it loads a declared configuration, discovers the actual
//! state of an organization through a [`provider::ProviderClient`], computes
//! an ordered [`differ::Plan`] between the two, and, on request, drives a
//! [`driver::ConvergenceDriver`] to converge the provider toward the
//! declaration.
//!
//! The core subsystems — [`model`], [`validator`], [`hierarchy`],
//! [`loader`], [`differ`], [`driver`] — share the [`model::Organization`]
//! aggregate and its invariants; everything else (CLI argument parsing,
//! concrete provider SDK bindings, YAML file I/O) is kept at the edges.

pub mod cancellation;
pub mod codec;
pub mod differ;
pub mod driver;
pub mod error;
pub mod hierarchy;
pub mod loader;
pub mod model;
pub mod provider;
pub mod validator;
pub mod value_objects;

pub use cancellation::CancellationToken;
pub use differ::Plan;
pub use driver::{ChangeReport, ConvergenceDriver};
pub use error::EngineError;
pub use model::Organization;
pub use provider::ProviderClient;
