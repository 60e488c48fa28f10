//! Core library for the `blueprint-sync` tool.
//!
//! The crate discovers locally stored blueprint templates that carry a
//! deployment marker, pairs them with live instances on a Home Assistant
//! style controller by name, and installs or updates them one at a time,
//! recording a per-item outcome rather than failing the whole run.

pub mod config;
pub mod controller;
pub mod domain;
pub mod http;
pub mod links;
pub mod marker;
pub mod matcher;
pub mod pipeline;
pub mod probe;
pub mod reconciler;
pub mod registry;
pub mod template_store;
pub mod test_support;

pub use config::{ConfigError, ControllerConfig};
pub use controller::{Controller, ControllerError};
pub use domain::{Domain, Inputs, Instance, Template, merge_inputs};
pub use http::HttpController;
pub use links::{LinkGenerator, LinkKind, LinkTarget};
pub use marker::{DeploymentMarker, template_key};
pub use matcher::{Match, MatchSet, match_templates};
pub use pipeline::{LinksReport, Pipeline, PipelineError, PreconditionError, SyncReport};
pub use probe::{ConnectivityProbe, ProbeOutcome};
pub use reconciler::{ItemOutcome, ReconcileAction, ReconcileError, Reconciler, RunResult};
pub use registry::{InstanceListing, InstanceRegistry, RegistryError};
pub use template_store::{TemplateCatalog, TemplateParseError, TemplateStore, TemplateStoreError};
