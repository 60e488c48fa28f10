//! Abstraction over the remote controller's REST surface.
//!
//! Components depend on [`Controller`] rather than on HTTP directly so test
//! doubles can stand in for the real client. [`crate::http::HttpController`]
//! is the production implementation.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Domain, Inputs, Instance};

/// Future returned by controller operations.
pub type ControllerFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ControllerError>> + Send + 'a>>;

/// Transport-level failures talking to the controller.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ControllerError {
    /// The controller rejected the credential (HTTP 401).
    #[error("authentication failed: check the access token")]
    Unauthorized,
    /// The requested resource does not exist (HTTP 404).
    #[error("{path} not found")]
    NotFound {
        /// Request path that returned 404.
        path: String,
    },
    /// Any other non-success status.
    #[error("{path} returned status {status}: {body}")]
    Status {
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The request did not complete within the configured timeout.
    #[error("request to {path} timed out: {message}")]
    Timeout {
        /// Request path.
        path: String,
        /// Client error message.
        message: String,
    },
    /// The connection could not be established (refused, DNS, TLS).
    #[error("could not connect to the controller: {message}")]
    Connect {
        /// Client error message.
        message: String,
    },
    /// The response body was not what the caller expected.
    #[error("unexpected response from {path}: {message}")]
    Decode {
        /// Request path.
        path: String,
        /// Decoder error message.
        message: String,
    },
    /// Any other request failure.
    #[error("request to {path} failed: {message}")]
    Request {
        /// Request path.
        path: String,
        /// Client error message.
        message: String,
    },
    /// The HTTP client could not be configured.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl ControllerError {
    /// Returns `true` for failures that never reached the controller.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connect { .. })
    }
}

/// Body of `GET /api/`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct ApiStatus {
    /// Status message, typically `API running.`.
    #[serde(default)]
    pub message: Option<String>,
    /// Controller version, when reported.
    #[serde(default)]
    pub version: Option<String>,
}

/// Instance as returned by the list and get endpoints.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct InstanceRecord {
    /// Controller-assigned identifier.
    pub id: String,
    /// Display name; automations report it as `alias`.
    #[serde(default, alias = "alias")]
    pub name: String,
    /// Bound inputs.
    #[serde(default)]
    pub input: Option<Inputs>,
    /// Blueprint the instance was created from.
    #[serde(default)]
    pub use_blueprint: Option<BlueprintReference>,
}

/// `use_blueprint` block of an instance.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BlueprintReference {
    /// Blueprint path on the controller.
    pub path: String,
    /// Inputs bound through the blueprint.
    #[serde(default)]
    pub input: Option<Inputs>,
}

impl InstanceRecord {
    /// Converts the wire record into an [`Instance`] of `domain`.
    ///
    /// Top-level `input` takes precedence over the blueprint block's inputs.
    #[must_use]
    pub fn into_instance(self, domain: Domain) -> Instance {
        let (source_reference, blueprint_inputs) = self
            .use_blueprint
            .map_or((None, None), |reference| (Some(reference.path), reference.input));
        Instance {
            id: self.id,
            name: self.name,
            domain,
            current_inputs: self.input.or(blueprint_inputs).unwrap_or_default(),
            source_reference,
        }
    }
}

/// Body of `POST /api/services/{service}/import_blueprint`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstallRequest {
    /// Canonical source location of the template.
    pub url: String,
}

/// Body of `POST /api/services/{service}/reload` when applying inputs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpdateRequest {
    /// Instance being updated.
    pub automation_id: String,
    /// Template identifier the instance follows.
    pub blueprint: String,
    /// Merged inputs to apply.
    pub input: Inputs,
}

/// Minimal interface the pipeline needs from the controller.
pub trait Controller {
    /// Liveness and version probe (`GET /api/`). Succeeds only for HTTP 200
    /// with a non-empty JSON object body.
    fn api_status(&self) -> ControllerFuture<'_, ApiStatus>;

    /// Lists live instances of `domain`.
    fn list_instances(&self, domain: Domain) -> ControllerFuture<'_, Vec<InstanceRecord>>;

    /// Fetches one instance's current state.
    fn get_instance<'a>(&'a self, domain: Domain, id: &'a str)
    -> ControllerFuture<'a, InstanceRecord>;

    /// Installs a template from its source location.
    fn import_blueprint<'a>(
        &'a self,
        domain: Domain,
        request: &'a InstallRequest,
    ) -> ControllerFuture<'a, ()>;

    /// Applies updated inputs to an existing instance.
    fn update_instance<'a>(
        &'a self,
        domain: Domain,
        request: &'a UpdateRequest,
    ) -> ControllerFuture<'a, ()>;
}
