//! One-shot connectivity and credential check against the controller.
//!
//! The outcome is computed at most once per [`ConnectivityProbe`] and then
//! served from the cell. Construct a fresh probe to check again.

use std::fmt;

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::ControllerConfig;
use crate::controller::{Controller, ControllerError};

/// Classified result of the probe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeOutcome {
    /// The controller answered with a well-formed status body.
    Connected {
        /// Controller version, when reported.
        version: Option<String>,
    },
    /// No token is configured; no request was issued.
    MissingToken,
    /// The controller rejected the token.
    Unauthorized,
    /// The controller could not be reached (refused, timed out, TLS).
    Unreachable(String),
    /// The controller answered with something other than a status body.
    UnexpectedResponse(String),
}

impl ProbeOutcome {
    /// Returns `true` for [`ProbeOutcome::Connected`].
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    fn from_error(err: ControllerError) -> Self {
        match err {
            ControllerError::Unauthorized => Self::Unauthorized,
            network if network.is_network() => Self::Unreachable(network.to_string()),
            other => Self::UnexpectedResponse(other.to_string()),
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected {
                version: Some(version),
            } => write!(f, "connected (version {version})"),
            Self::Connected { version: None } => f.write_str("connected"),
            Self::MissingToken => f.write_str("access token is not configured (set HA_TOKEN)"),
            Self::Unauthorized => f.write_str("authentication failed: check the access token"),
            Self::Unreachable(message) => write!(f, "controller is unreachable: {message}"),
            Self::UnexpectedResponse(message) => {
                write!(f, "unexpected response from controller: {message}")
            }
        }
    }
}

/// Memoising connectivity check.
#[derive(Debug)]
pub struct ConnectivityProbe<'a, C: Controller> {
    controller: &'a C,
    config: &'a ControllerConfig,
    outcome: OnceCell<ProbeOutcome>,
}

impl<'a, C: Controller> ConnectivityProbe<'a, C> {
    /// Creates a probe that has not run yet.
    #[must_use]
    pub const fn new(controller: &'a C, config: &'a ControllerConfig) -> Self {
        Self {
            controller,
            config,
            outcome: OnceCell::const_new(),
        }
    }

    /// Returns `true` when the controller is reachable and accepts the token.
    pub async fn check_connection(&self) -> bool {
        self.outcome().await.is_connected()
    }

    /// Returns the classified outcome, probing on first use only.
    pub async fn outcome(&self) -> &ProbeOutcome {
        self.outcome.get_or_init(|| self.probe()).await
    }

    async fn probe(&self) -> ProbeOutcome {
        if !self.config.has_token() {
            error!("access token is not configured; set HA_TOKEN or add token to blueprint-sync.toml");
            return ProbeOutcome::MissingToken;
        }

        info!(
            url = %self.config.base_url(),
            verify_ssl = self.config.verify_ssl,
            timeout_secs = self.config.timeout,
            "checking controller connectivity"
        );
        let outcome = match self.controller.api_status().await {
            Ok(status) => ProbeOutcome::Connected {
                version: status.version,
            },
            Err(err) => ProbeOutcome::from_error(err),
        };

        match &outcome {
            ProbeOutcome::Connected { version } => info!(
                version = version.as_deref().unwrap_or("unknown"),
                "connected to controller"
            ),
            ProbeOutcome::Unauthorized => {
                error!("authentication failed: the controller rejected the access token");
            }
            ProbeOutcome::Unreachable(message) => error!(
                url = %self.config.base_url(),
                error = %message,
                "controller is unreachable"
            ),
            ProbeOutcome::UnexpectedResponse(message) => {
                error!(error = %message, "unexpected response from controller");
            }
            ProbeOutcome::MissingToken => {}
        }
        outcome
    }
}
