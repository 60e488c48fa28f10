//! End-to-end flows: connectivity check, install links, and sync.
//!
//! Only [`PipelineError`] escapes these flows. Unreadable templates, failed
//! listings and failed writes are collected into the reports instead.

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ControllerConfig};
use crate::controller::Controller;
use crate::domain::{Domain, Instance, Template};
use crate::links::{LinkGenerator, LinkKind, LinkTarget};
use crate::matcher::match_templates;
use crate::probe::{ConnectivityProbe, ProbeOutcome};
use crate::reconciler::{Reconciler, RunResult};
use crate::registry::{InstanceRegistry, RegistryError};
use crate::template_store::{
    TemplateCatalog, TemplateParseError, TemplateStore, TemplateStoreError,
};

/// Conditions that must hold before any remote work starts.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// No access token is configured.
    #[error(transparent)]
    MissingToken(ConfigError),
    /// The configuration is unusable.
    #[error(transparent)]
    InvalidConfig(ConfigError),
    /// The template root cannot be read.
    #[error(transparent)]
    TemplateRoot(#[from] TemplateStoreError),
}

/// Failures that abort a flow.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A precondition does not hold.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// The controller is unreachable or rejected the token.
    #[error("connectivity check failed: {0}")]
    Connectivity(ProbeOutcome),
}

/// Install link for one template.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateLink {
    /// Template the link installs.
    pub template: Template,
    /// Deep link into the controller's import dialog.
    pub url: String,
}

/// Output of [`Pipeline::links`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinksReport {
    /// One link per marked template, in enumeration order.
    pub links: Vec<TemplateLink>,
    /// Template files that failed to parse.
    pub skipped: Vec<TemplateParseError>,
}

/// Output of [`Pipeline::sync`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncReport {
    /// Number of marked templates considered.
    pub templates: usize,
    /// Template files that failed to parse.
    pub skipped: Vec<TemplateParseError>,
    /// Listings that failed and were treated as empty.
    pub listing_failures: Vec<RegistryError>,
    /// Templates that lost a key tie and were not reconciled.
    pub unmatched: Vec<Template>,
    /// Marked instances with no template.
    pub orphaned: Vec<Instance>,
    /// Reconcile totals and per-item outcomes.
    pub result: RunResult,
}

/// Wires the components together for one process.
///
/// The connectivity probe and the reconciler's install history live as
/// long as the pipeline, so repeated flows share them.
#[derive(Debug)]
pub struct Pipeline<'a, C: Controller> {
    config: &'a ControllerConfig,
    controller: &'a C,
    probe: ConnectivityProbe<'a, C>,
    store: TemplateStore,
    links: LinkGenerator,
    reconciler: Reconciler<'a, C>,
}

impl<'a, C: Controller> Pipeline<'a, C> {
    /// Validates `config` and builds the components.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::InvalidConfig`] when validation fails.
    pub fn new(config: &'a ControllerConfig, controller: &'a C) -> Result<Self, PreconditionError> {
        config.validate().map_err(PreconditionError::InvalidConfig)?;
        let links = LinkGenerator::from_config(config);
        Ok(Self {
            config,
            controller,
            probe: ConnectivityProbe::new(controller, config),
            store: TemplateStore::new(config.blueprints_root(), config.deployment_marker()),
            reconciler: Reconciler::new(controller, links.clone()),
            links,
        })
    }

    /// Connectivity probe shared by every flow of this pipeline.
    #[must_use]
    pub const fn probe(&self) -> &ConnectivityProbe<'a, C> {
        &self.probe
    }

    /// Runs the connectivity check.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Precondition`] when no token is configured
    /// and [`PipelineError::Connectivity`] when the probe fails.
    pub async fn check(&self) -> Result<ProbeOutcome, PipelineError> {
        self.require_token()?;
        self.require_connection().await
    }

    /// Builds install links for the marked templates of `domains`.
    ///
    /// With `offline` set the connectivity check is skipped and no token is
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when a precondition or, unless `offline`,
    /// the connectivity check fails.
    pub async fn links(&self, domains: &[Domain], offline: bool) -> Result<LinksReport, PipelineError> {
        if !offline {
            self.require_token()?;
        }
        self.require_template_root()?;
        if !offline {
            self.require_connection().await?;
        }
        let catalog = self.load_templates(domains)?;
        let links = catalog
            .templates
            .into_iter()
            .map(|template| {
                let url = self
                    .links
                    .build_link(LinkKind::Install, &LinkTarget::template(&template));
                TemplateLink { template, url }
            })
            .collect();
        Ok(LinksReport {
            links,
            skipped: catalog.skipped,
        })
    }

    /// Edit link for a live instance.
    #[must_use]
    pub fn edit_link(&self, instance: &Instance) -> String {
        self.links
            .build_link(LinkKind::Edit, &LinkTarget::instance(instance))
    }

    /// Discovers, matches and reconciles the marked templates of `domains`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the token is missing, the template root
    /// is unreadable or the probe fails, checked in that order. Per-item
    /// failures are reported in [`SyncReport::result`].
    pub async fn sync(&mut self, domains: &[Domain]) -> Result<SyncReport, PipelineError> {
        self.require_token()?;
        self.require_template_root()?;
        self.require_connection().await?;
        let catalog = self.load_templates(domains)?;

        let registry = InstanceRegistry::new(self.controller);
        let mut instances = Vec::new();
        let mut listing_failures = Vec::new();
        for &domain in domains {
            let listing = registry.list_instances_with_diagnostics(domain).await;
            instances.extend(listing.instances);
            listing_failures.extend(listing.failure);
        }

        let set = match_templates(
            &catalog.templates,
            &instances,
            &self.config.deployment_marker(),
        );
        let result = self.reconciler.reconcile(&set.matches).await;
        info!(
            attempted = result.attempted,
            succeeded = result.succeeded,
            failed = result.failed,
            "sync finished"
        );

        Ok(SyncReport {
            templates: catalog.len(),
            skipped: catalog.skipped,
            listing_failures,
            unmatched: set.unmatched,
            orphaned: set.orphaned,
            result,
        })
    }

    fn require_token(&self) -> Result<(), PreconditionError> {
        self.config
            .require_token()
            .map(drop)
            .map_err(PreconditionError::MissingToken)
    }

    fn require_template_root(&self) -> Result<(), PreconditionError> {
        Ok(self.store.check_root()?)
    }

    async fn require_connection(&self) -> Result<ProbeOutcome, PipelineError> {
        let outcome = self.probe.outcome().await;
        if outcome.is_connected() {
            Ok(outcome.clone())
        } else {
            Err(PipelineError::Connectivity(outcome.clone()))
        }
    }

    fn load_templates(&self, domains: &[Domain]) -> Result<TemplateCatalog, PreconditionError> {
        Ok(self.store.load_templates(domains)?)
    }
}
