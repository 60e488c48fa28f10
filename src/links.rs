//! Deep links for manual follow-up in the controller's web interface.

use crate::config::ControllerConfig;
use crate::domain::{Domain, Instance, Template};

/// What the link lets the user do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkKind {
    /// Import a template from its source location.
    Install,
    /// Open an existing instance in the editor.
    Edit,
}

/// Item a link points at.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkTarget {
    /// Domain of the item.
    pub domain: Domain,
    /// Template identifier (or absolute source URL) for installs, instance
    /// id for edits.
    pub reference: String,
}

impl LinkTarget {
    /// Targets a template.
    #[must_use]
    pub fn template(template: &Template) -> Self {
        Self {
            domain: template.domain,
            reference: template.identifier.clone(),
        }
    }

    /// Targets a live instance.
    #[must_use]
    pub fn instance(instance: &Instance) -> Self {
        Self {
            domain: instance.domain,
            reference: instance.id.clone(),
        }
    }
}

/// Builds controller deep links. Performs no I/O.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkGenerator {
    base_url: String,
    source_base: String,
}

impl LinkGenerator {
    /// Creates a generator for the given controller and source locations.
    #[must_use]
    pub fn new(base_url: &str, source_base: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            source_base: source_base.trim().trim_end_matches('/').to_owned(),
        }
    }

    /// Creates a generator from configuration.
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.base_url(), config.source_base())
    }

    /// Canonical source location of a template identifier. Absolute URLs
    /// are returned unchanged.
    #[must_use]
    pub fn source_location(&self, identifier: &str) -> String {
        if identifier.starts_with("http://") || identifier.starts_with("https://") {
            return identifier.to_owned();
        }
        format!("{}/{}", self.source_base, identifier.trim_start_matches('/'))
    }

    /// Builds the link of `kind` for `target`.
    ///
    /// ```
    /// use blueprint_sync::domain::Domain;
    /// use blueprint_sync::links::{LinkGenerator, LinkKind, LinkTarget};
    ///
    /// let links = LinkGenerator::new("http://ha.local:8123", "https://example.org/bp");
    /// let target = LinkTarget {
    ///     domain: Domain::Automations,
    ///     reference: String::from("automations/hallway.yaml"),
    /// };
    /// assert_eq!(
    ///     links.build_link(LinkKind::Install, &target),
    ///     "http://ha.local:8123/blueprint/import?url=https%3A%2F%2Fexample.org%2Fbp%2Fautomations%2Fhallway.yaml"
    /// );
    /// ```
    #[must_use]
    pub fn build_link(&self, kind: LinkKind, target: &LinkTarget) -> String {
        match kind {
            LinkKind::Install => format!(
                "{}/blueprint/import?url={}",
                self.base_url,
                urlencoding::encode(&self.source_location(&target.reference))
            ),
            LinkKind::Edit => format!(
                "{}/config/{}/edit/{}",
                self.base_url,
                target.domain.service(),
                urlencoding::encode(&target.reference)
            ),
        }
    }
}
