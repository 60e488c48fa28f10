//! Live instance discovery on the controller.

use thiserror::Error;
use tracing::{debug, warn};

use crate::controller::{Controller, ControllerError};
use crate::domain::{Domain, Instance};

/// Failures fetching instances.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// A listing or get call failed.
    #[error("failed to fetch {resource}: {source}")]
    RemoteFetch {
        /// What was being fetched, for example `automation list`.
        resource: String,
        /// Transport error.
        #[source]
        source: ControllerError,
    },
}

/// Listing outcome with the cause of a failed listing kept alongside.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceListing {
    /// Instances in the order the controller returned them.
    pub instances: Vec<Instance>,
    /// Why the listing failed, when it did. `instances` is empty then.
    pub failure: Option<RegistryError>,
}

/// Reads instances through a [`Controller`].
#[derive(Clone, Debug)]
pub struct InstanceRegistry<'a, C: Controller> {
    controller: &'a C,
}

impl<'a, C: Controller> InstanceRegistry<'a, C> {
    /// Creates a registry over `controller`.
    #[must_use]
    pub const fn new(controller: &'a C) -> Self {
        Self { controller }
    }

    /// Lists instances of `domain`, returning an empty sequence on failure.
    ///
    /// The cause of a failure is logged; use
    /// [`InstanceRegistry::list_instances_with_diagnostics`] to inspect it.
    pub async fn list_instances(&self, domain: Domain) -> Vec<Instance> {
        self.list_instances_with_diagnostics(domain).await.instances
    }

    /// Lists instances of `domain`, carrying any failure as a diagnostic.
    pub async fn list_instances_with_diagnostics(&self, domain: Domain) -> InstanceListing {
        match self.controller.list_instances(domain).await {
            Ok(records) => {
                let instances: Vec<Instance> = records
                    .into_iter()
                    .map(|record| record.into_instance(domain))
                    .collect();
                debug!(domain = %domain, count = instances.len(), "listed instances");
                InstanceListing {
                    instances,
                    failure: None,
                }
            }
            Err(source) => {
                let failure = RegistryError::RemoteFetch {
                    resource: format!("{} list", domain.service()),
                    source,
                };
                warn!(domain = %domain, error = %failure, "instance listing failed; treating as empty");
                InstanceListing {
                    instances: Vec::new(),
                    failure: Some(failure),
                }
            }
        }
    }

    /// Fetches the current state of one instance.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RemoteFetch`] when the instance does not
    /// exist or the call fails.
    pub async fn get_instance(&self, domain: Domain, id: &str) -> Result<Instance, RegistryError> {
        self.controller
            .get_instance(domain, id)
            .await
            .map(|record| record.into_instance(domain))
            .map_err(|source| RegistryError::RemoteFetch {
                resource: format!("{} {id}", domain.service()),
                source,
            })
    }
}
