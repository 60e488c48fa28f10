//! Drives matched instances toward their template's declared inputs.
//!
//! Matches are processed one at a time in the order given; no two writes
//! are ever in flight together. A failing item is recorded and the run moves
//! on to the next one.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::controller::{Controller, ControllerError, InstallRequest, UpdateRequest};
use crate::domain::merge_inputs;
use crate::links::LinkGenerator;
use crate::matcher::Match;
use crate::registry::{InstanceRegistry, RegistryError};

/// Operation applied to a match.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReconcileAction {
    /// Template imported from its source location.
    Install,
    /// Existing instance updated with merged inputs.
    Update,
    /// Install skipped because this reconciler already installed the source.
    AlreadyInstalled,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::AlreadyInstalled => "already installed",
        })
    }
}

/// Per-match progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchPhase {
    /// Not started.
    Pending,
    /// Reading the instance's current inputs.
    FetchingCurrent,
    /// Issuing the install or update call.
    Applying,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::FetchingCurrent => "fetching-current",
            Self::Applying => "applying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// Failure of a single match.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReconcileError {
    /// Reading the instance's current state failed.
    #[error(transparent)]
    RemoteFetch(#[from] RegistryError),
    /// The install or update call failed.
    #[error("{action} of {target} failed: {source}")]
    RemoteWrite {
        /// Operation that failed.
        action: ReconcileAction,
        /// Instance id or source location written to.
        target: String,
        /// Transport error.
        #[source]
        source: ControllerError,
    },
}

/// Outcome of one match.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemOutcome {
    /// Template identifier.
    pub template: String,
    /// Instance id; `None` for installs.
    pub instance_id: Option<String>,
    /// Display name of the instance, or of the template for installs.
    pub name: String,
    /// Operation attempted.
    pub action: ReconcileAction,
    /// Phase the item was in when it failed.
    pub failed_in: Option<MatchPhase>,
    /// Failure detail.
    pub error: Option<ReconcileError>,
}

impl ItemOutcome {
    /// Returns `true` when the item reached [`MatchPhase::Succeeded`].
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate outcome of a reconcile pass.
///
/// `attempted` is bumped before an item starts and `succeeded`/`failed`
/// once it finishes, so the counts stay coherent at any point in a run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunResult {
    /// Items started.
    pub attempted: usize,
    /// Items that succeeded.
    pub succeeded: usize,
    /// Items that failed.
    pub failed: usize,
    /// Per-item outcomes in processing order.
    pub outcomes: Vec<ItemOutcome>,
}

impl RunResult {
    /// Failed outcomes in processing order.
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.succeeded())
    }

    fn record(&mut self, outcome: ItemOutcome) {
        if outcome.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}

/// Applies installs and updates through a [`Controller`].
///
/// Remembers the source locations it installed, so repeating a pass over
/// the same install candidates issues no further install calls.
#[derive(Debug)]
pub struct Reconciler<'a, C: Controller> {
    controller: &'a C,
    links: LinkGenerator,
    installed: BTreeSet<String>,
}

impl<'a, C: Controller> Reconciler<'a, C> {
    /// Creates a reconciler with an empty install history.
    #[must_use]
    pub const fn new(controller: &'a C, links: LinkGenerator) -> Self {
        Self {
            controller,
            links,
            installed: BTreeSet::new(),
        }
    }

    /// Processes `matches` sequentially and returns the totals.
    pub async fn reconcile(&mut self, matches: &[Match]) -> RunResult {
        let mut result = RunResult::default();
        self.reconcile_into(matches, &mut result).await;
        result
    }

    /// Processes `matches` sequentially, accumulating into `result` as each
    /// item starts and finishes.
    pub async fn reconcile_into(&mut self, matches: &[Match], result: &mut RunResult) {
        for item in matches {
            result.attempted += 1;
            let outcome = self.reconcile_one(item).await;
            result.record(outcome);
        }
    }

    async fn reconcile_one(&mut self, item: &Match) -> ItemOutcome {
        let template = &item.template;
        trace_phase(&template.identifier, MatchPhase::Pending);
        let outcome = match &item.instance {
            None => self.install(item).await,
            Some(instance) => {
                let mut outcome = ItemOutcome {
                    template: template.identifier.clone(),
                    instance_id: Some(instance.id.clone()),
                    name: instance.name.clone(),
                    action: ReconcileAction::Update,
                    failed_in: None,
                    error: None,
                };
                if let Err((phase, err)) = self.update(item, &instance.id).await {
                    outcome.failed_in = Some(phase);
                    outcome.error = Some(err);
                }
                outcome
            }
        };

        if let Some(err) = &outcome.error {
            trace_phase(&template.identifier, MatchPhase::Failed);
            error!(
                template = %template.identifier,
                name = %outcome.name,
                action = %outcome.action,
                error = %err,
                "reconcile failed"
            );
        } else {
            trace_phase(&template.identifier, MatchPhase::Succeeded);
            info!(
                template = %template.identifier,
                name = %outcome.name,
                action = %outcome.action,
                "reconciled"
            );
        }
        outcome
    }

    async fn install(&mut self, item: &Match) -> ItemOutcome {
        let template = &item.template;
        let url = self.links.source_location(&template.identifier);
        let mut outcome = ItemOutcome {
            template: template.identifier.clone(),
            instance_id: None,
            name: template.display_name.clone(),
            action: ReconcileAction::Install,
            failed_in: None,
            error: None,
        };
        if self.installed.contains(&url) {
            outcome.action = ReconcileAction::AlreadyInstalled;
            return outcome;
        }

        trace_phase(&template.identifier, MatchPhase::Applying);
        let request = InstallRequest { url };
        let applied = self
            .controller
            .import_blueprint(template.domain, &request)
            .await;
        match applied {
            Ok(()) => {
                self.installed.insert(request.url);
            }
            Err(source) => {
                outcome.failed_in = Some(MatchPhase::Applying);
                outcome.error = Some(ReconcileError::RemoteWrite {
                    action: ReconcileAction::Install,
                    target: request.url,
                    source,
                });
            }
        }
        outcome
    }

    async fn update(&self, item: &Match, id: &str) -> Result<(), (MatchPhase, ReconcileError)> {
        let template = &item.template;
        trace_phase(&template.identifier, MatchPhase::FetchingCurrent);
        let current = InstanceRegistry::new(self.controller)
            .get_instance(template.domain, id)
            .await
            .map_err(|err| (MatchPhase::FetchingCurrent, ReconcileError::from(err)))?;

        trace_phase(&template.identifier, MatchPhase::Applying);
        let request = UpdateRequest {
            automation_id: id.to_owned(),
            blueprint: template.identifier.clone(),
            input: merge_inputs(&template.declared_inputs(), &current.current_inputs),
        };
        self.controller
            .update_instance(template.domain, &request)
            .await
            .map_err(|source| {
                (
                    MatchPhase::Applying,
                    ReconcileError::RemoteWrite {
                        action: ReconcileAction::Update,
                        target: id.to_owned(),
                        source,
                    },
                )
            })
    }
}

fn trace_phase(template: &str, phase: MatchPhase) {
    debug!(template, phase = %phase, "reconcile phase");
}
