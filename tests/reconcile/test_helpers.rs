//! Shared fixtures and helpers for reconcile BDD scenarios.
//!
//! Steps borrow the context and record into its shared cells. Clones share
//! the cells, so every step sees what earlier steps wrote.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use blueprint_sync::test_support::{ScriptedController, template_document, write_template_file};
use blueprint_sync::{ControllerConfig, Domain, PipelineError, PreconditionError, SyncReport};
use camino::Utf8PathBuf;
use rstest::fixture;
use serde_json::json;
use tempfile::TempDir;

pub const CONTROLLER_URL: &str = "http://ha.test:8123";

#[derive(Clone, Debug)]
pub enum SyncOutcome {
    Success(SyncReport),
    MissingToken,
    UnreadableRoot,
    Failure(String),
}

impl From<Result<SyncReport, PipelineError>> for SyncOutcome {
    fn from(result: Result<SyncReport, PipelineError>) -> Self {
        match result {
            Ok(report) => Self::Success(report),
            Err(PipelineError::Precondition(PreconditionError::MissingToken(_))) => {
                Self::MissingToken
            }
            Err(PipelineError::Precondition(PreconditionError::TemplateRoot(_))) => {
                Self::UnreadableRoot
            }
            Err(err) => Self::Failure(err.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReconcileContext {
    pub workspace: Arc<TempDir>,
    pub blueprints: Rc<RefCell<Utf8PathBuf>>,
    pub controller: ScriptedController,
    pub token: Rc<RefCell<Option<String>>>,
    pub connected: Rc<Cell<Option<bool>>>,
    pub outcome: Rc<RefCell<Option<SyncOutcome>>>,
}

impl ReconcileContext {
    pub fn config(&self) -> ControllerConfig {
        let mut config =
            ControllerConfig::for_controller(CONTROLLER_URL, self.token.borrow().clone());
        config.blueprints_dir = self.blueprints.borrow().to_string();
        config
    }

    pub fn write_automation(&self, file_name: &str, name: &str, brightness: i64, color: &str) {
        let document = template_document(
            name,
            "",
            &json!({"brightness": brightness, "color": color}),
        );
        write_template_file(
            &self.blueprints.borrow(),
            Domain::Automations,
            file_name,
            &document,
        )
        .unwrap_or_else(|err| panic!("template {file_name} should be written: {err}"));
    }

    pub fn record(&self, outcome: SyncOutcome) {
        self.outcome.replace(Some(outcome));
    }

    /// Runs `check` against the finished report, or fails when the sync did
    /// not finish.
    pub fn with_report(
        &self,
        check: impl FnOnce(&SyncReport) -> Result<(), String>,
    ) -> Result<(), String> {
        match self.outcome.borrow().as_ref() {
            Some(SyncOutcome::Success(report)) => check(report),
            Some(SyncOutcome::MissingToken) => {
                Err(String::from("expected a finished sync, got a missing token"))
            }
            Some(SyncOutcome::UnreadableRoot) => Err(String::from(
                "expected a finished sync, got an unreadable template directory",
            )),
            Some(SyncOutcome::Failure(message)) => {
                Err(format!("expected a finished sync, got: {message}"))
            }
            None => Err(String::from("sync has not run")),
        }
    }
}

#[fixture]
pub fn reconcile_context() -> ReconcileContext {
    let workspace = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let blueprints = Utf8PathBuf::from_path_buf(workspace.path().join("blueprints"))
        .unwrap_or_else(|path| panic!("utf8 path: {}", path.display()));
    ReconcileContext {
        workspace: Arc::new(workspace),
        blueprints: Rc::new(RefCell::new(blueprints)),
        controller: ScriptedController::new(),
        token: Rc::new(RefCell::new(None)),
        connected: Rc::new(Cell::new(None)),
        outcome: Rc::new(RefCell::new(None)),
    }
}
