//! BDD step definitions for reconcile behaviour.

use blueprint_sync::controller::UpdateRequest;
use blueprint_sync::{ConnectivityProbe, ControllerError, Domain, Pipeline};
use camino::Utf8PathBuf;
use rstest_bdd_macros::{given, then, when};
use serde_json::{Value, json};
use tokio::runtime::Runtime;

use super::test_helpers::{ReconcileContext, SyncOutcome};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

fn update_for(
    reconcile_context: &ReconcileContext,
    instance_id: &str,
) -> Result<UpdateRequest, StepError> {
    let updates = reconcile_context.controller.updates();
    updates
        .iter()
        .find(|update| update.automation_id == instance_id)
        .cloned()
        .ok_or_else(|| {
            StepError::Assertion(format!("no update for {instance_id}, got {updates:?}"))
        })
}

#[given("a controller token is configured")]
fn token_configured(reconcile_context: &ReconcileContext) {
    reconcile_context
        .token
        .replace(Some(String::from("test-token")));
}

#[given("no controller token is configured")]
fn token_missing(reconcile_context: &ReconcileContext) {
    reconcile_context.token.replace(None);
}

#[given("the template directory does not exist")]
fn template_directory_missing(reconcile_context: &ReconcileContext) {
    let missing = reconcile_context.workspace.path().join("missing");
    let path = Utf8PathBuf::from_path_buf(missing)
        .unwrap_or_else(|path| panic!("utf8 path: {}", path.display()));
    reconcile_context.blueprints.replace(path);
}

#[given(
    "the automation template \"{file}\" named \"{name}\" declares brightness {brightness} and color \"{color}\""
)]
fn automation_template(
    reconcile_context: &ReconcileContext,
    file: String,
    name: String,
    brightness: i64,
    color: String,
) {
    reconcile_context.write_automation(&file, &name, brightness, &color);
}

#[given("a live automation \"{id}\" named \"{name}\" has brightness {brightness}")]
fn live_automation(reconcile_context: &ReconcileContext, id: String, name: String, brightness: i64) {
    reconcile_context.controller.add_instance(
        Domain::Automations,
        &id,
        &name,
        json!({"brightness": brightness}),
    );
}

#[given("updates to \"{id}\" are rejected by the controller")]
fn updates_rejected(reconcile_context: &ReconcileContext, id: String) {
    reconcile_context.controller.fail_update(
        &id,
        ControllerError::Status {
            path: String::from("/api/services/automation/reload"),
            status: 500,
            body: String::from("boom"),
        },
    );
}

#[when("I check connectivity")]
fn check_connectivity(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let config = reconcile_context.config();
    let probe = ConnectivityProbe::new(&reconcile_context.controller, &config);
    let connected = runtime()?.block_on(probe.check_connection());
    reconcile_context.connected.set(Some(connected));
    Ok(())
}

#[when("I run the sync")]
fn run_sync(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let config = reconcile_context.config();
    let mut pipeline = Pipeline::new(&config, &reconcile_context.controller)
        .map_err(|err| StepError::Assertion(format!("pipeline should build: {err}")))?;
    let result = runtime()?.block_on(pipeline.sync(&[Domain::Automations]));
    reconcile_context.record(SyncOutcome::from(result));
    Ok(())
}

#[when("I run the sync twice")]
fn run_sync_twice(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let config = reconcile_context.config();
    let mut pipeline = Pipeline::new(&config, &reconcile_context.controller)
        .map_err(|err| StepError::Assertion(format!("pipeline should build: {err}")))?;
    let rt = runtime()?;
    rt.block_on(pipeline.sync(&[Domain::Automations]))
        .map_err(|err| StepError::Assertion(format!("first sync should finish: {err}")))?;
    let result = rt.block_on(pipeline.sync(&[Domain::Automations]));
    reconcile_context.record(SyncOutcome::from(result));
    Ok(())
}

#[then("the update for \"{id}\" carries brightness {brightness} and color \"{color}\"")]
fn update_carries_inputs(
    reconcile_context: &ReconcileContext,
    id: String,
    brightness: i64,
    color: String,
) -> Result<(), StepError> {
    let update = update_for(reconcile_context, &id)?;
    let expected = json!({"brightness": brightness, "color": color});
    if Value::Object(update.input.clone()) == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected inputs {expected}, got {:?}",
            update.input
        )))
    }
}

#[then("the update for \"{id}\" follows \"{identifier}\"")]
fn update_follows_template(
    reconcile_context: &ReconcileContext,
    id: String,
    identifier: String,
) -> Result<(), StepError> {
    let update = update_for(reconcile_context, &id)?;
    if update.blueprint == identifier {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {id} to follow {identifier}, got {}",
            update.blueprint
        )))
    }
}

#[then("one install is issued for \"{identifier}\"")]
fn one_install_issued(
    reconcile_context: &ReconcileContext,
    identifier: String,
) -> Result<(), StepError> {
    let installs = reconcile_context.controller.installs();
    match installs.as_slice() {
        [install] if install.url.ends_with(&format!("/{identifier}")) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected one install of {identifier}, got {other:?}"
        ))),
    }
}

#[then("the run reports {attempted} attempted, {succeeded} succeeded and {failed} failed")]
fn run_totals(
    reconcile_context: &ReconcileContext,
    attempted: usize,
    succeeded: usize,
    failed: usize,
) -> Result<(), StepError> {
    reconcile_context
        .with_report(|report| {
            let result = &report.result;
            if (result.attempted, result.succeeded, result.failed)
                == (attempted, succeeded, failed)
            {
                Ok(())
            } else {
                Err(format!(
                    "expected {attempted}/{succeeded}/{failed}, got {}/{}/{}",
                    result.attempted, result.succeeded, result.failed
                ))
            }
        })
        .map_err(StepError::Assertion)
}

#[then("\"{identifier}\" is reported as unmatched")]
fn reported_unmatched(
    reconcile_context: &ReconcileContext,
    identifier: String,
) -> Result<(), StepError> {
    reconcile_context
        .with_report(|report| {
            if report
                .unmatched
                .iter()
                .any(|template| template.identifier == identifier)
            {
                Ok(())
            } else {
                Err(format!(
                    "expected {identifier} to be unmatched, got {:?}",
                    report.unmatched
                ))
            }
        })
        .map_err(StepError::Assertion)
}

#[then("the connectivity check fails without contacting the controller")]
fn connectivity_fails_offline(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let connected = reconcile_context.connected.get();
    if connected != Some(false) {
        return Err(StepError::Assertion(format!(
            "expected a failed check, got {connected:?}"
        )));
    }
    no_calls_recorded(reconcile_context)
}

#[then("the controller received no requests")]
fn controller_untouched(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    no_calls_recorded(reconcile_context)
}

fn no_calls_recorded(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let calls = reconcile_context.controller.calls();
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no controller calls, got {calls:?}"
        )))
    }
}

#[then("the sync fails because the token is missing")]
fn sync_fails_for_token(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    match reconcile_context.outcome.borrow().as_ref() {
        Some(SyncOutcome::MissingToken) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a missing token failure, got {other:?}"
        ))),
    }
}

#[then("the sync fails because the template directory is unreadable")]
fn sync_fails_for_root(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    match reconcile_context.outcome.borrow().as_ref() {
        Some(SyncOutcome::UnreadableRoot) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected an unreadable template directory, got {other:?}"
        ))),
    }
}
