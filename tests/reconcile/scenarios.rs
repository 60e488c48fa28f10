//! BDD scenarios for the reconcile pipeline.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ReconcileContext, reconcile_context};

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Existing instance keeps its customised inputs"
)]
fn scenario_update_keeps_inputs(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Template without an instance is installed from its source"
)]
fn scenario_install_missing_instance(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Repeating a sync does not install the template again"
)]
fn scenario_repeat_sync_is_idempotent(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Missing token stops the run before any work"
)]
fn scenario_missing_token(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Ambiguous template names bind to the first template"
)]
fn scenario_ambiguous_names(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "A failing update does not stop the other items"
)]
fn scenario_failure_isolation(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Unreadable template directory stops the run before any request"
)]
fn scenario_unreadable_root(reconcile_context: ReconcileContext) {
    let _ = reconcile_context;
}
