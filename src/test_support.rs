//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::future;
use std::io;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde_json::{Value, json};
use tokio::sync::{Mutex, MutexGuard};

use crate::controller::{
    ApiStatus, Controller, ControllerError, ControllerFuture, InstallRequest, InstanceRecord,
    UpdateRequest,
};
use crate::domain::Domain;

/// A call received by [`ScriptedController`].
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerCall {
    /// `GET /api/`.
    ApiStatus,
    /// Listing of a domain.
    List(Domain),
    /// Fetch of one instance.
    Get {
        /// Domain requested.
        domain: Domain,
        /// Instance id requested.
        id: String,
    },
    /// Template install.
    Install {
        /// Domain requested.
        domain: Domain,
        /// Request body.
        request: InstallRequest,
    },
    /// Instance update.
    Update {
        /// Domain requested.
        domain: Domain,
        /// Request body.
        request: UpdateRequest,
    },
}

#[derive(Debug, Default)]
struct ScriptedState {
    status: Option<Result<ApiStatus, ControllerError>>,
    instances: BTreeMap<Domain, Vec<InstanceRecord>>,
    listing_failures: BTreeMap<Domain, ControllerError>,
    get_failures: BTreeMap<String, ControllerError>,
    install_failures: BTreeMap<String, ControllerError>,
    update_failures: BTreeMap<String, ControllerError>,
    calls: Vec<ControllerCall>,
}

/// In-memory controller with scripted instances and failures.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the code under test owns another. Every call is recorded in order.
#[derive(Clone, Debug, Default)]
pub struct ScriptedController {
    state: Arc<StdMutex<ScriptedState>>,
}

impl ScriptedController {
    /// Creates a controller with no instances that reports itself healthy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StdMutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a live instance. `inputs` should be a JSON object; anything
    /// else is stored as no inputs.
    pub fn add_instance(&self, domain: Domain, id: &str, name: &str, inputs: Value) {
        let record = InstanceRecord {
            id: id.to_owned(),
            name: name.to_owned(),
            input: inputs.as_object().cloned(),
            use_blueprint: None,
        };
        self.state().instances.entry(domain).or_default().push(record);
    }

    /// Scripts the response of the status probe.
    pub fn respond_to_status(&self, response: Result<ApiStatus, ControllerError>) {
        self.state().status = Some(response);
    }

    /// Makes listings of `domain` fail with `err`.
    pub fn fail_listing(&self, domain: Domain, err: ControllerError) {
        self.state().listing_failures.insert(domain, err);
    }

    /// Makes fetching instance `id` fail with `err`.
    pub fn fail_get(&self, id: &str, err: ControllerError) {
        self.state().get_failures.insert(id.to_owned(), err);
    }

    /// Makes installing from `url` fail with `err`.
    pub fn fail_install(&self, url: &str, err: ControllerError) {
        self.state().install_failures.insert(url.to_owned(), err);
    }

    /// Makes updating instance `id` fail with `err`.
    pub fn fail_update(&self, id: &str, err: ControllerError) {
        self.state().update_failures.insert(id.to_owned(), err);
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ControllerCall> {
        self.state().calls.clone()
    }

    /// Number of status probes received.
    #[must_use]
    pub fn api_status_calls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, ControllerCall::ApiStatus))
            .count()
    }

    /// Install requests received, in order.
    #[must_use]
    pub fn installs(&self) -> Vec<InstallRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ControllerCall::Install { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Update requests received, in order.
    #[must_use]
    pub fn updates(&self) -> Vec<UpdateRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ControllerCall::Update { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Current state of a stored instance.
    #[must_use]
    pub fn instance(&self, domain: Domain, id: &str) -> Option<InstanceRecord> {
        self.state()
            .instances
            .get(&domain)
            .and_then(|records| records.iter().find(|record| record.id == id))
            .cloned()
    }
}

impl Controller for ScriptedController {
    fn api_status(&self) -> ControllerFuture<'_, ApiStatus> {
        let mut state = self.state();
        state.calls.push(ControllerCall::ApiStatus);
        let response = state.status.clone().unwrap_or_else(|| {
            Ok(ApiStatus {
                message: Some(String::from("API running.")),
                version: Some(String::from("2024.6.0")),
            })
        });
        Box::pin(future::ready(response))
    }

    fn list_instances(&self, domain: Domain) -> ControllerFuture<'_, Vec<InstanceRecord>> {
        let mut state = self.state();
        state.calls.push(ControllerCall::List(domain));
        let response = state.listing_failures.get(&domain).map_or_else(
            || Ok(state.instances.get(&domain).cloned().unwrap_or_default()),
            |err| Err(err.clone()),
        );
        Box::pin(future::ready(response))
    }

    fn get_instance<'a>(
        &'a self,
        domain: Domain,
        id: &'a str,
    ) -> ControllerFuture<'a, InstanceRecord> {
        let mut state = self.state();
        state.calls.push(ControllerCall::Get {
            domain,
            id: id.to_owned(),
        });
        if let Some(err) = state.get_failures.get(id) {
            return Box::pin(future::ready(Err(err.clone())));
        }
        let response = state
            .instances
            .get(&domain)
            .and_then(|records| records.iter().find(|record| record.id == id))
            .cloned()
            .ok_or_else(|| ControllerError::NotFound {
                path: format!("/api/services/{}/get/{id}", domain.service()),
            });
        Box::pin(future::ready(response))
    }

    fn import_blueprint<'a>(
        &'a self,
        domain: Domain,
        request: &'a InstallRequest,
    ) -> ControllerFuture<'a, ()> {
        let mut state = self.state();
        state.calls.push(ControllerCall::Install {
            domain,
            request: request.clone(),
        });
        let response = state
            .install_failures
            .get(&request.url)
            .map_or(Ok(()), |err| Err(err.clone()));
        Box::pin(future::ready(response))
    }

    fn update_instance<'a>(
        &'a self,
        domain: Domain,
        request: &'a UpdateRequest,
    ) -> ControllerFuture<'a, ()> {
        let mut state = self.state();
        state.calls.push(ControllerCall::Update {
            domain,
            request: request.clone(),
        });
        if let Some(err) = state.update_failures.get(&request.automation_id).cloned() {
            return Box::pin(future::ready(Err(err)));
        }
        if let Some(record) = state.instances.get_mut(&domain).and_then(|records| {
            records
                .iter_mut()
                .find(|record| record.id == request.automation_id)
        }) {
            record.input = Some(request.input.clone());
        }
        Box::pin(future::ready(Ok(())))
    }
}

/// Renders a minimal template document. JSON is valid YAML, so the output
/// parses like any hand-written template file.
#[must_use]
pub fn template_document(name: &str, description: &str, inputs: &Value) -> String {
    json!({
        "blueprint": {
            "name": name,
            "description": description,
            "input": inputs,
        }
    })
    .to_string()
}

/// Writes `contents` to `{root}/{domain}/{file_name}`, creating directories
/// as needed.
///
/// # Errors
///
/// Returns the underlying I/O error when a directory or the file cannot be
/// written.
pub fn write_template_file(
    root: &Utf8Path,
    domain: Domain,
    file_name: &str,
    contents: &str,
) -> io::Result<()> {
    let domain_dir = root.join(domain.directory());
    Dir::create_ambient_dir_all(&domain_dir, ambient_authority())?;
    let dir = Dir::open_ambient_dir(&domain_dir, ambient_authority())?;
    dir.write(file_name, contents)
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    /// A `None` value removes the variable.
    pub async fn apply(changes: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                changes.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::apply"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(changes.len());
        for (key, value) in changes {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
