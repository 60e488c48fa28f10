//! Snapshot types shared by the discovery, matching, and reconcile stages.
//!
//! [`Template`] and [`Instance`] are read-only values fetched once per run;
//! nothing here talks to the filesystem or the controller.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

/// Input parameters keyed by name, as declared by a template or bound on an
/// instance.
pub type Inputs = Map<String, Value>;

/// Category of deployable item.
///
/// Each domain has two spellings: the directory holding its templates and
/// the service domain used by the controller's REST paths.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Domain {
    /// Automation blueprints.
    Automations,
    /// Script blueprints.
    Scripts,
    /// Scene definitions.
    Scenes,
    /// Dashboard definitions.
    Dashboards,
}

impl Domain {
    /// Every domain in enumeration order.
    pub const ALL: [Self; 4] = [
        Self::Automations,
        Self::Scripts,
        Self::Scenes,
        Self::Dashboards,
    ];

    /// Directory name under the template root.
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Self::Automations => "automations",
            Self::Scripts => "scripts",
            Self::Scenes => "scenes",
            Self::Dashboards => "dashboards",
        }
    }

    /// Service domain used in `/api/services/{service}/...` paths.
    #[must_use]
    pub const fn service(self) -> &'static str {
        match self {
            Self::Automations => "automation",
            Self::Scripts => "script",
            Self::Scenes => "scene",
            Self::Dashboards => "dashboard",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory())
    }
}

/// Raised when a string does not name a known domain.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown domain '{0}': expected automations, scripts, scenes, or dashboards")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|domain| domain.directory() == trimmed || domain.service() == trimmed)
            .ok_or_else(|| UnknownDomain(trimmed.to_owned()))
    }
}

/// A deployment-ready definition read from local storage.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    /// Path relative to the template root, for example
    /// `automations/hallway_light.yaml`.
    pub identifier: String,
    /// Human-readable name carrying the deployment marker.
    pub display_name: String,
    /// Free text description.
    pub description: String,
    /// Category the template belongs to.
    pub domain: Domain,
    /// Declared parameters, passed through unmodified.
    pub input_schema: Inputs,
}

impl Template {
    /// Resolves the value each declared parameter contributes to a write.
    ///
    /// A selector-style entry contributes its `default`; a selector-style
    /// entry without a default contributes nothing; any other entry is taken
    /// as the value itself.
    #[must_use]
    pub fn declared_inputs(&self) -> Inputs {
        self.input_schema
            .iter()
            .filter_map(|(key, entry)| declared_value(entry).map(|value| (key.clone(), value)))
            .collect()
    }
}

fn declared_value(entry: &Value) -> Option<Value> {
    let Value::Object(fields) = entry else {
        return Some(entry.clone());
    };
    if let Some(default) = fields.get("default") {
        return Some(default.clone());
    }
    let selector_like = ["name", "description", "selector"]
        .iter()
        .any(|key| fields.contains_key(*key));
    if selector_like {
        None
    } else {
        Some(entry.clone())
    }
}

/// A live automation (or equivalent) object on the remote controller.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    /// Controller-assigned identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Domain the instance was listed from.
    pub domain: Domain,
    /// Currently bound parameter values; may be empty.
    pub current_inputs: Inputs,
    /// Pointer back to the file that created it, for reporting only.
    pub source_reference: Option<String>,
}

/// Merges a template's declared inputs with an instance's bound values.
///
/// Values already bound on the instance win for keys present in both, so
/// user customisation survives an update; keys only the template declares
/// are added.
#[must_use]
pub fn merge_inputs(declared: &Inputs, current: &Inputs) -> Inputs {
    let mut merged = declared.clone();
    for (key, value) in current {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
