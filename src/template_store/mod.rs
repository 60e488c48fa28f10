//! Local template discovery.
//!
//! Templates live under one subdirectory per [`Domain`] of the template
//! root, as YAML documents with a top-level `blueprint` block. Only
//! templates whose name carries the deployment marker are surfaced.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::{Dir, DirEntry};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Domain, Inputs, Template};
use crate::marker::DeploymentMarker;

/// Fatal template store failures.
#[derive(Debug, Error)]
pub enum TemplateStoreError {
    /// The template root could not be opened.
    #[error("template directory {path} is unreadable: {source}")]
    RootUnreadable {
        /// Configured template root.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
}

/// A template file that was skipped because it could not be read or parsed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to parse {path}: {message}")]
pub struct TemplateParseError {
    /// Path of the file, relative to the template root.
    pub path: String,
    /// Reader or parser message.
    pub message: String,
}

/// Result of one template scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateCatalog {
    /// Marked templates in enumeration order.
    pub templates: Vec<Template>,
    /// Files and directory entries that could not be read or parsed.
    pub skipped: Vec<TemplateParseError>,
    /// Identifiers of well-formed templates without the marker.
    pub unmarked: Vec<String>,
}

impl TemplateCatalog {
    /// Looks a template up by identifier.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&Template> {
        self.templates
            .iter()
            .find(|template| template.identifier == identifier)
    }

    /// Iterates templates in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    /// Number of marked templates.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` when no marked template was found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[derive(Deserialize)]
struct TemplateDocument {
    blueprint: BlueprintHeader,
}

#[derive(Deserialize)]
struct BlueprintHeader {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input: Option<Inputs>,
}

/// Reads templates from a directory tree.
#[derive(Clone, Debug)]
pub struct TemplateStore {
    root: Utf8PathBuf,
    marker: DeploymentMarker,
}

impl TemplateStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, marker: DeploymentMarker) -> Self {
        Self {
            root: root.into(),
            marker,
        }
    }

    /// Template root this store reads from.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Confirms the template root can be opened without reading any template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateStoreError::RootUnreadable`] when it cannot.
    pub fn check_root(&self) -> Result<(), TemplateStoreError> {
        self.open_root().map(drop)
    }

    /// Scans the subdirectory of each domain in `domains`.
    ///
    /// Files ending in `.yaml` or `.yml` are read in file-name order, domain
    /// by domain. A file that fails to parse is recorded in
    /// [`TemplateCatalog::skipped`] and the scan continues. A missing domain
    /// subdirectory is logged and skipped, and so is a directory entry whose
    /// name or type cannot be read. Nothing is cached; every call re-reads
    /// disk.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateStoreError::RootUnreadable`] when the root itself
    /// cannot be opened.
    pub fn load_templates(&self, domains: &[Domain]) -> Result<TemplateCatalog, TemplateStoreError> {
        let root = self.open_root()?;
        let mut catalog = TemplateCatalog::default();
        for &domain in domains {
            self.scan_domain(&root, domain, &mut catalog);
        }
        Ok(catalog)
    }

    fn open_root(&self) -> Result<Dir, TemplateStoreError> {
        Dir::open_ambient_dir(&self.root, ambient_authority()).map_err(|source| {
            TemplateStoreError::RootUnreadable {
                path: self.root.clone(),
                source,
            }
        })
    }

    fn scan_domain(&self, root: &Dir, domain: Domain, catalog: &mut TemplateCatalog) {
        let directory = domain.directory();
        let dir = match root.open_dir(directory) {
            Ok(dir) => dir,
            Err(err) => {
                warn!(
                    path = %self.root.join(directory),
                    error = %err,
                    "skipping unreadable template directory"
                );
                return;
            }
        };

        let entries = match dir.entries() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    path = %self.root.join(directory),
                    error = %err,
                    "failed to list template directory"
                );
                return;
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            match template_file_name(entry) {
                Ok(Some(file_name)) => files.push(file_name),
                Ok(None) => {}
                Err((name, err)) => {
                    let path = format!("{directory}/{name}");
                    warn!(path = %path, error = %err, "skipping unreadable directory entry");
                    catalog.skipped.push(TemplateParseError {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }
        files.sort();

        for file_name in files {
            let identifier = format!("{directory}/{file_name}");
            match read_template(&dir, &file_name, &identifier, domain) {
                Ok(template) if self.marker.is_marked(&template.display_name) => {
                    catalog.templates.push(template);
                }
                Ok(template) => {
                    debug!(
                        template = %identifier,
                        name = %template.display_name,
                        "ignoring template without deployment marker"
                    );
                    catalog.unmarked.push(identifier);
                }
                Err(message) => {
                    warn!(path = %identifier, error = %message, "skipping template");
                    catalog.skipped.push(TemplateParseError {
                        path: identifier,
                        message,
                    });
                }
            }
        }
    }
}

/// Name of a template file entry, `None` for anything else. Errors carry the
/// entry name when it is known.
fn template_file_name(entry: io::Result<DirEntry>) -> Result<Option<String>, (String, io::Error)> {
    let unnamed = |err: io::Error| (String::from("<unreadable entry>"), err);
    let dir_entry = entry.map_err(unnamed)?;
    let name = dir_entry.file_name().map_err(unnamed)?;
    if !(name.ends_with(".yaml") || name.ends_with(".yml")) {
        return Ok(None);
    }
    match dir_entry.file_type() {
        Ok(file_type) => Ok(file_type.is_file().then_some(name)),
        Err(err) => Err((name, err)),
    }
}

fn read_template(
    dir: &Dir,
    file_name: &str,
    identifier: &str,
    domain: Domain,
) -> Result<Template, String> {
    let contents = dir.read_to_string(file_name).map_err(|err| err.to_string())?;
    let document: TemplateDocument =
        serde_yaml::from_str(&contents).map_err(|err| err.to_string())?;
    let header = document.blueprint;
    if header.name.trim().is_empty() {
        return Err(String::from("blueprint name is empty"));
    }
    Ok(Template {
        identifier: identifier.to_owned(),
        display_name: header.name,
        description: header.description.unwrap_or_default(),
        domain,
        input_schema: header.input.unwrap_or_default(),
    })
}
