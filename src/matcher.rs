//! Pairs templates with live instances by marker-stripped name.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::{debug, warn};

use crate::domain::{Domain, Instance, Template};
use crate::marker::{DeploymentMarker, template_key};

/// A template and the instance it governs, if one exists yet.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    /// Template to reconcile toward.
    pub template: Template,
    /// Live instance, or `None` when the template still needs installing.
    pub instance: Option<Instance>,
}

impl Match {
    /// Returns `true` when no instance exists yet.
    #[must_use]
    pub const fn is_install(&self) -> bool {
        self.instance.is_none()
    }
}

/// Output of [`match_templates`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchSet {
    /// Matches in template enumeration order. A template with several
    /// instances yields one match per instance, in listing order.
    pub matches: Vec<Match>,
    /// Templates that can never be paired: those sharing a key with an
    /// earlier template of the same domain, and those whose name is only
    /// the marker.
    pub unmatched: Vec<Template>,
    /// Marked instances whose key names no known template.
    pub orphaned: Vec<Instance>,
}

impl MatchSet {
    /// Matches with no live instance.
    pub fn install_candidates(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| m.is_install())
    }

    /// Matches paired with a live instance.
    pub fn updates(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| !m.is_install())
    }
}

/// Pairs `templates` with `instances`.
///
/// Keys are derived with [`template_key`] and compared within a domain only.
/// When two templates of a domain share a key the first in enumeration
/// order wins; the ambiguity is logged and the later template is reported
/// in [`MatchSet::unmatched`]. Instances without the marker are ignored.
#[must_use]
pub fn match_templates(
    templates: &[Template],
    instances: &[Instance],
    marker: &DeploymentMarker,
) -> MatchSet {
    let mut set = MatchSet::default();
    let mut winners: Vec<&Template> = Vec::new();
    let mut by_key: BTreeMap<(Domain, &str), usize> = BTreeMap::new();

    for template in templates {
        let Some(key) = template_key(marker, &template.display_name) else {
            warn!(template = %template.identifier, "template name has nothing after the marker");
            set.unmatched.push(template.clone());
            continue;
        };
        match by_key.entry((template.domain, key)) {
            Entry::Occupied(existing) => {
                let kept = winners
                    .get(*existing.get())
                    .map_or("", |winner| winner.identifier.as_str());
                warn!(
                    key,
                    domain = %template.domain,
                    kept,
                    ignored = %template.identifier,
                    "ambiguous template key; keeping the first template"
                );
                set.unmatched.push(template.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(winners.len());
                winners.push(template);
            }
        }
    }

    let mut bound: Vec<Vec<&Instance>> = vec![Vec::new(); winners.len()];
    for instance in instances.iter().filter(|i| marker.is_marked(&i.name)) {
        let slot = template_key(marker, &instance.name)
            .and_then(|key| by_key.get(&(instance.domain, key)))
            .and_then(|&index| bound.get_mut(index));
        if let Some(bucket) = slot {
            bucket.push(instance);
        } else {
            debug!(
                instance = %instance.id,
                name = %instance.name,
                domain = %instance.domain,
                "marked instance has no matching template"
            );
            set.orphaned.push(instance.clone());
        }
    }

    for (template, paired) in winners.into_iter().zip(bound) {
        if paired.is_empty() {
            set.matches.push(Match {
                template: template.clone(),
                instance: None,
            });
            continue;
        }
        for instance in paired {
            set.matches.push(Match {
                template: template.clone(),
                instance: Some(instance.clone()),
            });
        }
    }
    set
}
