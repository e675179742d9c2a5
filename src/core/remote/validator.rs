//! Remote link validation and repair

use std::collections::{BTreeMap, BTreeSet};

use tracing::Span;

use super::{DeclaredLinks, LinkError, RemoteLink, RemoteLinkRepository};

/// Stored links sharing one `(backend, remote id)` across several entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub backend: String,
    pub remote_id: String,
    /// Sorted, at least two
    pub entity_ids: Vec<String>,
}

/// Discrepancies between declared and stored links for one backend
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkReport {
    pub backend: String,
    /// Entities declaring a remote id with nothing stored
    pub missing_in_cache: Vec<String>,
    /// Entities with stored links that no file declares
    pub extra_in_cache: Vec<String>,
    pub duplicates: Vec<DuplicateGroup>,
}

impl LinkReport {
    pub fn is_clean(&self) -> bool {
        self.missing_in_cache.is_empty()
            && self.extra_in_cache.is_empty()
            && self.duplicates.is_empty()
    }
}

/// Classify the stored links of `backend` against the declared ones
pub fn classify(backend: &str, declared: &DeclaredLinks, stored: &[RemoteLink]) -> LinkReport {
    let declared_ids: BTreeSet<&str> = declared
        .iter()
        .filter(|(_, refs)| refs.contains_key(backend))
        .map(|(id, _)| id.as_str())
        .collect();

    let mut stored_ids = BTreeSet::new();
    let mut by_remote: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for link in stored.iter().filter(|l| l.backend == backend) {
        stored_ids.insert(link.entity_id.as_str());
        by_remote
            .entry(link.remote_id.as_str())
            .or_default()
            .insert(link.entity_id.as_str());
    }

    LinkReport {
        backend: backend.to_string(),
        missing_in_cache: declared_ids
            .difference(&stored_ids)
            .map(|s| s.to_string())
            .collect(),
        extra_in_cache: stored_ids
            .difference(&declared_ids)
            .map(|s| s.to_string())
            .collect(),
        duplicates: by_remote
            .into_iter()
            .filter(|(_, entities)| entities.len() > 1)
            .map(|(remote_id, entities)| DuplicateGroup {
                backend: backend.to_string(),
                remote_id: remote_id.to_string(),
                entity_ids: entities.into_iter().map(String::from).collect(),
            })
            .collect(),
    }
}

/// Writes that would repair one backend's links
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixPlan {
    pub backend: String,
    /// Declared links to insert for missing entities
    pub to_link: Vec<RemoteLink>,
    /// Losing links of duplicate groups
    pub dedup: Vec<RemoteLink>,
    /// Links of undeclared entities, only when pruning
    pub prune: Vec<RemoteLink>,
}

impl FixPlan {
    pub fn is_empty(&self) -> bool {
        self.to_link.is_empty() && self.dedup.is_empty() && self.prune.is_empty()
    }

    /// Every link the plan deletes
    pub fn removals(&self) -> impl Iterator<Item = &RemoteLink> {
        self.dedup.iter().chain(self.prune.iter())
    }
}

/// Compute the repair for a report
///
/// Holders of a remote id are the stored links plus the links about to be
/// inserted. When there is more than one, the lowest entity id whose file
/// declares that remote id is kept, or else the lowest entity id. Stored
/// losers are removed and losing insertions are dropped, so a single pass
/// leaves no duplicate behind.
pub fn plan_fixes(
    report: &LinkReport,
    declared: &DeclaredLinks,
    stored: &[RemoteLink],
    prune: bool,
) -> FixPlan {
    let backend = report.backend.as_str();
    let declares = |entity: &str, remote_id: &str| -> bool {
        declared
            .get(entity)
            .and_then(|refs| refs.get(backend))
            .is_some_and(|id| id == remote_id)
    };

    let incoming: Vec<RemoteLink> = report
        .missing_in_cache
        .iter()
        .filter_map(|entity| {
            let remote_id = declared.get(entity)?.get(backend)?;
            Some(RemoteLink::new(entity.as_str(), backend, remote_id.as_str()))
        })
        .collect();

    let mut holders: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for link in stored.iter().filter(|l| l.backend == backend).chain(&incoming) {
        holders
            .entry(link.remote_id.as_str())
            .or_default()
            .insert(link.entity_id.as_str());
    }

    let mut keepers: BTreeMap<&str, &str> = BTreeMap::new();
    for (remote_id, entities) in &holders {
        if entities.len() < 2 {
            continue;
        }
        let keeper = entities
            .iter()
            .find(|e| declares(e, remote_id))
            .or_else(|| entities.iter().next());
        if let Some(keeper) = keeper {
            keepers.insert(*remote_id, *keeper);
        }
    }
    let loses = |link: &RemoteLink| {
        keepers
            .get(link.remote_id.as_str())
            .is_some_and(|keeper| *keeper != link.entity_id)
    };

    let dedup: Vec<RemoteLink> = stored
        .iter()
        .filter(|l| l.backend == backend && loses(l))
        .cloned()
        .collect();
    let to_link: Vec<RemoteLink> = incoming.iter().filter(|l| !loses(l)).cloned().collect();

    let mut pruned = Vec::new();
    if prune {
        let extra: BTreeSet<&str> = report.extra_in_cache.iter().map(String::as_str).collect();
        pruned = stored
            .iter()
            .filter(|l| l.backend == backend && extra.contains(l.entity_id.as_str()))
            .filter(|l| !dedup.contains(l))
            .cloned()
            .collect();
    }

    FixPlan {
        backend: backend.to_string(),
        to_link,
        dedup,
        prune: pruned,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixOptions {
    /// Report the plan without writing
    pub dry_run: bool,
    /// Also remove links no file declares
    pub prune: bool,
}

/// Result of one auto-fix pass over a backend
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub before: LinkReport,
    pub plan: FixPlan,
    /// Fresh validation after the plan was applied (or not, on dry-run)
    pub after: LinkReport,
    pub dry_run: bool,
}

/// Validates declared links against a repository
pub struct LinkValidator<R> {
    repo: R,
    declared: DeclaredLinks,
    span: Span,
}

impl<R: RemoteLinkRepository> LinkValidator<R> {
    pub fn new(repo: R, declared: DeclaredLinks, span: Span) -> Self {
        Self {
            repo,
            declared,
            span,
        }
    }

    pub fn declared(&self) -> &DeclaredLinks {
        &self.declared
    }

    /// Backends seen in the files or in the repository, sorted
    pub fn backends(&self) -> Result<Vec<String>, LinkError> {
        let mut all = self.repo.backends()?;
        for refs in self.declared.values() {
            all.extend(refs.keys().cloned());
        }
        Ok(all.into_iter().collect())
    }

    pub fn validate(&self, backend: &str) -> Result<LinkReport, LinkError> {
        let stored = self.repo.links_for_backend(backend)?;
        let report = classify(backend, &self.declared, &stored);
        tracing::debug!(
            parent: &self.span,
            backend,
            missing = report.missing_in_cache.len(),
            extra = report.extra_in_cache.len(),
            duplicates = report.duplicates.len(),
            "validated remote links"
        );
        Ok(report)
    }

    /// Plan and, unless dry-running, apply fixes, then validate again
    pub fn auto_fix(&mut self, backend: &str, options: FixOptions) -> Result<FixOutcome, LinkError> {
        let stored = self.repo.links_for_backend(backend)?;
        let before = classify(backend, &self.declared, &stored);
        let plan = plan_fixes(&before, &self.declared, &stored, options.prune);

        if options.dry_run {
            tracing::info!(parent: &self.span, backend, "dry run, no links written");
        } else if !plan.is_empty() {
            self.repo.apply(&plan)?;
            tracing::info!(
                parent: &self.span,
                backend,
                linked = plan.to_link.len(),
                deduplicated = plan.dedup.len(),
                pruned = plan.prune.len(),
                "applied link fixes"
            );
        }

        let after = self.validate(backend)?;
        Ok(FixOutcome {
            before,
            plan,
            after,
            dry_run: options.dry_run,
        })
    }
}
