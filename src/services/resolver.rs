use std::collections::HashSet;

use color_eyre::eyre::{Result, WrapErr};
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::models::{SearchCandidate, TrackId, TrackReference};
use crate::ports::catalog::CatalogClient;

/// Tie-break policy when a search returns several candidates.
#[derive(Debug, Clone, Copy)]
pub struct ResolvePolicy {
    /// Prefer the first candidate whose artist and title equal the reference
    /// (case-insensitive) before falling back to the first candidate.
    pub prefer_exact: bool,
    /// Searches allowed in flight at once for one batch.
    pub concurrency: usize,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            prefer_exact: true,
            concurrency: 1,
        }
    }
}

/// Result of resolving a batch: ids in input order plus the number of misses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub ids: Vec<TrackId>,
    pub unresolved: usize,
}

pub struct TrackResolver<'a, C: CatalogClient> {
    client: &'a C,
    policy: ResolvePolicy,
}

impl<'a, C: CatalogClient> TrackResolver<'a, C> {
    pub fn new(client: &'a C, policy: ResolvePolicy) -> Self {
        Self { client, policy }
    }

    /// Resolves one reference. `Ok(None)` is a miss; transport failures are errors.
    pub async fn resolve(&self, reference: &TrackReference) -> Result<Option<TrackId>> {
        let query = reference.search_query();
        let candidates = self
            .client
            .search(&query)
            .await
            .wrap_err_with(|| format!("Search failed for '{}'", query))?;

        let picked = pick_candidate(reference, &candidates, self.policy.prefer_exact);
        match &picked {
            Some(id) => log::debug!("Resolved '{}' -> {}", reference, id),
            None => log::debug!("No catalog match for '{}'", reference),
        }
        Ok(picked)
    }

    /// Resolves every reference and returns the hits in input order, before deduplication.
    ///
    /// With `concurrency > 1` searches overlap, but results are buffered back
    /// into input order. The first transport error aborts the batch.
    pub async fn resolve_many(&self, references: &[TrackReference]) -> Result<Resolved> {
        let results: Vec<Option<TrackId>> = stream::iter(references)
            .map(|reference| self.resolve(reference))
            .buffered(self.policy.concurrency.max(1))
            .try_collect()
            .await?;

        let unresolved = results.iter().filter(|r| r.is_none()).count();
        let ids: Vec<TrackId> = results.into_iter().flatten().collect();

        if unresolved > 0 {
            log::info!(
                "{} of {} references unresolved",
                unresolved,
                references.len()
            );
        }

        Ok(Resolved { ids, unresolved })
    }
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Applies the tie-break policy to candidates already in catalog relevance order.
pub fn pick_candidate(
    reference: &TrackReference,
    candidates: &[SearchCandidate],
    prefer_exact: bool,
) -> Option<TrackId> {
    let first = candidates.first()?;

    if prefer_exact {
        let exact = candidates.iter().find(|c| {
            same_text(&c.artist, reference.artist()) && same_text(&c.title, reference.title())
        });
        if let Some(candidate) = exact {
            return Some(candidate.id.clone());
        }
    }

    Some(first.id.clone())
}

/// Keeps the first occurrence of every id, preserving order.
pub fn dedupe(ids: &[TrackId]) -> Vec<TrackId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
