use color_eyre::eyre::{Result, WrapErr};

use crate::models::{OutcomeStatus, RemotePlaylist, SyncOutcome, TrackReference};
use crate::ports::catalog::CatalogClient;
use crate::services::reconcile::{ConvergeError, ConvergeMode, ReconciliationEngine};
use crate::sources::{DiffSource, SnapshotSource};

/// Outcome name used when the diff phase fails as a whole.
pub const DIFF_PHASE: &str = "(diff phase)";

/// Decides which playlist names a run touches.
///
/// Exactly `["*"]` matches everything. Otherwise a name is included when it
/// contains any pattern, ignoring case, so an empty list matches nothing.
#[derive(Debug, Clone)]
pub struct InclusionFilter {
    patterns: Option<Vec<String>>,
}

impl InclusionFilter {
    pub fn new(patterns: &[String]) -> Self {
        if let [only] = patterns {
            if only == "*" {
                return Self::all();
            }
        }
        Self {
            patterns: Some(patterns.iter().map(|p| p.to_lowercase()).collect()),
        }
    }

    pub fn all() -> Self {
        Self { patterns: None }
    }

    pub fn should_process(&self, playlist_name: &str) -> bool {
        match &self.patterns {
            None => true,
            Some(patterns) => {
                let lowered = playlist_name.to_lowercase();
                patterns.iter().any(|p| lowered.contains(p.as_str()))
            }
        }
    }
}

/// Runs resolution and reconciliation for every discovered playlist.
///
/// Playlists are processed one after another. A failure is recorded in that
/// playlist's outcome and never stops the others.
pub struct SyncOrchestrator<'a, C: CatalogClient> {
    engine: ReconciliationEngine<'a, C>,
    filter: InclusionFilter,
}

impl<'a, C: CatalogClient> SyncOrchestrator<'a, C> {
    pub fn new(engine: ReconciliationEngine<'a, C>, filter: InclusionFilter) -> Self {
        Self { engine, filter }
    }

    /// Creates every included snapshot playlist that does not exist remotely yet.
    ///
    /// Existing playlists are left for the diff phase and reported as skipped.
    pub async fn initialize_from_snapshot(
        &self,
        snapshots: &impl SnapshotSource,
    ) -> Result<Vec<SyncOutcome>> {
        let names = snapshots
            .playlist_names()
            .wrap_err("Failed to list snapshot playlists")?;

        let mut outcomes = Vec::new();
        for name in names {
            if !self.filter.should_process(&name) {
                log::debug!("[init] {}: excluded by filter", name);
                continue;
            }

            let outcome = self.initialize_one(&name, snapshots).await;
            log::info!("[init] {}: {:?}", name, outcome.status);
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn initialize_one(&self, name: &str, snapshots: &impl SnapshotSource) -> SyncOutcome {
        let existing = match self.engine.find_playlist(name).await {
            Ok(existing) => existing,
            Err(e) => return SyncOutcome::new(name, OutcomeStatus::Failed(format!("{:#}", e))),
        };

        // Existing playlists are neither read nor resolved.
        if existing.is_some() {
            return self
                .converge_existing(name, existing, &[], ConvergeMode::CreateOrSkip)
                .await;
        }

        let references = match snapshots.read(name) {
            Ok(references) => references,
            Err(e) => return SyncOutcome::new(name, OutcomeStatus::Failed(format!("{:#}", e))),
        };

        self.converge_existing(name, None, &references, ConvergeMode::CreateOrSkip)
            .await
    }

    /// Resolves `references` and converges `name` to them with `mode`.
    ///
    /// Nothing is created when no reference resolves.
    pub async fn converge_references(
        &self,
        name: &str,
        references: &[TrackReference],
        mode: ConvergeMode,
    ) -> SyncOutcome {
        match self.engine.find_playlist(name).await {
            Ok(existing) => {
                self.converge_existing(name, existing, references, mode)
                    .await
            }
            Err(e) => SyncOutcome::new(name, OutcomeStatus::Failed(format!("{:#}", e))),
        }
    }

    async fn converge_existing(
        &self,
        name: &str,
        existing: Option<RemotePlaylist>,
        references: &[TrackReference],
        mode: ConvergeMode,
    ) -> SyncOutcome {
        if existing.is_some() && mode == ConvergeMode::CreateOrSkip {
            return self
                .engine
                .converge_to(name, existing, &[], mode)
                .await
                .unwrap_or_else(ConvergeError::into_outcome);
        }

        let resolved = match self.engine.resolve(references).await {
            Ok(resolved) => resolved,
            Err(e) => return SyncOutcome::new(name, OutcomeStatus::Failed(format!("{:#}", e))),
        };

        if resolved.ids.is_empty() {
            let mut outcome = SyncOutcome::new(
                name,
                OutcomeStatus::Skipped("no resolvable tracks".to_string()),
            );
            outcome.unresolved = resolved.unresolved;
            return outcome;
        }

        let mut outcome = self
            .engine
            .converge_to(name, existing, &resolved.ids, mode)
            .await
            .unwrap_or_else(ConvergeError::into_outcome);
        outcome.unresolved = resolved.unresolved;
        outcome
    }

    /// Applies the most recent diff to every included playlist that exists remotely.
    ///
    /// Playlists without a diff are left untouched and produce no outcome.
    pub async fn apply_latest_diffs(&self, diffs: &impl DiffSource) -> Result<Vec<SyncOutcome>> {
        let playlists = self
            .engine
            .find_all_playlists()
            .await
            .wrap_err("Failed to list remote playlists")?;

        let mut outcomes = Vec::new();
        for playlist in playlists {
            if !self.filter.should_process(&playlist.name) {
                log::debug!("[diff] {}: excluded by filter", playlist.name);
                continue;
            }

            let diff = match diffs.latest_diff(&playlist.name) {
                Ok(Some(diff)) => diff,
                Ok(None) => {
                    log::debug!("[diff] {}: no diff available", playlist.name);
                    continue;
                }
                Err(e) => {
                    let outcome = SyncOutcome::new(
                        playlist.name.as_str(),
                        OutcomeStatus::Failed(format!("{:#}", e)),
                    );
                    log::error!("[diff] {}: {:?}", playlist.name, outcome.status);
                    outcomes.push(outcome);
                    continue;
                }
            };

            log::info!(
                "[diff] {}: applying {} (+{} / -{} references)",
                playlist.name,
                diff.source.display(),
                diff.added.len(),
                diff.removed.len()
            );
            let outcome = self
                .engine
                .apply_diff_to(&playlist, &diff.added, &diff.removed)
                .await
                .unwrap_or_else(ConvergeError::into_outcome);
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Snapshot initialization followed by diff updates.
    ///
    /// A diff phase that cannot start is recorded as one failed outcome, so
    /// the init outcomes are still reported.
    pub async fn run(
        &self,
        snapshots: &impl SnapshotSource,
        diffs: &impl DiffSource,
    ) -> Result<Vec<SyncOutcome>> {
        let mut outcomes = self.initialize_from_snapshot(snapshots).await?;
        match self.apply_latest_diffs(diffs).await {
            Ok(diffed) => outcomes.extend(diffed),
            Err(e) => {
                log::error!("[diff] phase aborted: {:#}", e);
                outcomes.push(SyncOutcome::new(
                    DIFF_PHASE,
                    OutcomeStatus::Failed(format!("{:#}", e)),
                ));
            }
        }
        Ok(outcomes)
    }
}
