use std::collections::HashSet;

use color_eyre::eyre::{Result, WrapErr};

use crate::models::{
    OutcomeStatus, PlaylistState, ReconciliationPlan, RemotePlaylist, SyncOutcome, TrackId,
    TrackReference,
};
use crate::ports::catalog::{CatalogClient, CreatedIdUnknown};
use crate::services::resolver::{ResolvePolicy, Resolved, TrackResolver, dedupe};

/// What to do when the target playlist already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeMode {
    /// Delete the existing playlist and recreate it with the desired members.
    Replace,
    /// Leave an existing playlist untouched.
    CreateOrSkip,
    /// Append the desired members to the existing playlist.
    Append,
}

#[derive(Debug, thiserror::Error)]
pub enum ConvergeError {
    #[error("Catalog request failed for playlist '{playlist}': {report:#}")]
    Transport {
        playlist: String,
        report: color_eyre::Report,
    },
    /// The playlist was deleted but could not be recreated, so it is now missing remotely.
    #[error("Playlist '{playlist}' was deleted but recreating it failed: {report:#}")]
    ReplaceWindow {
        playlist: String,
        report: color_eyre::Report,
    },
}

impl ConvergeError {
    fn transport(playlist: &str, report: color_eyre::Report) -> Self {
        Self::Transport {
            playlist: playlist.to_string(),
            report,
        }
    }

    /// Turns the error into the outcome recorded for the playlist.
    pub fn into_outcome(self) -> SyncOutcome {
        match self {
            Self::Transport { playlist, report } => {
                SyncOutcome::new(playlist, OutcomeStatus::Failed(format!("{:#}", report)))
            }
            Self::ReplaceWindow { playlist, report } => SyncOutcome::new(
                playlist,
                OutcomeStatus::ReplaceWindowFailed(format!("{:#}", report)),
            ),
        }
    }
}

/// Every position in `state.members` holding an id from `remove_ids`, plus the ids to append.
///
/// Duplicate entries of a targeted id are all selected, not just the first.
pub fn plan_diff(
    state: &PlaylistState,
    add_ids: &[TrackId],
    remove_ids: &[TrackId],
) -> ReconciliationPlan {
    let targeted: HashSet<&str> = remove_ids.iter().map(String::as_str).collect();
    let to_remove_indices = state
        .members
        .iter()
        .enumerate()
        .filter(|(_, id)| targeted.contains(id.as_str()))
        .map(|(i, _)| i)
        .collect();

    ReconciliationPlan {
        to_add: add_ids.to_vec(),
        to_remove_indices,
    }
}

/// Brings one remote playlist to a target membership through the catalog port.
pub struct ReconciliationEngine<'a, C: CatalogClient> {
    client: &'a C,
    policy: ResolvePolicy,
    dedupe: bool,
}

impl<'a, C: CatalogClient> ReconciliationEngine<'a, C> {
    pub fn new(client: &'a C, policy: ResolvePolicy, dedupe: bool) -> Self {
        Self {
            client,
            policy,
            dedupe,
        }
    }

    /// Resolves references and, when configured, drops repeated ids.
    pub async fn resolve(&self, references: &[TrackReference]) -> Result<Resolved> {
        let mut resolved = TrackResolver::new(self.client, self.policy)
            .resolve_many(references)
            .await?;
        if self.dedupe {
            resolved.ids = dedupe(&resolved.ids);
        }
        Ok(resolved)
    }

    pub async fn find_all_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        self.client
            .list_playlists()
            .await
            .wrap_err("Failed to list playlists")
    }

    /// Exact, case-sensitive name lookup.
    pub async fn find_playlist(&self, name: &str) -> Result<Option<RemotePlaylist>> {
        let playlists = self.find_all_playlists().await?;
        Ok(playlists.into_iter().find(|p| p.name == name))
    }

    pub async fn fetch_state(&self, playlist: &RemotePlaylist) -> Result<PlaylistState> {
        let members = self
            .client
            .get_members(&playlist.id)
            .await
            .wrap_err_with(|| format!("Failed to fetch members of '{}'", playlist.name))?;
        Ok(PlaylistState {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
            members,
        })
    }

    /// Full-replace convergence of `name` to exactly `desired`, in order.
    ///
    /// Replace is delete-then-create and not atomic: if create fails after the
    /// delete went through, the playlist is gone and `ReplaceWindow` is returned.
    pub async fn converge(
        &self,
        name: &str,
        desired: &[TrackId],
        mode: ConvergeMode,
    ) -> Result<SyncOutcome, ConvergeError> {
        let existing = self
            .find_playlist(name)
            .await
            .map_err(|e| ConvergeError::transport(name, e))?;
        self.converge_to(name, existing, desired, mode).await
    }

    /// Same as [`Self::converge`] for a playlist the caller already looked up.
    pub async fn converge_to(
        &self,
        name: &str,
        existing: Option<RemotePlaylist>,
        desired: &[TrackId],
        mode: ConvergeMode,
    ) -> Result<SyncOutcome, ConvergeError> {
        let Some(existing) = existing else {
            log::info!("Creating playlist '{}' with {} tracks", name, desired.len());
            let note = self
                .create(name, desired)
                .await
                .map_err(|e| ConvergeError::transport(name, e))?;

            let mut outcome = SyncOutcome::new(name, OutcomeStatus::Created);
            outcome.added = desired.len();
            outcome.note = note;
            return Ok(outcome);
        };

        match mode {
            ConvergeMode::CreateOrSkip => {
                log::info!("Playlist '{}' already exists, leaving it alone", name);
                Ok(SyncOutcome::new(
                    name,
                    OutcomeStatus::Skipped("exists".to_string()),
                ))
            }
            ConvergeMode::Replace => {
                log::info!(
                    "Replacing playlist '{}' (ID: {}) with {} tracks",
                    name,
                    existing.id,
                    desired.len()
                );
                self.client
                    .delete_playlist(&existing.id)
                    .await
                    .map_err(|e| ConvergeError::transport(name, e))?;

                let note = match self.create(name, desired).await {
                    Ok(note) => note,
                    Err(report) => {
                        log::error!(
                            "Playlist '{}' was deleted but could not be recreated: {:#}",
                            name,
                            report
                        );
                        return Err(ConvergeError::ReplaceWindow {
                            playlist: name.to_string(),
                            report,
                        });
                    }
                };

                let mut outcome = SyncOutcome::new(name, OutcomeStatus::Replaced);
                outcome.added = desired.len();
                outcome.note = note;
                Ok(outcome)
            }
            ConvergeMode::Append => {
                log::info!(
                    "Appending {} tracks to playlist '{}' (ID: {})",
                    desired.len(),
                    name,
                    existing.id
                );
                if !desired.is_empty() {
                    self.client
                        .add_members(&existing.id, desired)
                        .await
                        .map_err(|e| ConvergeError::transport(name, e))?;
                }

                let mut outcome = SyncOutcome::new(name, OutcomeStatus::Diffed);
                outcome.added = desired.len();
                Ok(outcome)
            }
        }
    }

    /// Creates the playlist. A create that went through but whose id could not
    /// be read back counts as done, with a note for the report.
    async fn create(&self, name: &str, desired: &[TrackId]) -> Result<Option<String>> {
        match self.client.create_playlist(name, desired).await {
            Ok(id) => {
                log::debug!("Playlist '{}' has ID {}", name, id);
                Ok(None)
            }
            Err(report) if report.downcast_ref::<CreatedIdUnknown>().is_some() => {
                log::warn!("{:#}", report);
                Ok(Some("created, id unknown".to_string()))
            }
            Err(report) => Err(report),
        }
    }

    /// Differential convergence of the playlist called `name`.
    ///
    /// A playlist that does not exist is skipped.
    pub async fn apply_diff(
        &self,
        name: &str,
        to_add: &[TrackReference],
        to_remove: &[TrackReference],
    ) -> Result<SyncOutcome, ConvergeError> {
        let playlist = self
            .find_playlist(name)
            .await
            .map_err(|e| ConvergeError::transport(name, e))?;

        match playlist {
            Some(playlist) => self.apply_diff_to(&playlist, to_add, to_remove).await,
            None => Ok(SyncOutcome::new(
                name,
                OutcomeStatus::Skipped("playlist not found".to_string()),
            )),
        }
    }

    /// Differential convergence of an already looked-up playlist.
    ///
    /// Removals go out before additions. The result is not re-read afterwards.
    pub async fn apply_diff_to(
        &self,
        playlist: &RemotePlaylist,
        to_add: &[TrackReference],
        to_remove: &[TrackReference],
    ) -> Result<SyncOutcome, ConvergeError> {
        let name = playlist.name.as_str();
        let fail = |e| ConvergeError::transport(name, e);

        let add = self.resolve(to_add).await.map_err(fail)?;
        let remove = self.resolve(to_remove).await.map_err(fail)?;

        let state = self.fetch_state(playlist).await.map_err(fail)?;
        let plan = plan_diff(&state, &add.ids, &remove.ids);

        log::debug!(
            "Plan for '{}': remove {} entries, add {} tracks",
            name,
            plan.to_remove_indices.len(),
            plan.to_add.len()
        );

        if plan.is_empty() {
            log::info!("'{}' already matches its diff", name);
        }

        if !plan.to_remove_indices.is_empty() {
            let indices: Vec<usize> = plan.to_remove_indices.iter().copied().collect();
            self.client
                .remove_members_by_index(&state.id, &indices)
                .await
                .map_err(fail)?;
        }
        if !plan.to_add.is_empty() {
            self.client
                .add_members(&state.id, &plan.to_add)
                .await
                .map_err(fail)?;
        }

        let mut outcome = SyncOutcome::new(name, OutcomeStatus::Diffed);
        outcome.added = plan.to_add.len();
        outcome.removed = plan.to_remove_indices.len();
        outcome.unresolved = add.unresolved + remove.unresolved;

        log::info!(
            "Diff applied to '{}': -{} +{}",
            name,
            outcome.removed,
            outcome.added
        );
        Ok(outcome)
    }
}
