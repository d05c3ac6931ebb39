use color_eyre::eyre::Result;

use crate::models::{PlaylistId, RemotePlaylist, SearchCandidate, TrackId};

/// `create_playlist` went through but the new playlist's id could not be read back.
///
/// The playlist exists remotely. Adapters attach this as context so callers
/// can tell it apart from a create that never happened.
#[derive(Debug, thiserror::Error)]
#[error("Playlist '{name}' was created but its ID could not be determined")]
pub struct CreatedIdUnknown {
    pub name: String,
}

/// Port trait wrapping the remote catalog capabilities used by the sync engine.
///
/// Implementations live in `services::subsonic::client` (production) or test mocks.
/// Every method either fully succeeds or returns an error; there is no partial success.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Free-text track search. Candidates come back in the catalog's relevance order.
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>>;

    async fn list_playlists(&self) -> Result<Vec<RemotePlaylist>>;

    async fn get_members(&self, playlist_id: &str) -> Result<Vec<TrackId>>;

    async fn create_playlist(&self, name: &str, track_ids: &[TrackId]) -> Result<PlaylistId>;

    /// Appends tracks to the end of the playlist.
    async fn add_members(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()>;

    /// Removes the entries at the given zero-based positions in a single call.
    async fn remove_members_by_index(&self, playlist_id: &str, indices: &[usize]) -> Result<()>;

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;
}
