use std::collections::HashSet;
use std::sync::Mutex;

use color_eyre::eyre::{Result, eyre};

use crate::models::{PlaylistId, RemotePlaylist, SearchCandidate, TrackId};
use crate::ports::catalog::CatalogClient;

/// A catalog call as seen by [`FakeCatalog`], in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    Search(String),
    ListPlaylists,
    GetMembers(PlaylistId),
    Create { name: String, ids: Vec<TrackId> },
    Add { playlist_id: PlaylistId, ids: Vec<TrackId> },
    Remove { playlist_id: PlaylistId, indices: Vec<usize> },
    Delete(PlaylistId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Search(String),
    ListPlaylists,
    GetMembers,
    Create,
    Add,
    Remove,
    Delete,
}

#[derive(Default)]
struct FakeState {
    playlists: Vec<(RemotePlaylist, Vec<TrackId>)>,
    next_id: u32,
    calls: Vec<CatalogCall>,
}

/// In-memory catalog that behaves like a Subsonic server and records every call.
#[derive(Default)]
pub struct FakeCatalog {
    songs: Vec<SearchCandidate>,
    fail_points: HashSet<FailPoint>,
    state: Mutex<FakeState>,
}

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(|w| w.to_lowercase()).collect()
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_song(mut self, id: &str, artist: &str, title: &str) -> Self {
        self.songs.push(SearchCandidate {
            id: id.to_string(),
            artist: artist.to_string(),
            title: title.to_string(),
        });
        self
    }

    pub fn with_playlist(self, name: &str, members: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("pl-{}", state.next_id);
            let members = members.iter().map(|m| m.to_string()).collect();
            state.playlists.push((
                RemotePlaylist {
                    id,
                    name: name.to_string(),
                },
                members,
            ));
        }
        self
    }

    pub fn failing(mut self, point: FailPoint) -> Self {
        self.fail_points.insert(point);
        self
    }

    pub fn failing_search(self, query: &str) -> Self {
        self.failing(FailPoint::Search(query.to_string()))
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change remote state.
    pub fn mutations(&self) -> Vec<CatalogCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    CatalogCall::Create { .. }
                        | CatalogCall::Add { .. }
                        | CatalogCall::Remove { .. }
                        | CatalogCall::Delete(_)
                )
            })
            .collect()
    }

    pub fn members_of(&self, name: &str) -> Option<Vec<TrackId>> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|(p, _)| p.name == name)
            .map(|(_, members)| members.clone())
    }

    pub fn playlist_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.playlists.iter().map(|(p, _)| p.name.clone()).collect()
    }

    fn record(&self, call: CatalogCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_points.contains(&point) {
            return Err(eyre!("injected failure at {:?}", point));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogClient for FakeCatalog {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>> {
        self.record(CatalogCall::Search(query.to_string()));
        self.check(FailPoint::Search(query.to_string()))?;

        let query_words = words(query);
        Ok(self
            .songs
            .iter()
            .filter(|song| {
                words(&song.artist)
                    .iter()
                    .chain(words(&song.title).iter())
                    .all(|w| query_words.contains(w))
            })
            .cloned()
            .collect())
    }

    async fn list_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        self.record(CatalogCall::ListPlaylists);
        self.check(FailPoint::ListPlaylists)?;
        let state = self.state.lock().unwrap();
        Ok(state.playlists.iter().map(|(p, _)| p.clone()).collect())
    }

    async fn get_members(&self, playlist_id: &str) -> Result<Vec<TrackId>> {
        self.record(CatalogCall::GetMembers(playlist_id.to_string()));
        self.check(FailPoint::GetMembers)?;
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|(p, _)| p.id == playlist_id)
            .map(|(_, members)| members.clone())
            .ok_or_else(|| eyre!("playlist {} not found", playlist_id))
    }

    async fn create_playlist(&self, name: &str, track_ids: &[TrackId]) -> Result<PlaylistId> {
        self.record(CatalogCall::Create {
            name: name.to_string(),
            ids: track_ids.to_vec(),
        });
        self.check(FailPoint::Create)?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("pl-{}", state.next_id);
        state.playlists.push((
            RemotePlaylist {
                id: id.clone(),
                name: name.to_string(),
            },
            track_ids.to_vec(),
        ));
        Ok(id)
    }

    async fn add_members(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        self.record(CatalogCall::Add {
            playlist_id: playlist_id.to_string(),
            ids: track_ids.to_vec(),
        });
        self.check(FailPoint::Add)?;
        let mut state = self.state.lock().unwrap();
        let (_, members) = state
            .playlists
            .iter_mut()
            .find(|(p, _)| p.id == playlist_id)
            .ok_or_else(|| eyre!("playlist {} not found", playlist_id))?;
        members.extend(track_ids.iter().cloned());
        Ok(())
    }

    async fn remove_members_by_index(&self, playlist_id: &str, indices: &[usize]) -> Result<()> {
        self.record(CatalogCall::Remove {
            playlist_id: playlist_id.to_string(),
            indices: indices.to_vec(),
        });
        self.check(FailPoint::Remove)?;
        let mut state = self.state.lock().unwrap();
        let (_, members) = state
            .playlists
            .iter_mut()
            .find(|(p, _)| p.id == playlist_id)
            .ok_or_else(|| eyre!("playlist {} not found", playlist_id))?;
        if let Some(bad) = indices.iter().find(|i| **i >= members.len()) {
            return Err(eyre!("index {} out of range", bad));
        }
        let doomed: HashSet<usize> = indices.iter().copied().collect();
        let kept = members
            .iter()
            .enumerate()
            .filter(|(i, _)| !doomed.contains(i))
            .map(|(_, id)| id.clone())
            .collect();
        *members = kept;
        Ok(())
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        self.record(CatalogCall::Delete(playlist_id.to_string()));
        self.check(FailPoint::Delete)?;
        let mut state = self.state.lock().unwrap();
        state.playlists.retain(|(p, _)| p.id != playlist_id);
        Ok(())
    }
}
