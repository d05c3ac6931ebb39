use color_eyre::eyre::{OptionExt, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{EmptyBody, SubsonicServer, get, post, string_or_number};

/* ---------- Playlists ---------- */

#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicPlaylist {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistList {
    #[serde(default)]
    pub playlist: Vec<SubsonicPlaylist>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetPlaylistsBody {
    #[serde(default)]
    pub playlists: Option<PlaylistList>,
}

pub async fn get_playlists(client: &Client, server: &SubsonicServer) -> Result<Vec<SubsonicPlaylist>> {
    let body: GetPlaylistsBody = get(client, server, "getPlaylists", &[]).await?;
    Ok(body.playlists.map(|p| p.playlist).unwrap_or_default())
}

/* ---------- Playlist entries ---------- */

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistWithSongs {
    #[serde(default)]
    pub entry: Vec<PlaylistEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetPlaylistBody {
    #[serde(default)]
    pub playlist: Option<PlaylistWithSongs>,
}

/// Entries of one playlist in playlist order. Position in this list is the
/// index `updatePlaylist` expects in `songIndexToRemove`.
pub async fn get_playlist_entries(
    client: &Client,
    server: &SubsonicServer,
    playlist_id: &str,
) -> Result<Vec<PlaylistEntry>> {
    let body: GetPlaylistBody = get(
        client,
        server,
        "getPlaylist",
        &[("id", playlist_id.to_string())],
    )
    .await?;

    let playlist = body
        .playlist
        .ok_or_eyre(format!("getPlaylist response for {} had no playlist", playlist_id))?;
    Ok(playlist.entry)
}

/* ---------- Create, update and delete ---------- */

/// Creates a playlist with the given songs in order.
///
/// Older servers answer with an empty body, so callers should look the id up
/// by name afterwards.
pub async fn create_playlist(
    client: &Client,
    server: &SubsonicServer,
    name: &str,
    song_ids: &[String],
) -> Result<()> {
    let mut params = vec![("name", name.to_string())];
    params.extend(song_ids.iter().map(|id| ("songId", id.clone())));

    let _: EmptyBody = post(client, server, "createPlaylist", &params).await?;
    Ok(())
}

pub async fn add_songs_to_playlist(
    client: &Client,
    server: &SubsonicServer,
    playlist_id: &str,
    song_ids: &[String],
) -> Result<()> {
    let mut params = vec![("playlistId", playlist_id.to_string())];
    params.extend(song_ids.iter().map(|id| ("songIdToAdd", id.clone())));

    let _: EmptyBody = post(client, server, "updatePlaylist", &params).await?;
    Ok(())
}

pub async fn remove_songs_by_index(
    client: &Client,
    server: &SubsonicServer,
    playlist_id: &str,
    indices: &[usize],
) -> Result<()> {
    let mut params = vec![("playlistId", playlist_id.to_string())];
    params.extend(indices.iter().map(|i| ("songIndexToRemove", i.to_string())));

    let _: EmptyBody = post(client, server, "updatePlaylist", &params).await?;
    Ok(())
}

pub async fn delete_playlist(
    client: &Client,
    server: &SubsonicServer,
    playlist_id: &str,
) -> Result<()> {
    let _: EmptyBody = post(
        client,
        server,
        "deletePlaylist",
        &[("id", playlist_id.to_string())],
    )
    .await?;
    Ok(())
}

/* ---------- Optional helpers ---------- */

/// Exact, case-sensitive name lookup.
pub fn find_playlist_by_name<'a>(
    playlists: &'a [SubsonicPlaylist],
    name: &str,
) -> Option<&'a SubsonicPlaylist> {
    playlists.iter().find(|p| p.name == name)
}
