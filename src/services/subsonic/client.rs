use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use reqwest::Client;

use crate::config::Config;
use crate::models::{PlaylistId, RemotePlaylist, SearchCandidate, TrackId};
use crate::ports::catalog::{CatalogClient, CreatedIdUnknown};
use crate::subsonic_rs::SubsonicServer;
use crate::subsonic_rs::playlist::{
    add_songs_to_playlist, create_playlist, delete_playlist, find_playlist_by_name,
    get_playlist_entries, get_playlists, remove_songs_by_index,
};
use crate::subsonic_rs::search::search_songs;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Runtime knobs for the adapter that are not part of the server address.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub connect_timeout: Duration,
    pub requests_per_second: u32,
    pub retry_attempts: usize,
    /// Log write calls instead of sending them.
    pub dry_run: bool,
}

impl AdapterOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            requests_per_second: config.requests_per_second,
            retry_attempts: config.retry_attempts,
            dry_run: config.dry_run,
        }
    }
}

/// `CatalogClient` backed by a Subsonic-compatible REST server.
pub struct SubsonicHttpAdapter {
    client: Client,
    server: SubsonicServer,
    limiter: DirectRateLimiter,
    retry_attempts: usize,
    dry_run: bool,
}

impl SubsonicHttpAdapter {
    pub fn new(server: SubsonicServer, options: AdapterOptions) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .wrap_err("Failed to build HTTP client")?;
        let per_second = NonZeroU32::new(options.requests_per_second)
            .ok_or_eyre("requests_per_second must be at least 1")?;

        log::debug!(
            "Subsonic adapter for {} as '{}' ({} req/s, {} retries, dry_run={})",
            server.base_url,
            server.credentials.username(),
            per_second,
            options.retry_attempts,
            options.dry_run
        );

        Ok(Self {
            client,
            server,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            retry_attempts: options.retry_attempts,
            dry_run: options.dry_run,
        })
    }

    async fn limited<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        self.limiter.until_ready().await;
        request.await
    }

    /// Retries `op` with exponential backoff when `retry_attempts > 0`.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.retry_attempts == 0 {
            return op().await;
        }

        op.retry(ExponentialBuilder::default().with_max_times(self.retry_attempts))
            .sleep(tokio::time::sleep)
            .notify(|err: &color_eyre::Report, after: Duration| {
                log::warn!("{} failed, retrying in {:?}: {:#}", what, after, err);
            })
            .await
    }

    fn skip_write(&self, what: std::fmt::Arguments<'_>) -> bool {
        if self.dry_run {
            log::info!("[dry-run] would {}", what);
        }
        self.dry_run
    }
}

#[async_trait::async_trait]
impl CatalogClient for SubsonicHttpAdapter {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>> {
        let songs = self
            .with_retry("search2", || {
                self.limited(search_songs(&self.client, &self.server, query))
            })
            .await?;

        Ok(songs
            .into_iter()
            .map(|song| SearchCandidate {
                id: song.id,
                artist: song.artist,
                title: song.title,
            })
            .collect())
    }

    async fn list_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        let playlists = self
            .with_retry("getPlaylists", || {
                self.limited(get_playlists(&self.client, &self.server))
            })
            .await?;

        Ok(playlists
            .into_iter()
            .map(|p| RemotePlaylist {
                id: p.id,
                name: p.name,
            })
            .collect())
    }

    async fn get_members(&self, playlist_id: &str) -> Result<Vec<TrackId>> {
        let entries = self
            .with_retry("getPlaylist", || {
                self.limited(get_playlist_entries(&self.client, &self.server, playlist_id))
            })
            .await?;

        Ok(entries.into_iter().map(|e| e.id).collect())
    }

    async fn create_playlist(&self, name: &str, track_ids: &[TrackId]) -> Result<PlaylistId> {
        if self.skip_write(format_args!(
            "create '{}' with {} tracks",
            name,
            track_ids.len()
        )) {
            return Ok(format!("dry-run:{}", name));
        }

        self.with_retry("createPlaylist", || {
            self.limited(create_playlist(&self.client, &self.server, name, track_ids))
        })
        .await?;

        // createPlaylist does not reliably return the new id, so look it up by name.
        let id_unknown = || CreatedIdUnknown {
            name: name.to_string(),
        };
        let playlists = self
            .with_retry("getPlaylists", || {
                self.limited(get_playlists(&self.client, &self.server))
            })
            .await
            .wrap_err_with(id_unknown)?;
        let created = find_playlist_by_name(&playlists, name)
            .ok_or_else(|| color_eyre::Report::new(id_unknown()))?;

        log::info!("Created playlist '{}' (ID: {})", name, created.id);
        Ok(created.id.clone())
    }

    async fn add_members(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        if track_ids.is_empty()
            || self.skip_write(format_args!(
                "add {} tracks to playlist {}",
                track_ids.len(),
                playlist_id
            ))
        {
            return Ok(());
        }

        self.with_retry("updatePlaylist(add)", || {
            self.limited(add_songs_to_playlist(
                &self.client,
                &self.server,
                playlist_id,
                track_ids,
            ))
        })
        .await
    }

    async fn remove_members_by_index(&self, playlist_id: &str, indices: &[usize]) -> Result<()> {
        if indices.is_empty()
            || self.skip_write(format_args!(
                "remove indices {:?} from playlist {}",
                indices, playlist_id
            ))
        {
            return Ok(());
        }

        self.with_retry("updatePlaylist(remove)", || {
            self.limited(remove_songs_by_index(
                &self.client,
                &self.server,
                playlist_id,
                indices,
            ))
        })
        .await
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        if self.skip_write(format_args!("delete playlist {}", playlist_id)) {
            return Ok(());
        }

        self.with_retry("deletePlaylist", || {
            self.limited(delete_playlist(&self.client, &self.server, playlist_id))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsonic_rs::{SubsonicCredentials, normalize_base_url};

    fn adapter(dry_run: bool) -> SubsonicHttpAdapter {
        let server = SubsonicServer {
            // Nothing listens here; any request that escapes dry-run fails fast.
            base_url: normalize_base_url("http://127.0.0.1:9/rest").unwrap(),
            credentials: SubsonicCredentials::Password {
                username: "alice".into(),
                password: "pw".into(),
            },
            api_version: "1.16.1".into(),
            client_name: "test".into(),
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
        };
        SubsonicHttpAdapter::new(
            server,
            AdapterOptions {
                connect_timeout: Duration::from_secs(2),
                requests_per_second: 100,
                retry_attempts: 0,
                dry_run,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_dry_run_writes_are_not_sent() {
        let adapter = adapter(true);
        let ids = vec!["1".to_string(), "2".to_string()];

        assert_eq!(
            adapter.create_playlist("Mix", &ids).await.unwrap(),
            "dry-run:Mix"
        );
        adapter.add_members("p1", &ids).await.unwrap();
        adapter.remove_members_by_index("p1", &[0, 3]).await.unwrap();
        adapter.delete_playlist("p1").await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_mutations_are_not_sent() {
        let adapter = adapter(false);
        adapter.add_members("p1", &[]).await.unwrap();
        adapter.remove_members_by_index("p1", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let adapter = adapter(false);
        assert!(adapter.search("anything").await.is_err());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let server = adapter(true).server.clone();
        let result = SubsonicHttpAdapter::new(
            server,
            AdapterOptions {
                connect_timeout: Duration::from_secs(1),
                requests_per_second: 0,
                retry_attempts: 0,
                dry_run: true,
            },
        );
        assert!(result.is_err());
    }
}
