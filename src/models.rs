use std::collections::BTreeSet;
use std::fmt;

/// Catalog track identifier. Opaque to us; equality is exact-string.
pub type TrackId = String;

/// Catalog playlist identifier.
pub type PlaylistId = String;

/// A free-text description of a desired track, not yet resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackReference {
    artist: String,
    title: String,
    album: Option<String>,
}

impl TrackReference {
    /// Builds a reference from raw parser output.
    ///
    /// Artist and title are trimmed and must be non-empty, otherwise the row is
    /// dropped here and never reaches resolution. A blank album becomes `None`.
    pub fn new(artist: &str, title: &str, album: Option<&str>) -> Option<Self> {
        let artist = artist.trim();
        let title = title.trim();
        if artist.is_empty() || title.is_empty() {
            return None;
        }

        let album = album
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Some(Self {
            artist: artist.to_string(),
            title: title.to_string(),
            album,
        })
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    /// The free-text query sent to the catalog search: `"{artist} {title}[ {album}]"`.
    pub fn search_query(&self) -> String {
        match self.album() {
            Some(album) => format!("{} {} {}", self.artist, self.title, album),
            None => format!("{} {}", self.artist, self.title),
        }
    }
}

impl fmt::Display for TrackReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)?;
        if let Some(album) = self.album() {
            write!(f, " ({})", album)?;
        }
        Ok(())
    }
}

/// A single hit returned by the catalog search, in the catalog's relevance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub id: TrackId,
    pub artist: String,
    pub title: String,
}

/// A playlist as listed by the catalog (without members).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePlaylist {
    pub id: PlaylistId,
    pub name: String,
}

/// Snapshot of a remote playlist's membership at query time.
///
/// Stale as soon as anything mutates the playlist; there is no versioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistState {
    pub id: PlaylistId,
    pub name: String,
    pub members: Vec<TrackId>,
}

/// Mutations needed to bring a playlist closer to its target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_add: Vec<TrackId>,
    pub to_remove_indices: BTreeSet<usize>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove_indices.is_empty()
    }
}

/// What happened to one playlist during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Created,
    Replaced,
    Diffed,
    Skipped(String),
    /// Catalog search or mutation failed; the playlist was left as the failure found it.
    Failed(String),
    /// Delete succeeded but recreate failed. The playlist no longer exists remotely.
    ReplaceWindowFailed(String),
}

/// Per-playlist result record for the end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub playlist_name: String,
    pub status: OutcomeStatus,
    pub added: usize,
    pub removed: usize,
    /// References that produced no catalog match.
    pub unresolved: usize,
    /// Extra detail for the report, e.g. a create whose id is unknown.
    pub note: Option<String>,
}

impl SyncOutcome {
    pub fn new(playlist_name: impl Into<String>, status: OutcomeStatus) -> Self {
        Self {
            playlist_name: playlist_name.into(),
            status,
            added: 0,
            removed: 0,
            unresolved: 0,
            note: None,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self.status, OutcomeStatus::Created)
    }

    pub fn skipped_reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            OutcomeStatus::Failed(_) | OutcomeStatus::ReplaceWindowFailed(_)
        )
    }
}
