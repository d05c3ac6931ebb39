//! Readers for the externally produced track lists: timestamped CSV export
//! folders (full snapshots) and XLSX diff sheets (added/removed blocks).

use std::path::{Path, PathBuf};

use color_eyre::eyre::{OptionExt, Result};

use crate::models::TrackReference;

pub mod diff;
pub mod snapshot;

use diff::{DiffInput, most_recent_diff_for, read_diff_xlsx};
use snapshot::{CsvLayout, SnapshotFile, latest_snapshot_folder, list_csvs, read_snapshot_csv};

/// Full desired membership per playlist name.
pub trait SnapshotSource {
    fn playlist_names(&self) -> Result<Vec<String>>;
    fn read(&self, playlist_name: &str) -> Result<Vec<TrackReference>>;
}

/// Most recent add/remove lists per playlist name.
pub trait DiffSource {
    fn latest_diff(&self, playlist_name: &str) -> Result<Option<DiffInput>>;
}

/// Snapshot CSVs from the newest timestamped folder under an exports root.
pub struct CsvSnapshotSource {
    folder: PathBuf,
    files: Vec<SnapshotFile>,
    layout: CsvLayout,
    artist_sep: String,
}

impl CsvSnapshotSource {
    pub fn from_exports_root(root: &Path, layout: CsvLayout, artist_sep: &str) -> Result<Self> {
        let folder = latest_snapshot_folder(root)?;
        Self::from_folder(&folder, layout, artist_sep)
    }

    pub fn from_folder(folder: &Path, layout: CsvLayout, artist_sep: &str) -> Result<Self> {
        Ok(Self {
            folder: folder.to_path_buf(),
            files: list_csvs(folder)?,
            layout,
            artist_sep: artist_sep.to_string(),
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

impl SnapshotSource for CsvSnapshotSource {
    fn playlist_names(&self) -> Result<Vec<String>> {
        Ok(self.files.iter().map(|f| f.playlist_name.clone()).collect())
    }

    fn read(&self, playlist_name: &str) -> Result<Vec<TrackReference>> {
        let file = self
            .files
            .iter()
            .find(|f| f.playlist_name == playlist_name)
            .ok_or_eyre(format!("No snapshot CSV for '{}'", playlist_name))?;
        read_snapshot_csv(&file.path, &self.layout, &self.artist_sep)
    }
}

/// XLSX diff sheets in a single folder, matched to playlists by file name.
pub struct XlsxDiffSource {
    root: PathBuf,
}

impl XlsxDiffSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl DiffSource for XlsxDiffSource {
    fn latest_diff(&self, playlist_name: &str) -> Result<Option<DiffInput>> {
        match most_recent_diff_for(&self.root, playlist_name)? {
            Some(path) => {
                log::debug!("Diff for '{}': {}", playlist_name, path.display());
                read_diff_xlsx(&path).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_csv_snapshot_source_reads_newest_folder() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("export_01-01-24_0000");
        let new = dir.path().join("export_01-01-25_0000");
        fs::create_dir(&old).unwrap();
        fs::create_dir(&new).unwrap();
        fs::write(old.join("Stale.csv"), "t,a,r\nX,Y,Z\n").unwrap();
        fs::write(new.join("Chill.csv"), "t,a,r\nTeardrop,Mezzanine,Massive Attack\n").unwrap();

        let source =
            CsvSnapshotSource::from_exports_root(dir.path(), CsvLayout::default(), ";").unwrap();

        assert_eq!(source.folder(), new.as_path());
        assert_eq!(source.playlist_names().unwrap(), vec!["Chill".to_string()]);
        let refs = source.read("Chill").unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].artist(), "Massive Attack");
        assert!(source.read("Stale").is_err());
    }

    #[test]
    fn test_xlsx_diff_source_without_match() {
        let dir = tempfile::tempdir().unwrap();
        let source = XlsxDiffSource::new(dir.path());
        assert!(source.latest_diff("Chill").unwrap().is_none());
    }
}
