use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use color_eyre::eyre::{Result, WrapErr, eyre};
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::models::TrackReference;

/// Zero-based column positions in a snapshot CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvLayout {
    pub track: usize,
    pub album: usize,
    pub artists: usize,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            track: 0,
            album: 1,
            artists: 2,
        }
    }
}

/// A snapshot CSV and the playlist it describes (its file stem).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub playlist_name: String,
    pub path: PathBuf,
}

static FOLDER_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<dd>\d{2})-(?P<mm>\d{2})-(?P<yy>\d{2})_(?P<hh>\d{2})(?P<mi>\d{2})$")
        .expect("folder timestamp pattern is valid")
});

/// Parses the `DD-MM-YY_HHMM` suffix of an export folder name. Years are 20YY.
pub fn parse_folder_timestamp(name: &str) -> Option<NaiveDateTime> {
    let caps = FOLDER_TIMESTAMP.captures(name)?;
    let num = |key: &str| caps[key].parse::<u32>().ok();

    let year = 2000 + num("yy")? as i32;
    NaiveDate::from_ymd_opt(year, num("mm")?, num("dd")?)?.and_hms_opt(num("hh")?, num("mi")?, 0)
}

/// The direct child directory of `root` with the most recent timestamped name.
pub fn latest_snapshot_folder(root: &Path) -> Result<PathBuf> {
    let mut newest: Option<(NaiveDateTime, PathBuf)> = None;

    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.wrap_err_with(|| format!("Failed to read {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(ts) = entry.file_name().to_str().and_then(parse_folder_timestamp) else {
            log::debug!("Ignoring non-timestamped folder {}", entry.path().display());
            continue;
        };
        if newest.as_ref().is_none_or(|(best, _)| ts > *best) {
            newest = Some((ts, entry.into_path()));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| eyre!("No timestamped snapshot folders found in {}", root.display()))
}

/// `*.csv` files directly inside `folder`, sorted by path.
pub fn list_csvs(folder: &Path) -> Result<Vec<SnapshotFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.wrap_err_with(|| format!("Failed to read {}", folder.display()))?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !entry.file_type().is_file() || !is_csv {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push(SnapshotFile {
                playlist_name: stem.to_string(),
                path: path.to_path_buf(),
            });
        }
    }

    Ok(files)
}

/// Reads one snapshot CSV into references, in file order.
///
/// The first row is a header. The artists column may hold several names
/// joined by `artist_sep`; only the first is used. Rows without a title or
/// artist are dropped.
pub fn read_snapshot_csv(
    path: &Path,
    layout: &CsvLayout,
    artist_sep: &str,
) -> Result<Vec<TrackReference>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .wrap_err_with(|| format!("Failed to open snapshot {}", path.display()))?;

    let mut references = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.wrap_err_with(|| format!("Bad CSV row {} in {}", line + 2, path.display()))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let track = record.get(layout.track).unwrap_or_default();
        let album = record.get(layout.album).unwrap_or_default();
        let artists = record.get(layout.artists).unwrap_or_default();
        let artist = artists.split(artist_sep).next().unwrap_or_default();

        if let Some(reference) = TrackReference::new(artist, track, Some(album)) {
            references.push(reference);
        }
    }

    Ok(references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_folder_timestamp() {
        let ts = parse_folder_timestamp("spotify_export_05-03-25_1830").unwrap();
        assert_eq!(ts.to_string(), "2025-03-05 18:30:00");
    }

    #[test]
    fn test_parse_folder_timestamp_rejects_invalid() {
        assert!(parse_folder_timestamp("export_31-02-25_1830").is_none());
        assert!(parse_folder_timestamp("export_05-03-25_2561").is_none());
        assert!(parse_folder_timestamp("export_05-03-25_1830_old").is_none());
        assert!(parse_folder_timestamp("random").is_none());
    }

    #[test]
    fn test_latest_snapshot_folder_picks_newest_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("export_31-12-24_2359")).unwrap();
        fs::create_dir(dir.path().join("export_01-01-25_0001")).unwrap();
        fs::create_dir(dir.path().join("export_15-06-24_1200")).unwrap();
        fs::create_dir(dir.path().join("scratch")).unwrap();
        fs::write(dir.path().join("notes_02-02-25_1000"), "file, not folder").unwrap();

        let latest = latest_snapshot_folder(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "export_01-01-25_0001");
    }

    #[test]
    fn test_latest_snapshot_folder_none_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("scratch")).unwrap();
        assert!(latest_snapshot_folder(dir.path()).is_err());
    }

    #[test]
    fn test_list_csvs_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Workout.csv"), "").unwrap();
        fs::write(dir.path().join("Chill.CSV"), "").unwrap();
        fs::write(dir.path().join("readme.txt"), "").unwrap();

        let files = list_csvs(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.playlist_name.as_str()).collect();
        assert_eq!(names, vec!["Chill", "Workout"]);
    }

    #[test]
    fn test_read_snapshot_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Chill.csv");
        fs::write(
            &path,
            "Track Name,Album Name,Artist Name(s)\n\
             Teardrop,Mezzanine,Massive Attack\n\
             \"Re: Stacks\",\"For Emma, Forever Ago\",Bon Iver\n\
             Get Lucky,,Daft Punk;Pharrell Williams;Nile Rodgers\n\
             ,Orphan Album,Nobody\n\
             No Artist,Album,\n\
             \n",
        )
        .unwrap();

        let refs = read_snapshot_csv(&path, &CsvLayout::default(), ";").unwrap();

        assert_eq!(
            refs,
            vec![
                TrackReference::new("Massive Attack", "Teardrop", Some("Mezzanine")).unwrap(),
                TrackReference::new("Bon Iver", "Re: Stacks", Some("For Emma, Forever Ago"))
                    .unwrap(),
                TrackReference::new("Daft Punk", "Get Lucky", None).unwrap(),
            ]
        );
    }

    #[test]
    fn test_read_snapshot_csv_custom_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("List.csv");
        fs::write(&path, "artist,title\nFoo | Bar,Song\n").unwrap();

        let layout = CsvLayout {
            track: 1,
            album: 5,
            artists: 0,
        };
        let refs = read_snapshot_csv(&path, &layout, "|").unwrap();
        assert_eq!(refs, vec![TrackReference::new("Foo", "Song", None).unwrap()]);
    }
}
