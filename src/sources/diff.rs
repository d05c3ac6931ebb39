use std::path::{Path, PathBuf};
use std::time::SystemTime;

use calamine::{Data, Reader, open_workbook_auto};
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use walkdir::WalkDir;

use crate::models::TrackReference;

/// Additions and removals read from one diff sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffInput {
    pub source: PathBuf,
    pub added: Vec<TrackReference>,
    pub removed: Vec<TrackReference>,
}

/// The newest `*.xlsx` in `root` whose file stem contains `playlist_name` (case-insensitive).
pub fn most_recent_diff_for(root: &Path, playlist_name: &str) -> Result<Option<PathBuf>> {
    let needle = playlist_name.to_lowercase();
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.wrap_err_with(|| format!("Failed to read {}", root.display()))?;
        let path = entry.path();
        let is_xlsx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
        let matches_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.to_lowercase().contains(&needle));
        if !entry.file_type().is_file() || !is_xlsx || !matches_name {
            continue;
        }

        let modified = entry
            .metadata()
            .wrap_err_with(|| format!("Failed to stat {}", path.display()))?
            .modified()
            .wrap_err_with(|| format!("No modification time for {}", path.display()))?;
        if newest.as_ref().is_none_or(|(best, _)| modified > *best) {
            newest = Some((modified, entry.into_path()));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// Reads the first worksheet of a diff workbook.
pub fn read_diff_xlsx(path: &Path) -> Result<DiffInput> {
    let mut workbook = open_workbook_auto(path)
        .wrap_err_with(|| format!("Failed to open diff workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_eyre(format!("{} has no worksheets", path.display()))?
        .wrap_err_with(|| format!("Failed to read first worksheet of {}", path.display()))?;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let (added, removed) = parse_diff_rows(&rows);
    Ok(DiffInput {
        source: path.to_path_buf(),
        added,
        removed,
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Column positions for one side (added or removed) of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockColumns {
    title: usize,
    artist: Option<usize>,
    album: Option<usize>,
}

fn find_header(header: &[String], name: &str, from: usize) -> Option<usize> {
    header
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, h)| h.trim().eq_ignore_ascii_case(name))
        .map(|(i, _)| i)
}

/// Locates the `Added | Artist | Album` and `Removed | Artist | Album` blocks.
///
/// The removed block uses the first `Artist`/`Album` columns to the right of
/// `Removed`, falling back to the first ones in the sheet.
fn locate_blocks(header: &[String]) -> (Option<BlockColumns>, Option<BlockColumns>) {
    let first_artist = find_header(header, "Artist", 0);
    let first_album = find_header(header, "Album", 0);

    let added = find_header(header, "Added", 0).map(|title| BlockColumns {
        title,
        artist: find_header(header, "Artist", title + 1).or(first_artist),
        album: find_header(header, "Album", title + 1).or(first_album),
    });
    let removed = find_header(header, "Removed", 0).map(|title| BlockColumns {
        title,
        artist: find_header(header, "Artist", title + 1).or(first_artist),
        album: find_header(header, "Album", title + 1).or(first_album),
    });

    (added, removed)
}

fn read_block(rows: &[Vec<String>], block: BlockColumns) -> Vec<TrackReference> {
    let cell = |row: &[String], idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
    };

    rows.iter()
        .filter_map(|row| {
            let title = cell(row, Some(block.title));
            let artist = cell(row, block.artist);
            let album = cell(row, block.album);
            TrackReference::new(&artist, &title, Some(&album))
        })
        .collect()
}

/// Splits sheet rows (header first) into added and removed references.
pub fn parse_diff_rows(rows: &[Vec<String>]) -> (Vec<TrackReference>, Vec<TrackReference>) {
    let Some((header, body)) = rows.split_first() else {
        return (Vec::new(), Vec::new());
    };

    let (added_cols, removed_cols) = locate_blocks(header);
    let added = added_cols
        .map(|cols| read_block(body, cols))
        .unwrap_or_default();
    let removed = removed_cols
        .map(|cols| read_block(body, cols))
        .unwrap_or_default();

    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_parse_diff_rows_side_by_side_blocks() {
        let rows = vec![
            row(&["Added", "Artist", "Album", "", "", "Removed", "Artist", "Album"]),
            row(&["One More Time", "Daft Punk", "Discovery", "", "", "Teardrop", "Massive Attack", "Mezzanine"]),
            row(&["Get Lucky", "Daft Punk", "", "", "", "", "", ""]),
            row(&["", "", "", "", "", "Angel", "Massive Attack", ""]),
        ];

        let (added, removed) = parse_diff_rows(&rows);

        assert_eq!(
            added,
            vec![
                TrackReference::new("Daft Punk", "One More Time", Some("Discovery")).unwrap(),
                TrackReference::new("Daft Punk", "Get Lucky", None).unwrap(),
            ]
        );
        assert_eq!(
            removed,
            vec![
                TrackReference::new("Massive Attack", "Teardrop", Some("Mezzanine")).unwrap(),
                TrackReference::new("Massive Attack", "Angel", None).unwrap(),
            ]
        );
    }

    #[test]
    fn test_parse_diff_rows_without_removed_block() {
        let rows = vec![
            row(&["Added", "Artist", "Album"]),
            row(&["Song", "Band", "Record"]),
        ];
        let (added, removed) = parse_diff_rows(&rows);
        assert_eq!(added.len(), 1);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_parse_diff_rows_removed_falls_back_to_shared_columns() {
        let rows = vec![
            row(&["Artist", "Album", "Added", "Removed"]),
            row(&["Band", "Record", "", "Old Song"]),
        ];
        let (added, removed) = parse_diff_rows(&rows);
        assert!(added.is_empty());
        assert_eq!(
            removed,
            vec![TrackReference::new("Band", "Old Song", Some("Record")).unwrap()]
        );
    }

    #[test]
    fn test_parse_diff_rows_empty_sheet() {
        let (added, removed) = parse_diff_rows(&[]);
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::String("  x ".into())), "x");
        assert_eq!(cell_text(&Data::Float(1999.0)), "1999");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn test_most_recent_diff_for_matches_name_and_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();

        let touch = |name: &str, age_secs: u64| {
            let path = dir.path().join(name);
            fs::write(&path, "").unwrap();
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(now - Duration::from_secs(age_secs))
                .unwrap();
        };
        touch("chill_diff_2025-01-01.xlsx", 300);
        touch("CHILL_diff_2025-02-01.xlsx", 100);
        touch("Workout_diff.xlsx", 10);
        touch("Chill_notes.csv", 1);

        let found = most_recent_diff_for(dir.path(), "Chill").unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "CHILL_diff_2025-02-01.xlsx");

        assert!(most_recent_diff_for(dir.path(), "Jazz").unwrap().is_none());
    }
}
