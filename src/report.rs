use crate::models::{OutcomeStatus, SyncOutcome};

/// One line per playlist, e.g. `Chill: diffed -2 +5 (1 unresolved)`.
pub fn format_outcome(outcome: &SyncOutcome) -> String {
    let body = match &outcome.status {
        OutcomeStatus::Created => format!("created with {} tracks", outcome.added),
        OutcomeStatus::Replaced => format!("replaced with {} tracks", outcome.added),
        OutcomeStatus::Diffed => format!("diffed -{} +{}", outcome.removed, outcome.added),
        OutcomeStatus::Skipped(reason) => format!("skipped ({})", reason),
        OutcomeStatus::Failed(reason) => format!("FAILED: {}", reason),
        OutcomeStatus::ReplaceWindowFailed(reason) => format!(
            "DELETED BUT NOT RECREATED, playlist is missing and needs manual recovery: {}",
            reason
        ),
    };

    let mut line = format!("{}: {}", outcome.playlist_name, body);
    if outcome.unresolved > 0 {
        line.push_str(&format!(" ({} unresolved)", outcome.unresolved));
    }
    if let Some(note) = &outcome.note {
        line.push_str(&format!(" [{}]", note));
    }
    line
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub processed: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub replace_window_failed: usize,
}

pub fn summarize(outcomes: &[SyncOutcome]) -> Summary {
    Summary {
        processed: outcomes.len(),
        created: outcomes.iter().filter(|o| o.created()).count(),
        skipped: outcomes
            .iter()
            .filter(|o| o.skipped_reason().is_some())
            .count(),
        failed: outcomes.iter().filter(|o| o.is_failure()).count(),
        replace_window_failed: outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::ReplaceWindowFailed(_)))
            .count(),
    }
}

pub fn render(outcomes: &[SyncOutcome]) -> String {
    if outcomes.is_empty() {
        return "No playlists processed.".to_string();
    }

    let mut lines: Vec<String> = outcomes.iter().map(format_outcome).collect();
    let summary = summarize(outcomes);
    lines.push(format!(
        "{} playlists processed: {} created, {} skipped, {} failed",
        summary.processed, summary.created, summary.skipped, summary.failed
    ));
    lines.join("\n")
}
