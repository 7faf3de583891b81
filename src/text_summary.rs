//! Text output builders for the headless modes.
//!
//! Progress lines are derived from consecutive status snapshots; the summary is formatted from
//! a committed dashboard update.

use crate::dashboards::DashboardUpdate;
use crate::engine::FINALIZING_MESSAGE;
use crate::model::{RunPhase, RunStatus, StageStatus};
use anyhow::{bail, Result};
use time::macros::format_description;
use time::OffsetDateTime;

/// Pre-formatted lines for text output.
#[derive(Debug)]
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Lines describing what changed between two snapshots of the same run.
pub(crate) fn progress_lines(prev: &RunStatus, next: &RunStatus) -> Vec<String> {
    let mut lines = Vec::new();
    if next.run_id != prev.run_id && next.phase.is_in_flight() {
        lines.push(format!("== run {} ==", next.run_id));
    }
    // A commit can land in the same snapshot as the last stage completing.
    if !next.shows_progress() && next.phase != RunPhase::Committed {
        return lines;
    }
    let same_run = next.run_id == prev.run_id;
    for (i, stage) in next.stages.iter().enumerate() {
        let before = same_run
            .then(|| prev.stages.get(i))
            .flatten()
            .map_or(StageStatus::Waiting, |s| s.status);
        if stage.status == before {
            continue;
        }
        match stage.status {
            StageStatus::Working => lines.push(format!(
                "[{:>3}s] > {}: {}",
                next.elapsed_seconds, stage.display_name, stage.working_message
            )),
            StageStatus::Completed => lines.push(format!(
                "[{:>3}s] + {}: {}",
                next.elapsed_seconds, stage.display_name, stage.done_message
            )),
            StageStatus::Waiting => {}
        }
    }
    if next.phase == RunPhase::Finalizing && prev.phase != RunPhase::Finalizing {
        lines.push(format!("[{:>3}s] {FINALIZING_MESSAGE}", next.elapsed_seconds));
    }
    if let Some(fact) = next.current_fact.as_deref() {
        if !same_run || prev.current_fact.as_deref() != Some(fact) {
            lines.push(format!("        tip: {fact}"));
        }
    }
    lines
}

/// Build a text summary from a committed update. A failed update is returned as an error.
pub(crate) fn build_text_summary(
    update: &DashboardUpdate,
    committed_at: OffsetDateTime,
) -> Result<TextSummary> {
    let (feature, slot, body) = match update {
        DashboardUpdate::Committed {
            feature,
            slot,
            lines,
            ..
        } => (feature, slot, lines),
        DashboardUpdate::Failed { feature, message } => bail!("{feature} failed: {message}"),
    };

    let when = committed_at
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default();
    let mut lines = vec![format!("{feature} ({slot}) at {when}")];
    lines.extend(body.iter().cloned());
    Ok(TextSummary { lines })
}
