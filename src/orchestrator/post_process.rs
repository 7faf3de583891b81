//! Post-commit processing utilities.
//!
//! Handles auto-save and exports after a dashboard commits a result.

use crate::cli::Cli;
use crate::dashboards::{DashboardUpdate, Feature};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File layout of an exported result.
#[derive(Debug, Serialize)]
struct ExportedResult<'a> {
    feature: Feature,
    slot: &'a str,
    exported_at: String,
    result: &'a serde_json::Value,
}

/// Result of post-commit processing, ready for presentation layers.
pub(crate) struct ProcessedUpdate {
    pub export_messages: Vec<String>,
    pub auto_saved_path: Option<PathBuf>,
}

/// Process a dashboard update: auto-save and export committed results. Failures pass through.
pub(crate) fn process_update(args: &Cli, auto_save: bool, update: &DashboardUpdate) -> ProcessedUpdate {
    let DashboardUpdate::Committed {
        feature, slot, json, ..
    } = update
    else {
        return ProcessedUpdate {
            export_messages: Vec::new(),
            auto_saved_path: None,
        };
    };
    if json.is_null() {
        return ProcessedUpdate {
            export_messages: vec![format!("{feature} result has no JSON form; not saved")],
            auto_saved_path: None,
        };
    }

    let auto_saved_path = if auto_save {
        match save_result(*feature, slot, json) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(%feature, "auto-save failed: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let mut export_messages = Vec::new();
    if let Some(export_path) = args.export_json.as_deref() {
        match export_json(export_path, *feature, slot, json) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedUpdate {
        export_messages,
        auto_saved_path,
    }
}

/// Write one committed result to `path`, replacing any earlier export.
pub(crate) fn export_json(
    path: &Path,
    feature: Feature,
    slot: &str,
    result: &serde_json::Value,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let doc = ExportedResult {
        feature,
        slot,
        exported_at: timestamp(),
        result,
    };
    let body = serde_json::to_string_pretty(&doc)?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Save under the user's data directory, one file per commit.
pub(crate) fn save_result(
    feature: Feature,
    slot: &str,
    result: &serde_json::Value,
) -> Result<PathBuf> {
    let dir = dirs::data_local_dir()
        .context("no local data directory on this platform")?
        .join("wfm-dash")
        .join("results");
    let stamp = time::OffsetDateTime::now_utc().unix_timestamp();
    let path = dir.join(format!("{}-{}-{stamp}.json", feature_slug(feature), file_safe(slot)));
    export_json(&path, feature, slot, result)?;
    Ok(path)
}

fn feature_slug(feature: Feature) -> &'static str {
    match feature {
        Feature::Scheduling => "scheduling",
        Feature::Retention => "retention",
        Feature::LearningPath => "learning-path",
        Feature::Sentiment => "sentiment",
    }
}

fn file_safe(slot: &str) -> String {
    slot.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn slot_names_become_file_safe() {
        assert_eq!(file_safe("department:Sales Floor"), "department_Sales_Floor");
        assert_eq!(file_safe("2024-01-01 to 2024-01-07"), "2024-01-01_to_2024-01-07");
    }

    #[test]
    fn export_wraps_result_with_feature_and_slot() {
        let dir = std::env::temp_dir().join(format!("wfm-dash-export-{}", std::process::id()));
        let path = dir.join("nested").join("out.json");
        let result = serde_json::json!({"average_sentiment": 71.5});

        export_json(&path, Feature::Sentiment, "Electronics", &result).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["feature"], "sentiment");
        assert_eq!(written["slot"], "Electronics");
        assert_eq!(written["result"], result);
        assert!(written["exported_at"].as_str().is_some_and(|s| !s.is_empty()));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn null_result_is_neither_saved_nor_exported() {
        let path = std::env::temp_dir().join(format!("wfm-dash-null-{}.json", std::process::id()));
        let args = Cli::parse_from(["wfm-dash", "--text", "--export-json", path.to_str().unwrap()]);
        let update = DashboardUpdate::Committed {
            feature: Feature::Retention,
            slot: "workforce".into(),
            lines: Vec::new(),
            json: serde_json::Value::Null,
        };

        let processed = process_update(&args, true, &update);
        assert!(processed.auto_saved_path.is_none());
        assert_eq!(
            processed.export_messages,
            vec!["Retention result has no JSON form; not saved".to_string()]
        );
        assert!(!path.exists());
    }
}
