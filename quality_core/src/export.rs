//! Markdown export of the rendered report.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::info;

use crate::render::{RenderedReport, ReportSection};
use crate::selection::SelectionState;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no report has been rendered yet")]
    NotReady,
    #[error("failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn export_markdown(report: &RenderedReport, selection: &SelectionState) -> String {
    let mut out = String::from("# Quality report\n\n");
    let area = selection
        .area
        .as_ref()
        .map(|area| area.name.as_str())
        .unwrap_or("-");
    let topic = selection
        .topic
        .as_ref()
        .map(|topic| topic.key())
        .unwrap_or("-");
    let _ = writeln!(out, "- Area: {area}");
    let _ = writeln!(out, "- Topic: {topic}");
    if let Some(dataset) = &selection.dataset {
        let _ = writeln!(
            out,
            "- Dataset: {} (feature {})",
            dataset.dataset_id, dataset.feature_id
        );
    }

    for section in report.sections() {
        out.push('\n');
        match section {
            ReportSection::Header(title) => {
                let _ = writeln!(out, "## {title}");
            }
            ReportSection::TrafficLight { label, image_key } => {
                let _ = writeln!(out, "![{label}]({image_key}.png)");
            }
            ReportSection::OverallValue(value) => {
                let _ = writeln!(out, "**Value:** {value}");
            }
            ReportSection::OverallText(text) => {
                let _ = writeln!(out, "{text}");
            }
            ReportSection::Indicators(entries) => {
                out.push_str("## Indicators\n\n| Indicator | Value | Label | Text |\n|---|---|---|---|\n");
                for entry in entries {
                    let _ = writeln!(
                        out,
                        "| {} | {} | {} | {} |",
                        entry.name, entry.value, entry.label, entry.text
                    );
                }
            }
        }
    }
    out
}

/// Write the report into `dir` and return the file path.
pub fn write_export(
    report: &RenderedReport,
    selection: &SelectionState,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let area = selection
        .area
        .as_ref()
        .map(|area| slug(&area.name))
        .unwrap_or_else(|| "area".to_string());
    let path = dir.join(format!("quality_report_{area}_{stamp}.md"));
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    std::fs::write(&path, export_markdown(report, selection)).map_err(|source| {
        ExportError::Io {
            path: path.clone(),
            source,
        }
    })?;
    info!(target: "quality::export", path = %path.display(), "export.written");
    Ok(path)
}

fn slug(text: &str) -> String {
    let slug: String = text
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = slug.trim_matches('_');
    if trimmed.is_empty() {
        "area".to_string()
    } else {
        trimmed.to_string()
    }
}
