use crate::config::RunConfig;
use crate::core::connectivity::ExportRow;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONNECTIONS_FILE: &str = "connections.csv";
pub const SUSPICIOUS_FILE: &str = "suspicious.csv";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Counters and settings reported alongside the exported table.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub finished_at: String,
    pub submissions: usize,
    pub references: usize,
    pub files_checked: usize,
    pub figures_kept: usize,
    pub extraction_failures: usize,
    pub units_dispatched: usize,
    pub units_recorded: usize,
    pub units_skipped: usize,
    pub units_failed: usize,
    pub rows_exported: usize,
    pub rows_suspicious: usize,
    pub elapsed_secs: f64,
    pub config: RunConfig,
}

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub connections: PathBuf,
    pub suspicious: PathBuf,
    pub summary: PathBuf,
}

/// Rows whose best image match falls below `error_threshold`, closest first.
pub fn rank(rows: &[ExportRow], error_threshold: f64) -> Vec<ExportRow> {
    let mut flagged: Vec<ExportRow> = rows
        .iter()
        .filter(|row| row.mse_min < error_threshold)
        .cloned()
        .collect();
    flagged.sort_by(|a, b| {
        a.mse_min
            .total_cmp(&b.mse_min)
            .then_with(|| b.ssim_max.total_cmp(&a.ssim_max))
            .then_with(|| a.entity_id_a.cmp(&b.entity_id_a))
            .then_with(|| a.entity_id_b.cmp(&b.entity_id_b))
    });
    flagged
}

pub fn write_csv(path: &Path, rows: &[ExportRow]) -> Result<(), ExportError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", ExportRow::HEADER.join(","))?;
    for row in rows {
        let values: Vec<String> = row.values().iter().map(|v| format_value(*v)).collect();
        writeln!(
            out,
            "{},{},{}",
            escape_field(&row.entity_id_a),
            escape_field(&row.entity_id_b),
            values.join(",")
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json + "\n")?;
    Ok(())
}

/// Write the full table, the ranked subset and the summary into `output_dir`.
pub fn write_report(
    output_dir: &Path,
    rows: &[ExportRow],
    summary: &mut RunSummary,
) -> Result<ReportPaths, ExportError> {
    fs::create_dir_all(output_dir)?;

    let paths = ReportPaths {
        connections: output_dir.join(CONNECTIONS_FILE),
        suspicious: output_dir.join(SUSPICIOUS_FILE),
        summary: output_dir.join(SUMMARY_FILE),
    };

    let flagged = rank(rows, summary.config.error_threshold);
    summary.rows_exported = rows.len();
    summary.rows_suspicious = flagged.len();

    write_csv(&paths.connections, rows)?;
    write_csv(&paths.suspicious, &flagged)?;
    write_summary(&paths.summary, summary)?;

    Ok(paths)
}

fn format_value(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{}", value)
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{AggregatedMetrics, Stats};
    use crate::core::connectivity::ConnectivityStore;
    use tempfile::TempDir;

    fn metrics(mse_min: f64, ssim_max: f64) -> AggregatedMetrics {
        AggregatedMetrics {
            mse: Stats { min: mse_min, max: mse_min + 10.0, mean: mse_min + 5.0 },
            ssim: Stats { min: 0.1, max: ssim_max, mean: 0.5 },
            psnr: Stats { min: 12.5, max: f64::INFINITY, mean: f64::INFINITY },
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            finished_at: "2024-04-02T00:00:00+00:00".to_string(),
            submissions: 3,
            references: 1,
            files_checked: 7,
            figures_kept: 6,
            extraction_failures: 0,
            units_dispatched: 6,
            units_recorded: 4,
            units_skipped: 2,
            units_failed: 0,
            rows_exported: 0,
            rows_suspicious: 0,
            elapsed_secs: 1.5,
            config: RunConfig::default(),
        }
    }

    #[test]
    fn test_rank_filters_and_orders() {
        let mut store = ConnectivityStore::new();
        store.add("a", "b", metrics(0.0, 0.8), true);
        store.add("a", "c", metrics(0.0, 0.99), true);
        store.add("b", "c", metrics(42.0, 0.3), true);
        let rows = store.export();

        let flagged = rank(&rows, 0.01);
        assert_eq!(flagged.len(), 4);
        // Equal MSE: higher SSIM first
        assert_eq!(flagged[0].ssim_max, 0.99);
        assert!(flagged.iter().all(|row| row.mse_min < 0.01));

        assert!(rank(&rows, 0.0).is_empty());
    }

    #[test]
    fn test_write_report() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");

        let mut store = ConnectivityStore::new();
        store.add("alice", "bob", metrics(0.0, 1.0), true);
        store.add("alice", "references", metrics(120.0, 0.4), false);
        let rows = store.export();

        let mut summary = summary();
        let paths = write_report(&out, &rows, &mut summary).unwrap();

        let csv = fs::read_to_string(&paths.connections).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], ExportRow::HEADER.join(","));
        assert!(lines[1].starts_with("alice,bob,0,10,5,0.1,1,0.5,12.5,inf,inf"));

        let suspicious = fs::read_to_string(&paths.suspicious).unwrap();
        assert_eq!(suspicious.lines().count(), 3);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.summary).unwrap()).unwrap();
        assert_eq!(json["rows_exported"], 3);
        assert_eq!(json["rows_suspicious"], 2);
        assert_eq!(json["config"]["shape_threshold"], 5);
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
