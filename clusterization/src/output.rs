use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::clustering::ClusteringReport;

/// File holding the labeled records
pub const POINTS_FILE: &str = "part-00000";
/// File holding the final centroids
pub const CENTROIDS_FILE: &str = "centroids.txt";

/// Timestamped subdirectory of `outdir` for one run
pub fn run_directory<Tz: TimeZone>(outdir: &Path, time: DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    outdir.join(time.format("%Y%m%d%H%M%S%3f").to_string())
}

/// Write one line per entry
pub async fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let data_file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("cannot create {}", path.display()))?;
    let mut data_file = BufWriter::new(data_file);
    for line in lines {
        data_file.write_all(line.as_bytes()).await?;
        data_file.write_all(b"\n").await?;
    }
    data_file.flush().await.with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// Write labeled records and centroids into `dir`
pub async fn write_report(dir: &Path, report: &ClusteringReport) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    write_lines(&dir.join(POINTS_FILE), &report.lines).await?;
    write_lines(&dir.join(CENTROIDS_FILE), &report.centroids).await?;
    Ok(())
}
