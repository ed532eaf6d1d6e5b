use std::path::Path;

use anyhow::{Context, Result};
use kmeans::FeatureCodec;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Read every non-blank line of the input file
pub async fn load_records(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .await
        .with_context(|| format!("cannot open input {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut records = Vec::new();
    let mut blank = 0usize;
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("cannot read input {}", path.display()))?
    {
        if line.trim().is_empty() {
            blank += 1;
            continue;
        }
        records.push(line);
    }
    if blank > 0 {
        debug!(blank, "skipped blank lines");
    }
    info!(records = records.len(), path = %path.display(), "input loaded");
    Ok(records)
}

/// Load a JSON schema description
pub async fn load_schema(path: &Path) -> Result<FeatureCodec> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read schema {}", path.display()))?;
    let codec = FeatureCodec::from_json(&json)
        .with_context(|| format!("invalid schema {}", path.display()))?;
    info!(features = codec.features(), "schema loaded");
    Ok(codec)
}
