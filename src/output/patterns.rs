use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::pipeline::AnalysisResult;

pub async fn write_patterns(out_dir: &Path, result: &AnalysisResult, stamp: &str) -> Result<()> {
    let file = tokio::fs::File::create(out_dir.join("patterns.md")).await?;
    let mut writer = BufWriter::new(file);

    writer.write_all(stamp.as_bytes()).await?;
    writer.write_all(b"\n\n# Change Patterns\n\n").await?;
    writer
        .write_all(b"Files that change together in commit history, ordered by frequency.\n\n")
        .await?;

    if result.patterns.is_empty() {
        writer.write_all(b"No frequent patterns detected.\n").await?;
    }

    for pattern in result.patterns.iter().take(50) {
        let header = format!(
            "## {} ({}x, confidence {:.2})\n\n",
            pattern.name, pattern.frequency, pattern.confidence
        );
        writer.write_all(header.as_bytes()).await?;
        for file in &pattern.files {
            let line = format!("- {}\n", file);
            writer.write_all(line.as_bytes()).await?;
        }
        if pattern.average_interval_secs > 0 {
            let line = format!(
                "\nAverage interval: {}\n",
                humanize_secs(pattern.average_interval_secs)
            );
            writer.write_all(line.as_bytes()).await?;
        }
        writer.write_all(b"\n").await?;
    }

    writer.write_all(b"# Module Groups\n\n").await?;
    if result.groups.is_empty() {
        writer.write_all(b"No module groups detected.\n").await?;
    }
    for group in &result.groups {
        let header = format!(
            "## {} (cohesion {:.2}, {} changes)\n\n",
            group.name, group.cohesion, group.change_frequency
        );
        writer.write_all(header.as_bytes()).await?;
        for file in &group.files {
            let line = format!("- {}\n", file);
            writer.write_all(line.as_bytes()).await?;
        }
        let connections = format!(
            "\nConnections: {} internal, {} external\n\n",
            group.internal_connections, group.external_connections
        );
        writer.write_all(connections.as_bytes()).await?;
    }

    writer.write_all(b"# Strong Relationships\n\n").await?;
    let strong: Vec<_> = result
        .relationships
        .iter()
        .filter(|r| r.strength == crate::mining::RelationshipStrength::Strong)
        .take(30)
        .collect();
    if strong.is_empty() {
        writer.write_all(b"No strong relationships detected.\n").await?;
    }
    for rel in strong {
        let line = format!(
            "- {} <-> {} ({:.2}, {}x)\n",
            rel.files.0, rel.files.1, rel.correlation, rel.frequency
        );
        writer.write_all(line.as_bytes()).await?;
    }

    writer.flush().await?;
    Ok(())
}

fn humanize_secs(secs: u64) -> String {
    if secs >= 86_400 {
        format!("{:.1} days", secs as f64 / 86_400.0)
    } else if secs >= 3_600 {
        format!("{:.1} hours", secs as f64 / 3_600.0)
    } else if secs >= 60 {
        format!("{:.1} minutes", secs as f64 / 60.0)
    } else {
        format!("{} seconds", secs)
    }
}
