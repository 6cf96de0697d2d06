use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::pipeline::AnalysisResult;

pub async fn write_neighborhoods(
    out_dir: &Path,
    result: &AnalysisResult,
    stamp: &str,
) -> Result<()> {
    let file = tokio::fs::File::create(out_dir.join("neighborhoods.md")).await?;
    let mut writer = BufWriter::new(file);

    writer.write_all(stamp.as_bytes()).await?;
    writer.write_all(b"\n\n# Semantic Neighborhoods\n\n").await?;
    writer
        .write_all(
            b"File groups scored across co-change history, dependencies, and structure,\nclustered into working sets.\n\n",
        )
        .await?;

    if result.clusters.is_empty() {
        writer.write_all(b"No neighborhoods detected.\n").await?;
        writer.flush().await?;
        return Ok(());
    }

    for cluster in &result.clusters {
        let header = format!(
            "## {} ({} neighborhoods, strength {:.2})\n\n",
            cluster.name, cluster.size, cluster.strength
        );
        writer.write_all(header.as_bytes()).await?;
        writer
            .write_all(format!("{}\n\n", cluster.recommendation_reason).as_bytes())
            .await?;

        let metrics = format!(
            "Cohesion {:.2} | density {:.2} | distance avg {:.2} (min {:.2}, max {:.2})\n\n",
            cluster.metrics.cohesion,
            cluster.metrics.density,
            cluster.metrics.avg_distance,
            cluster.metrics.min_distance,
            cluster.metrics.max_distance
        );
        writer.write_all(metrics.as_bytes()).await?;

        if !cluster.optimal_tasks.is_empty() {
            let tasks = format!("Best for: {}\n\n", cluster.optimal_tasks.join(", "));
            writer.write_all(tasks.as_bytes()).await?;
        }

        for member in &cluster.neighborhoods {
            let line = format!(
                "### {} ({}, score {:.2})\n\n",
                member.neighborhood.name,
                member.recommendation.label(),
                member.combined_score
            );
            writer.write_all(line.as_bytes()).await?;

            let breakdown = format!(
                "Signals: git {:.2}, dependencies {:.2}, structural {:.2}\n\n",
                member.breakdown.git, member.breakdown.dependency, member.breakdown.structural
            );
            writer.write_all(breakdown.as_bytes()).await?;

            for file in &member.neighborhood.files {
                writer.write_all(format!("- {}\n", file).as_bytes()).await?;
            }
            if !member.usage_patterns.is_empty() {
                let usage = format!("\nUsage: {}\n", member.usage_patterns.join(", "));
                writer.write_all(usage.as_bytes()).await?;
            }
            writer.write_all(b"\n").await?;
        }
    }

    writer.flush().await?;
    Ok(())
}
