use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::graph::NodeKind;
use crate::pipeline::AnalysisResult;

pub async fn write_overview(out_dir: &Path, result: &AnalysisResult, stamp: &str) -> Result<()> {
    let file = tokio::fs::File::create(out_dir.join("overview.md")).await?;
    let mut writer = BufWriter::new(file);

    writer.write_all(stamp.as_bytes()).await?;
    writer.write_all(b"\n\n# Code Context Overview\n\n").await?;

    let meta = &result.graph.metadata;
    let header = format!(
        "Project: {}\nBranch: {}\nFiles: {} | Symbols: {} | Edges: {} | Lines: {}\n\n",
        meta.project,
        result.repo.branch,
        meta.total_files,
        meta.total_symbols,
        meta.total_edges,
        meta.total_lines
    );
    writer.write_all(header.as_bytes()).await?;

    writer.write_all(b"## Languages\n\n").await?;
    let mut languages: Vec<(&String, &usize)> = meta.languages.iter().collect();
    languages.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (language, count) in languages {
        let line = format!("- {}: {} files\n", language, count);
        writer.write_all(line.as_bytes()).await?;
    }

    writer.write_all(b"\n## Most Important Files\n\n").await?;
    let mut files: Vec<_> = result
        .graph
        .nodes
        .values()
        .filter(|n| n.kind == NodeKind::File)
        .collect();
    files.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    for node in files.iter().take(20) {
        let line = format!(
            "- {} (importance {:.2}, {} edges, {} changes)\n",
            node.path, node.importance, node.edge_count, node.change_frequency
        );
        writer.write_all(line.as_bytes()).await?;
    }

    let cycles = result.graph.circular_dependencies();
    if !cycles.is_empty() {
        writer.write_all(b"\n## Circular Imports\n\n").await?;
        for cycle in cycles.iter().take(10) {
            let line = format!("- {}\n", cycle.join(" -> "));
            writer.write_all(line.as_bytes()).await?;
        }
    }

    if !result.skipped.is_empty() {
        writer.write_all(b"\n## Skipped Files\n\n").await?;
        for skipped in result.skipped.iter().take(20) {
            let line = format!("- {} ({})\n", skipped.path, skipped.reason);
            writer.write_all(line.as_bytes()).await?;
        }
    }

    writer.flush().await?;
    Ok(())
}
