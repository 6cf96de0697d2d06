pub mod neighborhoods;
pub mod overview;
pub mod patterns;

use anyhow::Result;
use std::path::Path;

use crate::config::OUTPUT_DIR;
use crate::pipeline::AnalysisResult;

pub async fn write_report(root: &Path, result: &AnalysisResult, stamp: &str) -> Result<()> {
    let out_dir = root.join(OUTPUT_DIR);
    tokio::fs::create_dir_all(&out_dir).await?;

    let gitignore_path = out_dir.join(".gitignore");
    if !gitignore_path.exists() {
        tokio::fs::write(&gitignore_path, "*\n").await?;
    }

    overview::write_overview(&out_dir, result, stamp).await?;
    patterns::write_patterns(&out_dir, result, stamp).await?;
    neighborhoods::write_neighborhoods(&out_dir, result, stamp).await?;
    write_meta(&out_dir, result).await?;

    Ok(())
}

pub fn format_stamp(result: &AnalysisResult) -> String {
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        "[codecontext @ {} | {} | {} files | {} lines]",
        result.repo.branch,
        timestamp,
        result.graph.metadata.total_files,
        result.graph.metadata.total_lines
    )
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Meta {
    timestamp: String,
    branch: String,
    remote: Option<String>,
    files: usize,
    symbols: usize,
    edges: usize,
    patterns: usize,
    clusters: usize,
}

async fn write_meta(out_dir: &Path, result: &AnalysisResult) -> Result<()> {
    let meta = Meta {
        timestamp: chrono::Utc::now().to_rfc3339(),
        branch: result.repo.branch.clone(),
        remote: result.repo.remote.clone(),
        files: result.graph.metadata.total_files,
        symbols: result.graph.metadata.total_symbols,
        edges: result.graph.metadata.total_edges,
        patterns: result.patterns.len(),
        clusters: result.clusters.len(),
    };

    let content = serde_json::to_string_pretty(&meta)?;
    tokio::fs::write(out_dir.join("meta.json"), content).await?;
    Ok(())
}

/// Quick summary for the `status` subcommand.
pub async fn stats(root: &Path) -> Result<()> {
    let out_dir = root.join(OUTPUT_DIR);
    let meta_path = out_dir.join("meta.json");

    if !meta_path.exists() {
        eprintln!("No {}/ directory found. Run 'codecontext' first.", OUTPUT_DIR);
        std::process::exit(1);
    }

    let content = tokio::fs::read_to_string(&meta_path).await?;
    let meta: Meta = serde_json::from_str(&content)?;

    println!("Last analysis: {}", meta.timestamp);
    println!("Branch: {}", meta.branch);
    if let Some(remote) = &meta.remote {
        println!("Remote: {}", remote);
    }
    println!(
        "{} files, {} symbols, {} edges, {} change patterns, {} clusters",
        meta.files, meta.symbols, meta.edges, meta.patterns, meta.clusters
    );

    Ok(())
}
