mod walk;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::cache::{AstCache, AstDiff, GraphCacheConfig, PersistentGraphCache};
use crate::config::Config;
use crate::errors::{CancelFlag, CodeContextError, Result};
use crate::extract;
use crate::framework::FrameworkDetector;
use crate::git::{GitAnalyzer, RepoInfo};
use crate::graph::{AnalyzedFile, CodeGraph, build_graph, classify_path};
use crate::lang::Language;
use crate::mining::{
    ChangePattern, FileFilter, FileRelationship, IgnorePatterns, ModuleGroup, PatternMiner,
    build_module_groups, build_relationships,
};
use crate::output;
use crate::parse;
use crate::semantic::{
    NeighborhoodCluster, NeighborhoodEnhancer, build_neighborhoods, cluster_neighborhoods,
};

const SEMAPHORE_PERMITS: usize = 256;

#[derive(Debug)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

pub struct AnalysisResult {
    pub graph: CodeGraph,
    pub patterns: Vec<ChangePattern>,
    pub relationships: Vec<FileRelationship>,
    pub groups: Vec<ModuleGroup>,
    pub clusters: Vec<NeighborhoodCluster>,
    pub repo: RepoInfo,
    pub skipped: Vec<SkippedFile>,
    pub parsed_count: usize,
    pub cached_count: usize,
}

/// Full analysis run: walk, parse+extract in parallel, mine co-change
/// history, score neighborhoods, cluster, render, persist.
pub async fn analyze(root: &Path, cancel: CancelFlag) -> Result<AnalysisResult> {
    let config = Config::load(root).await?;

    let git = GitAnalyzer::new(root);
    let repo = git.repo_info().await?;
    info!(branch = %repo.branch, "analyzing repository");

    let ignore = IgnorePatterns::load(root).await?;
    let filter = FileFilter::from_config(&config, ignore);

    let files = walk::walk_directory(root)
        .await
        .map_err(|e| CodeContextError::parse_failure(root.display().to_string(), e))?;

    let (analyzed, skipped, cached_count) = parse_phase(root, files, &cancel).await?;
    let parsed_count = analyzed.len() - cached_count;

    cancel.check()?;

    let days = config.mining.period_days;
    let commits = git.commit_history(days).await?;
    let change_frequency = git.change_frequency(days).await?;
    info!(commits = commits.len(), window_days = days, "mined commit history");

    let project = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_string();
    let graph = build_graph(&project, analyzed, &change_frequency);

    let miner = PatternMiner::new(&config.mining, cancel.clone());
    let patterns = miner.detect_change_patterns(&commits, &filter)?;
    let relationships = build_relationships(&commits, &filter);
    let groups = build_module_groups(&relationships, &commits);

    let neighborhoods = build_neighborhoods(
        &groups,
        &patterns,
        &commits,
        config.neighborhood.max_neighborhood_size,
    );
    let enhancer = NeighborhoodEnhancer::new(
        &graph,
        config.weights.clone(),
        config.neighborhood.min_combined_score,
    );
    let enhanced = enhancer.enhance(neighborhoods);
    let clusters = cluster_neighborhoods(enhanced, &config.weights, &cancel)?;

    let result = AnalysisResult {
        graph,
        patterns,
        relationships,
        groups,
        clusters,
        repo,
        skipped,
        parsed_count,
        cached_count,
    };

    cancel.check()?;

    let stamp = output::format_stamp(&result);
    output::write_report(root, &result, &stamp)
        .await
        .map_err(|e| CodeContextError::CacheIo(e.to_string()))?;

    persist_graph(root, &config, &project, &result.graph).await?;

    print_summary(&result);
    Ok(result)
}

async fn parse_phase(
    root: &Path,
    files: Vec<PathBuf>,
    cancel: &CancelFlag,
) -> Result<(Vec<AnalyzedFile>, Vec<SkippedFile>, usize)> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let semaphore = Arc::new(Semaphore::new(SEMAPHORE_PERMITS));
    let analyzed = Arc::new(Mutex::new(Vec::new()));
    let skipped = Arc::new(Mutex::new(Vec::new()));
    let cached_count = Arc::new(AtomicUsize::new(0));
    let ast_cache = Arc::new(AstCache::default());
    let detector = Arc::new(FrameworkDetector::new());

    let mut join_set = JoinSet::new();

    for path in files {
        if cancel.is_cancelled() {
            break;
        }

        let semaphore = Arc::clone(&semaphore);
        let analyzed = Arc::clone(&analyzed);
        let skipped = Arc::clone(&skipped);
        let cached_count = Arc::clone(&cached_count);
        let ast_cache = Arc::clone(&ast_cache);
        let detector = Arc::clone(&detector);
        let root = root.to_path_buf();
        let pb = pb.clone();

        join_set.spawn(async move {
            let _permit = semaphore.acquire().await;

            match process_file(&path, &root, &ast_cache, &detector, &cached_count).await {
                Ok(Some(result)) => {
                    analyzed.lock().await.push(result);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    skipped.lock().await.push(SkippedFile {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }

            pb.inc(1);
        });
    }

    while join_set.join_next().await.is_some() {}
    pb.finish_and_clear();

    cancel.check()?;

    let mut analyzed = Arc::try_unwrap(analyzed)
        .expect("all tasks completed")
        .into_inner();
    analyzed.sort_by(|a, b| a.path.cmp(&b.path));

    let skipped = Arc::try_unwrap(skipped)
        .expect("all tasks completed")
        .into_inner();
    let cached = cached_count.load(Ordering::Relaxed);

    Ok((analyzed, skipped, cached))
}

async fn process_file(
    path: &Path,
    root: &Path,
    ast_cache: &Arc<AstCache>,
    detector: &Arc<FrameworkDetector>,
    cached_count: &Arc<AtomicUsize>,
) -> Result<Option<AnalyzedFile>> {
    let Some(language) = Language::from_path(path) else {
        return Ok(None);
    };

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| CodeContextError::parse_failure(path.display().to_string(), e))?;
    let size = metadata.len();
    let last_modified = metadata
        .modified()
        .ok()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(Utc::now);

    let bytes = parse::read_source(path)
        .await
        .map_err(|e| CodeContextError::parse_failure(path.display().to_string(), e))?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    let lines = parse::count_lines(&bytes);

    let relative_path = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");
    let version = blake3::hash(content.as_bytes()).to_hex().to_string();

    let abs_path = path.to_path_buf();
    let ast_cache = Arc::clone(ast_cache);
    let detector = Arc::clone(detector);
    let cached_count = Arc::clone(cached_count);
    let rel = relative_path.clone();

    let (extraction, framework) = tokio::task::spawn_blocking(move || {
        let ast = match ast_cache.get(&rel, Some(&version)) {
            Some(ast) => {
                cached_count.fetch_add(1, Ordering::Relaxed);
                ast
            }
            None => {
                let previous = ast_cache.get(&rel, None);
                let ast = parse::parse_versioned(&rel, &content, &version)?;
                if let Some(previous) = previous {
                    let mut diffs = ast_cache.get_diffs(&rel);
                    diffs.push(AstDiff::between(&previous, &ast));
                    ast_cache.set_diffs(&rel, diffs);
                }
                ast_cache.set(&rel, ast.clone());
                ast
            }
        };

        let framework = detector.detect(&abs_path, language, &content);
        let extraction = extract::extract(&ast, &rel, language, framework, &content, last_modified);
        Ok::<_, CodeContextError>((extraction, framework))
    })
    .await
    .map_err(|e| CodeContextError::parse_failure(path.display().to_string(), e))??;

    Ok(Some(AnalyzedFile {
        path: relative_path.clone(),
        language,
        size,
        lines,
        class: classify_path(&relative_path),
        framework: framework.map(|f| f.label().to_string()),
        last_modified,
        symbols: extraction.symbols,
        imports: extraction.imports,
    }))
}

async fn persist_graph(
    root: &Path,
    config: &Config,
    project: &str,
    graph: &CodeGraph,
) -> Result<()> {
    let cache_config = GraphCacheConfig {
        directory: config.cache_directory(root),
        max_size: config.cache.max_size,
        ttl: config.cache_ttl(),
        enable_lru: config.cache.enable_lru,
        enable_metrics: config.cache.enable_metrics,
    };

    let cache = PersistentGraphCache::open(cache_config).await?;
    cache.set_graph(&format!("graph:{}", project), graph.clone()).await?;
    cache.close().await
}

fn print_summary(result: &AnalysisResult) {
    println!();
    println!(
        "Analyzed @ {} ({} files, {} symbols, {} edges)",
        result.repo.branch,
        result.graph.metadata.total_files,
        result.graph.metadata.total_symbols,
        result.graph.metadata.total_edges
    );
    println!(
        "  parsed: {}, cached: {}, skipped: {}",
        result.parsed_count,
        result.cached_count,
        result.skipped.len()
    );
    println!(
        "  patterns: {}, module groups: {}, clusters: {}",
        result.patterns.len(),
        result.groups.len(),
        result.clusters.len()
    );
}
