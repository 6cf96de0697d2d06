use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use codecontext::cache;
use codecontext::cli::{Cli, Commands};
use codecontext::config::Config;
use codecontext::errors::{CancelFlag, CodeContextError};
use codecontext::output;
use codecontext::pipeline;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        None => {
            let root = resolve_root(cli.path);
            run_analysis(&root).await
        }
        Some(Commands::Status { path }) => {
            let root = resolve_root(path);
            output::stats(&root)
                .await
                .map_err(|e| CodeContextError::CacheIo(e.to_string()))
        }
        Some(Commands::Clean { path }) => {
            let root = resolve_root(path);
            clean_cache(&root).await
        }
    };

    if let Err(error) = outcome {
        eprintln!("error: {}", error);
        std::process::exit(error.exit_code());
    }
}

fn resolve_root(path: Option<PathBuf>) -> PathBuf {
    let base = path.unwrap_or_else(|| PathBuf::from("."));
    if base.is_absolute() {
        base
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&base))
            .unwrap_or(base)
    }
}

async fn run_analysis(root: &Path) -> Result<(), CodeContextError> {
    let cancel = CancelFlag::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    pipeline::analyze(root, cancel).await.map(|_| ())
}

async fn clean_cache(root: &Path) -> Result<(), CodeContextError> {
    let config = Config::load(root).await?;
    let cache_config = cache::GraphCacheConfig {
        directory: config.cache_directory(root),
        max_size: config.cache.max_size,
        ttl: config.cache_ttl(),
        enable_lru: config.cache.enable_lru,
        enable_metrics: config.cache.enable_metrics,
    };

    let store = cache::PersistentGraphCache::open(cache_config).await?;
    store.clear().await?;
    store.close().await?;
    println!("Cache cleared.");
    Ok(())
}
