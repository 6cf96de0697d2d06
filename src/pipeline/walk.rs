use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::OUTPUT_DIR;
use crate::lang::Language;

const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
];

pub async fn walk_directory(root: &Path) -> Result<Vec<PathBuf>> {
    let root = root.to_path_buf();

    tokio::task::spawn_blocking(move || walk_directory_sync(&root)).await?
}

fn walk_directory_sync(root: &Path) -> Result<Vec<PathBuf>> {
    let files = Mutex::new(Vec::new());

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .ignore(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .parents(true)
        .threads(num_cpus::get())
        .build_parallel();

    walker.run(|| {
        let files = &files;
        let root = root.to_path_buf();

        Box::new(move |entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => return ignore::WalkState::Continue,
            };

            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                return ignore::WalkState::Continue;
            }

            let path = entry.path();

            if path.starts_with(root.join(OUTPUT_DIR)) || path.starts_with(root.join(".git")) {
                return ignore::WalkState::Continue;
            }

            let skipped_dir = path.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|s| SKIP_DIRS.contains(&s))
                    .unwrap_or(false)
            });
            if skipped_dir {
                return ignore::WalkState::Continue;
            }

            if Language::from_path(path).is_some() {
                files
                    .lock()
                    .expect("lock poisoned")
                    .push(path.to_path_buf());
            }

            ignore::WalkState::Continue
        })
    });

    let mut files = files.into_inner().expect("lock poisoned");
    files.sort();
    Ok(files)
}
