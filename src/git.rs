use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::errors::{CodeContextError, Result};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_FORMAT: &str = "--pretty=format:%H|%an|%ae|%at|%s";
const MAX_EXAMPLE_COMMITS: usize = 10;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RepoInfo {
    pub root: PathBuf,
    pub branch: String,
    pub remote: Option<String>,
    /// Always `true`; a real `status` check is not performed.
    pub is_clean: bool,
}

/// Unordered file pair observed changing together, keyed canonically
/// (lexicographically smaller path first).
#[derive(Debug, Clone)]
pub struct CoOccurrence {
    pub files: (String, String),
    pub count: u32,
    pub example_commits: Vec<String>,
    pub last_seen: DateTime<Utc>,
    pub confidence: f64,
}

/// History adapter over the host `git` tool. Every command spawns a fresh
/// subprocess with a 30 second deadline.
#[derive(Debug, Clone)]
pub struct GitAnalyzer {
    root: PathBuf,
}

impl GitAnalyzer {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw command gateway. Returns stdout on success.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let child = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output();

        let output = tokio::time::timeout(COMMAND_TIMEOUT, child)
            .await
            .map_err(|_| CodeContextError::Timeout(COMMAND_TIMEOUT))?
            .map_err(|e| CodeContextError::BackendUnavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository") {
                return Err(CodeContextError::RepositoryUnavailable(self.root.clone()));
            }
            return Err(CodeContextError::BackendUnavailable(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn is_repository(&self) -> bool {
        self.run(&["rev-parse", "--git-dir"]).await.is_ok()
    }

    pub async fn branch(&self) -> Result<String> {
        let out = self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    pub async fn remote(&self) -> Result<Option<String>> {
        let names = match self.run(&["remote"]).await {
            Ok(out) => out,
            Err(_) => return Ok(None),
        };
        let Some(first) = names.lines().next().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        match self.run(&["remote", "get-url", first]).await {
            Ok(url) => Ok(Some(url.trim().to_string())),
            Err(_) => Ok(None),
        }
    }

    pub async fn repo_info(&self) -> Result<RepoInfo> {
        if !self.is_repository().await {
            return Err(CodeContextError::RepositoryUnavailable(self.root.clone()));
        }
        let branch = self.branch().await.unwrap_or_else(|_| "HEAD".to_string());
        let remote = self.remote().await.unwrap_or(None);
        Ok(RepoInfo {
            root: self.root.clone(),
            branch,
            remote,
            is_clean: true,
        })
    }

    /// Commits in the window, newest first, each with the files it touched.
    pub async fn commit_history(&self, days: u32) -> Result<Vec<CommitInfo>> {
        let since = format!("--since={}.days", days);
        let out = self
            .run(&["log", LOG_FORMAT, "--name-only", &since])
            .await?;
        parse_log_output(&out)
    }

    /// Commits per file over the window.
    pub async fn file_change_history(&self, days: u32) -> Result<HashMap<String, Vec<CommitInfo>>> {
        let commits = self.commit_history(days).await?;
        let mut history: HashMap<String, Vec<CommitInfo>> = HashMap::new();
        for commit in commits {
            for file in &commit.files {
                history.entry(file.clone()).or_default().push(commit.clone());
            }
        }
        Ok(history)
    }

    /// Change counts per file over the window.
    pub async fn change_frequency(&self, days: u32) -> Result<HashMap<String, u32>> {
        let commits = self.commit_history(days).await?;
        let mut freq: HashMap<String, u32> = HashMap::new();
        for commit in &commits {
            for file in &commit.files {
                *freq.entry(file.clone()).or_insert(0) += 1;
            }
        }
        Ok(freq)
    }

    /// Unordered co-change pairs over the window with raw confidence
    /// (count of both / count of the more frequently changed file).
    pub async fn file_co_occurrences(&self, days: u32) -> Result<Vec<CoOccurrence>> {
        let commits = self.commit_history(days).await?;
        Ok(co_occurrences_from_commits(&commits))
    }

    pub async fn last_modified(&self) -> Result<DateTime<Utc>> {
        let out = self.run(&["log", "-1", "--pretty=format:%at"]).await?;
        let secs: i64 = out
            .trim()
            .parse()
            .map_err(|e| CodeContextError::parse_failure("git log -1", e))?;
        Utc.timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| CodeContextError::parse_failure("git log -1", "timestamp out of range"))
    }
}

pub fn co_occurrences_from_commits(commits: &[CommitInfo]) -> Vec<CoOccurrence> {
    let mut file_counts: HashMap<&str, u32> = HashMap::new();
    for commit in commits {
        for file in &commit.files {
            *file_counts.entry(file).or_insert(0) += 1;
        }
    }

    let mut pairs: HashMap<(String, String), CoOccurrence> = HashMap::new();
    for commit in commits {
        let mut files: Vec<&String> = commit.files.iter().collect();
        files.sort();
        files.dedup();

        for i in 0..files.len() {
            for j in (i + 1)..files.len() {
                let key = (files[i].clone(), files[j].clone());
                let entry = pairs.entry(key.clone()).or_insert_with(|| CoOccurrence {
                    files: key,
                    count: 0,
                    example_commits: Vec::new(),
                    last_seen: commit.timestamp,
                    confidence: 0.0,
                });
                entry.count += 1;
                if entry.example_commits.len() < MAX_EXAMPLE_COMMITS {
                    entry.example_commits.push(commit.hash.clone());
                }
                if commit.timestamp > entry.last_seen {
                    entry.last_seen = commit.timestamp;
                }
            }
        }
    }

    let mut result: Vec<CoOccurrence> = pairs
        .into_values()
        .map(|mut co| {
            let count_a = *file_counts.get(co.files.0.as_str()).unwrap_or(&1);
            let count_b = *file_counts.get(co.files.1.as_str()).unwrap_or(&1);
            let base = count_a.max(count_b).max(1);
            co.confidence = f64::from(co.count) / f64::from(base);
            co
        })
        .collect();

    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.files.cmp(&b.files)));
    result
}

/// Parses `git log --pretty=format:%H|%an|%ae|%at|%s --name-only` output.
/// Headers split into exactly 5 fields; the subject may contain pipes.
/// Filenames follow one per line until a blank separator.
pub fn parse_log_output(output: &str) -> Result<Vec<CommitInfo>> {
    let mut commits = Vec::new();
    let mut current: Option<CommitInfo> = None;

    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if looks_like_header(line) {
            if let Some(commit) = current.take() {
                commits.push(commit);
            }
            current = Some(parse_header(line)?);
        } else if let Some(commit) = current.as_mut() {
            commit.files.push(line.trim().to_string());
        }
    }

    if let Some(commit) = current.take() {
        commits.push(commit);
    }

    Ok(commits)
}

fn looks_like_header(line: &str) -> bool {
    let mut parts = line.splitn(5, '|');
    let hash = parts.next().unwrap_or("");
    if hash.len() != 40 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    parts.next().is_some()
        && parts.next().is_some()
        && parts
            .next()
            .map(|t| t.parse::<i64>().is_ok())
            .unwrap_or(false)
}

fn parse_header(line: &str) -> Result<CommitInfo> {
    let parts: Vec<&str> = line.splitn(5, '|').collect();
    if parts.len() != 5 {
        return Err(CodeContextError::parse_failure(
            "git log",
            format!("malformed header: {}", line),
        ));
    }

    let secs: i64 = parts[3]
        .parse()
        .map_err(|e| CodeContextError::parse_failure("git log", e))?;
    let timestamp = Utc
        .timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| CodeContextError::parse_failure("git log", "timestamp out of range"))?;

    Ok(CommitInfo {
        hash: parts[0].to_string(),
        author: parts[1].to_string(),
        email: parts[2].to_string(),
        timestamp,
        message: parts[4].to_string(),
        files: Vec::new(),
    })
}
