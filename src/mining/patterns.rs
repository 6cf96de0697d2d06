use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::filter::FileFilter;
use crate::config::MiningConfig;
use crate::errors::{CancelFlag, Result};
use crate::git::CommitInfo;

const MAX_EXAMPLE_COMMITS: usize = 10;
const MAX_NAME_PARTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequentItemset {
    pub files: Vec<String>,
    pub support: u32,
    pub confidence: f64,
    pub frequency: u32,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePattern {
    pub name: String,
    pub files: Vec<String>,
    pub frequency: u32,
    pub confidence: f64,
    pub last_occurrence: DateTime<Utc>,
    /// Mean gap between commits containing every file of the pattern.
    pub average_interval_secs: u64,
    pub metadata: HashMap<String, String>,
}

struct PairStats {
    count: u32,
    example_commits: Vec<String>,
    last_seen: DateTime<Utc>,
}

/// Frequent co-change pair miner. Output order is deterministic for a
/// fixed commit list and thresholds: frequency descending, then
/// lexicographic file pairs.
pub struct PatternMiner {
    min_support: f64,
    min_confidence: f64,
    max_pairs: usize,
    cancel: CancelFlag,
}

impl PatternMiner {
    pub fn new(config: &MiningConfig, cancel: CancelFlag) -> Self {
        Self {
            min_support: config.min_support,
            min_confidence: config.min_confidence,
            max_pairs: config.max_pairs.max(1),
            cancel,
        }
    }

    pub fn detect_change_patterns(
        &self,
        commits: &[CommitInfo],
        filter: &FileFilter,
    ) -> Result<Vec<ChangePattern>> {
        let filtered = self.filter_commits(commits, filter);
        let itemsets = self.mine_itemsets(&filtered)?;
        self.build_patterns(&filtered, itemsets)
    }

    /// Filters each commit's file list and drops commits with fewer than
    /// two surviving files. File lists come out canonically sorted.
    fn filter_commits(&self, commits: &[CommitInfo], filter: &FileFilter) -> Vec<CommitInfo> {
        let mut filtered: Vec<CommitInfo> = commits
            .iter()
            .filter_map(|commit| {
                let mut files: Vec<String> = commit
                    .files
                    .iter()
                    .filter(|f| filter.should_include(f))
                    .cloned()
                    .collect();
                files.sort();
                files.dedup();
                if files.len() < 2 {
                    return None;
                }
                Some(CommitInfo {
                    files,
                    ..commit.clone()
                })
            })
            .collect();

        // When the pair space would blow past the cap, degrade gracefully
        // by subsampling commits from the tail of the window.
        loop {
            let pair_estimate: usize = filtered
                .iter()
                .map(|c| c.files.len() * (c.files.len() - 1) / 2)
                .sum();
            if pair_estimate <= self.max_pairs || filtered.len() <= 1 {
                break;
            }
            let dropped = filtered.pop();
            if let Some(dropped) = dropped {
                debug!(hash = %dropped.hash, "subsampling commit to bound pair count");
            }
        }

        filtered
    }

    fn mine_itemsets(&self, commits: &[CommitInfo]) -> Result<Vec<FrequentItemset>> {
        let mut file_counts: HashMap<&str, u32> = HashMap::new();
        for commit in commits {
            for file in &commit.files {
                *file_counts.entry(file).or_insert(0) += 1;
            }
        }

        let mut pairs: HashMap<(String, String), PairStats> = HashMap::new();
        for commit in commits {
            self.cancel.check()?;
            for i in 0..commit.files.len() {
                for j in (i + 1)..commit.files.len() {
                    let key = (commit.files[i].clone(), commit.files[j].clone());
                    let stats = pairs.entry(key).or_insert_with(|| PairStats {
                        count: 0,
                        example_commits: Vec::new(),
                        last_seen: commit.timestamp,
                    });
                    stats.count += 1;
                    if stats.example_commits.len() < MAX_EXAMPLE_COMMITS {
                        stats.example_commits.push(commit.hash.clone());
                    }
                    if commit.timestamp > stats.last_seen {
                        stats.last_seen = commit.timestamp;
                    }
                }
            }
        }

        let min_support_count = min_support_count(self.min_support, commits.len());

        let mut itemsets: Vec<FrequentItemset> = pairs
            .into_iter()
            .filter(|(_, stats)| stats.count >= min_support_count)
            .filter_map(|((file1, file2), stats)| {
                let count1 = *file_counts.get(file1.as_str()).unwrap_or(&1);
                let count2 = *file_counts.get(file2.as_str()).unwrap_or(&1);
                // P(file2|file1) when file1 is the more frequent side,
                // else the symmetric form.
                let base = count1.max(count2).max(1);
                let confidence = f64::from(stats.count) / f64::from(base);
                if confidence < self.min_confidence {
                    return None;
                }
                Some(FrequentItemset {
                    files: vec![file1, file2],
                    support: stats.count,
                    confidence,
                    frequency: stats.count,
                    last_seen: stats.last_seen,
                })
            })
            .collect();

        itemsets.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.files.cmp(&b.files))
        });

        Ok(itemsets)
    }

    fn build_patterns(
        &self,
        commits: &[CommitInfo],
        itemsets: Vec<FrequentItemset>,
    ) -> Result<Vec<ChangePattern>> {
        let mut patterns = Vec::with_capacity(itemsets.len());

        for itemset in itemsets {
            self.cancel.check()?;

            let mut containing: Vec<DateTime<Utc>> = commits
                .iter()
                .filter(|c| itemset.files.iter().all(|f| c.files.contains(f)))
                .map(|c| c.timestamp)
                .collect();
            containing.sort();

            let average_interval_secs = if containing.len() > 1 {
                let total: i64 = containing
                    .windows(2)
                    .map(|w| (w[1] - w[0]).num_seconds())
                    .sum();
                (total / (containing.len() as i64 - 1)).max(0) as u64
            } else {
                0
            };

            let mut metadata = HashMap::new();
            metadata.insert("support".to_string(), itemset.support.to_string());
            let examples: Vec<String> = commits
                .iter()
                .filter(|c| itemset.files.iter().all(|f| c.files.contains(f)))
                .take(MAX_EXAMPLE_COMMITS)
                .map(|c| c.hash.clone())
                .collect();
            metadata.insert("example_commits".to_string(), examples.join(","));

            patterns.push(ChangePattern {
                name: pattern_name(&itemset.files),
                files: itemset.files,
                frequency: itemset.frequency,
                confidence: itemset.confidence,
                last_occurrence: itemset.last_seen,
                average_interval_secs,
                metadata,
            });
        }

        Ok(patterns)
    }
}

pub fn min_support_count(min_support: f64, commit_count: usize) -> u32 {
    let floor = (min_support * commit_count as f64).floor() as u32;
    floor.max(1)
}

/// Human-readable pattern name from file basenames without extensions.
pub fn pattern_name(files: &[String]) -> String {
    if files.is_empty() {
        return "Empty Pattern".to_string();
    }

    let stems: Vec<&str> = files
        .iter()
        .map(|f| {
            let base = f.rsplit('/').next().unwrap_or(f);
            match base.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem,
                _ => base,
            }
        })
        .collect();

    if stems.len() <= MAX_NAME_PARTS {
        stems.join(" + ")
    } else {
        format!(
            "{} + {} more",
            stems[..MAX_NAME_PARTS].join(" + "),
            stems.len() - MAX_NAME_PARTS
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mining::filter::IgnorePatterns;
    use chrono::TimeZone;

    fn commit(hash: &str, secs: i64, files: &[&str]) -> CommitInfo {
        CommitInfo {
            hash: hash.to_string(),
            author: "dev".into(),
            email: "dev@example.com".into(),
            timestamp: Utc.timestamp_opt(secs, 0).single().unwrap(),
            message: "change".into(),
            files: files.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn miner(min_support: f64, min_confidence: f64) -> PatternMiner {
        let config = MiningConfig {
            min_support,
            min_confidence,
            period_days: 30,
            max_pairs: 100_000,
        };
        PatternMiner::new(&config, CancelFlag::new())
    }

    fn permissive_filter() -> FileFilter {
        FileFilter::from_config(&Config::default(), IgnorePatterns::default())
    }

    #[test]
    fn mines_single_frequent_pair() {
        let commits = vec![
            commit("c1", 1000, &["a.rs", "b.rs"]),
            commit("c2", 2000, &["a.rs", "b.rs"]),
            commit("c3", 3000, &["a.rs", "c.rs"]),
        ];

        let patterns = miner(0.05, 0.3)
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");

        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.files, vec!["a.rs", "b.rs"]);
        assert_eq!(p.frequency, 2);
        assert!((p.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(p.average_interval_secs, 1000);
    }

    #[test]
    fn output_is_deterministic_across_runs() {
        let commits = vec![
            commit("c1", 1000, &["x.rs", "y.rs", "z.rs"]),
            commit("c2", 2000, &["x.rs", "y.rs"]),
            commit("c3", 3000, &["y.rs", "z.rs"]),
            commit("c4", 4000, &["x.rs", "z.rs"]),
        ];

        let m = miner(0.05, 0.0);
        let first = m
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");
        for _ in 0..5 {
            let again = m
                .detect_change_patterns(&commits, &permissive_filter())
                .expect("mines");
            let names: Vec<&String> = again.iter().map(|p| &p.name).collect();
            let first_names: Vec<&String> = first.iter().map(|p| &p.name).collect();
            assert_eq!(names, first_names);
        }
    }

    #[test]
    fn pairs_are_canonically_ordered() {
        let commits = vec![
            commit("c1", 1000, &["z.rs", "a.rs"]),
            commit("c2", 2000, &["z.rs", "a.rs"]),
        ];

        let patterns = miner(0.05, 0.0)
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");
        for p in &patterns {
            assert!(p.files[0] < p.files[1]);
        }
    }

    #[test]
    fn support_floor_is_enforced() {
        let mut commits: Vec<CommitInfo> = (0..20)
            .map(|i| commit(&format!("c{}", i), i * 100, &["hot1.rs", "hot2.rs"]))
            .collect();
        commits.push(commit("rare", 9999, &["cold1.rs", "cold2.rs"]));

        let patterns = miner(0.5, 0.0)
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");

        let floor = min_support_count(0.5, commits.len());
        assert!(patterns.iter().all(|p| p.frequency >= floor));
        assert!(patterns.iter().any(|p| p.files[0] == "hot1.rs"));
        assert!(!patterns.iter().any(|p| p.files[0] == "cold1.rs"));
    }

    #[test]
    fn support_floor_is_at_least_one() {
        assert_eq!(min_support_count(0.05, 3), 1);
        assert_eq!(min_support_count(0.0, 100), 1);
        assert_eq!(min_support_count(0.5, 10), 5);
    }

    #[test]
    fn confidence_threshold_filters_pairs() {
        // a+b co-change twice, but a changes 10 times: confidence 0.2.
        let mut commits = vec![
            commit("c1", 100, &["a.rs", "b.rs"]),
            commit("c2", 200, &["a.rs", "b.rs"]),
        ];
        for i in 0..8 {
            commits.push(commit(&format!("x{}", i), 300 + i, &["a.rs", "other.rs"]));
        }

        let low = miner(0.05, 0.1)
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");
        assert!(low.iter().any(|p| p.files.contains(&"b.rs".to_string())));

        let high = miner(0.05, 0.5)
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");
        assert!(!high.iter().any(|p| p.files.contains(&"b.rs".to_string())));
        for p in &high {
            assert!((0.0..=1.0).contains(&p.confidence));
        }
    }

    #[test]
    fn ordering_is_by_frequency_descending() {
        let mut commits = Vec::new();
        for i in 0..5 {
            commits.push(commit(&format!("a{}", i), i, &["p.rs", "q.rs"]));
        }
        for i in 0..3 {
            commits.push(commit(&format!("b{}", i), 100 + i, &["r.rs", "s.rs"]));
        }

        let patterns = miner(0.05, 0.0)
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");
        assert!(patterns.len() >= 2);
        for window in patterns.windows(2) {
            assert!(window[0].frequency >= window[1].frequency);
        }
    }

    #[test]
    fn name_generation_matches_expected_forms() {
        assert_eq!(
            pattern_name(&["src/main.go".to_string(), "src/utils.go".to_string()]),
            "main + utils"
        );
        assert_eq!(pattern_name(&[]), "Empty Pattern");
        assert_eq!(
            pattern_name(&[
                "a.rs".to_string(),
                "b.rs".to_string(),
                "c.rs".to_string(),
                "d.rs".to_string()
            ]),
            "a + b + c + 1 more"
        );
    }

    #[test]
    fn commits_with_one_surviving_file_are_dropped() {
        let commits = vec![
            commit("c1", 100, &["a.rs"]),
            commit("c2", 200, &["a.rs", "image.png"]),
        ];
        let patterns = miner(0.05, 0.0)
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");
        assert!(patterns.is_empty());
    }

    #[test]
    fn pair_cap_subsamples_from_the_tail() {
        let config = MiningConfig {
            min_support: 0.05,
            min_confidence: 0.0,
            period_days: 30,
            max_pairs: 1,
        };
        let m = PatternMiner::new(&config, CancelFlag::new());

        // Newest first, like git log output; the tail (older) commit with a
        // wide file list gets dropped.
        let commits = vec![
            commit("new", 2000, &["a.rs", "b.rs"]),
            commit("old", 1000, &["c.rs", "d.rs", "e.rs"]),
        ];
        let patterns = m
            .detect_change_patterns(&commits, &permissive_filter())
            .expect("mines");
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].files, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn cancellation_aborts_mining() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let config = MiningConfig::default();
        let m = PatternMiner::new(&config, cancel);

        let commits = vec![
            commit("c1", 100, &["a.rs", "b.rs"]),
            commit("c2", 200, &["a.rs", "b.rs"]),
        ];
        assert!(m
            .detect_change_patterns(&commits, &permissive_filter())
            .is_err());
    }
}
