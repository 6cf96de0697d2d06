use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::git::CommitInfo;
use crate::mining::{ChangePattern, ModuleGroup};

const MAX_COMMON_OPERATIONS: usize = 3;

/// A set of files that behaves as a unit across change history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticNeighborhood {
    pub name: String,
    pub files: Vec<String>,
    pub change_frequency: u32,
    pub last_changed: DateTime<Utc>,
    pub common_operations: Vec<String>,
    pub correlation_strength: f64,
    pub confidence: f64,
    pub metadata: HashMap<String, String>,
}

/// Builds neighborhoods from module groups, then from frequent patterns
/// whose file sets are not already covered. File lists are truncated to
/// `max_size`, largest-correlation members first being the group order.
pub fn build_neighborhoods(
    groups: &[ModuleGroup],
    patterns: &[ChangePattern],
    commits: &[CommitInfo],
    max_size: usize,
) -> Vec<SemanticNeighborhood> {
    let mut neighborhoods = Vec::new();
    let mut covered: Vec<HashSet<&str>> = Vec::new();

    for group in groups {
        let files: Vec<String> = group.files.iter().take(max_size).cloned().collect();
        covered.push(group.files.iter().map(String::as_str).collect());

        let confidence = mean_pattern_confidence(&files, patterns);
        let mut metadata = HashMap::new();
        metadata.insert("origin".to_string(), "module-group".to_string());
        metadata.insert(
            "internal_connections".to_string(),
            group.internal_connections.to_string(),
        );

        neighborhoods.push(SemanticNeighborhood {
            name: group.name.clone(),
            files,
            change_frequency: group.change_frequency,
            last_changed: group.last_changed,
            common_operations: common_operations(&group.files, commits),
            correlation_strength: group.cohesion,
            confidence,
            metadata,
        });
    }

    for pattern in patterns {
        let file_set: HashSet<&str> = pattern.files.iter().map(String::as_str).collect();
        if covered.iter().any(|c| file_set.is_subset(c)) {
            continue;
        }
        covered.push(file_set);

        let mut metadata = pattern.metadata.clone();
        metadata.insert("origin".to_string(), "change-pattern".to_string());

        neighborhoods.push(SemanticNeighborhood {
            name: pattern.name.clone(),
            files: pattern.files.iter().take(max_size).cloned().collect(),
            change_frequency: pattern.frequency,
            last_changed: pattern.last_occurrence,
            common_operations: common_operations(&pattern.files, commits),
            correlation_strength: pattern.confidence,
            confidence: pattern.confidence,
            metadata,
        });
    }

    neighborhoods
}

fn mean_pattern_confidence(files: &[String], patterns: &[ChangePattern]) -> f64 {
    let members: HashSet<&str> = files.iter().map(String::as_str).collect();
    let matching: Vec<f64> = patterns
        .iter()
        .filter(|p| p.files.iter().all(|f| members.contains(f.as_str())))
        .map(|p| p.confidence)
        .collect();

    if matching.is_empty() {
        0.0
    } else {
        matching.iter().sum::<f64>() / matching.len() as f64
    }
}

/// Most frequent leading commit-message tokens over commits touching the
/// file set; a cheap proxy for what kind of work happens here.
fn common_operations(files: &[String], commits: &[CommitInfo]) -> Vec<String> {
    let members: HashSet<&str> = files.iter().map(String::as_str).collect();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for commit in commits {
        if !commit.files.iter().any(|f| members.contains(f.as_str())) {
            continue;
        }
        let Some(first) = commit.message.split_whitespace().next() else {
            continue;
        };
        let op = first
            .trim_end_matches(':')
            .trim_end_matches('!')
            .to_lowercase();
        if op.len() > 1 {
            *counts.entry(op).or_insert(0) += 1;
        }
    }

    let mut ops: Vec<(String, usize)> = counts.into_iter().collect();
    ops.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ops.into_iter()
        .take(MAX_COMMON_OPERATIONS)
        .map(|(op, _)| op)
        .collect()
}
