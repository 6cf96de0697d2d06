use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::enhance::EnhancedNeighborhood;
use crate::config::ScoringWeights;
use crate::errors::{CancelFlag, Result};

const EDGE_FLOOR: f64 = 0.1;
const STOPWORDS: &[&str] = &[
    "module", "files", "file", "src", "the", "and", "of", "more", "pattern",
];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClusterMetrics {
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub cohesion: f64,
    pub density: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodCluster {
    pub id: String,
    pub name: String,
    pub description: String,
    pub size: usize,
    pub neighborhoods: Vec<EnhancedNeighborhood>,
    pub strength: f64,
    pub metrics: ClusterMetrics,
    pub optimal_tasks: Vec<String>,
    pub recommendation_reason: String,
}

/// Cluster count target as a fixed step function of input size.
pub fn target_cluster_count(n: usize) -> usize {
    match n {
        0 => 0,
        1 => 1,
        2..=8 => 2,
        9..=16 => 3,
        17..=32 => 4,
        33..=64 => 5,
        65..=100 => 6,
        101..=128 => 7,
        129..=256 => 8,
        257..=512 => 9,
        _ => 10,
    }
}

/// Agglomerative hierarchical clustering with single-linkage merging.
/// Distance ties break on the lexicographically smallest cluster-id pair,
/// keeping the result deterministic.
pub fn cluster_neighborhoods(
    neighborhoods: Vec<EnhancedNeighborhood>,
    weights: &ScoringWeights,
    cancel: &CancelFlag,
) -> Result<Vec<NeighborhoodCluster>> {
    let n = neighborhoods.len();
    let target = target_cluster_count(n);
    if n == 0 {
        return Ok(Vec::new());
    }

    let distances = distance_matrix(&neighborhoods, weights);
    let edges = similarity_edges(&distances);

    // Each neighborhood starts as its own cluster, identified by its
    // smallest member index.
    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    while clusters.len() > target {
        cancel.check()?;

        let mut best: Option<(f64, usize, usize)> = None;
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let distance = linkage_distance(&clusters[a], &clusters[b], &distances);
                let candidate = (distance, a, b);
                best = match best {
                    None => Some(candidate),
                    Some(current) => {
                        if distance < current.0
                            || (distance == current.0
                                && cluster_id_pair(&clusters, a, b)
                                    < cluster_id_pair(&clusters, current.1, current.2))
                        {
                            Some(candidate)
                        } else {
                            Some(current)
                        }
                    }
                };
            }
        }

        let Some((_, a, b)) = best else { break };
        let merged = clusters.remove(b);
        clusters[a].extend(merged);
        clusters[a].sort_unstable();
    }

    let mut result: Vec<NeighborhoodCluster> = Vec::with_capacity(clusters.len());
    clusters.sort_by_key(|members| members[0]);

    let mut remaining: HashMap<usize, EnhancedNeighborhood> =
        neighborhoods.into_iter().enumerate().collect();

    for (index, members) in clusters.iter().enumerate() {
        let metrics = cluster_metrics(members, &distances, &edges);
        let member_neighborhoods: Vec<EnhancedNeighborhood> = members
            .iter()
            .filter_map(|i| remaining.remove(i))
            .collect();

        let mean_score = member_neighborhoods
            .iter()
            .map(|m| m.combined_score)
            .sum::<f64>()
            / member_neighborhoods.len().max(1) as f64;
        let strength = ((mean_score + metrics.cohesion) / 2.0).clamp(0.0, 1.0);

        let name = cluster_name(&member_neighborhoods);
        let description = format!(
            "{} related neighborhoods around {}",
            member_neighborhoods.len(),
            name
        );
        let optimal_tasks = optimal_tasks(&member_neighborhoods);
        let recommendation_reason = recommendation_reason(strength, &member_neighborhoods);

        result.push(NeighborhoodCluster {
            id: format!("cluster-{}", index),
            name,
            description,
            size: member_neighborhoods.len(),
            neighborhoods: member_neighborhoods,
            strength,
            metrics,
            optimal_tasks,
            recommendation_reason,
        });
    }

    Ok(result)
}

fn cluster_id_pair(clusters: &[Vec<usize>], a: usize, b: usize) -> (usize, usize) {
    let id_a = clusters[a][0];
    let id_b = clusters[b][0];
    (id_a.min(id_b), id_a.max(id_b))
}

fn linkage_distance(a: &[usize], b: &[usize], distances: &[Vec<f64>]) -> f64 {
    let mut min = f64::MAX;
    for &i in a {
        for &j in b {
            if distances[i][j] < min {
                min = distances[i][j];
            }
        }
    }
    min
}

/// Pairwise distance: `1 - similarity` when the similarity edge survives
/// the floor, otherwise a score-difference fallback in the far band.
/// Symmetric, zero on the diagonal.
fn distance_matrix(neighborhoods: &[EnhancedNeighborhood], weights: &ScoringWeights) -> Vec<Vec<f64>> {
    let n = neighborhoods.len();
    let mut distances = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let similarity = neighborhood_similarity(&neighborhoods[i], &neighborhoods[j], weights);
            let distance = if similarity > EDGE_FLOOR {
                1.0 - similarity
            } else {
                let score_gap = (neighborhoods[i].combined_score
                    - neighborhoods[j].combined_score)
                    .abs();
                let correlation_gap = (neighborhoods[i].neighborhood.correlation_strength
                    - neighborhoods[j].neighborhood.correlation_strength)
                    .abs();
                0.9 + 0.1 * ((score_gap + correlation_gap) / 2.0).clamp(0.0, 1.0)
            };
            distances[i][j] = distance;
            distances[j][i] = distance;
        }
    }

    distances
}

fn similarity_edges(distances: &[Vec<f64>]) -> HashSet<(usize, usize)> {
    let mut edges = HashSet::new();
    for i in 0..distances.len() {
        for j in (i + 1)..distances.len() {
            if 1.0 - distances[i][j] > EDGE_FLOOR {
                edges.insert((i, j));
            }
        }
    }
    edges
}

/// Weighted mean of file-set Jaccard, dependency-edge-set Jaccard, and
/// shared-structural-pattern Jaccard, using the scoring weights.
fn neighborhood_similarity(
    a: &EnhancedNeighborhood,
    b: &EnhancedNeighborhood,
    weights: &ScoringWeights,
) -> f64 {
    let files_a: HashSet<&str> = a.neighborhood.files.iter().map(String::as_str).collect();
    let files_b: HashSet<&str> = b.neighborhood.files.iter().map(String::as_str).collect();
    let file_jaccard = jaccard(&files_a, &files_b);

    let edges_a: HashSet<String> = a
        .dependency_connections
        .iter()
        .map(|c| format!("{}|{}", c.from, c.to))
        .collect();
    let edges_b: HashSet<String> = b
        .dependency_connections
        .iter()
        .map(|c| format!("{}|{}", c.from, c.to))
        .collect();
    let edge_jaccard = jaccard_owned(&edges_a, &edges_b);

    let patterns_a: HashSet<&str> = a
        .structural_similarities
        .iter()
        .flat_map(|s| s.shared_patterns.iter().map(String::as_str))
        .collect();
    let patterns_b: HashSet<&str> = b
        .structural_similarities
        .iter()
        .flat_map(|s| s.shared_patterns.iter().map(String::as_str))
        .collect();
    let pattern_jaccard = jaccard(&patterns_a, &patterns_b);

    let total = weights.git + weights.dependencies + weights.structural;
    if total <= 0.0 {
        return 0.0;
    }
    (file_jaccard * weights.git
        + edge_jaccard * weights.dependencies
        + pattern_jaccard * weights.structural)
        / total
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn jaccard_owned(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn cluster_metrics(
    members: &[usize],
    distances: &[Vec<f64>],
    edges: &HashSet<(usize, usize)>,
) -> ClusterMetrics {
    let n = members.len();
    if n < 2 {
        return ClusterMetrics {
            cohesion: 1.0,
            ..ClusterMetrics::default()
        };
    }

    let mut pairwise = Vec::new();
    let mut internal_edges = 0usize;
    for (index, &i) in members.iter().enumerate() {
        for &j in &members[index + 1..] {
            pairwise.push(distances[i][j]);
            let key = (i.min(j), i.max(j));
            if edges.contains(&key) {
                internal_edges += 1;
            }
        }
    }

    let avg = pairwise.iter().sum::<f64>() / pairwise.len() as f64;
    let min = pairwise.iter().cloned().fold(f64::MAX, f64::min);
    let max = pairwise.iter().cloned().fold(f64::MIN, f64::max);

    ClusterMetrics {
        avg_distance: avg,
        min_distance: min,
        max_distance: max,
        cohesion: 1.0 / (1.0 + avg),
        // Directed pair count in the denominator.
        density: (2 * internal_edges) as f64 / (n * (n - 1)) as f64,
    }
}

/// Most common non-stopword term across member neighborhood names.
fn cluster_name(members: &[EnhancedNeighborhood]) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for member in members {
        for term in member
            .neighborhood
            .name
            .split(|c: char| !c.is_alphanumeric())
        {
            let term = term.to_lowercase();
            if term.len() < 2 || STOPWORDS.contains(&term.as_str()) {
                continue;
            }
            *counts.entry(term).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(term, _)| format!("{}-cluster", term))
        .unwrap_or_else(|| "mixed-cluster".to_string())
}

fn optimal_tasks(members: &[EnhancedNeighborhood]) -> Vec<String> {
    let mut git = 0.0;
    let mut dependency = 0.0;
    let mut structural = 0.0;
    for member in members {
        git += member.breakdown.git;
        dependency += member.breakdown.dependency;
        structural += member.breakdown.structural;
    }

    let mut tasks = Vec::new();
    if git >= dependency && git >= structural {
        tasks.push("coordinated feature changes".to_string());
        tasks.push("regression hunting".to_string());
    } else if dependency >= structural {
        tasks.push("impact analysis".to_string());
        tasks.push("dependency upgrades".to_string());
    } else {
        tasks.push("pattern replication".to_string());
        tasks.push("consistency review".to_string());
    }
    tasks
}

fn recommendation_reason(strength: f64, members: &[EnhancedNeighborhood]) -> String {
    let files: usize = members.iter().map(|m| m.neighborhood.files.len()).sum();
    if strength >= 0.6 {
        format!(
            "{} files change together consistently; treat this cluster as one working set",
            files
        )
    } else if strength >= 0.3 {
        format!("{} files share moderate coupling; review before batching", files)
    } else {
        format!("loose grouping of {} files; use as a starting point only", files)
    }
}
