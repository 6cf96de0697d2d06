use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::filter::FileFilter;
use crate::git::CommitInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipStrength {
    Strong,
    Moderate,
    Weak,
}

impl RelationshipStrength {
    pub fn from_correlation(correlation: f64) -> Self {
        if correlation >= 0.7 {
            Self::Strong
        } else if correlation >= 0.4 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
        }
    }
}

/// Pairwise co-change relationship. Correlation is the Jaccard similarity
/// of the two files' commit occurrence sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRelationship {
    pub files: (String, String),
    pub correlation: f64,
    pub frequency: u32,
    pub strength: RelationshipStrength,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleGroup {
    pub name: String,
    pub files: Vec<String>,
    pub cohesion: f64,
    pub change_frequency: u32,
    pub last_changed: DateTime<Utc>,
    pub internal_connections: usize,
    pub external_connections: usize,
}

/// Jaccard relationships over filtered commit history, canonical pair
/// order, sorted by correlation descending then pair.
pub fn build_relationships(commits: &[CommitInfo], filter: &FileFilter) -> Vec<FileRelationship> {
    let mut occurrences: HashMap<String, HashSet<usize>> = HashMap::new();

    for (index, commit) in commits.iter().enumerate() {
        let mut files: Vec<&String> = commit
            .files
            .iter()
            .filter(|f| filter.should_include(f))
            .collect();
        files.sort();
        files.dedup();
        for file in files {
            occurrences.entry(file.clone()).or_default().insert(index);
        }
    }

    let mut files: Vec<&String> = occurrences.keys().collect();
    files.sort();

    let mut relationships = Vec::new();
    for i in 0..files.len() {
        for j in (i + 1)..files.len() {
            let set_a = &occurrences[files[i]];
            let set_b = &occurrences[files[j]];
            let intersection = set_a.intersection(set_b).count();
            if intersection == 0 {
                continue;
            }
            let union = set_a.len() + set_b.len() - intersection;
            let correlation = intersection as f64 / union as f64;

            relationships.push(FileRelationship {
                files: (files[i].clone(), files[j].clone()),
                correlation,
                frequency: intersection as u32,
                strength: RelationshipStrength::from_correlation(correlation),
            });
        }
    }

    relationships.sort_by(|a, b| {
        b.correlation
            .partial_cmp(&a.correlation)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.files.cmp(&b.files))
    });
    relationships
}

/// Connected components over strong relationships; a component of two or
/// more files becomes a module group.
pub fn build_module_groups(
    relationships: &[FileRelationship],
    commits: &[CommitInfo],
) -> Vec<ModuleGroup> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for rel in relationships {
        if rel.strength == RelationshipStrength::Strong {
            adjacency
                .entry(rel.files.0.as_str())
                .or_default()
                .push(rel.files.1.as_str());
            adjacency
                .entry(rel.files.1.as_str())
                .or_default()
                .push(rel.files.0.as_str());
        }
    }

    let mut nodes: Vec<&str> = adjacency.keys().copied().collect();
    nodes.sort();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();

    for start in nodes {
        if visited.contains(start) {
            continue;
        }

        // Iterative DFS with an explicit stack.
        let mut component = Vec::new();
        let mut stack = vec![start];
        visited.insert(start);

        while let Some(node) = stack.pop() {
            component.push(node.to_string());
            if let Some(neighbors) = adjacency.get(node) {
                for neighbor in neighbors {
                    if visited.insert(neighbor) {
                        stack.push(neighbor);
                    }
                }
            }
        }

        if component.len() < 2 {
            continue;
        }
        component.sort();
        groups.push(make_group(component, relationships, commits));
    }

    groups.sort_by(|a, b| a.name.cmp(&b.name));
    groups
}

fn make_group(
    files: Vec<String>,
    relationships: &[FileRelationship],
    commits: &[CommitInfo],
) -> ModuleGroup {
    let members: HashSet<&str> = files.iter().map(String::as_str).collect();

    let mut internal = 0usize;
    let mut external = 0usize;
    for rel in relationships {
        let a_in = members.contains(rel.files.0.as_str());
        let b_in = members.contains(rel.files.1.as_str());
        if a_in && b_in {
            internal += 1;
        } else if a_in || b_in {
            external += 1;
        }
    }

    let cohesion = if internal + external == 0 {
        0.0
    } else {
        internal as f64 / (internal + external) as f64
    };

    let mut change_frequency = 0u32;
    let mut last_changed = DateTime::<Utc>::MIN_UTC;
    for commit in commits {
        if commit.files.iter().any(|f| members.contains(f.as_str())) {
            change_frequency += 1;
            if commit.timestamp > last_changed {
                last_changed = commit.timestamp;
            }
        }
    }

    ModuleGroup {
        name: group_name(&files),
        files,
        cohesion,
        change_frequency,
        last_changed,
        internal_connections: internal,
        external_connections: external,
    }
}

/// Longest common directory prefix suffixed `-module`, or a size-based
/// fallback when the files share no directory.
fn group_name(files: &[String]) -> String {
    let prefix = common_dir_prefix(files);
    if prefix.is_empty() {
        format!("module-{}-files", files.len())
    } else {
        format!("{}-module", prefix)
    }
}

fn common_dir_prefix(files: &[String]) -> String {
    let dirs: Vec<Vec<&str>> = files
        .iter()
        .map(|f| {
            let normalized = f.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
            if normalized.is_empty() {
                Vec::new()
            } else {
                normalized.split('/').collect()
            }
        })
        .collect();

    let Some(first) = dirs.first() else {
        return String::new();
    };

    let mut prefix: Vec<&str> = Vec::new();
    for (depth, segment) in first.iter().enumerate() {
        if dirs.iter().all(|d| d.get(depth) == Some(segment)) {
            prefix.push(segment);
        } else {
            break;
        }
    }

    prefix.join("/")
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

    fn permissive_filter() -> FileFilter {
        FileFilter::from_config(&Config::default(), IgnorePatterns::default())
    }

    #[test]
    fn jaccard_is_one_iff_files_always_co_occur() {
        let commits = vec![
            commit("c1", 100, &["a.rs", "b.rs"]),
            commit("c2", 200, &["a.rs", "b.rs"]),
            commit("c3", 300, &["a.rs", "c.rs"]),
        ];

        let rels = build_relationships(&commits, &permissive_filter());
        let ab = rels
            .iter()
            .find(|r| r.files == ("a.rs".into(), "b.rs".into()))
            .expect("a/b relationship");
        // a in 3 commits, b in 2, both in 2: 2 / 3.
        assert!((ab.correlation - 2.0 / 3.0).abs() < 1e-9);

        let always = vec![
            commit("c1", 100, &["x.rs", "y.rs"]),
            commit("c2", 200, &["x.rs", "y.rs"]),
        ];
        let rels = build_relationships(&always, &permissive_filter());
        assert!((rels[0].correlation - 1.0).abs() < f64::EPSILON);
        assert_eq!(rels[0].strength, RelationshipStrength::Strong);
    }

    #[test]
    fn correlations_stay_in_unit_range() {
        let commits = vec![
            commit("c1", 100, &["a.rs", "b.rs", "c.rs"]),
            commit("c2", 200, &["a.rs", "c.rs"]),
            commit("c3", 300, &["b.rs", "c.rs"]),
        ];
        for rel in build_relationships(&commits, &permissive_filter()) {
            assert!((0.0..=1.0).contains(&rel.correlation));
            assert!(rel.files.0 < rel.files.1);
        }
    }

    #[test]
    fn strength_thresholds() {
        assert_eq!(
            RelationshipStrength::from_correlation(0.7),
            RelationshipStrength::Strong
        );
        assert_eq!(
            RelationshipStrength::from_correlation(0.5),
            RelationshipStrength::Moderate
        );
        assert_eq!(
            RelationshipStrength::from_correlation(0.39),
            RelationshipStrength::Weak
        );
    }

    #[test]
    fn module_groups_are_maximal_strong_components() {
        // Two strong clusters and one weak link between them.
        let commits = vec![
            commit("c1", 100, &["src/auth/login.rs", "src/auth/token.rs"]),
            commit("c2", 200, &["src/auth/login.rs", "src/auth/token.rs"]),
            commit("c3", 300, &["src/auth/login.rs", "src/auth/token.rs"]),
            commit("c4", 400, &["src/ui/view.rs", "src/ui/render.rs"]),
            commit("c5", 500, &["src/ui/view.rs", "src/ui/render.rs"]),
            commit("c6", 600, &["src/ui/view.rs", "src/ui/render.rs"]),
            commit("c7", 700, &["src/auth/login.rs", "src/ui/view.rs", "src/misc.rs"]),
            commit("c8", 800, &["src/misc.rs", "src/other.rs"]),
        ];

        let rels = build_relationships(&commits, &permissive_filter());
        let groups = build_module_groups(&rels, &commits);

        assert_eq!(groups.len(), 2);
        for group in &groups {
            assert!(group.files.len() >= 2);
            assert!((0.0..=1.0).contains(&group.cohesion));
            // Maximality: no file outside the group has a strong
            // relationship into it.
            for rel in &rels {
                if rel.strength != RelationshipStrength::Strong {
                    continue;
                }
                let a_in = group.files.contains(&rel.files.0);
                let b_in = group.files.contains(&rel.files.1);
                assert_eq!(a_in, b_in, "strong edge must not cross group boundary");
            }
        }
    }

    #[test]
    fn group_names_use_common_directory_prefix() {
        let files = vec![
            "src/auth/login.rs".to_string(),
            "src/auth/token.rs".to_string(),
        ];
        assert_eq!(group_name(&files), "src/auth-module");

        let scattered = vec!["login.rs".to_string(), "token.rs".to_string()];
        assert_eq!(group_name(&scattered), "module-2-files");
    }

    #[test]
    fn cohesion_counts_relationships_crossing_the_boundary() {
        let commits = vec![
            commit("c1", 100, &["m/a.rs", "m/b.rs"]),
            commit("c2", 200, &["m/a.rs", "m/b.rs"]),
            commit("c3", 300, &["m/a.rs", "m/b.rs"]),
            commit("c4", 400, &["m/a.rs", "outside.rs"]),
        ];
        let rels = build_relationships(&commits, &permissive_filter());
        let groups = build_module_groups(&rels, &commits);

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.internal_connections, 1);
        assert_eq!(group.external_connections, 1);
        assert!((group.cohesion - 0.5).abs() < f64::EPSILON);
        assert_eq!(group.change_frequency, 4);
    }
}
