use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::neighborhoods::SemanticNeighborhood;
use crate::config::ScoringWeights;
use crate::graph::{CodeGraph, EdgeType};

const STRUCTURAL_PAIR_FLOOR: f64 = 0.1;
const AFFIX_LEN: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConnection {
    pub from: String,
    pub to: String,
    pub edge_type: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralSimilarity {
    pub files: (String, String),
    pub score: f64,
    pub shared_patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub git: f64,
    pub dependency: f64,
    pub structural: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationStrength {
    VeryStrong,
    Strong,
    Moderate,
    Weak,
}

impl RecommendationStrength {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::VeryStrong
        } else if score >= 0.6 {
            Self::Strong
        } else if score >= 0.4 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryStrong => "very_strong",
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedNeighborhood {
    pub neighborhood: SemanticNeighborhood,
    pub dependency_connections: Vec<DependencyConnection>,
    pub structural_similarities: Vec<StructuralSimilarity>,
    pub combined_score: f64,
    pub breakdown: ScoreBreakdown,
    pub recommendation: RecommendationStrength,
    pub usage_patterns: Vec<String>,
}

/// Scores neighborhoods against the assembled graph: git correlation,
/// dependency edge weights, and structural symbol-name similarity,
/// combined as a weighted mean over the active signals.
pub struct NeighborhoodEnhancer<'a> {
    graph: &'a CodeGraph,
    weights: ScoringWeights,
    min_combined_score: f64,
}

impl<'a> NeighborhoodEnhancer<'a> {
    pub fn new(graph: &'a CodeGraph, weights: ScoringWeights, min_combined_score: f64) -> Self {
        Self {
            graph,
            weights,
            min_combined_score,
        }
    }

    pub fn enhance(&self, neighborhoods: Vec<SemanticNeighborhood>) -> Vec<EnhancedNeighborhood> {
        let mut enhanced: Vec<EnhancedNeighborhood> = neighborhoods
            .into_iter()
            .map(|n| self.enhance_one(n))
            .filter(|e| e.combined_score >= self.min_combined_score)
            .collect();

        enhanced.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.neighborhood.name.cmp(&b.neighborhood.name))
        });
        enhanced
    }

    fn enhance_one(&self, neighborhood: SemanticNeighborhood) -> EnhancedNeighborhood {
        let members: HashSet<&str> = neighborhood.files.iter().map(String::as_str).collect();

        let connections = self.dependency_connections(&members);
        let dependency = if connections.is_empty() {
            None
        } else {
            Some(connections.iter().map(|c| c.weight).sum::<f64>() / connections.len() as f64)
        };

        let similarities = self.structural_similarities(&neighborhood.files);
        let scored: Vec<&StructuralSimilarity> = similarities
            .iter()
            .filter(|s| s.score > STRUCTURAL_PAIR_FLOOR)
            .collect();
        let structural = if scored.is_empty() {
            None
        } else {
            Some(scored.iter().map(|s| s.score).sum::<f64>() / scored.len() as f64)
        };

        let git = neighborhood.correlation_strength.clamp(0.0, 1.0);
        let breakdown = ScoreBreakdown {
            git,
            dependency: dependency.unwrap_or(0.0),
            structural: structural.unwrap_or(0.0),
        };

        let mut weighted = git * self.weights.git;
        let mut active = self.weights.git;
        if let Some(dependency) = dependency {
            weighted += dependency * self.weights.dependencies;
            active += self.weights.dependencies;
        }
        if let Some(structural) = structural {
            weighted += structural * self.weights.structural;
            active += self.weights.structural;
        }
        let combined_score = if active > 0.0 { weighted / active } else { 0.0 };

        let usage_patterns = usage_patterns(&breakdown, &neighborhood);

        EnhancedNeighborhood {
            recommendation: RecommendationStrength::from_score(combined_score),
            neighborhood,
            dependency_connections: connections,
            structural_similarities: similarities,
            combined_score,
            breakdown,
            usage_patterns,
        }
    }

    /// Graph edges of the dependency-flavored types whose endpoints both
    /// resolve inside the neighborhood's file set.
    fn dependency_connections(&self, members: &HashSet<&str>) -> Vec<DependencyConnection> {
        let mut connections: Vec<DependencyConnection> = self
            .graph
            .edges
            .values()
            .filter(|edge| {
                matches!(
                    edge.edge_type,
                    EdgeType::Imports | EdgeType::Calls | EdgeType::References
                )
            })
            .filter_map(|edge| {
                let from = self.graph.nodes.get(&edge.from)?;
                let to = self.graph.nodes.get(&edge.to)?;
                if members.contains(from.path.as_str()) && members.contains(to.path.as_str()) {
                    Some(DependencyConnection {
                        from: from.path.clone(),
                        to: to.path.clone(),
                        edge_type: edge.edge_type.label().to_string(),
                        weight: edge.weight,
                    })
                } else {
                    None
                }
            })
            .collect();

        connections.sort_by(|a, b| {
            (&a.from, &a.to, &a.edge_type).cmp(&(&b.from, &b.to, &b.edge_type))
        });
        connections
    }

    fn structural_similarities(&self, files: &[String]) -> Vec<StructuralSimilarity> {
        let names: HashMap<&str, HashSet<String>> = files
            .iter()
            .map(|f| (f.as_str(), self.exported_names(f)))
            .collect();

        let mut result = Vec::new();
        for i in 0..files.len() {
            for j in (i + 1)..files.len() {
                let set_a = &names[files[i].as_str()];
                let set_b = &names[files[j].as_str()];
                if set_a.is_empty() && set_b.is_empty() {
                    continue;
                }

                let intersection = set_a.intersection(set_b).count();
                let union = set_a.len() + set_b.len() - intersection;
                let score = if union == 0 {
                    0.0
                } else {
                    intersection as f64 / union as f64
                };

                result.push(StructuralSimilarity {
                    files: (files[i].clone(), files[j].clone()),
                    score,
                    shared_patterns: shared_name_patterns(set_a, set_b),
                });
            }
        }
        result
    }

    fn exported_names(&self, file: &str) -> HashSet<String> {
        self.graph
            .files
            .get(file)
            .map(|node| {
                node.symbol_ids
                    .iter()
                    .filter_map(|id| self.graph.symbols.get(id))
                    .map(|s| s.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Shared naming habits between two files: common 3-char prefixes and
/// suffixes, plus the case class when both sides agree.
fn shared_name_patterns(a: &HashSet<String>, b: &HashSet<String>) -> Vec<String> {
    let mut patterns = HashSet::new();

    let affixes = |names: &HashSet<String>| -> (HashSet<String>, HashSet<String>) {
        let mut prefixes = HashSet::new();
        let mut suffixes = HashSet::new();
        for name in names {
            if name.len() >= AFFIX_LEN {
                prefixes.insert(name[..AFFIX_LEN].to_lowercase());
                suffixes.insert(name[name.len() - AFFIX_LEN..].to_lowercase());
            }
        }
        (prefixes, suffixes)
    };

    let (prefixes_a, suffixes_a) = affixes(a);
    let (prefixes_b, suffixes_b) = affixes(b);

    for prefix in prefixes_a.intersection(&prefixes_b) {
        patterns.insert(format!("prefix:{}", prefix));
    }
    for suffix in suffixes_a.intersection(&suffixes_b) {
        patterns.insert(format!("suffix:{}", suffix));
    }

    let case_class = |names: &HashSet<String>| -> Option<&'static str> {
        if names.is_empty() {
            return None;
        }
        let title = names
            .iter()
            .filter(|n| n.chars().next().map(char::is_uppercase).unwrap_or(false))
            .count();
        if title * 2 >= names.len() {
            Some("title")
        } else {
            Some("lower")
        }
    };
    if let (Some(class_a), Some(class_b)) = (case_class(a), case_class(b)) {
        if class_a == class_b {
            patterns.insert(format!("case:{}", class_a));
        }
    }

    let mut result: Vec<String> = patterns.into_iter().collect();
    result.sort();
    result
}

fn usage_patterns(
    breakdown: &ScoreBreakdown,
    neighborhood: &SemanticNeighborhood,
) -> Vec<String> {
    let mut patterns = Vec::new();

    let dominant = if breakdown.git >= breakdown.dependency
        && breakdown.git >= breakdown.structural
    {
        "co-change driven"
    } else if breakdown.dependency >= breakdown.structural {
        "dependency driven"
    } else {
        "structurally similar"
    };
    patterns.push(dominant.to_string());

    for op in &neighborhood.common_operations {
        patterns.push(format!("frequent: {}", op));
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Symbol, SymbolKind};
    use crate::graph::{AnalyzedFile, build_graph, classify_path};
    use crate::lang::Language;
    use crate::parse::Span;
    use chrono::Utc;

    fn symbol(file: &str, name: &str) -> Symbol {
        Symbol {
            id: format!("{}:{}:1", file, name),
            name: name.to_string(),
            kind: SymbolKind::Function,
            file: file.to_string(),
            span: Span::default(),
            signature: None,
            doc: None,
            language: Language::Rust,
            hash: String::new(),
            last_modified: Utc::now(),
        }
    }

    fn analyzed(path: &str, symbols: Vec<Symbol>) -> AnalyzedFile {
        AnalyzedFile {
            path: path.to_string(),
            language: Language::Rust,
            size: 10,
            lines: 5,
            class: classify_path(path),
            framework: None,
            last_modified: Utc::now(),
            symbols,
            imports: Vec::new(),
        }
    }

    fn neighborhood(name: &str, files: &[&str], correlation: f64) -> SemanticNeighborhood {
        SemanticNeighborhood {
            name: name.to_string(),
            files: files.iter().map(|s| s.to_string()).collect(),
            change_frequency: 3,
            last_changed: Utc::now(),
            common_operations: vec!["fix".to_string()],
            correlation_strength: correlation,
            confidence: correlation,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn git_only_signal_normalises_to_git_weight() {
        let graph = build_graph("demo", vec![], &HashMap::new());
        let enhancer = NeighborhoodEnhancer::new(&graph, ScoringWeights::default(), 0.0);

        let enhanced = enhancer.enhance(vec![neighborhood("n", &["a.rs", "b.rs"], 0.9)]);
        assert_eq!(enhanced.len(), 1);
        // No dependency or structural data: score equals the git signal.
        assert!((enhanced[0].combined_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn low_scores_are_dropped() {
        let graph = build_graph("demo", vec![], &HashMap::new());
        let enhancer = NeighborhoodEnhancer::new(&graph, ScoringWeights::default(), 0.4);

        let enhanced = enhancer.enhance(vec![
            neighborhood("keep", &["a.rs"], 0.9),
            neighborhood("drop", &["b.rs"], 0.1),
        ]);
        assert_eq!(enhanced.len(), 1);
        assert_eq!(enhanced[0].neighborhood.name, "keep");
    }

    #[test]
    fn recommendation_thresholds() {
        assert_eq!(
            RecommendationStrength::from_score(0.85),
            RecommendationStrength::VeryStrong
        );
        assert_eq!(
            RecommendationStrength::from_score(0.65),
            RecommendationStrength::Strong
        );
        assert_eq!(
            RecommendationStrength::from_score(0.45),
            RecommendationStrength::Moderate
        );
        assert_eq!(
            RecommendationStrength::from_score(0.1),
            RecommendationStrength::Weak
        );
    }

    #[test]
    fn structural_similarity_uses_symbol_name_jaccard() {
        let graph = build_graph(
            "demo",
            vec![
                analyzed(
                    "a.rs",
                    vec![symbol("a.rs", "parse_header"), symbol("a.rs", "parse_body")],
                ),
                analyzed(
                    "b.rs",
                    vec![symbol("b.rs", "parse_header"), symbol("b.rs", "render")],
                ),
            ],
            &HashMap::new(),
        );
        let enhancer = NeighborhoodEnhancer::new(&graph, ScoringWeights::default(), 0.0);
        let enhanced = enhancer.enhance(vec![neighborhood("n", &["a.rs", "b.rs"], 0.8)]);

        let sims = &enhanced[0].structural_similarities;
        assert_eq!(sims.len(), 1);
        // {parse_header} over {parse_header, parse_body, render}.
        assert!((sims[0].score - 1.0 / 3.0).abs() < 1e-9);
        assert!(sims[0]
            .shared_patterns
            .iter()
            .any(|p| p.starts_with("prefix:par")));
        assert!(sims[0].shared_patterns.contains(&"case:lower".to_string()));
        assert!((0.0..=1.0).contains(&enhanced[0].combined_score));
    }

    #[test]
    fn combined_score_weights_all_active_signals() {
        let graph = build_graph(
            "demo",
            vec![
                analyzed("a.rs", vec![symbol("a.rs", "shared_name")]),
                analyzed("b.rs", vec![symbol("b.rs", "shared_name")]),
            ],
            &HashMap::new(),
        );
        let weights = ScoringWeights {
            git: 0.6,
            dependencies: 0.3,
            structural: 0.1,
        };
        let enhancer = NeighborhoodEnhancer::new(&graph, weights, 0.0);
        let enhanced = enhancer.enhance(vec![neighborhood("n", &["a.rs", "b.rs"], 0.5)]);

        // Structural signal active (identical name sets: jaccard 1.0),
        // dependency inactive: (0.5*0.6 + 1.0*0.1) / 0.7.
        let expected = (0.5 * 0.6 + 1.0 * 0.1) / 0.7;
        assert!((enhanced[0].combined_score - expected).abs() < 1e-9);
    }
}
