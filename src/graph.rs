use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::extract::{Import, Symbol, SymbolKind};
use crate::lang::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileClass {
    Source,
    Test,
    Config,
    Docs,
}

impl FileClass {
    pub fn label(&self) -> &'static str {
        match self {
            FileClass::Source => "source",
            FileClass::Test => "test",
            FileClass::Config => "config",
            FileClass::Docs => "docs",
        }
    }
}

pub fn classify_path(path: &str) -> FileClass {
    let normalized = path.replace('\\', "/");
    let lower = normalized.to_lowercase();
    let basename = lower.rsplit('/').next().unwrap_or(&lower);

    if lower.contains("/tests/")
        || lower.contains("/test/")
        || lower.contains("/__tests__/")
        || basename.starts_with("test_")
        || basename.contains(".test.")
        || basename.contains(".spec.")
        || basename.ends_with("_test.rs")
        || basename.ends_with("_test.go")
    {
        return FileClass::Test;
    }

    if lower.ends_with(".md") || lower.ends_with(".markdown") || lower.contains("/docs/") {
        return FileClass::Docs;
    }

    if lower.ends_with(".json")
        || lower.ends_with(".yaml")
        || lower.ends_with(".yml")
        || lower.ends_with(".toml")
    {
        return FileClass::Config;
    }

    FileClass::Source
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub path: String,
    pub language: Language,
    pub size: u64,
    pub lines: usize,
    pub class: FileClass,
    pub framework: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub symbol_ids: Vec<String>,
    pub imports: Vec<Import>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Symbol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub path: String,
    pub importance: f64,
    pub edge_count: usize,
    pub change_frequency: u32,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Imports,
    Calls,
    References,
}

impl EdgeType {
    pub fn label(&self) -> &'static str {
        match self {
            EdgeType::Imports => "imports",
            EdgeType::Calls => "calls",
            EdgeType::References => "references",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub project: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub total_files: usize,
    pub total_symbols: usize,
    pub total_edges: usize,
    pub total_lines: usize,
    pub languages: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeGraph {
    pub nodes: HashMap<String, GraphNode>,
    pub edges: HashMap<String, GraphEdge>,
    pub files: HashMap<String, FileNode>,
    pub symbols: HashMap<String, Symbol>,
    pub metadata: GraphMetadata,
}

/// Assembler input: one parsed+extracted file.
#[derive(Debug, Clone)]
pub struct AnalyzedFile {
    pub path: String,
    pub language: Language,
    pub size: u64,
    pub lines: usize,
    pub class: FileClass,
    pub framework: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
}

pub fn file_node_id(path: &str) -> String {
    format!("file:{}", path)
}

/// Builds the code graph: file and symbol nodes, import edges resolved
/// syntactically, and call/reference edges derived from import specifiers
/// that name symbols in the resolved target.
pub fn build_graph(
    project: &str,
    analyzed: Vec<AnalyzedFile>,
    change_frequency: &HashMap<String, u32>,
) -> CodeGraph {
    let mut graph = CodeGraph {
        metadata: GraphMetadata {
            project: project.to_string(),
            generated_at: Some(Utc::now()),
            ..GraphMetadata::default()
        },
        ..CodeGraph::default()
    };

    let paths: Vec<String> = analyzed.iter().map(|f| f.path.clone()).collect();

    for file in &analyzed {
        let churn = change_frequency.get(&file.path).copied().unwrap_or(0);

        graph.nodes.insert(
            file_node_id(&file.path),
            GraphNode {
                id: file_node_id(&file.path),
                kind: NodeKind::File,
                label: file.path.clone(),
                path: file.path.clone(),
                importance: 0.0,
                edge_count: 0,
                change_frequency: churn,
                last_modified: file.last_modified,
            },
        );

        for symbol in &file.symbols {
            graph.nodes.insert(
                symbol.id.clone(),
                GraphNode {
                    id: symbol.id.clone(),
                    kind: NodeKind::Symbol,
                    label: symbol.name.clone(),
                    path: file.path.clone(),
                    importance: 0.0,
                    edge_count: 0,
                    change_frequency: churn,
                    last_modified: symbol.last_modified,
                },
            );
            graph.symbols.insert(symbol.id.clone(), symbol.clone());
        }

        *graph
            .metadata
            .languages
            .entry(file.language.name().to_string())
            .or_insert(0) += 1;
        graph.metadata.total_lines += file.lines;

        graph.files.insert(
            file.path.clone(),
            FileNode {
                path: file.path.clone(),
                language: file.language,
                size: file.size,
                lines: file.lines,
                class: file.class,
                framework: file.framework.clone(),
                last_modified: file.last_modified,
                symbol_ids: file.symbols.iter().map(|s| s.id.clone()).collect(),
                imports: file.imports.clone(),
            },
        );
    }

    for file in &analyzed {
        for import in &file.imports {
            let Some(target) = resolve_import(&file.path, &import.source, &paths) else {
                continue;
            };
            if target == file.path {
                continue;
            }

            add_edge(
                &mut graph,
                &file_node_id(&file.path),
                &file_node_id(&target),
                EdgeType::Imports,
            );

            let target_symbols: Vec<(String, String, SymbolKind)> = graph
                .files
                .get(&target)
                .map(|f| {
                    f.symbol_ids
                        .iter()
                        .filter_map(|id| {
                            graph
                                .symbols
                                .get(id)
                                .map(|s| (id.clone(), s.name.clone(), s.kind))
                        })
                        .collect()
                })
                .unwrap_or_default();

            for spec in &import.specifiers {
                for (symbol_id, name, kind) in &target_symbols {
                    if name != spec {
                        continue;
                    }
                    let edge_type = match kind {
                        SymbolKind::Function | SymbolKind::Method | SymbolKind::Hook => {
                            EdgeType::Calls
                        }
                        _ => EdgeType::References,
                    };
                    add_edge(&mut graph, &file_node_id(&file.path), symbol_id, edge_type);
                }
            }
        }
    }

    score_importance(&mut graph);

    graph.metadata.total_files = graph.files.len();
    graph.metadata.total_symbols = graph.symbols.len();
    graph.metadata.total_edges = graph.edges.len();

    graph
}

fn add_edge(graph: &mut CodeGraph, from: &str, to: &str, edge_type: EdgeType) {
    if !graph.nodes.contains_key(from) || !graph.nodes.contains_key(to) {
        return;
    }
    let id = format!("{}|{}|{}", from, to, edge_type.label());
    if graph.edges.contains_key(&id) {
        return;
    }
    graph.edges.insert(
        id.clone(),
        GraphEdge {
            id,
            from: from.to_string(),
            to: to.to_string(),
            edge_type,
            weight: 1.0,
        },
    );
    if let Some(node) = graph.nodes.get_mut(from) {
        node.edge_count += 1;
    }
    if let Some(node) = graph.nodes.get_mut(to) {
        node.edge_count += 1;
    }
}

fn score_importance(graph: &mut CodeGraph) {
    let max_raw = graph
        .nodes
        .values()
        .map(|n| 2 * n.edge_count as u64 + u64::from(n.change_frequency))
        .max()
        .unwrap_or(0);
    if max_raw == 0 {
        return;
    }
    for node in graph.nodes.values_mut() {
        let raw = 2 * node.edge_count as u64 + u64::from(node.change_frequency);
        node.importance = raw as f64 / max_raw as f64;
    }
}

/// Syntactic import resolution: relative paths joined and probed with
/// known extensions and index files, otherwise a module-stem suffix match.
/// No cross-language symbol resolution is attempted.
fn resolve_import(from_file: &str, source: &str, paths: &[String]) -> Option<String> {
    const PROBE_EXTENSIONS: &[&str] = &[
        "", ".js", ".jsx", ".ts", ".tsx", ".mjs", ".py", ".rs", ".go", ".java", "/index.js",
        "/index.ts", "/mod.rs",
    ];

    if source.starts_with('.') {
        let dir = match from_file.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };
        let joined = normalize_join(dir, source);
        for ext in PROBE_EXTENSIONS {
            let candidate = format!("{}{}", joined, ext);
            if paths.iter().any(|p| *p == candidate) {
                return Some(candidate);
            }
        }
        return None;
    }

    let stem = source
        .rsplit(['/', ':', '.'])
        .find(|s| !s.is_empty())?
        .to_string();

    paths
        .iter()
        .find(|p| {
            let file_stem = p
                .rsplit('/')
                .next()
                .and_then(|name| name.split('.').next())
                .unwrap_or("");
            file_stem == stem
        })
        .cloned()
}

fn normalize_join(dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };

    for segment in relative.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

impl CodeGraph {
    /// Files whose import edges participate in a cycle. DFS with a
    /// recursion-stack bit per node.
    pub fn circular_dependencies(&self) -> Vec<Vec<String>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in self.edges.values() {
            if edge.edge_type == EdgeType::Imports {
                adjacency.entry(&edge.from).or_default().push(&edge.to);
            }
        }
        for targets in adjacency.values_mut() {
            targets.sort();
        }

        let mut roots: Vec<&str> = adjacency.keys().copied().collect();
        roots.sort();

        let mut visited: HashSet<&str> = HashSet::new();
        let mut cycles = Vec::new();

        for root in roots {
            if visited.contains(root) {
                continue;
            }

            let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
            let mut rec_stack: Vec<&str> = vec![root];
            let mut on_stack: HashSet<&str> = HashSet::from([root]);
            visited.insert(root);

            while let Some((node, child_idx)) = stack.last().copied() {
                let children = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);

                if child_idx >= children.len() {
                    stack.pop();
                    rec_stack.pop();
                    on_stack.remove(node);
                    continue;
                }
                stack.last_mut().expect("non-empty stack").1 += 1;

                let next = children[child_idx];
                if on_stack.contains(next) {
                    let start = rec_stack.iter().position(|n| *n == next).unwrap_or(0);
                    let cycle: Vec<String> = rec_stack[start..]
                        .iter()
                        .map(|id| id.trim_start_matches("file:").to_string())
                        .collect();
                    cycles.push(cycle);
                } else if !visited.contains(next) {
                    visited.insert(next);
                    on_stack.insert(next);
                    rec_stack.push(next);
                    stack.push((next, 0));
                }
            }
        }

        cycles
    }
}
