mod grammar;
mod read;

pub use read::{count_lines, read_source};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{CodeContextError, Result};
use crate::lang::Language;

/// Line/column span, 1-based lines. Invariant: start ≤ end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn is_well_formed(&self) -> bool {
        (self.start_line, self.start_col) <= (self.end_line, self.end_col)
    }
}

/// Uniform parse tree node. Kinds are grammar-defined strings; text is an
/// owned slice so the source buffer can be freed after extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeNode {
    pub id: u32,
    pub kind: String,
    pub span: Span,
    pub text: Option<String>,
    pub children: Vec<CodeNode>,
}

impl CodeNode {
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn child_by_kind(&self, kind: &str) -> Option<&CodeNode> {
        self.children.iter().find(|c| c.kind == kind)
    }

    pub fn descendant_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(CodeNode::descendant_count)
            .sum::<usize>()
    }

    pub fn walk_preorder<'a>(&'a self, visit: &mut impl FnMut(&'a CodeNode)) {
        visit(self);
        for child in &self.children {
            child.walk_preorder(visit);
        }
    }
}

/// Parse result tagged with the content hash and caller-supplied version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedAst {
    pub root: CodeNode,
    pub content_hash: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

impl VersionedAst {
    fn new(root: CodeNode, content: &str, version: String) -> Self {
        Self {
            root,
            content_hash: blake3::hash(content.as_bytes()).to_hex().to_string(),
            version,
            created_at: Utc::now(),
        }
    }
}

/// Parses `content` as the language detected from `path`. For languages
/// without a grammar binding the result is a synthetic single-node tree
/// carrying the full source; callers must not assume children exist.
pub fn parse_versioned(path: &str, content: &str, version: &str) -> Result<VersionedAst> {
    let language = Language::from_path(Path::new(path)).ok_or_else(|| {
        CodeContextError::parse_failure(path, "unknown file extension")
    })?;

    let root = parse_source(language, path, content)?;
    Ok(VersionedAst::new(root, content, version.to_string()))
}

/// Reads `path` from disk and parses it; the version tag is the content hash.
pub async fn parse_file(path: &Path) -> Result<VersionedAst> {
    let bytes = read_source(path)
        .await
        .map_err(|e| CodeContextError::parse_failure(path.display().to_string(), e))?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    let hash = blake3::hash(content.as_bytes()).to_hex().to_string();

    let path_str = path.to_string_lossy().replace('\\', "/");
    let version = hash.clone();

    tokio::task::spawn_blocking(move || parse_versioned(&path_str, &content, &version))
        .await
        .map_err(|e| CodeContextError::parse_failure(path.display().to_string(), e))?
}

pub fn parse_source(language: Language, path: &str, content: &str) -> Result<CodeNode> {
    if language.has_grammar() {
        grammar::parse_with_grammar(language, path, content)
    } else {
        Ok(grammar::synthetic_tree(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammarless_input_yields_synthetic_single_node() {
        let ast = parse_versioned("config.json", "{\"a\": 1}", "v1").expect("parses");
        assert_eq!(ast.root.kind, "document");
        assert!(ast.root.children.is_empty());
        assert_eq!(ast.root.text_or_empty(), "{\"a\": 1}");
    }

    #[test]
    fn unknown_extension_is_a_parse_failure() {
        let err = parse_versioned("binary.exe", "MZ", "v1").unwrap_err();
        assert!(matches!(
            err,
            CodeContextError::ParseFailure { .. }
        ));
    }

    #[test]
    fn rust_source_produces_named_children_with_well_formed_spans() {
        let source = "fn main() {}\nstruct Point { x: i32, y: i32 }\n";
        let ast = parse_versioned("src/main.rs", source, "v1").expect("parses");

        assert!(!ast.root.children.is_empty());
        let mut all_well_formed = true;
        ast.root.walk_preorder(&mut |node| {
            if !node.span.is_well_formed() {
                all_well_formed = false;
            }
        });
        assert!(all_well_formed);
        assert!(ast.root.child_by_kind("function_item").is_some());
        assert!(ast.root.child_by_kind("struct_item").is_some());
    }

    #[test]
    fn version_tag_and_hash_are_recorded() {
        let ast = parse_versioned("a.py", "x = 1\n", "rev-7").expect("parses");
        assert_eq!(ast.version, "rev-7");
        assert_eq!(ast.content_hash.len(), 64);
    }

    #[test]
    fn syntax_errors_still_yield_a_usable_tree() {
        let ast = parse_versioned("bad.rs", "fn broken( {", "v1").expect("parses");
        let mut has_error_node = false;
        ast.root.walk_preorder(&mut |node| {
            if node.kind == "ERROR" {
                has_error_node = true;
            }
        });
        assert!(has_error_node);
    }

    #[tokio::test]
    async fn parse_file_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("m.rs");
        std::fs::write(&path, "fn top() {}\n").expect("write");

        let ast = parse_file(&path).await.expect("parses");
        assert_eq!(ast.version, ast.content_hash);
        assert!(ast.root.child_by_kind("function_item").is_some());
    }

    #[test]
    fn wide_nodes_are_truncated() {
        let mut source = String::new();
        for i in 0..1500 {
            source.push_str(&format!("let x{} = {};\n", i, i));
        }
        let ast = parse_versioned("wide.js", &source, "v1").expect("parses");
        assert!(ast.root.children.len() <= 1000);
    }
}
