use std::cell::RefCell;
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

use super::{CodeNode, Span};
use crate::errors::{CodeContextError, Result};
use crate::lang::Language;

/// Nodes wider than this are truncated during conversion; malformed input
/// can otherwise produce pathological child counts.
const MAX_CHILDREN: usize = 1000;
const MAX_NODE_TEXT: usize = 4096;
const PARSE_TIMEOUT_MICROS: u64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GrammarKey {
    Rust,
    Python,
    JavaScript,
    Tsx,
    Go,
    Java,
}

fn grammar_key(language: Language, path: &str) -> Option<GrammarKey> {
    match language {
        Language::Rust => Some(GrammarKey::Rust),
        Language::Python => Some(GrammarKey::Python),
        Language::JavaScript => Some(GrammarKey::JavaScript),
        // .tsx gets the TSX grammar; plain .ts stays on the JavaScript
        // grammar, matching the dispatch table.
        Language::TypeScript => {
            if path.ends_with(".tsx") {
                Some(GrammarKey::Tsx)
            } else {
                Some(GrammarKey::JavaScript)
            }
        }
        Language::Go => Some(GrammarKey::Go),
        Language::Java => Some(GrammarKey::Java),
        _ => None,
    }
}

fn ts_language(key: GrammarKey) -> tree_sitter::Language {
    match key {
        GrammarKey::Rust => tree_sitter_rust::LANGUAGE.into(),
        GrammarKey::Python => tree_sitter_python::LANGUAGE.into(),
        GrammarKey::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        GrammarKey::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        GrammarKey::Go => tree_sitter_go::LANGUAGE.into(),
        GrammarKey::Java => tree_sitter_java::LANGUAGE.into(),
    }
}

thread_local! {
    static PARSERS: RefCell<HashMap<GrammarKey, Parser>> = RefCell::new(HashMap::new());
}

pub fn parse_with_grammar(language: Language, path: &str, content: &str) -> Result<CodeNode> {
    let key = grammar_key(language, path)
        .ok_or_else(|| CodeContextError::parse_failure(path, "no grammar binding"))?;

    PARSERS.with(|parsers| {
        let mut parsers = parsers.borrow_mut();
        let parser = match parsers.entry(key) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let mut parser = Parser::new();
                parser
                    .set_language(&ts_language(key))
                    .map_err(|e| CodeContextError::parse_failure(path, e))?;
                parser.set_timeout_micros(PARSE_TIMEOUT_MICROS);
                e.insert(parser)
            }
        };

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| CodeContextError::parse_failure(path, "parser timed out"))?;

        let mut next_id = 0u32;
        Ok(convert_node(tree.root_node(), content.as_bytes(), &mut next_id))
    })
}

/// Single-node tree for languages without a grammar binding, carrying the
/// full source.
pub fn synthetic_tree(content: &str) -> CodeNode {
    let line_count = content.lines().count().max(1) as u32;
    CodeNode {
        id: 0,
        kind: "document".to_string(),
        span: Span {
            start_line: 1,
            start_col: 0,
            end_line: line_count,
            end_col: content.lines().last().map(|l| l.len() as u32).unwrap_or(0),
        },
        text: Some(content.to_string()),
        children: Vec::new(),
    }
}

fn convert_node(node: Node, source: &[u8], next_id: &mut u32) -> CodeNode {
    let id = *next_id;
    *next_id += 1;

    let start = node.start_position();
    let end = node.end_position();
    let span = Span {
        start_line: start.row as u32 + 1,
        start_col: start.column as u32,
        end_line: end.row as u32 + 1,
        end_col: end.column as u32,
    };

    let text = node_text(&node, source);

    let mut children = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if children.len() >= MAX_CHILDREN {
            break;
        }
        children.push(convert_node(child, source, next_id));
    }

    CodeNode {
        id,
        kind: node.kind().to_string(),
        span,
        text,
        children,
    }
}

fn node_text(node: &Node, source: &[u8]) -> Option<String> {
    let bytes = &source[node.byte_range()];
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_NODE_TEXT {
        Some(text.into_owned())
    } else {
        // Large bodies keep their first line; enough for signatures.
        text.lines().next().map(|l| l.to_string())
    }
}
