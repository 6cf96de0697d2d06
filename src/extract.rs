pub mod frameworks;
pub mod imports;
pub mod languages;
pub mod symbols;

pub use symbols::{Import, Symbol, SymbolKind};

use chrono::{DateTime, Utc};

use crate::framework::Framework;
use crate::lang::Language;
use crate::parse::{CodeNode, VersionedAst};
use frameworks::FrameworkContext;
use languages::LanguageExtractor;

#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
}

/// Lifts a uniform parse tree into the symbols and imports it implies:
/// a language pass over the whole tree, then a framework pass that may
/// reclassify (never drop) symbols.
pub fn extract(
    ast: &VersionedAst,
    file_path: &str,
    language: Language,
    framework: Option<Framework>,
    content: &str,
    last_modified: DateTime<Utc>,
) -> ExtractionResult {
    let mut walker = Walker {
        extractor: LanguageExtractor::for_language(language),
        language,
        file_path,
        framework,
        content,
        last_modified,
        result: ExtractionResult::default(),
    };

    walker.visit(&ast.root, None, None);
    walker.result
}

struct Walker<'a> {
    extractor: LanguageExtractor,
    language: Language,
    file_path: &'a str,
    framework: Option<Framework>,
    content: &'a str,
    last_modified: DateTime<Utc>,
    result: ExtractionResult,
}

impl Walker<'_> {
    fn is_script(&self) -> bool {
        matches!(self.language, Language::JavaScript | Language::TypeScript)
    }

    fn visit(
        &mut self,
        node: &CodeNode,
        parent: Option<&CodeNode>,
        prev_sibling: Option<&CodeNode>,
    ) {
        let parent_kind = parent.map(|p| p.kind.as_str());

        if let Some(kind) = self.extractor.handle_node(&node.kind, parent_kind) {
            if kind == SymbolKind::Import {
                self.emit_import(node);
            } else {
                if kind == SymbolKind::Variable && self.is_script() {
                    if let Some(import) = imports::parse_require(node) {
                        self.result.imports.push(import);
                    }
                }
                self.emit_symbol(node, parent, prev_sibling, kind);
            }
        }

        let mut prev: Option<&CodeNode> = None;
        for child in &node.children {
            self.visit(child, Some(node), prev);
            prev = Some(child);
        }
    }

    fn emit_import(&mut self, node: &CodeNode) {
        let Some(import) = imports::parse_import(self.language, node) else {
            return;
        };

        self.result.symbols.push(Symbol {
            id: symbol_id(self.file_path, &import.source, node.span.start_line),
            name: import.source.clone(),
            kind: SymbolKind::Import,
            file: self.file_path.to_string(),
            span: node.span,
            signature: None,
            doc: None,
            language: self.language,
            hash: blake3::hash(node.text_or_empty().as_bytes())
                .to_hex()
                .to_string(),
            last_modified: self.last_modified,
        });
        self.result.imports.push(import);
    }

    fn emit_symbol(
        &mut self,
        node: &CodeNode,
        parent: Option<&CodeNode>,
        prev_sibling: Option<&CodeNode>,
        language_kind: SymbolKind,
    ) {
        let Some(name) = self.extractor.detect_name(node) else {
            return;
        };

        let kind = match self.framework {
            Some(framework) => {
                let ctx = FrameworkContext {
                    framework,
                    file_path: self.file_path,
                    file_content: self.content,
                };
                frameworks::reclassify(
                    &ctx,
                    language_kind,
                    &name,
                    node.text_or_empty(),
                    is_default_export(parent),
                )
                .unwrap_or(language_kind)
            }
            None => language_kind,
        };

        let doc = prev_sibling.and_then(doc_of).or_else(|| {
            if self.language == Language::Python {
                python_docstring(node)
            } else {
                None
            }
        });

        self.result.symbols.push(Symbol {
            id: symbol_id(self.file_path, &name, node.span.start_line),
            name,
            kind,
            file: self.file_path.to_string(),
            span: node.span,
            signature: signature_of(node),
            doc,
            language: self.language,
            hash: blake3::hash(node.text_or_empty().as_bytes())
                .to_hex()
                .to_string(),
            last_modified: self.last_modified,
        });
    }
}

fn symbol_id(file: &str, name: &str, line: u32) -> String {
    format!("{}:{}:{}", file, name, line)
}

fn is_default_export(parent: Option<&CodeNode>) -> bool {
    parent
        .map(|p| {
            p.kind == "export_statement" && p.text_or_empty().starts_with("export default")
        })
        .unwrap_or(false)
}

fn signature_of(node: &CodeNode) -> Option<String> {
    let first_line = node.text_or_empty().lines().next()?.trim_end();
    let sig = first_line.trim_end_matches('{').trim_end();
    if sig.is_empty() {
        None
    } else {
        Some(sig.to_string())
    }
}

/// Leading string expression of a Python definition body.
fn python_docstring(node: &CodeNode) -> Option<String> {
    let body = node.child_by_kind("block")?;
    let first = body.children.first()?;
    if first.kind != "expression_statement" {
        return None;
    }
    let string = first.child_by_kind("string")?;
    let cleaned = string
        .text_or_empty()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn doc_of(node: &CodeNode) -> Option<String> {
    if !node.kind.contains("comment") {
        return None;
    }
    let cleaned = node
        .text_or_empty()
        .lines()
        .map(|line| {
            line.trim_start()
                .trim_start_matches("///")
                .trim_start_matches("//!")
                .trim_start_matches("//")
                .trim_start_matches("/*")
                .trim_start_matches('*')
                .trim_end_matches("*/")
                .trim_start_matches('#')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() { None } else { Some(cleaned) }
}
