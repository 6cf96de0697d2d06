use regex::Regex;
use std::sync::LazyLock;

use super::symbols::SymbolKind;
use crate::lang::Language;
use crate::parse::CodeNode;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("valid identifier pattern"));

const NAME_KINDS: &[&str] = &[
    "identifier",
    "type_identifier",
    "property_identifier",
    "field_identifier",
    "name",
];

/// Per-language node handler. One variant per grammar family; dispatch is
/// a tagged enum rather than a method table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageExtractor {
    /// JavaScript / TypeScript style grammars.
    Script,
    Rust,
    Python,
    Go,
    Java,
    /// Grammarless languages; nothing to extract.
    Passive,
}

impl LanguageExtractor {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::JavaScript | Language::TypeScript => Self::Script,
            Language::Rust => Self::Rust,
            Language::Python => Self::Python,
            Language::Go => Self::Go,
            Language::Java => Self::Java,
            _ => Self::Passive,
        }
    }

    /// Maps a grammar node kind (with its parent's kind for nesting-aware
    /// cases) to the symbol kind it declares, if any.
    pub fn handle_node(&self, node_kind: &str, parent_kind: Option<&str>) -> Option<SymbolKind> {
        match self {
            Self::Script => match node_kind {
                "function_declaration" | "function" | "function_expression" | "arrow_function" => {
                    Some(SymbolKind::Function)
                }
                "class_declaration" => Some(SymbolKind::Class),
                "interface_declaration" => Some(SymbolKind::Interface),
                "type_alias_declaration" => Some(SymbolKind::Type),
                "variable_declaration" | "lexical_declaration" => Some(SymbolKind::Variable),
                "method_definition" => Some(SymbolKind::Method),
                "import_statement" => Some(SymbolKind::Import),
                "export_statement" => Some(SymbolKind::Namespace),
                _ => None,
            },
            Self::Rust => match node_kind {
                "function_item" => {
                    if parent_kind == Some("declaration_list") {
                        Some(SymbolKind::Method)
                    } else {
                        Some(SymbolKind::Function)
                    }
                }
                "struct_item" | "enum_item" => Some(SymbolKind::Class),
                "trait_item" => Some(SymbolKind::Interface),
                "type_item" => Some(SymbolKind::Type),
                "const_item" | "static_item" => Some(SymbolKind::Constant),
                "use_declaration" => Some(SymbolKind::Import),
                "mod_item" => Some(SymbolKind::Namespace),
                _ => None,
            },
            Self::Python => match node_kind {
                "function_definition" => {
                    if parent_kind == Some("block") || parent_kind == Some("class_definition") {
                        Some(SymbolKind::Method)
                    } else {
                        Some(SymbolKind::Function)
                    }
                }
                "class_definition" => Some(SymbolKind::Class),
                "import_statement" | "import_from_statement" => Some(SymbolKind::Import),
                _ => None,
            },
            Self::Go => match node_kind {
                "function_declaration" => Some(SymbolKind::Function),
                "method_declaration" => Some(SymbolKind::Method),
                "type_declaration" => Some(SymbolKind::Type),
                "const_declaration" => Some(SymbolKind::Constant),
                "var_declaration" => Some(SymbolKind::Variable),
                "import_declaration" => Some(SymbolKind::Import),
                _ => None,
            },
            Self::Java => match node_kind {
                "class_declaration" | "enum_declaration" => Some(SymbolKind::Class),
                "interface_declaration" => Some(SymbolKind::Interface),
                "method_declaration" | "constructor_declaration" => Some(SymbolKind::Method),
                "field_declaration" => Some(SymbolKind::Property),
                "import_declaration" => Some(SymbolKind::Import),
                _ => None,
            },
            Self::Passive => None,
        }
    }

    /// Finds the declared name: identifier children first, then a token
    /// scan of the node's source slice skipping keywords.
    pub fn detect_name(&self, node: &CodeNode) -> Option<String> {
        for child in &node.children {
            if NAME_KINDS.contains(&child.kind.as_str()) {
                let text = child.text_or_empty();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }

        let keywords = self.keywords();
        for m in IDENTIFIER.find_iter(node.text_or_empty()) {
            let token = m.as_str();
            if !keywords.contains(&token) {
                return Some(token.to_string());
            }
        }

        None
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Script => &[
                "function", "class", "interface", "type", "const", "let", "var", "async", "await",
                "export", "default", "import", "from", "return", "new", "extends", "implements",
                "static", "get", "set", "public", "private", "protected", "readonly", "abstract",
            ],
            Self::Rust => &[
                "fn", "struct", "enum", "trait", "type", "const", "static", "use", "mod", "pub",
                "crate", "super", "self", "impl", "let", "mut", "async", "unsafe", "extern",
                "where", "dyn", "ref",
            ],
            Self::Python => &[
                "def", "class", "import", "from", "as", "async", "await", "return", "lambda",
                "global", "nonlocal", "pass",
            ],
            Self::Go => &[
                "func", "type", "struct", "interface", "const", "var", "import", "package", "map",
                "chan", "go", "defer", "return",
            ],
            Self::Java => &[
                "class", "interface", "enum", "void", "public", "private", "protected", "static",
                "final", "abstract", "import", "package", "new", "return", "extends", "implements",
                "throws", "synchronized", "int", "long", "double", "float", "boolean", "char",
                "byte", "short",
            ],
            Self::Passive => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Span;

    fn node(kind: &str, text: &str, children: Vec<CodeNode>) -> CodeNode {
        CodeNode {
            id: 0,
            kind: kind.to_string(),
            span: Span::default(),
            text: Some(text.to_string()),
            children,
        }
    }

    #[test]
    fn script_kind_table_covers_spec_kinds() {
        let extractor = LanguageExtractor::Script;
        assert_eq!(
            extractor.handle_node("arrow_function", None),
            Some(SymbolKind::Function)
        );
        assert_eq!(
            extractor.handle_node("lexical_declaration", None),
            Some(SymbolKind::Variable)
        );
        assert_eq!(
            extractor.handle_node("export_statement", None),
            Some(SymbolKind::Namespace)
        );
        assert_eq!(extractor.handle_node("jsx_element", None), None);
    }

    #[test]
    fn rust_functions_inside_impl_are_methods() {
        let extractor = LanguageExtractor::Rust;
        assert_eq!(
            extractor.handle_node("function_item", Some("declaration_list")),
            Some(SymbolKind::Method)
        );
        assert_eq!(
            extractor.handle_node("function_item", Some("source_file")),
            Some(SymbolKind::Function)
        );
    }

    #[test]
    fn name_detection_prefers_identifier_children() {
        let extractor = LanguageExtractor::Script;
        let n = node(
            "function_declaration",
            "function render() {}",
            vec![node("identifier", "render", vec![])],
        );
        assert_eq!(extractor.detect_name(&n), Some("render".to_string()));
    }

    #[test]
    fn name_detection_falls_back_to_token_scan() {
        let extractor = LanguageExtractor::Script;
        let n = node("lexical_declaration", "const counter = 1;", vec![]);
        assert_eq!(extractor.detect_name(&n), Some("counter".to_string()));
    }

    #[test]
    fn dollar_identifiers_are_valid() {
        let extractor = LanguageExtractor::Script;
        let n = node("lexical_declaration", "let $el = query();", vec![]);
        assert_eq!(extractor.detect_name(&n), Some("$el".to_string()));
    }
}
