use regex::Regex;
use std::sync::LazyLock;

use super::symbols::Import;
use crate::lang::Language;
use crate::parse::CodeNode;

static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid require pattern")
});

/// Lifts an import-kind node into an `Import` record. Imports are
/// syntactic; sources are kept exactly as written.
pub fn parse_import(language: Language, node: &CodeNode) -> Option<Import> {
    match language {
        Language::JavaScript | Language::TypeScript => parse_script_import(node),
        Language::Python => parse_python_import(node),
        Language::Rust => parse_rust_use(node),
        Language::Go => parse_go_import(node),
        Language::Java => parse_java_import(node),
        _ => None,
    }
}

fn parse_script_import(node: &CodeNode) -> Option<Import> {
    let source = node
        .children
        .iter()
        .find(|c| c.kind == "string")
        .map(|c| strip_quotes(c.text_or_empty()))?;

    let mut import = Import {
        source,
        alias: None,
        specifiers: Vec::new(),
        is_default: false,
        line: node.span.start_line,
    };

    if let Some(clause) = node.child_by_kind("import_clause") {
        for child in &clause.children {
            match child.kind.as_str() {
                "identifier" => {
                    import.is_default = true;
                    import.specifiers.push(child.text_or_empty().to_string());
                }
                "named_imports" => {
                    for spec in &child.children {
                        if spec.kind == "import_specifier" {
                            if let Some(name) = spec.children.iter().find(|c| c.kind == "identifier")
                            {
                                import.specifiers.push(name.text_or_empty().to_string());
                            }
                            // `{ x as y }` carries a second identifier
                            let idents: Vec<&CodeNode> = spec
                                .children
                                .iter()
                                .filter(|c| c.kind == "identifier")
                                .collect();
                            if idents.len() > 1 {
                                import.alias =
                                    Some(idents[idents.len() - 1].text_or_empty().to_string());
                            }
                        }
                    }
                }
                "namespace_import" => {
                    if let Some(name) = child.children.iter().find(|c| c.kind == "identifier") {
                        import.alias = Some(name.text_or_empty().to_string());
                    }
                }
                _ => {}
            }
        }
    }

    Some(import)
}

fn parse_python_import(node: &CodeNode) -> Option<Import> {
    let line = node.span.start_line;

    if node.kind == "import_from_statement" {
        let source = node
            .children
            .iter()
            .find(|c| c.kind == "dotted_name" || c.kind == "relative_import")
            .map(|c| c.text_or_empty().to_string())?;

        let mut specifiers = Vec::new();
        let mut seen_import_kw = false;
        for child in &node.children {
            if child.kind == "import" {
                seen_import_kw = true;
                continue;
            }
            if seen_import_kw && (child.kind == "dotted_name" || child.kind == "aliased_import") {
                let name = child
                    .children
                    .first()
                    .map(|c| c.text_or_empty())
                    .unwrap_or_else(|| child.text_or_empty());
                specifiers.push(name.to_string());
            }
        }

        return Some(Import {
            source,
            alias: None,
            specifiers,
            is_default: false,
            line,
        });
    }

    // plain `import a.b as c`
    let target = node
        .children
        .iter()
        .find(|c| c.kind == "dotted_name" || c.kind == "aliased_import")?;

    let (source, alias) = if target.kind == "aliased_import" {
        let source = target
            .children
            .first()
            .map(|c| c.text_or_empty().to_string())
            .unwrap_or_default();
        let alias = target
            .children
            .iter()
            .rev()
            .find(|c| c.kind == "identifier")
            .map(|c| c.text_or_empty().to_string());
        (source, alias)
    } else {
        (target.text_or_empty().to_string(), None)
    };

    Some(Import {
        source,
        alias,
        specifiers: Vec::new(),
        is_default: false,
        line,
    })
}

fn parse_rust_use(node: &CodeNode) -> Option<Import> {
    let text = node.text_or_empty();
    let body = text
        .trim_start_matches("pub ")
        .trim_start_matches("pub(crate) ")
        .strip_prefix("use ")?
        .trim_end_matches(';')
        .trim();

    let (path, alias) = match body.split_once(" as ") {
        Some((p, a)) => (p.trim(), Some(a.trim().to_string())),
        None => (body, None),
    };

    let (source, specifiers) = match path.split_once('{') {
        Some((prefix, rest)) => {
            let names = rest
                .trim_end_matches('}')
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (prefix.trim_end_matches("::").to_string(), names)
        }
        None => (path.to_string(), Vec::new()),
    };

    Some(Import {
        source,
        alias,
        specifiers,
        is_default: false,
        line: node.span.start_line,
    })
}

fn parse_go_import(node: &CodeNode) -> Option<Import> {
    // Single spec or a parenthesized list; the first spec names the record.
    let spec = find_first_by_kind(node, "import_spec")?;
    let source = spec
        .children
        .iter()
        .find(|c| c.kind == "interpreted_string_literal")
        .map(|c| strip_quotes(c.text_or_empty()))?;
    let alias = spec
        .children
        .iter()
        .find(|c| c.kind == "package_identifier")
        .map(|c| c.text_or_empty().to_string());

    Some(Import {
        source,
        alias,
        specifiers: Vec::new(),
        is_default: false,
        line: node.span.start_line,
    })
}

fn parse_java_import(node: &CodeNode) -> Option<Import> {
    let source = node
        .children
        .iter()
        .find(|c| c.kind == "scoped_identifier" || c.kind == "identifier")
        .map(|c| c.text_or_empty().to_string())?;

    Some(Import {
        source,
        alias: None,
        specifiers: Vec::new(),
        is_default: false,
        line: node.span.start_line,
    })
}

/// CommonJS `require('...')` inside a declaration. The bound identifier
/// becomes the alias.
pub fn parse_require(node: &CodeNode) -> Option<Import> {
    let text = node.text_or_empty();
    let source = REQUIRE_CALL.captures(text)?.get(1)?.as_str().to_string();

    let alias = node
        .children
        .iter()
        .find(|c| c.kind == "variable_declarator")
        .and_then(|d| d.children.iter().find(|c| c.kind == "identifier"))
        .map(|c| c.text_or_empty().to_string());

    Some(Import {
        source,
        alias,
        specifiers: Vec::new(),
        is_default: false,
        line: node.span.start_line,
    })
}

fn find_first_by_kind<'a>(node: &'a CodeNode, kind: &str) -> Option<&'a CodeNode> {
    if node.kind == kind {
        return Some(node);
    }
    node.children
        .iter()
        .find_map(|c| find_first_by_kind(c, kind))
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}
