use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lang::Language;
use crate::parse::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Type,
    Variable,
    Constant,
    Import,
    Namespace,
    Property,
    Component,
    Hook,
    Service,
    Directive,
    Store,
    Action,
    Computed,
    Watcher,
    Route,
    Middleware,
}

impl SymbolKind {
    pub fn label(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Import => "import",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Property => "property",
            SymbolKind::Component => "component",
            SymbolKind::Hook => "hook",
            SymbolKind::Service => "service",
            SymbolKind::Directive => "directive",
            SymbolKind::Store => "store",
            SymbolKind::Action => "action",
            SymbolKind::Computed => "computed",
            SymbolKind::Watcher => "watcher",
            SymbolKind::Route => "route",
            SymbolKind::Middleware => "middleware",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub span: Span,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub language: Language,
    pub hash: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    /// Source path as written in the declaration.
    pub source: String,
    pub alias: Option<String>,
    pub specifiers: Vec<String>,
    pub is_default: bool,
    pub line: u32,
}
