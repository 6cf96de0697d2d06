use regex::Regex;
use std::sync::LazyLock;

use super::symbols::SymbolKind;
use crate::framework::Framework;

static HOOK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^use[A-Z]").expect("valid hook pattern"));

pub struct FrameworkContext<'a> {
    pub framework: Framework,
    pub file_path: &'a str,
    pub file_content: &'a str,
}

/// Framework reclassification pass. Returns the framework-specific kind
/// when a structural predicate fires; `None` keeps the language-pass kind,
/// so the pass never downgrades a symbol.
pub fn reclassify(
    ctx: &FrameworkContext,
    kind: SymbolKind,
    name: &str,
    node_text: &str,
    default_export: bool,
) -> Option<SymbolKind> {
    let eligible = matches!(
        kind,
        SymbolKind::Function
            | SymbolKind::Method
            | SymbolKind::Class
            | SymbolKind::Variable
            | SymbolKind::Namespace
    );
    if !eligible {
        return None;
    }

    match ctx.framework {
        Framework::React => reclassify_react(kind, name, node_text),
        Framework::NextJs => reclassify_next(ctx, kind, name, node_text, default_export),
        Framework::Angular => reclassify_angular(ctx, kind),
        Framework::Svelte | Framework::SvelteKit => reclassify_svelte(kind, node_text),
        Framework::Vue | Framework::Nuxt => reclassify_vue(kind, node_text),
        _ => None,
    }
}

fn returns_markup(node_text: &str) -> bool {
    node_text.contains("return <")
        || node_text.contains("=> <")
        || node_text.contains("return (\n")
        || node_text.contains("return (<")
}

fn reclassify_react(kind: SymbolKind, name: &str, node_text: &str) -> Option<SymbolKind> {
    if !matches!(kind, SymbolKind::Function | SymbolKind::Variable) {
        return None;
    }
    if HOOK_NAME.is_match(name) {
        return Some(SymbolKind::Hook);
    }
    if starts_uppercase(name) && returns_markup(node_text) {
        return Some(SymbolKind::Component);
    }
    None
}

fn reclassify_next(
    ctx: &FrameworkContext,
    kind: SymbolKind,
    name: &str,
    node_text: &str,
    default_export: bool,
) -> Option<SymbolKind> {
    let path = ctx.file_path.replace('\\', "/");

    let file_stem = path.rsplit('/').next().unwrap_or(&path);
    if file_stem.starts_with("middleware.") && name == "middleware" {
        return Some(SymbolKind::Middleware);
    }

    let in_api = path.contains("/pages/api/") || path.contains("/app/api/");
    let in_routes = path.contains("/pages/") || path.contains("/app/");

    if default_export
        && matches!(kind, SymbolKind::Function)
        && (in_api || in_routes)
    {
        return Some(SymbolKind::Route);
    }

    // Everything else behaves like React inside a Next.js project.
    reclassify_react(kind, name, node_text)
}

fn reclassify_angular(ctx: &FrameworkContext, kind: SymbolKind) -> Option<SymbolKind> {
    if kind != SymbolKind::Class {
        return None;
    }
    if ctx.file_content.contains("@Component") {
        return Some(SymbolKind::Component);
    }
    if ctx.file_content.contains("@Injectable") {
        return Some(SymbolKind::Service);
    }
    if ctx.file_content.contains("@Directive") {
        return Some(SymbolKind::Directive);
    }
    None
}

fn reclassify_svelte(kind: SymbolKind, node_text: &str) -> Option<SymbolKind> {
    if kind != SymbolKind::Variable {
        return None;
    }
    for store_fn in ["writable(", "readable(", "derived("] {
        if node_text.contains(store_fn) {
            return Some(SymbolKind::Store);
        }
    }
    None
}

fn reclassify_vue(kind: SymbolKind, node_text: &str) -> Option<SymbolKind> {
    if kind != SymbolKind::Variable {
        return None;
    }
    if node_text.contains("defineStore(") {
        return Some(SymbolKind::Store);
    }
    if node_text.contains("computed(") {
        return Some(SymbolKind::Computed);
    }
    if node_text.contains("watch(") {
        return Some(SymbolKind::Watcher);
    }
    None
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(framework: Framework, path: &'a str, content: &'a str) -> FrameworkContext<'a> {
        FrameworkContext {
            framework,
            file_path: path,
            file_content: content,
        }
    }

    #[test]
    fn react_hook_by_name_shape() {
        let c = ctx(Framework::React, "src/hooks.js", "");
        assert_eq!(
            reclassify(&c, SymbolKind::Function, "useCounter", "function useCounter() {}", false),
            Some(SymbolKind::Hook)
        );
        // `user` does not match use[A-Z]
        assert_eq!(
            reclassify(&c, SymbolKind::Function, "userData", "function userData() {}", false),
            None
        );
    }

    #[test]
    fn react_component_requires_markup_return() {
        let c = ctx(Framework::React, "src/App.jsx", "");
        assert_eq!(
            reclassify(
                &c,
                SymbolKind::Function,
                "App",
                "function App() { return <div /> }",
                false
            ),
            Some(SymbolKind::Component)
        );
        assert_eq!(
            reclassify(&c, SymbolKind::Function, "App", "function App() { return 1 }", false),
            None
        );
    }

    #[test]
    fn angular_decorators_classify_classes() {
        let c = ctx(
            Framework::Angular,
            "src/user.service.ts",
            "@Injectable()\nexport class UserService {}",
        );
        assert_eq!(
            reclassify(&c, SymbolKind::Class, "UserService", "class UserService {}", false),
            Some(SymbolKind::Service)
        );
    }

    #[test]
    fn svelte_store_bindings() {
        let c = ctx(Framework::Svelte, "src/stores.js", "");
        assert_eq!(
            reclassify(
                &c,
                SymbolKind::Variable,
                "count",
                "const count = writable(0);",
                false
            ),
            Some(SymbolKind::Store)
        );
    }

    #[test]
    fn next_route_needs_default_export_under_pages() {
        let c = ctx(Framework::NextJs, "web/pages/index.js", "");
        assert_eq!(
            reclassify(&c, SymbolKind::Function, "Home", "function Home() {}", true),
            Some(SymbolKind::Route)
        );
        assert_eq!(
            reclassify(&c, SymbolKind::Function, "helper", "function helper() {}", false),
            None
        );
    }

    #[test]
    fn next_middleware_by_filename_and_export() {
        let c = ctx(Framework::NextJs, "web/middleware.ts", "");
        assert_eq!(
            reclassify(
                &c,
                SymbolKind::Function,
                "middleware",
                "export function middleware() {}",
                false
            ),
            Some(SymbolKind::Middleware)
        );
    }

    #[test]
    fn import_symbols_are_never_touched() {
        let c = ctx(Framework::React, "src/App.jsx", "");
        assert_eq!(
            reclassify(&c, SymbolKind::Import, "react", "import React from 'react'", false),
            None
        );
    }
}
