use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    Json,
    Yaml,
    Toml,
    Vue,
    Svelte,
    Astro,
    Markdown,
    Html,
    Css,
}

/// Static description of a language binding. `parser` names the grammar
/// used by the dispatcher; languages without one get a synthetic tree.
#[derive(Debug, Clone, Copy)]
pub struct LanguageDescriptor {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub parser: Option<&'static str>,
    pub enabled: bool,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Language::Rust),
            "py" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            "json" => Some(Language::Json),
            "yaml" | "yml" => Some(Language::Yaml),
            "toml" => Some(Language::Toml),
            "vue" => Some(Language::Vue),
            "svelte" => Some(Language::Svelte),
            "astro" => Some(Language::Astro),
            "md" | "markdown" => Some(Language::Markdown),
            "html" | "htm" => Some(Language::Html),
            "css" | "scss" | "less" => Some(Language::Css),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn descriptor(&self) -> LanguageDescriptor {
        match self {
            Language::Rust => LanguageDescriptor {
                name: "Rust",
                extensions: &["rs"],
                parser: Some("rust"),
                enabled: true,
            },
            Language::Python => LanguageDescriptor {
                name: "Python",
                extensions: &["py", "pyi"],
                parser: Some("python"),
                enabled: true,
            },
            Language::JavaScript => LanguageDescriptor {
                name: "JavaScript",
                extensions: &["js", "jsx", "mjs", "cjs"],
                parser: Some("javascript"),
                enabled: true,
            },
            Language::TypeScript => LanguageDescriptor {
                name: "TypeScript",
                extensions: &["ts", "tsx"],
                parser: Some("javascript"),
                enabled: true,
            },
            Language::Go => LanguageDescriptor {
                name: "Go",
                extensions: &["go"],
                parser: Some("go"),
                enabled: true,
            },
            Language::Java => LanguageDescriptor {
                name: "Java",
                extensions: &["java"],
                parser: Some("java"),
                enabled: true,
            },
            Language::Json => LanguageDescriptor {
                name: "JSON",
                extensions: &["json"],
                parser: None,
                enabled: true,
            },
            Language::Yaml => LanguageDescriptor {
                name: "YAML",
                extensions: &["yaml", "yml"],
                parser: None,
                enabled: true,
            },
            Language::Toml => LanguageDescriptor {
                name: "TOML",
                extensions: &["toml"],
                parser: None,
                enabled: true,
            },
            Language::Vue => LanguageDescriptor {
                name: "Vue",
                extensions: &["vue"],
                parser: None,
                enabled: true,
            },
            Language::Svelte => LanguageDescriptor {
                name: "Svelte",
                extensions: &["svelte"],
                parser: None,
                enabled: true,
            },
            Language::Astro => LanguageDescriptor {
                name: "Astro",
                extensions: &["astro"],
                parser: None,
                enabled: true,
            },
            Language::Markdown => LanguageDescriptor {
                name: "Markdown",
                extensions: &["md", "markdown"],
                parser: None,
                enabled: true,
            },
            Language::Html => LanguageDescriptor {
                name: "HTML",
                extensions: &["html", "htm"],
                parser: None,
                enabled: true,
            },
            Language::Css => LanguageDescriptor {
                name: "CSS",
                extensions: &["css", "scss", "less"],
                parser: None,
                enabled: true,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    pub fn has_grammar(&self) -> bool {
        self.descriptor().parser.is_some()
    }

    /// Extensions the walker collects. Grammarless languages are still
    /// walked so the graph carries their file nodes.
    pub fn all_extensions() -> Vec<&'static str> {
        ALL.iter()
            .flat_map(|l| l.descriptor().extensions.iter().copied())
            .collect()
    }
}

const ALL: &[Language] = &[
    Language::Rust,
    Language::Python,
    Language::JavaScript,
    Language::TypeScript,
    Language::Go,
    Language::Java,
    Language::Json,
    Language::Yaml,
    Language::Toml,
    Language::Vue,
    Language::Svelte,
    Language::Astro,
    Language::Markdown,
    Language::Html,
    Language::Css,
];

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_from_extension() {
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("yml"), Some(Language::Yaml));
        assert_eq!(Language::from_extension("exe"), None);
    }

    #[test]
    fn grammarless_languages_have_no_parser() {
        assert!(!Language::Json.has_grammar());
        assert!(!Language::Vue.has_grammar());
        assert!(Language::Rust.has_grammar());
    }

    #[test]
    fn typescript_dispatches_to_javascript_grammar() {
        assert_eq!(Language::TypeScript.descriptor().parser, Some("javascript"));
    }
}
