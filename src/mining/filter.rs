use std::path::Path;

use crate::config::Config;
use crate::errors::{CodeContextError, Result};
use crate::graph::{FileClass, classify_path};
use crate::lang::Language;

pub const IGNORE_FILE: &str = ".codecontextignore";

const MANIFEST_FILES: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "pyproject.toml",
    "requirements.txt",
];

/// Gitignore-style patterns from `.codecontextignore`: blank and `#` lines
/// are comments, a trailing `/` matches a directory segment, `*` globs
/// within a basename, and anything without a wildcard falls back to a
/// substring match.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<IgnorePattern>,
}

#[derive(Debug, Clone)]
enum IgnorePattern {
    Directory(String),
    Glob(String),
    Substring(String),
}

impl IgnorePatterns {
    pub fn parse(content: &str) -> Result<Self> {
        let mut patterns = Vec::new();

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.chars().all(|c| c == '/' || c == '*') {
                return Err(CodeContextError::Config(format!(
                    "{}:{}: pattern matches everything",
                    IGNORE_FILE,
                    line_no + 1
                )));
            }

            if let Some(dir) = line.strip_suffix('/') {
                patterns.push(IgnorePattern::Directory(dir.to_string()));
            } else if line.contains('*') {
                patterns.push(IgnorePattern::Glob(line.to_string()));
            } else {
                patterns.push(IgnorePattern::Substring(line.to_string()));
            }
        }

        Ok(Self { patterns })
    }

    pub async fn load(root: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(root.join(IGNORE_FILE)).await {
            Ok(content) => Self::parse(&content),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        let basename = normalized.rsplit('/').next().unwrap_or(&normalized);

        self.patterns.iter().any(|pattern| match pattern {
            IgnorePattern::Directory(dir) => normalized
                .split('/')
                .rev()
                .skip(1)
                .any(|segment| segment == dir),
            IgnorePattern::Glob(glob) => glob_match(glob, basename),
            IgnorePattern::Substring(sub) => normalized.contains(sub.as_str()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Basename glob: `*` matches any run of characters.
fn glob_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == name;
    }

    let mut rest = name;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }

    // Pattern ended with `*`.
    true
}

/// Mining file predicate: source extensions plus selected manifests,
/// hidden paths excluded (the ignore file itself excepted), class gates
/// from the configuration, and ignore patterns on top.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub include_tests: bool,
    pub include_docs: bool,
    pub include_configs: bool,
    ignore: IgnorePatterns,
}

impl FileFilter {
    pub fn from_config(config: &Config, ignore: IgnorePatterns) -> Self {
        Self {
            include_tests: config.include_tests,
            include_docs: config.include_docs,
            include_configs: config.include_configs,
            ignore,
        }
    }

    pub fn should_include(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        let basename = normalized.rsplit('/').next().unwrap_or(&normalized);

        let hidden = normalized
            .split('/')
            .any(|segment| segment.starts_with('.') && segment != "." && segment != "..");
        if hidden && basename != IGNORE_FILE {
            return false;
        }

        if self.ignore.matches(&normalized) {
            return false;
        }

        let is_manifest = MANIFEST_FILES.contains(&basename);
        let known_language = Language::from_path(Path::new(&normalized)).is_some();
        if !is_manifest && !known_language && basename != IGNORE_FILE {
            return false;
        }

        match classify_path(&normalized) {
            FileClass::Test => self.include_tests,
            FileClass::Docs => self.include_docs,
            FileClass::Config => self.include_configs || is_manifest,
            FileClass::Source => true,
        }
    }
}
