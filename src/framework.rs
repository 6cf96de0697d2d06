use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::lang::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    React,
    NextJs,
    Vue,
    Nuxt,
    Angular,
    Svelte,
    SvelteKit,
    Astro,
    Django,
    Flask,
    FastApi,
    SpringBoot,
}

impl Framework {
    pub fn label(&self) -> &'static str {
        match self {
            Framework::React => "React",
            Framework::NextJs => "Next.js",
            Framework::Vue => "Vue",
            Framework::Nuxt => "Nuxt",
            Framework::Angular => "Angular",
            Framework::Svelte => "Svelte",
            Framework::SvelteKit => "SvelteKit",
            Framework::Astro => "Astro",
            Framework::Django => "Django",
            Framework::Flask => "Flask",
            Framework::FastApi => "FastAPI",
            Framework::SpringBoot => "Spring Boot",
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Import-line substrings checked in order; the first hit wins, so more
/// specific frameworks precede the libraries they build on.
const SCRIPT_IMPORT_MARKERS: &[(&str, Framework)] = &[
    ("next/", Framework::NextJs),
    ("#app", Framework::Nuxt),
    ("nuxt/", Framework::Nuxt),
    ("$app/", Framework::SvelteKit),
    ("@sveltejs/kit", Framework::SvelteKit),
    ("@angular/", Framework::Angular),
    ("astro:", Framework::Astro),
    ("'svelte'", Framework::Svelte),
    ("\"svelte\"", Framework::Svelte),
    ("'react'", Framework::React),
    ("\"react\"", Framework::React),
    ("'vue'", Framework::Vue),
    ("\"vue\"", Framework::Vue),
];

/// Manifest dependency names in detection priority order.
const MANIFEST_MARKERS: &[(&str, Framework)] = &[
    ("next", Framework::NextJs),
    ("nuxt", Framework::Nuxt),
    ("@sveltejs/kit", Framework::SvelteKit),
    ("astro", Framework::Astro),
    ("react", Framework::React),
    ("vue", Framework::Vue),
    ("svelte", Framework::Svelte),
    ("@angular/core", Framework::Angular),
];

/// Per-path memoised framework classifier. Negative results are cached.
#[derive(Debug, Default)]
pub struct FrameworkDetector {
    memo: RwLock<HashMap<PathBuf, Option<Framework>>>,
}

impl FrameworkDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detect(&self, path: &Path, language: Language, content: &str) -> Option<Framework> {
        if let Some(cached) = self.memo.read().expect("memo lock").get(path) {
            return *cached;
        }

        let detected = self.classify(path, language, content);
        self.memo
            .write()
            .expect("memo lock")
            .insert(path.to_path_buf(), detected);
        detected
    }

    fn classify(&self, path: &Path, language: Language, content: &str) -> Option<Framework> {
        if let Some(framework) = detect_by_extension(path) {
            return Some(framework);
        }

        match language {
            Language::JavaScript | Language::TypeScript => {
                if let Some(framework) = detect_script_imports(content) {
                    return Some(framework);
                }
                detect_by_manifest(path)
            }
            Language::Python => detect_python_imports(content),
            Language::Java => detect_java_imports(content),
            _ => None,
        }
    }
}

fn detect_by_extension(path: &Path) -> Option<Framework> {
    let name = path.file_name()?.to_str()?;
    let ext = path.extension()?.to_str()?;

    match ext {
        "vue" => return Some(Framework::Vue),
        "svelte" => return Some(Framework::Svelte),
        "astro" => return Some(Framework::Astro),
        _ => {}
    }

    if (ext == "ts" || ext == "js") && name.trim_end_matches(ext).ends_with(".component.") {
        return Some(Framework::Angular);
    }

    None
}

fn detect_script_imports(content: &str) -> Option<Framework> {
    for line in content.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("import") && !trimmed.contains("require(") {
            continue;
        }
        for (marker, framework) in SCRIPT_IMPORT_MARKERS {
            if trimmed.contains(marker) {
                return Some(*framework);
            }
        }
    }
    None
}

fn detect_by_manifest(path: &Path) -> Option<Framework> {
    let mut dir = path.parent()?.to_path_buf();

    loop {
        let manifest = dir.join("package.json");
        if manifest.is_file() {
            if let Some(framework) = classify_manifest(&manifest) {
                return Some(framework);
            }
        }
        if !dir.pop() {
            return None;
        }
    }
}

fn classify_manifest(manifest: &Path) -> Option<Framework> {
    let content = std::fs::read_to_string(manifest).ok()?;
    let parsed: serde_json::Value = serde_json::from_str(&content).ok()?;

    let mut dependencies: HashMap<String, ()> = HashMap::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(map) = parsed.get(section).and_then(|v| v.as_object()) {
            for name in map.keys() {
                dependencies.insert(name.clone(), ());
            }
        }
    }

    MANIFEST_MARKERS
        .iter()
        .find(|(name, _)| dependencies.contains_key(*name))
        .map(|(_, framework)| *framework)
}

fn detect_python_imports(content: &str) -> Option<Framework> {
    for line in content.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("import ") && !trimmed.starts_with("from ") {
            continue;
        }
        if trimmed.contains("django") {
            return Some(Framework::Django);
        }
        if trimmed.contains("flask") {
            return Some(Framework::Flask);
        }
        if trimmed.contains("fastapi") {
            return Some(Framework::FastApi);
        }
    }
    None
}

fn detect_java_imports(content: &str) -> Option<Framework> {
    const MARKERS: &[&str] = &[
        "org.springframework",
        "@SpringBootApplication",
        "@RestController",
        "@Service",
    ];
    if MARKERS.iter().any(|m| content.contains(m)) {
        Some(Framework::SpringBoot)
    } else {
        None
    }
}
