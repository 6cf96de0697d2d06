use std::path::Path;
use std::process::Command;

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write_file(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, content).expect("write file");
}

fn commit(dir: &Path, message: &str, files: &[(&str, &str)]) {
    for (rel, content) in files {
        write_file(dir, rel, content);
    }
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-m", message]);
}

fn run_codecontext(dir: &Path, args: &[&str]) -> (bool, i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_codecontext");
    let output = Command::new(bin)
        .args(args)
        .current_dir(dir)
        .output()
        .expect("codecontext runs");

    (
        output.status.success(),
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn read_output(dir: &Path, name: &str) -> String {
    let path = dir.join(".codecontext").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

/// Repo with two co-changing JavaScript modules and an independent one.
fn fixture_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    git(root, &["init", "-q"]);

    commit(
        root,
        "feat: session handling",
        &[
            (
                "src/session.js",
                "import { loadToken } from './token';\n\
                 export function openSession() { return loadToken(); }\n",
            ),
            (
                "src/token.js",
                "export function loadToken() { return 'tok'; }\n",
            ),
        ],
    );
    commit(
        root,
        "fix: expire sessions",
        &[
            (
                "src/session.js",
                "import { loadToken } from './token';\n\
                 export function openSession() { return loadToken(); }\n\
                 export function expireSession() {}\n",
            ),
            (
                "src/token.js",
                "export function loadToken() { return 'tok2'; }\n\
                 export function dropToken() {}\n",
            ),
        ],
    );
    commit(
        root,
        "fix: token rotation",
        &[
            (
                "src/session.js",
                "import { loadToken } from './token';\n\
                 export function openSession() { return loadToken(); }\n\
                 export function expireSession() {}\n\
                 export function rotate() {}\n",
            ),
            (
                "src/token.js",
                "export function loadToken() { return 'tok3'; }\n\
                 export function dropToken() {}\n\
                 export function rotateToken() {}\n",
            ),
        ],
    );
    commit(
        root,
        "docs: unrelated helper",
        &[(
            "src/helper.py",
            "def helper():\n    return 1\n",
        )],
    );

    dir
}

#[test]
fn analysis_creates_output_files() {
    let dir = fixture_repo();
    let (ok, code, stdout, stderr) = run_codecontext(dir.path(), &[]);
    assert!(ok, "exit {}: stdout {} stderr {}", code, stdout, stderr);

    for name in ["overview.md", "patterns.md", "neighborhoods.md", "meta.json"] {
        assert!(
            dir.path().join(".codecontext").join(name).exists(),
            "missing {}",
            name
        );
    }
    assert!(
        dir.path().join(".codecontext/cache/index.bin").exists(),
        "missing cache index"
    );
}

#[test]
fn patterns_reflect_co_change_history() {
    let dir = fixture_repo();
    let (ok, ..) = run_codecontext(dir.path(), &[]);
    assert!(ok);

    let patterns = read_output(dir.path(), "patterns.md");
    assert!(
        patterns.contains("session + token"),
        "expected session/token pattern, got:\n{}",
        patterns
    );
    assert!(patterns.contains("src/session.js"));
    assert!(patterns.contains("src/token.js"));
}

#[test]
fn overview_lists_files_and_languages() {
    let dir = fixture_repo();
    let (ok, ..) = run_codecontext(dir.path(), &[]);
    assert!(ok);

    let overview = read_output(dir.path(), "overview.md");
    assert!(overview.contains("JavaScript"));
    assert!(overview.contains("Python"));
    assert!(overview.contains("src/session.js"));
}

#[test]
fn meta_counts_are_consistent() {
    let dir = fixture_repo();
    let (ok, ..) = run_codecontext(dir.path(), &[]);
    assert!(ok);

    let meta: serde_json::Value =
        serde_json::from_str(&read_output(dir.path(), "meta.json")).expect("valid meta");
    assert_eq!(meta["files"].as_u64(), Some(3));
    assert!(meta["symbols"].as_u64().unwrap_or(0) > 0);
}

#[test]
fn not_a_repository_exits_with_code_two() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "src/main.rs", "fn main() {}\n");

    let (ok, code, _, stderr) = run_codecontext(dir.path(), &[]);
    assert!(!ok);
    assert_eq!(code, 2, "stderr: {}", stderr);
    assert!(!dir.path().join(".codecontext").exists());
}

#[test]
fn status_reports_last_analysis() {
    let dir = fixture_repo();
    let (ok, ..) = run_codecontext(dir.path(), &[]);
    assert!(ok);

    let (ok, _, stdout, _) = run_codecontext(dir.path(), &["status"]);
    assert!(ok);
    assert!(stdout.contains("files"));
    assert!(stdout.contains("Branch:"));
}

#[test]
fn clean_clears_the_graph_cache() {
    let dir = fixture_repo();
    let (ok, ..) = run_codecontext(dir.path(), &[]);
    assert!(ok);

    let cache_dir = dir.path().join(".codecontext/cache");
    let entries_before = std::fs::read_dir(&cache_dir).expect("cache dir").count();
    assert!(entries_before > 1, "expected index plus entry files");

    let (ok, _, stdout, _) = run_codecontext(dir.path(), &["clean"]);
    assert!(ok);
    assert!(stdout.contains("Cache cleared"));

    // Only the index remains and it references nothing.
    let (ok, ..) = run_codecontext(dir.path(), &["status"]);
    assert!(ok);
}

#[test]
fn second_run_is_consistent() {
    let dir = fixture_repo();
    let (ok, ..) = run_codecontext(dir.path(), &[]);
    assert!(ok);
    let first = read_output(dir.path(), "patterns.md");

    let (ok, ..) = run_codecontext(dir.path(), &[]);
    assert!(ok);
    let second = read_output(dir.path(), "patterns.md");

    // Stamps differ; the mined content must not.
    let body = |s: &str| s.lines().skip(1).collect::<Vec<_>>().join("\n");
    assert_eq!(body(&first), body(&second));
}

#[test]
fn ignore_file_excludes_paths_from_mining() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    git(root, &["init", "-q"]);

    write_file(root, ".codecontextignore", "vendor/\n");
    commit(
        root,
        "feat: vendored pair",
        &[
            ("vendor/a.js", "export const a = 1;\n"),
            ("vendor/b.js", "export const b = 1;\n"),
            ("src/c.js", "export const c = 1;\n"),
            ("src/d.js", "export const d = 1;\n"),
        ],
    );
    commit(
        root,
        "fix: vendored pair again",
        &[
            ("vendor/a.js", "export const a = 2;\n"),
            ("vendor/b.js", "export const b = 2;\n"),
            ("src/c.js", "export const c = 2;\n"),
            ("src/d.js", "export const d = 2;\n"),
        ],
    );

    let (ok, ..) = run_codecontext(root, &[]);
    assert!(ok);

    let patterns = read_output(root, "patterns.md");
    assert!(!patterns.contains("vendor/a.js"));
    assert!(patterns.contains("src/c.js"));
}
