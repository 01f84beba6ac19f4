//! Read-only checks run before a publish and by the `verify` command.

use std::fs;
use std::path::Path;
use std::process::Command;

use serde::Serialize;
use tracing::debug;

use crate::config::BlogConfig;
use crate::patterns::{INDEX_PATTERNS, ROOT_MARKER, TEMPLATE_PATTERNS};

/// Markers a template in the posts directory uses to reach shared assets.
const RELATIVE_MARKERS: &[&str] = &[r#"href="../"#, r#"src="../"#];
const POST_TEMPLATE_NAME: &str = "post-template";

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub passed: bool,
    pub issues: Vec<String>,
    /// Non-blocking notes.
    pub warnings: Vec<String>,
}

impl CheckReport {
    fn from_issues(issues: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternStatus {
    pub name: &'static str,
    pub found: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternMatchReport {
    pub patterns: Vec<PatternStatus>,
    #[serde(flatten)]
    pub check: CheckReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub environment: CheckReport,
    pub template: Option<PatternMatchReport>,
    pub index: Option<CheckReport>,
    /// Informational only; never affects `passed`.
    pub git: Option<CheckReport>,
    pub passed: bool,
}

/// Required paths under the blog root. A missing root stops the check early.
pub fn verify_environment(config: &BlogConfig) -> CheckReport {
    let mut issues = Vec::new();

    if !config.root.exists() {
        issues.push(format!("Blog root not found: {}", config.root.display()));
        return CheckReport::from_issues(issues, Vec::new());
    }

    let posts = config.posts_path();
    if !posts.exists() {
        issues.push(format!("Posts directory not found: {}", posts.display()));
    }
    let template = config.template_path();
    if !template.exists() {
        issues.push(format!("Template not found: {}", template.display()));
    }
    let index = config.index_path();
    if !index.exists() {
        issues.push(format!("Index file not found: {}", index.display()));
    }
    if !config.root.join(".git").exists() {
        issues.push(format!(
            "Git not initialized in {} (no .git folder)",
            config.root.display()
        ));
    }

    CheckReport::from_issues(issues, Vec::new())
}

pub fn verify_template(path: &Path) -> PatternMatchReport {
    let template = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(_) => {
            return PatternMatchReport {
                patterns: Vec::new(),
                check: CheckReport::from_issues(
                    vec![format!("Template not found: {}", path.display())],
                    Vec::new(),
                ),
            }
        }
    };

    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    let mut patterns = Vec::with_capacity(TEMPLATE_PATTERNS.len());

    for spec in TEMPLATE_PATTERNS.iter() {
        let found = spec.is_found(&template);
        debug!(pattern = spec.name, found, "template pattern");
        if spec.required && !found {
            issues.push(format!("Missing pattern '{}'", spec.name));
        }
        patterns.push(PatternStatus {
            name: spec.name,
            found,
        });
    }

    if !template.contains(ROOT_MARKER) {
        issues.push("Template doesn't appear to be valid HTML (no <html> tag)".to_string());
    }

    let is_post_template = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().contains(POST_TEMPLATE_NAME));
    if is_post_template && !RELATIVE_MARKERS.iter().any(|m| template.contains(m)) {
        warnings.push("Template may have incorrect relative paths for posts/ folder".to_string());
    }

    PatternMatchReport {
        patterns,
        check: CheckReport::from_issues(issues, warnings),
    }
}

pub fn verify_index(path: &Path) -> CheckReport {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            return CheckReport::from_issues(
                vec![format!("Index not found: {}", path.display())],
                Vec::new(),
            )
        }
    };

    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    for spec in INDEX_PATTERNS.iter() {
        let found = spec.is_found(&content);
        debug!(pattern = spec.name, found, "index pattern");
        match (found, spec.required) {
            (true, _) => {}
            (false, true) => issues.push(format!(
                "Missing pattern '{}': new posts won't appear on the homepage",
                spec.name
            )),
            (false, false) => warnings.push(format!("Optional pattern '{}' not found", spec.name)),
        }
    }
    if !content.contains(ROOT_MARKER) {
        issues.push("Index doesn't appear to be valid HTML".to_string());
    }

    CheckReport::from_issues(issues, warnings)
}

fn git(root: &Path, args: &[&str]) -> std::io::Result<std::process::Output> {
    Command::new("git").args(args).current_dir(root).output()
}

/// Whether the blog root is ready to push. Every finding is informational.
pub fn verify_git(root: &Path, remote: &str, branch: &str) -> CheckReport {
    let mut issues = Vec::new();

    match git(root, &["--version"]) {
        Ok(out) if out.status.success() => {}
        Ok(_) => {
            issues.push("Git is not installed or not in PATH".to_string());
            return CheckReport::from_issues(issues, Vec::new());
        }
        Err(_) => {
            issues.push("Git is not installed".to_string());
            return CheckReport::from_issues(issues, Vec::new());
        }
    }

    match git(root, &["rev-parse", "--git-dir"]) {
        Ok(out) if out.status.success() => {}
        _ => {
            issues.push("Not a git repository".to_string());
            return CheckReport::from_issues(issues, Vec::new());
        }
    }

    if !git(root, &["remote", "get-url", remote]).is_ok_and(|o| o.status.success()) {
        issues.push(format!("Git remote '{}' not configured", remote));
    }

    if let Ok(out) = git(root, &["status", "--porcelain"]) {
        if !String::from_utf8_lossy(&out.stdout).trim().is_empty() {
            issues.push("You have uncommitted changes. Commit or stash them first.".to_string());
        }
    }

    if let Ok(out) = git(root, &["branch", "--show-current"]) {
        let current = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if current != branch {
            issues.push(format!("On branch '{}', expected '{}'", current, branch));
        }
    }

    CheckReport::from_issues(issues, Vec::new())
}

/// Every check in order. Git readiness is reported but does not count.
pub fn run_full(config: &BlogConfig) -> VerificationReport {
    let environment = verify_environment(config);
    if !environment.passed {
        return VerificationReport {
            environment,
            template: None,
            index: None,
            git: None,
            passed: false,
        };
    }

    let template = verify_template(&config.template_path());
    let index = verify_index(&config.index_path());
    let git = verify_git(&config.root, &config.git_remote, &config.git_branch);
    let passed = template.check.passed && index.passed;

    VerificationReport {
        environment,
        template: Some(template),
        index: Some(index),
        git: Some(git),
        passed,
    }
}
