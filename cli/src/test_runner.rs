use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use assist::{AssistConfig, AssistSession};
use blockdoc::loader::load_markdown;
use blockdoc::{Block, MergeMode};

use crate::harness::{self, Target};

#[derive(Debug, Deserialize)]
pub struct ScenarioConfig {
    /// Human-readable scenario description.
    #[serde(default)]
    pub description: Option<String>,

    /// Merge mode. Defaults to replace.
    #[serde(default)]
    pub mode: MergeMode,

    /// Span to select, as BLOCK:OFFSET..BLOCK:OFFSET.
    #[serde(default)]
    pub select: Option<String>,

    /// Block indices to select instead of a span.
    #[serde(default)]
    pub blocks: Option<Vec<usize>>,

    /// Set to false to skip the replace-by-search fallback.
    #[serde(default = "default_search_fallback")]
    pub search_fallback: bool,

    /// The assistant reply fed to the session.
    pub reply: String,

    /// Expected markdown rendering of the document (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected block records of the document.
    #[serde(default)]
    pub expect_blocks: Option<Vec<Block>>,

    /// The session error's Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the merge must have fallen back to appending.
    #[serde(default)]
    pub expect_degraded: bool,
}

fn default_search_fallback() -> bool {
    true
}

impl ScenarioConfig {
    fn target(&self) -> Result<Target, String> {
        match (&self.select, &self.blocks) {
            (Some(_), Some(_)) => Err("set either select or blocks, not both".into()),
            (Some(select), None) => harness::parse_select(select),
            (None, Some(blocks)) => Ok(Target::Blocks(blocks.clone())),
            (None, None) => Err("scenario selects nothing (set select or blocks)".into()),
        }
    }
}

/// Split a `.test.md` file into its scenario config and report markdown.
///
/// The file opens with a `---` line, the TOML runs to the next line that is
/// exactly `---`, and everything after it is the report.
fn parse_test_file(content: &str) -> Result<(ScenarioConfig, String), String> {
    let mut lines = content.trim_start_matches('\u{feff}').lines();
    if lines.next().map(str::trim_end) != Some("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let mut frontmatter = Vec::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim_end() == "---" {
            closed = true;
            break;
        }
        frontmatter.push(line);
    }
    if !closed {
        return Err("missing closing --- frontmatter delimiter".into());
    }

    let config: ScenarioConfig = toml::from_str(&frontmatter.join("\n"))
        .map_err(|e| format!("TOML parse error: {}", e))?;
    let report = lines.collect::<Vec<_>>().join("\n");
    Ok((config, report))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    // 1. Read file
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    // 2. Parse frontmatter
    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };

    let description = config.description.clone();

    let target = match config.target() {
        Ok(target) => target,
        Err(e) => return fail(description, e),
    };

    // 3. Load the report. Loader warnings do not fail a scenario.
    let (mut doc, _warnings) = load_markdown(&source, 0);

    // 4. Run the round trip
    let mut session = AssistSession::with_config(AssistConfig {
        default_mode: config.mode,
        search_fallback: config.search_fallback,
        ..AssistConfig::default()
    });
    let result = harness::round_trip(&mut doc, &mut session, &target, &config.reply);

    // 5. Check error and degradation expectations
    let outcome = match (&config.expect_error, &result) {
        (Some(expected_err), Err(err)) => {
            let err_str = err.to_string();
            if err_str.contains(expected_err.as_str()) {
                None
            } else {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected_err, err_str
                ))
            }
        }
        (Some(expected_err), Ok(_)) => Some(format!(
            "expected error containing \"{}\", but the merge succeeded",
            expected_err
        )),
        (None, Err(err)) => Some(format!("unexpected error: {}", err)),
        (None, Ok(report)) => {
            let degraded = report.degraded.is_some();
            if degraded == config.expect_degraded {
                None
            } else if degraded {
                Some("merge fell back to append unexpectedly".to_string())
            } else {
                Some("expected the merge to fall back to append".to_string())
            }
        }
    };

    if let Some(reason) = outcome {
        return fail(description, reason);
    }

    // 6. Check the resulting document
    if let Some(expected_output) = &config.expect_output {
        let actual = doc.to_string();
        let actual_trimmed = actual.trim();
        let expected_trimmed = expected_output.trim();
        if actual_trimmed != expected_trimmed {
            return fail(
                description,
                format!(
                    "output mismatch\n  expected:\n{}\n  actual:\n{}",
                    indent(expected_trimmed),
                    indent(actual_trimmed)
                ),
            );
        }
    }

    if let Some(expected_blocks) = &config.expect_blocks {
        if let Some(reason) = check_blocks(&doc.snapshot(), expected_blocks) {
            return fail(description, reason);
        }
    }

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Pass,
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare block records. Returns `Some(reason)` on mismatch.
fn check_blocks(actual: &[Block], expected: &[Block]) -> Option<String> {
    if actual.len() != expected.len() {
        let actual_blocks: Vec<String> = actual.iter().map(|b| format!("  - {:?}", b)).collect();
        return Some(format!(
            "expected {} block(s), got {}\n  actual blocks:\n{}",
            expected.len(),
            actual.len(),
            if actual_blocks.is_empty() {
                "    (none)".to_string()
            } else {
                actual_blocks.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in actual.iter().zip(expected.iter()).enumerate() {
        if actual != expected {
            return Some(format!(
                "block[{}]: expected {:?}, got {:?}",
                i, expected, actual
            ));
        }
    }

    None
}

type Categories = BTreeMap<String, Vec<PathBuf>>;

/// Scenario files under `root`, keyed by their folder relative to `root`
/// ("" for files directly inside it).
fn discover_categorized(root: &Path) -> Categories {
    let mut categories = Categories::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if is_scenario(&path) {
                categories
                    .entry(category_of(&path, root))
                    .or_default()
                    .push(path);
            }
        }
    }
    categories.values_mut().for_each(|files| files.sort());
    categories
}

fn is_scenario(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".test.md"))
}

fn category_of(path: &Path, root: &Path) -> String {
    path.parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .map(|dir| dir.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// Keep the requested categories and their subfolders. Unknown names are
/// reported and skipped.
fn filter_categories<'a>(all: &'a Categories, requested: &[String]) -> Vec<(&'a str, &'a [PathBuf])> {
    let wanted = |category: &str| {
        requested.is_empty()
            || requested.iter().any(|name| {
                let name = name.trim_matches('/');
                category == name || category.starts_with(&format!("{}/", name))
            })
    };
    for name in requested {
        let name = name.trim_matches('/');
        let known = all
            .keys()
            .any(|category| category == name || category.starts_with(&format!("{}/", name)));
        if !known {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                name,
                available.join(", ")
            );
        }
    }
    all.iter()
        .filter(|(category, _)| wanted(category))
        .map(|(category, files)| (category.as_str(), files.as_slice()))
        .collect()
}

/// List available categories for the given scenario path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} scenarios)", category_label(category), files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn ok_label(no_color: bool) -> &'static str {
    if no_color { "ok" } else { "\x1b[32mok\x1b[0m" }
}

fn failed_label(no_color: bool) -> &'static str {
    if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn label_of<'a>(result: &'a TestResult) -> &'a str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("?")
    })
}

/// Run all `.test.md` files under `path` (or a single file).
/// If `categories` is non-empty, only run scenarios in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    // Single file mode, categories ignored
    if path.is_file() {
        let result = run_single_test(path);
        let passed = matches!(result.outcome, TestOutcome::Pass);
        let label = if passed { pass_label(no_color) } else { fail_label(no_color) };
        eprintln!("  {}  {}", label, label_of(&result));
        let failures: Vec<TestResult> = if passed { Vec::new() } else { vec![result] };
        print_failures(&failures);
        return summarize(usize::from(passed), usize::from(!passed), no_color);
    }

    let all_categories = discover_categorized(path);

    if all_categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return 1;
    }

    let selected = filter_categories(&all_categories, categories);
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in selected {
        eprintln!();
        eprintln!("{}", bold(category_label(category), no_color));

        for result in files.iter().map(|file| run_single_test(file)) {
            let ok = matches!(result.outcome, TestOutcome::Pass);
            let label = if ok { pass_label(no_color) } else { fail_label(no_color) };
            eprintln!("  {}  {}", label, label_of(&result));
            if ok {
                passed += 1;
            } else {
                failures.push(result);
            }
        }
    }

    print_failures(&failures);
    summarize(passed, failures.len(), no_color)
}

fn print_failures(failures: &[TestResult]) {
    if failures.is_empty() {
        return;
    }
    eprintln!();
    eprintln!("failures:");
    for f in failures {
        eprintln!();
        eprintln!("  --- {} ---", f.path.display());
        if let TestOutcome::Fail(reason) = &f.outcome {
            for line in reason.lines() {
                eprintln!("  {}", line);
            }
        }
    }
}

fn summarize(passed: usize, failed: usize, no_color: bool) -> i32 {
    eprintln!();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", ok_label(no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            failed_label(no_color),
            passed,
            failed,
            passed + failed
        );
        1
    }
}
