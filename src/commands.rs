// src/commands.rs

use crate::auth::ApiKey;
use crate::catalog::Catalog;
use crate::cli::{Cli, Command, OutputFormat};
use crate::config::Config;
use crate::engine::{
    ExecutionRequest, ExecutionResult, Grader, TestCaseResult, TestFixture, ValidationReport,
};
use crate::language::LanguageId;
use crate::request_id::RequestId;
use crate::runners::RunnerRegistry;
use crate::runtime::{self, AppState};
use crate::suite::{self, Suite};
use crate::util::{ensure_dir, read_to_string, source_digest};

use anyhow::{anyhow, bail, Context, Result};
use notify::{RecursiveMode, Watcher};
use serde::Serialize;
use std::future::Future;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, Instrument};

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    let request_id = RequestId::new();
    let span = info_span!("command", request_id = %request_id);

    dispatch(cli).instrument(span).await
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        config: config_path,
        output,
        command,
    } = cli;

    match command {
        Command::Init { language } => init_scaffold(language.as_deref()),

        Command::Languages => {
            let cfg = Config::load_or_default(&config_path)?;
            let languages = RunnerRegistry::from_config(&cfg).languages();
            match output {
                OutputFormat::Simple => {
                    for l in languages {
                        println!("{}", l);
                    }
                }
                _ => print_json(output, &languages)?,
            }
            Ok(())
        }

        Command::Run {
            file,
            language,
            input,
            timeout_ms,
        } => {
            let mut cfg = Config::load_or_default(&config_path)?;
            if let Some(ms) = timeout_ms {
                cfg.execution.timeout_ms = ms;
                cfg.ensure_valid()?;
            }
            cancellable(run_once(&cfg, &file, language.as_deref(), input, output)).await
        }

        Command::Test {
            file,
            fixtures,
            language,
            watch,
        } => {
            let cfg = Config::load_or_default(&config_path)?;
            if watch {
                cancellable(test_with_watch(&cfg, &file, &fixtures, language.as_deref(), output))
                    .await
            } else {
                cancellable(test_once(&cfg, &file, &fixtures, language.as_deref(), output)).await
            }
        }

        Command::Grade {
            file,
            algorithm,
            language,
            threshold,
        } => {
            let mut cfg = Config::load_or_default(&config_path)?;
            if let Some(t) = threshold {
                cfg.grading.threshold = t;
            }
            let catalog = Catalog::from_config(&cfg, &config_path)?;
            cancellable(grade(&cfg, &catalog, &file, algorithm, language.as_deref(), output))
                .await
        }

        Command::Check { root } => {
            let cfg = Config::load_or_default(&config_path)?;
            cancellable(check(&cfg, &root)).await
        }

        Command::Serve { addr } => {
            let cfg = Config::load_or_default(&config_path)?;
            let addr = addr.unwrap_or_else(|| cfg.server.addr.clone());
            let catalog = Catalog::from_config(&cfg, &config_path)?;
            let state = AppState {
                grader: build_grader(&cfg),
                catalog: Arc::new(catalog),
            };

            runtime::serve(&addr, state, ApiKey::from_env(), async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutting down");
            })
            .await
        }
    }
}

/// Ctrl-C drops the in-flight future, which kills any running child.
async fn cancellable<F>(fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        res = fut => res,
        _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
    }
}

fn build_grader(cfg: &Config) -> Grader {
    let registry = Arc::new(RunnerRegistry::from_config(cfg));
    Grader::from_config(cfg, registry)
}

fn resolve_language(file: &Path, explicit: Option<&str>) -> Result<LanguageId> {
    match explicit {
        Some(l) => Ok(LanguageId::new(l)),
        None => LanguageId::from_path(file)
            .ok_or_else(|| anyhow!("Cannot infer language of {:?}; pass --language", file)),
    }
}

/* ---------------- run ---------------- */

async fn run_once(
    cfg: &Config,
    file: &Path,
    language: Option<&str>,
    input: Option<String>,
    output: OutputFormat,
) -> Result<()> {
    let language = resolve_language(file, language)?;
    let code = read_to_string(file)?;

    let request = ExecutionRequest {
        code,
        language: language.to_string(),
        input,
    };
    let result = build_grader(cfg).engine().execute(&request).await?;

    match output {
        OutputFormat::Simple => println!("{}", format_execution(file, &result, should_use_color())),
        _ => print_json(output, &result)?,
    }

    if !result.success {
        bail!("Run failed");
    }
    Ok(())
}

/* ---------------- test ---------------- */

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestOutcome {
    passed_count: usize,
    total_count: usize,
    results: Vec<TestCaseResult>,
}

async fn test_once(
    cfg: &Config,
    file: &Path,
    suite_path: &Path,
    language: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    let outcome = run_suite_fixtures(cfg, file, suite_path, language).await?;

    match output {
        OutputFormat::Simple => println!("{}", format_test_outcome(&outcome, should_use_color())),
        _ => print_json(output, &outcome)?,
    }

    if outcome.passed_count != outcome.total_count {
        bail!(
            "{} of {} test cases failed",
            outcome.total_count - outcome.passed_count,
            outcome.total_count
        );
    }
    Ok(())
}

async fn run_suite_fixtures(
    cfg: &Config,
    file: &Path,
    suite_path: &Path,
    language: Option<&str>,
) -> Result<TestOutcome> {
    let suite = Suite::load(suite_path)?;
    let language = match language {
        Some(l) => LanguageId::new(l),
        None => suite
            .language_for(file)
            .ok_or_else(|| anyhow!("Cannot infer language of {:?}; pass --language", file))?,
    };
    let code = read_to_string(file)?;

    let results = build_grader(cfg)
        .run_fixtures(&code, language.as_str(), &suite.fixtures)
        .await?;

    Ok(TestOutcome {
        passed_count: results.iter().filter(|r| r.passed).count(),
        total_count: results.len(),
        results: results.iter().map(TestCaseResult::redacted).collect(),
    })
}

async fn test_with_watch(
    cfg: &Config,
    file: &Path,
    suite_path: &Path,
    language: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = tx.send(());
        }
    })
    .context("Failed to initialise file watcher")?;

    watcher.watch(file, RecursiveMode::NonRecursive)?;
    watcher.watch(suite_path, RecursiveMode::NonRecursive)?;

    loop {
        clear_screen();

        // Suite and solution are re-read on every pass
        if let Err(e) = test_once(cfg, file, suite_path, language, output).await {
            eprintln!("{}", e);
        }

        if rx.recv().await.is_none() {
            return Ok(());
        }
        // Editors emit several events per save
        tokio::time::sleep(Duration::from_millis(100)).await;
        while rx.try_recv().is_ok() {}
    }
}

fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = std::io::stdout().flush();
}

/* ---------------- grade ---------------- */

async fn grade(
    cfg: &Config,
    catalog: &Catalog,
    file: &Path,
    algorithm: u32,
    language: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    let language = resolve_language(file, language)?;
    let code = read_to_string(file)?;

    let algorithm_name = catalog
        .get(algorithm)
        .map(|a| a.name.clone())
        .unwrap_or_default();
    let report = build_grader(cfg)
        .validate_algorithm(algorithm, &code, language.as_str(), catalog)
        .await?
        .redacted();

    match output {
        OutputFormat::Simple => {
            println!("{}", format_report(&algorithm_name, &report, should_use_color()))
        }
        _ => print_json(output, &report)?,
    }

    if !report.is_valid {
        bail!("Solution scored {} (threshold {})", report.score, cfg.grading.threshold);
    }
    Ok(())
}

/* ---------------- check (CI) ---------------- */

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuiteSummary {
    suite: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    passed_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    feedback: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SuiteSummary {
    fn failed(suite: &Path, error: String) -> Self {
        Self {
            suite: suite.to_string_lossy().to_string(),
            ok: false,
            solution: None,
            language: None,
            sha256: None,
            score: None,
            passed_count: None,
            total_count: None,
            feedback: Vec::new(),
            error: Some(error),
        }
    }
}

async fn check(cfg: &Config, root: &Path) -> Result<()> {
    let suites = suite::discover(root)?;
    if suites.is_empty() {
        bail!("No *{} files found under {:?}", suite::SUITE_SUFFIX, root);
    }

    let grader = build_grader(cfg);
    let mut results = Vec::with_capacity(suites.len());

    for path in &suites {
        let summary = match check_suite(cfg, &grader, path).await {
            Ok(s) => s,
            Err(e) => SuiteSummary::failed(path, format!("{:#}", e)),
        };
        results.push(summary);
    }

    let ok = results.iter().all(|r| r.ok);

    // CI JSON emitter: always one stable JSON blob.
    let out = serde_json::json!({
        "ok": ok,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "results": results,
    });
    println!("{}", serde_json::to_string(&out)?);

    if !ok {
        bail!("One or more suites failed");
    }
    Ok(())
}

async fn check_suite(cfg: &Config, grader: &Grader, path: &Path) -> Result<SuiteSummary> {
    let suite = Suite::load(path)?;
    let solution = suite
        .solution
        .clone()
        .with_context(|| format!("Suite {:?} does not name a solution", path))?;
    let language = suite
        .language_for(&solution)
        .with_context(|| format!("Cannot infer language of {:?}", solution))?;
    let code = read_to_string(&solution)?;

    let threshold = suite.threshold.unwrap_or(cfg.grading.threshold);
    let report = grader
        .validate(&code, language.as_str(), &suite.fixtures, threshold)
        .await?;

    Ok(SuiteSummary {
        suite: path.to_string_lossy().to_string(),
        ok: report.is_valid,
        solution: Some(solution.to_string_lossy().to_string()),
        language: Some(language.to_string()),
        sha256: Some(source_digest(&code)),
        score: Some(report.score),
        passed_count: Some(report.passed_count),
        total_count: Some(report.total_count),
        feedback: report.feedback,
        error: None,
    })
}

/* ---------------- rendering ---------------- */

fn print_json<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    let text = match format {
        OutputFormat::Pretty => {
            serde_json::to_string_pretty(value).context("Failed to format output as pretty JSON")?
        }
        _ => serde_json::to_string(value).context("Failed to format output as JSON")?,
    };
    println!("{}", text);
    Ok(())
}

fn format_execution(file: &Path, result: &ExecutionResult, use_color: bool) -> String {
    let status = if result.success { "OK" } else { "FAIL" };
    let status = paint(status, if result.success { "32" } else { "31" }, use_color);

    let mut out = String::new();
    out.push_str(&format!("{} {}\n", status, file.display()));
    out.push_str(&format!("time: {}ms\n", result.execution_time_ms));

    let mem = result
        .memory_usage_kb
        .map(|v| format!("{}kb", v))
        .unwrap_or_else(|| "n/a".to_string());
    out.push_str(&format!("memory: {}\n", mem));

    if let Some(err) = &result.error {
        out.push_str("error:\n");
        out.push_str(err.trim_end());
        out.push('\n');
    }
    if !result.output.is_empty() {
        out.push_str("output:\n");
        out.push_str(result.output.trim_end());
        out.push('\n');
    }

    out.trim_end().to_string()
}

fn format_test_outcome(outcome: &TestOutcome, use_color: bool) -> String {
    let mut out = String::new();

    for (idx, r) in outcome.results.iter().enumerate() {
        let mark = if r.passed {
            paint("✔", "32", use_color)
        } else {
            paint("✖", "31", use_color)
        };
        out.push_str(&format!("{} Test {}{}", mark, idx + 1, describe_case(&r.fixture)));
        out.push_str(&format!(" ({}ms)", r.execution_time_ms));

        if !r.passed && !r.fixture.hidden {
            match &r.error {
                Some(err) => out.push_str(&format!(
                    "\n    error: {}",
                    err.lines().next().unwrap_or_default()
                )),
                None => out.push_str(&format!(
                    "\n    expected: {}\n    actual:   {}",
                    r.fixture.expected_output.trim(),
                    r.actual_output
                )),
            }
        }
        out.push('\n');
    }

    let all = outcome.passed_count == outcome.total_count;
    let summary = format!("passed {}/{}", outcome.passed_count, outcome.total_count);
    out.push_str(&paint(&summary, if all { "32" } else { "31" }, use_color));
    out
}

fn describe_case(fixture: &TestFixture) -> String {
    if fixture.hidden {
        " (hidden)".to_string()
    } else {
        format!(": {}", fixture.input.trim())
    }
}

fn format_report(algorithm_name: &str, report: &ValidationReport, use_color: bool) -> String {
    let verdict = if report.is_valid { "VALID" } else { "INVALID" };
    let verdict = paint(verdict, if report.is_valid { "32" } else { "31" }, use_color);

    let mut out = String::new();
    if !algorithm_name.is_empty() {
        out.push_str(&format!("{}\n", algorithm_name));
    }
    out.push_str(&format!(
        "{} score {} ({}/{} passed)\n",
        verdict, report.score, report.passed_count, report.total_count
    ));
    for line in &report.feedback {
        out.push_str(&format!("  {}\n", line));
    }
    out.trim_end().to_string()
}

fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{}m{}\x1b[0m", color, text)
    } else {
        text.to_string()
    }
}

/* ---------------- init ---------------- */

fn init_scaffold(language: Option<&str>) -> Result<()> {
    init_scaffold_in(Path::new("."), language)
}

fn init_scaffold_in(root: &Path, language: Option<&str>) -> Result<()> {
    ensure_dir(root)?;

    let language = LanguageId::new(language.unwrap_or("python"));
    let (solution, starter) = match language.as_str() {
        "javascript" => ("solution.js", default_solution_js()),
        "python" => ("solution.py", default_solution_py()),
        "java" => ("Main.java", default_solution_java()),
        "cpp" => ("main.cpp", default_solution_cpp()),
        other => bail!("No starter solution for language {:?}", other),
    };

    write_if_missing(&root.join("algograde.yaml"), default_config_yaml())?;
    write_if_missing(&root.join("sort.suite.yaml"), &default_suite_yaml(solution))?;
    write_if_missing(&root.join(solution), starter)?;

    Ok(())
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        eprintln!("{} already exists (skipping)", path.display());
        return Ok(());
    }
    std::fs::write(path, contents.trim_start())
        .with_context(|| format!("Failed to write {:?}", path))?;
    eprintln!("Created {}", path.display());
    Ok(())
}

fn default_config_yaml() -> &'static str {
    r#"
execution:
  timeout_ms: 2000
  compile_timeout_ms: 10000
  max_parallel_fixtures: 1

grading:
  threshold: 70
  comparison: exact # exact | structural

runtime:
  node: node
  python: python3
  javac: javac
  java: java
  cxx: g++
  entry: solve

# catalog: catalog.yaml
"#
}

fn default_suite_yaml(solution: &str) -> String {
    format!(
        r#"
solution: {}
threshold: 70
fixtures:
  - {{ input: "[64, 34, 25, 12, 22, 11, 90]", expected: "[11,12,22,25,34,64,90]" }}
  - {{ input: "[5, 2, 8, 1, 9]", expected: "[1,2,5,8,9]" }}
  - {{ input: "[1]", expected: "[1]" }}
  - {{ input: "[]", expected: "[]" }}
  - {{ input: "[3, 3, 3]", expected: "[3,3,3]", hidden: true }}
"#,
        solution
    )
}

fn default_solution_js() -> &'static str {
    r#"
function solve(arr) {
  const a = [...arr];
  for (let i = 0; i < a.length; i++) {
    for (let j = 0; j < a.length - i - 1; j++) {
      if (a[j] > a[j + 1]) [a[j], a[j + 1]] = [a[j + 1], a[j]];
    }
  }
  return a;
}
"#
}

fn default_solution_py() -> &'static str {
    r#"
def solve(arr):
    a = list(arr)
    for i in range(len(a)):
        for j in range(len(a) - i - 1):
            if a[j] > a[j + 1]:
                a[j], a[j + 1] = a[j + 1], a[j]
    return a
"#
}

fn default_solution_java() -> &'static str {
    r#"
import java.util.*;

public class Main {
    public static void main(String[] args) {
        String text = new Scanner(System.in).useDelimiter("\\A").next().trim();
        String body = text.substring(1, text.length() - 1).trim();
        List<Integer> a = new ArrayList<>();
        if (!body.isEmpty()) {
            for (String part : body.split(",")) a.add(Integer.parseInt(part.trim()));
        }
        Collections.sort(a);
        System.out.println("Result: " + a.toString().replace(" ", ""));
    }
}
"#
}

fn default_solution_cpp() -> &'static str {
    r#"
#include <algorithm>
#include <iostream>
#include <sstream>
#include <string>
#include <vector>

int main() {
    std::string text((std::istreambuf_iterator<char>(std::cin)), std::istreambuf_iterator<char>());
    for (char& c : text) if (c == '[' || c == ']' || c == ',') c = ' ';
    std::istringstream in(text);
    std::vector<long long> a;
    for (long long x; in >> x;) a.push_back(x);
    std::sort(a.begin(), a.end());
    std::cout << "Result: [";
    for (size_t i = 0; i < a.size(); i++) std::cout << (i ? "," : "") << a[i];
    std::cout << "]" << std::endl;
    return 0;
}
"#
}
