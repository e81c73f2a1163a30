// src/runners/process.rs

//! Toolchain-backed runner.
//!
//! Every run gets its own scratch directory and child process. Both are
//! scoped to the run:
//! - the scratch directory is a `TempDir`, removed when dropped
//! - children are spawned with `kill_on_drop(true)`, so a timeout or a
//!   cancelled request kills the process
//! - the memory sampler stops when dropped
//!
//! stdout and stderr are each read through a byte cap. A program that writes
//! past it is killed and reported as `output_limit_exceeded`.
//!
//! Programs start with a cleared environment (PATH plus configured `env`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use super::{RawRunResult, Runner};
use crate::config::Config;
use crate::language::{CPP, JAVA, JAVASCRIPT, PYTHON};
use crate::metrics::MemoryTracker;
use crate::shim::{node_shim, python_shim};

/// How one language is built and launched.
///
/// Command templates may use:
/// - `{source}`  path of the written submission
/// - `{dir}`     scratch directory
/// - `{binary}`  output path for compiled executables
/// - `{class}`   Java main class name
/// - `{harness}` path of the harness script
/// - `{entry}`   entry function name
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub language: &'static str,
    /// File name for the submission; may contain `{class}`.
    pub source_file: &'static str,
    /// Harness script written next to the submission.
    pub harness: Option<(&'static str, &'static str)>,
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
}

impl Toolchain {
    pub fn builtin(cfg: &Config) -> Vec<Toolchain> {
        let rt = &cfg.runtime;
        let cmd = |parts: &[&str]| parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();

        vec![
            Toolchain {
                language: JAVASCRIPT,
                source_file: "solution.js",
                harness: Some(("harness.cjs", node_shim())),
                compile: None,
                run: cmd(&[rt.node.as_str(), "{harness}", "{source}", "{entry}"]),
            },
            Toolchain {
                language: PYTHON,
                source_file: "solution.py",
                harness: Some(("harness.py", python_shim())),
                compile: None,
                run: cmd(&[rt.python.as_str(), "{harness}", "{source}", "{entry}"]),
            },
            Toolchain {
                language: JAVA,
                source_file: "{class}.java",
                harness: None,
                compile: Some(cmd(&[rt.javac.as_str(), "-d", "{dir}", "{source}"])),
                run: cmd(&[rt.java.as_str(), "-cp", "{dir}", "{class}"]),
            },
            Toolchain {
                language: CPP,
                source_file: "main.cpp",
                harness: None,
                compile: Some(cmd(&[
                    rt.cxx.as_str(),
                    "-O2",
                    "-std=c++17",
                    "-o",
                    "{binary}",
                    "{source}",
                ])),
                run: cmd(&["{binary}"]),
            },
        ]
    }
}

/// Class the JVM is launched with.
///
/// A public class must match its file name, so it wins. Otherwise the class
/// declaring `static void main` is used, falling back to `Main`.
pub fn java_main_class(code: &str) -> String {
    static PUBLIC_RE: OnceLock<Regex> = OnceLock::new();
    static CLASS_RE: OnceLock<Regex> = OnceLock::new();
    static MAIN_RE: OnceLock<Regex> = OnceLock::new();

    let public = PUBLIC_RE.get_or_init(|| {
        Regex::new(r"public\s+(?:final\s+|abstract\s+)*class\s+([A-Za-z_$][A-Za-z0-9_$]*)")
            .expect("valid class regex")
    });
    if let Some(m) = public.captures(code).and_then(|c| c.get(1)) {
        return m.as_str().to_string();
    }

    let class = CLASS_RE.get_or_init(|| {
        Regex::new(r"\bclass\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("valid class regex")
    });
    let main = MAIN_RE.get_or_init(|| {
        Regex::new(r"\bstatic\s+(?:final\s+)?void\s+main\s*\(").expect("valid main regex")
    });

    // Innermost class opened before `main` is the one declaring it.
    main.find(code)
        .and_then(|at| class.captures_iter(&code[..at.start()]).last())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "Main".to_string())
}

struct Vars {
    source: PathBuf,
    dir: PathBuf,
    binary: PathBuf,
    class: String,
    harness: PathBuf,
    entry: String,
}

impl Vars {
    fn render(&self, template: &[String]) -> Vec<String> {
        template
            .iter()
            .map(|part| {
                part.replace("{source}", &self.source.to_string_lossy())
                    .replace("{dir}", &self.dir.to_string_lossy())
                    .replace("{binary}", &self.binary.to_string_lossy())
                    .replace("{class}", &self.class)
                    .replace("{harness}", &self.harness.to_string_lossy())
                    .replace("{entry}", &self.entry)
            })
            .collect()
    }
}

enum ProcessOutcome {
    Exited {
        code: Option<i32>,
        stdout: String,
        stderr: String,
        memory_kb: Option<u64>,
    },
    TimedOut {
        memory_kb: Option<u64>,
    },
    OutputExceeded {
        memory_kb: Option<u64>,
    },
}

enum Capture {
    Overflow,
    Io(std::io::Error),
}

/// Drain a pipe, giving up as soon as it carries more than `limit` bytes.
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
) -> Result<Vec<u8>, Capture> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await.map_err(Capture::Io)?;
        if n == 0 {
            return Ok(buf);
        }
        if buf.len() + n > limit {
            return Err(Capture::Overflow);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

pub struct ProcessRunner {
    toolchain: Toolchain,
    env: BTreeMap<String, String>,
    entry: String,
    compile_timeout: Duration,
    memory_sample: Duration,
    max_output: usize,
}

impl ProcessRunner {
    pub fn new(toolchain: Toolchain, cfg: &Config) -> Self {
        Self {
            toolchain,
            env: cfg.env.clone(),
            entry: cfg.runtime.entry.clone(),
            compile_timeout: Duration::from_millis(cfg.execution.compile_timeout_ms),
            memory_sample: Duration::from_millis(cfg.execution.memory_sample_ms),
            max_output: cfg.execution.max_output_bytes,
        }
    }

    async fn run_in_scratch(
        &self,
        code: &str,
        input: Option<&str>,
        timeout: Duration,
    ) -> Result<RawRunResult> {
        let scratch = tempfile::Builder::new()
            .prefix("algograde-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        let dir = scratch.path();

        let class = java_main_class(code);
        let source = dir.join(self.toolchain.source_file.replace("{class}", &class));
        std::fs::write(&source, code).context("Failed to write submission")?;

        let harness = match &self.toolchain.harness {
            Some((name, script)) => {
                let path = dir.join(name);
                std::fs::write(&path, script).context("Failed to write harness")?;
                path
            }
            None => PathBuf::new(),
        };

        let vars = Vars {
            source,
            dir: dir.to_path_buf(),
            binary: dir.join(if cfg!(windows) { "main.exe" } else { "main" }),
            class,
            harness,
            entry: self.entry.clone(),
        };

        if let Some(compile) = &self.toolchain.compile {
            let argv = vars.render(compile);
            match self.spawn_and_wait(&argv, None, self.compile_timeout, dir).await? {
                ProcessOutcome::TimedOut { .. } => {
                    return Ok(RawRunResult::compile_failed("compilation timed out"));
                }
                ProcessOutcome::OutputExceeded { .. } => {
                    return Ok(RawRunResult::compile_failed("compiler output limit exceeded"));
                }
                ProcessOutcome::Exited {
                    code,
                    stdout,
                    stderr,
                    ..
                } if code != Some(0) => {
                    let diagnostics = format!("{}{}", stderr, stdout);
                    return Ok(RawRunResult::compile_failed(diagnostics.trim()));
                }
                ProcessOutcome::Exited { .. } => {}
            }
        }

        let argv = vars.render(&self.toolchain.run);
        let outcome = self.spawn_and_wait(&argv, input, timeout, dir).await?;

        // `scratch` lives until here; dropping it removes the directory.
        drop(scratch);

        Ok(match outcome {
            ProcessOutcome::TimedOut { memory_kb } => {
                RawRunResult::timed_out().with_memory(memory_kb)
            }
            ProcessOutcome::OutputExceeded { memory_kb } => {
                RawRunResult::output_limit_exceeded().with_memory(memory_kb)
            }
            ProcessOutcome::Exited {
                code,
                stdout,
                stderr,
                memory_kb,
            } => RawRunResult {
                stdout,
                stderr,
                exit_code: code,
                ..RawRunResult::default()
            }
            .with_memory(memory_kb),
        })
    }

    async fn spawn_and_wait(
        &self,
        argv: &[String],
        input: Option<&str>,
        timeout: Duration,
        dir: &Path,
    ) -> Result<ProcessOutcome> {
        let (program, args) = argv.split_first().context("Empty command line")?;

        let path_env =
            std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string());

        let mut cmd = TokioCommand::new(program);
        cmd.args(args)
            .current_dir(dir)
            .env_clear()
            .env("PATH", path_env)
            .envs(&self.env)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(language = self.toolchain.language, program = %program, "spawning");

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn `{}`", program))?;

        let mem = child
            .id()
            .map(|pid| MemoryTracker::start(pid, self.memory_sample));

        // Feed stdin from its own task so a program that never reads cannot
        // block us; the write fails harmlessly once the child is gone.
        if let (Some(mut stdin), Some(data)) = (child.stdin.take(), input) {
            let data = data.as_bytes().to_vec();
            tokio::spawn(async move {
                let _ = stdin.write_all(&data).await;
                let _ = stdin.shutdown().await;
            });
        }

        let stdout = child.stdout.take().context("stdout was not piped")?;
        let stderr = child.stderr.take().context("stderr was not piped")?;
        let limit = self.max_output;

        let waited = tokio::time::timeout(timeout, async {
            let (stdout, stderr) =
                tokio::try_join!(read_capped(stdout, limit), read_capped(stderr, limit))?;
            let status = child.wait().await.map_err(Capture::Io)?;
            Ok::<_, Capture>((status, stdout, stderr))
        })
        .await;
        let memory_kb = mem.and_then(MemoryTracker::stop_and_take);

        match waited {
            Ok(Ok((status, stdout, stderr))) => Ok(ProcessOutcome::Exited {
                code: status.code(),
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                memory_kb,
            }),
            Ok(Err(Capture::Overflow)) => {
                warn!(language = self.toolchain.language, limit, "output limit exceeded; killing");
                let _ = child.start_kill();
                Ok(ProcessOutcome::OutputExceeded { memory_kb })
            }
            Ok(Err(Capture::Io(e))) => Err(e).context("Failed while waiting for program"),
            // kill_on_drop sends SIGKILL when `child` goes out of scope.
            Err(_) => Ok(ProcessOutcome::TimedOut { memory_kb }),
        }
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    fn language(&self) -> &str {
        self.toolchain.language
    }

    fn overhead(&self) -> Duration {
        if self.toolchain.compile.is_some() {
            self.compile_timeout
        } else {
            Duration::ZERO
        }
    }

    async fn run(&self, code: &str, input: Option<&str>, timeout: Duration) -> RawRunResult {
        match self.run_in_scratch(code, input, timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(language = self.toolchain.language, error = %message, "runner fault");
                RawRunResult::fault(message)
            }
        }
    }
}
