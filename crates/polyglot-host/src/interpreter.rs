//! Interpreter-process execution for Python and JavaScript.
//!
//! Every run spawns a fresh interpreter with the snippet on stdin. Stdout is
//! streamed line by line to the [`OutputSink`] while it is collected, and the
//! process is killed if it outlives the run timeout.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use polyglot_common::{ExecutionConfig, InterpreterConfig, Language, RuntimeError};
use polyglot_core::{LanguageBackend, OutputSink};

/// Captured result of one interpreter process.
#[derive(Debug)]
struct Finished {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Backend that runs snippets through a local interpreter binary.
#[derive(Debug)]
pub struct InterpreterBackend {
    language: Language,
    config: InterpreterConfig,
    run_timeout: Duration,
    install_timeout: Duration,
}

impl InterpreterBackend {
    /// Create an unbooted backend for `language`.
    pub fn new(language: Language, config: InterpreterConfig, execution: &ExecutionConfig) -> Self {
        Self {
            language,
            config,
            run_timeout: execution.timeout(),
            install_timeout: execution.init_timeout(),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(args)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn spawn(&self, args: &[String]) -> Result<Child, RuntimeError> {
        self.command(args).spawn().map_err(|e| {
            RuntimeError::invalid_config(format!(
                "interpreter `{}` could not be started: {e}",
                self.config.program
            ))
        })
    }

    /// Run the interpreter with `args` and `stdin`, streaming stdout to `sink`.
    async fn run(
        &self,
        args: &[String],
        stdin: &str,
        sink: Option<&OutputSink>,
        limit: Duration,
    ) -> Result<Finished, RuntimeError> {
        let mut child = self.spawn(args)?;
        let input = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = tokio::time::timeout(limit, async {
            let (_, stdout, stderr) = tokio::join!(
                write_stdin(input, stdin),
                stream_lines(stdout, sink),
                read_all(stderr),
            );
            let status = child.wait().await?;
            Ok::<_, io::Error>(Finished {
                status,
                stdout: stdout?,
                stderr: stderr?,
            })
        })
        .await;

        match outcome {
            Ok(finished) => Ok(finished?),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(language = %self.language, error = %e, "Failed to kill interpreter");
                }
                Err(RuntimeError::ExecutionTimeout {
                    duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}

async fn write_stdin(input: Option<tokio::process::ChildStdin>, text: &str) {
    let Some(mut input) = input else {
        return;
    };
    // The program may exit without reading everything.
    if let Err(e) = input.write_all(text.as_bytes()).await {
        debug!(error = %e, "Interpreter closed stdin early");
    }
}

async fn stream_lines(
    stdout: Option<tokio::process::ChildStdout>,
    sink: Option<&OutputSink>,
) -> io::Result<String> {
    let Some(stdout) = stdout else {
        return Ok(String::new());
    };

    let mut reader = BufReader::new(stdout);
    let mut collected = Vec::new();
    loop {
        let start = collected.len();
        if reader.read_until(b'\n', &mut collected).await? == 0 {
            break;
        }
        if let Some(sink) = sink {
            let line = String::from_utf8_lossy(&collected[start..]);
            sink.emit(line.trim_end_matches(['\n', '\r']));
        }
    }
    Ok(String::from_utf8_lossy(&collected).into_owned())
}

async fn read_all(stream: Option<impl AsyncRead + Unpin>) -> io::Result<String> {
    let mut bytes = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut bytes).await?;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn failure_reason(finished: &Finished) -> String {
    let stderr = finished.stderr.trim();
    if stderr.is_empty() {
        format!("process exited with {}", finished.status)
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl LanguageBackend for InterpreterBackend {
    fn language(&self) -> Language {
        self.language
    }

    async fn boot(&mut self) -> Result<String, RuntimeError> {
        let finished = self
            .run(&self.config.version_args, "", None, self.install_timeout)
            .await?;

        if !finished.status.success() {
            return Err(RuntimeError::execution_failed(failure_reason(&finished)));
        }

        // Some interpreters print their version on stderr.
        let version = if finished.stdout.trim().is_empty() {
            finished.stderr.trim()
        } else {
            finished.stdout.trim()
        };
        Ok(version.to_string())
    }

    async fn execute(&mut self, code: &str, sink: &OutputSink) -> Result<String, RuntimeError> {
        let finished = self
            .run(&self.config.args, code, Some(sink), self.run_timeout)
            .await?;

        if !finished.status.success() {
            return Err(RuntimeError::execution_failed(failure_reason(&finished)));
        }
        if !finished.stderr.is_empty() {
            debug!(language = %self.language, stderr = %finished.stderr.trim(), "Interpreter wrote to stderr");
        }
        Ok(finished.stdout)
    }

    async fn install(&mut self, package: &str) -> Result<String, RuntimeError> {
        let Some(install_args) = &self.config.install_args else {
            return Err(RuntimeError::unsupported(self.language, "package install"));
        };

        let mut args = install_args.clone();
        args.push(package.to_string());

        let finished = self.run(&args, "", None, self.install_timeout).await?;
        if !finished.status.success() {
            return Err(RuntimeError::execution_failed(failure_reason(&finished)));
        }
        Ok(finished.stdout)
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_err;

    use super::*;

    fn shell(install_args: Option<Vec<String>>) -> InterpreterBackend {
        let config = InterpreterConfig {
            program: "sh".into(),
            args: vec![],
            version_args: vec!["-c".into(), "echo sh 1.0".into()],
            install_args,
        };
        let execution = ExecutionConfig {
            timeout_ms: 500,
            ..ExecutionConfig::default()
        };
        InterpreterBackend::new(Language::Python, config, &execution)
    }

    #[tokio::test]
    async fn test_boot_reports_version() {
        let mut backend = shell(None);
        assert_eq!(backend.boot().await.unwrap(), "sh 1.0");
    }

    #[tokio::test]
    async fn test_execute_collects_stdout() {
        let mut backend = shell(None);
        let sink = OutputSink::detached(Language::Python);

        let output = backend
            .execute("echo hi\necho there", &sink)
            .await
            .unwrap();
        assert_eq!(output, "hi\nthere\n");
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_still_succeeds() {
        let mut backend = shell(None);
        let sink = OutputSink::detached(Language::Python);

        let output = backend
            .execute("printf '\\377ok\\n'; printf '\\376' >&2", &sink)
            .await
            .unwrap();
        assert_eq!(output, "\u{FFFD}ok\n");
    }

    #[tokio::test]
    async fn test_output_bytes_are_kept_as_written() {
        let mut backend = shell(None);
        let sink = OutputSink::detached(Language::Python);

        let output = backend.execute("printf 'a\\r\\nb'", &sink).await.unwrap();
        assert_eq!(output, "a\r\nb");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let mut backend = shell(None);
        let sink = OutputSink::detached(Language::Python);

        let err = backend
            .execute("echo oops >&2; exit 3", &sink)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Execution failed: oops");
    }

    #[tokio::test]
    async fn test_runaway_process_times_out() {
        let mut backend = shell(None);
        let sink = OutputSink::detached(Language::Python);

        let err = assert_err!(backend.execute("sleep 5", &sink).await);
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_missing_interpreter_fails_boot() {
        let mut backend = InterpreterBackend::new(
            Language::JavaScript,
            InterpreterConfig {
                program: "definitely-not-an-interpreter".into(),
                args: vec!["-".into()],
                version_args: vec!["--version".into()],
                install_args: None,
            },
            &ExecutionConfig::default(),
        );

        let err = assert_err!(backend.boot().await);
        assert!(err.to_string().contains("could not be started"));
    }

    #[tokio::test]
    async fn test_install_requires_install_args() {
        let mut backend = shell(None);
        let err = backend.install("numpy").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Unsupported { .. }));

        let mut backend = shell(Some(vec!["-c".into(), "echo installing \"$0\"".into()]));
        let output = backend.install("numpy").await.unwrap();
        assert_eq!(output.trim(), "installing numpy");
    }
}
