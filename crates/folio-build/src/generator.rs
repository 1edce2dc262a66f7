//! External static-site generator process.
//!
//! The generator runs in the project's source directory and must write the
//! site into the output directory it is given. The output directory is
//! passed as the `FOLIO_OUTPUT_DIR` environment variable and can also be
//! spliced into the arguments with the `{output}` placeholder (`{source}`
//! works the same way for the source directory).
//!
//! A run that outlives the command's timeout is killed and reported as
//! [`BuildError::Timeout`].

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::BuildError;

/// Number of stderr lines kept in failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// Default upper bound on one generator run.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Generator program, arguments and time limit.
#[derive(Clone, Debug)]
pub struct GeneratorCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl GeneratorCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the time limit of a run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn expand_args(&self, source: &Path, output: &Path) -> Vec<String> {
        let source = source.display().to_string();
        let output = output.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{source}", &source).replace("{output}", &output))
            .collect()
    }

    /// Run the generator to completion.
    ///
    /// Fails if the process cannot be started, exits unsuccessfully, runs
    /// past the timeout or leaves the output directory missing or empty.
    /// The child is killed if the returned future is dropped.
    pub async fn run(&self, source: &Path, output: &Path) -> Result<(), BuildError> {
        let args = self.expand_args(source, output);
        tracing::debug!(
            program = %self.program,
            args = ?args,
            source = %source.display(),
            output = %output.display(),
            "Running generator"
        );

        let child = Command::new(&self.program)
            .args(&args)
            .current_dir(source)
            .env("FOLIO_SOURCE_DIR", source)
            .env("FOLIO_OUTPUT_DIR", output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        let Ok(result) = tokio::time::timeout(self.timeout, child).await else {
            tracing::warn!(
                program = %self.program,
                timeout_secs = self.timeout.as_secs(),
                "Generator timed out, killed"
            );
            return Err(BuildError::Timeout(self.timeout));
        };
        let result = result
            .map_err(|e| BuildError::Generator(format!("failed to start {}: {e}", self.program)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail = tail_lines(&stderr, STDERR_TAIL_LINES);
            tracing::warn!(
                program = %self.program,
                status = %result.status,
                stderr = %tail,
                "Generator failed"
            );
            return Err(BuildError::Generator(if tail.is_empty() {
                result.status.to_string()
            } else {
                format!("{}: {tail}", result.status)
            }));
        }

        if !has_entries(output).await? {
            return Err(BuildError::Generator(format!(
                "{} produced no output in {}",
                self.program,
                output.display()
            )));
        }

        Ok(())
    }
}

async fn has_entries(dir: &Path) -> Result<bool, BuildError> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sh(script: &str) -> GeneratorCommand {
        GeneratorCommand::new("sh", vec!["-c".to_owned(), script.to_owned()])
    }

    #[test]
    fn test_expand_args() {
        let cmd = GeneratorCommand::new(
            "gen",
            vec!["--in={source}".to_owned(), "--out".to_owned(), "{output}".to_owned()],
        );

        let args = cmd.expand_args(Path::new("/src"), Path::new("/out"));

        assert_eq!(args, vec!["--in=/src", "--out", "/out"]);
    }

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\n\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("", 5), "");
    }

    #[tokio::test]
    async fn test_run_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");

        sh("mkdir -p \"$FOLIO_OUTPUT_DIR\" && echo ok > \"$FOLIO_OUTPUT_DIR/index.html\"")
            .run(dir.path(), &output)
            .await
            .unwrap();

        assert!(output.join("index.html").is_file());
    }

    #[tokio::test]
    async fn test_run_reports_failure_with_stderr() {
        let dir = tempfile::tempdir().unwrap();

        let err = sh("echo broken config >&2; exit 3")
            .run(dir.path(), &dir.path().join("out"))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("broken config"), "{message}");
    }

    #[tokio::test]
    async fn test_run_requires_output() {
        let dir = tempfile::tempdir().unwrap();

        let err = sh("true").run(dir.path(), &dir.path().join("out")).await.unwrap_err();

        assert!(matches!(err, BuildError::Generator(_)));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();

        let err = GeneratorCommand::new("folio-no-such-generator", Vec::new())
            .run(dir.path(), &dir.path().join("out"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to start"));
    }

    #[tokio::test]
    async fn test_run_kills_generator_past_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");

        let err = sh("mkdir -p \"$FOLIO_OUTPUT_DIR\" && exec sleep 30")
            .with_timeout(Duration::from_millis(200))
            .run(dir.path(), &output)
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::Timeout(_)));
        assert_eq!(err.to_string(), "build timed out after 200ms");
    }
}
