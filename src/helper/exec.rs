//! External command execution.
//!
//! Every dump, archive, compress and encrypt stage shells out to a standard
//! tool. Commands are awaited to completion; there is no timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::debug;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::error::{BackrError, Result};

static GNU_TAR: OnceCell<bool> = OnceCell::const_new();

/// A command line to run, built up like a `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments passed after the program
    pub args: Vec<String>,
    /// Extra environment variables for the child only
    pub env: Vec<(String, String)>,
    /// Working directory for the child
    pub current_dir: Option<PathBuf>,
    /// Stream the child's stdout to ours instead of capturing it
    pub inherit_stdout: bool,
}

impl CommandSpec {
    /// Create a command for a single program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Parse a whitespace separated command line, e.g. `"pg_dump -Fc"`.
    ///
    /// The first word is the program, the rest become leading arguments.
    pub fn parse(command_line: &str) -> Self {
        let mut words = command_line.split_whitespace();
        let program = words.next().unwrap_or_default().to_string();
        Self {
            program,
            args: words.map(str::to_string).collect(),
            ..Default::default()
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable visible only to the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Let the child write straight to our stdout (used for scripts)
    pub fn inherit_stdout(mut self) -> Self {
        self.inherit_stdout = true;
        self
    }

    /// Render the command for logs. Environment values are never included.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Run the command to completion and return its trimmed stdout.
    ///
    /// A non-zero exit becomes an [`BackrError::Execution`] carrying stderr.
    pub async fn run(&self) -> Result<String> {
        if self.program.is_empty() {
            return Err(BackrError::Execution("empty command".to_string()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        // a cancelled run must not leave tar or a dump tool writing into a removed temp dir
        cmd.kill_on_drop(true);
        cmd.stdin(Stdio::null()).stderr(Stdio::piped());
        if self.inherit_stdout {
            cmd.stdout(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped());
        }

        debug!("exec command={}", self.display());

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackrError::Execution(format!("{} cannot be found", self.program)));
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(
                "exec failed command={} status={:?} stderr={}",
                self.display(),
                output.status.code(),
                stderr
            );
            let message = if stderr.is_empty() {
                format!("{} exited with status {:?}", self.program, output.status.code())
            } else {
                stderr
            };
            return Err(BackrError::Execution(message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_matches('\n').to_string())
    }
}

/// Run `command_line` with extra `args` appended.
pub async fn exec<I, S>(command_line: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::parse(command_line).args(args).run().await
}

/// Whether the `tar` on PATH is GNU tar (which understands `--ignore-failed-read`).
pub async fn is_gnu_tar() -> bool {
    *GNU_TAR
        .get_or_init(|| async {
            CommandSpec::new("tar")
                .arg("--version")
                .run()
                .await
                .map(|out| out.contains("GNU"))
                .unwrap_or(false)
        })
        .await
}
