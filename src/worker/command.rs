// src/worker/command.rs

//! Process-backed worker.

use std::process::Stdio;

use anyhow::{bail, Context};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::{ContextBundle, RoleId};
use crate::worker::{Worker, WorkerFuture};

/// Runs a shell command per invocation.
///
/// The prompt (description, a blank line, then the rendered context bundle)
/// is written to the child's stdin; whatever the child prints on stdout is
/// the produced text. A non-zero exit is a failure. The child is killed when
/// the invocation future is dropped, which is how registry timeouts stop it.
#[derive(Debug, Clone)]
pub struct CommandWorker {
    role: RoleId,
    cmd: String,
}

impl CommandWorker {
    pub fn new(role: impl Into<RoleId>, cmd: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            cmd: cmd.into(),
        }
    }

    async fn run(&self, description: &str, context: &ContextBundle) -> anyhow::Result<String> {
        info!(role = %self.role, cmd = %self.cmd, "starting worker process");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.env("QUILLDAG_ROLE", &self.role)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning worker process for role '{}'", self.role))?;

        // Feed stdin while collecting output; a child that echoes as it reads
        // would otherwise block on a full stdout pipe.
        let prompt = build_prompt(description, context);
        let stdin = child.stdin.take();
        let feed = async move {
            match stdin {
                // Dropping stdin at the end closes the pipe so the child sees EOF.
                Some(mut stdin) => stdin.write_all(prompt.as_bytes()).await,
                None => Ok(()),
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.with_context(|| format!("waiting for worker process of role '{}'", self.role))?;

        match fed {
            Ok(()) => {}
            // The child may exit without reading all of its input.
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!(role = %self.role, "worker closed stdin before reading the whole prompt");
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("writing prompt to worker for role '{}'", self.role)));
            }
        }

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(role = %self.role, "stderr: {}", line);
        }

        let code = output.status.code().unwrap_or(-1);
        info!(
            role = %self.role,
            exit_code = code,
            success = output.status.success(),
            "worker process exited"
        );

        if !output.status.success() {
            bail!("worker process for role '{}' exited with code {}", self.role, code);
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("worker output for role '{}' is not UTF-8", self.role))
    }
}

impl Worker for CommandWorker {
    fn invoke<'a>(&'a self, description: &'a str, context: &'a ContextBundle) -> WorkerFuture<'a> {
        Box::pin(self.run(description, context))
    }
}

fn build_prompt(description: &str, context: &ContextBundle) -> String {
    if context.is_empty() {
        return format!("{}\n", description.trim_end());
    }
    format!("{}\n\n{}", description.trim_end(), context.render())
}
