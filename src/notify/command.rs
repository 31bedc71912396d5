use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::CommandRunner;

/// Runs notification commands through `sh -c`, detached. The child is never
/// awaited; tokio reaps it in the background.
pub struct ShellCommandRunner;

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn spawn(&self, command_line: &str) -> anyhow::Result<()> {
        if command_line.trim().is_empty() {
            anyhow::bail!("empty command line");
        }

        Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        log::info!("[COMMAND] Spawned notification command. [command = {command_line}]");
        Ok(())
    }
}
