//! Notification dispatch: sound playback and command spawning.
//!
//! The media backend and the process spawner sit behind traits; the core
//! only decides *what* to dispatch and bounds how long a sound may play.

mod command;
mod notifier;

pub use command::ShellCommandRunner;
pub use notifier::Notifier;

use async_trait::async_trait;

/// A created-but-cancellable sound playback.
#[async_trait]
pub trait Playback: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;
    async fn stop(&self);
}

/// Media-playback backend.
#[async_trait]
pub trait MediaPlayer: Send + Sync + 'static {
    async fn create(&self, uri: &str, looped: bool) -> anyhow::Result<Box<dyn Playback>>;
}

/// Fire-and-forget command execution; no output capture.
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn spawn(&self, command_line: &str) -> anyhow::Result<()>;
}

/// Stand-in player for environments without an audio backend.
pub struct NullMediaPlayer;

struct NullPlayback;

#[async_trait]
impl Playback for NullPlayback {
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) {}
}

#[async_trait]
impl MediaPlayer for NullMediaPlayer {
    async fn create(&self, uri: &str, looped: bool) -> anyhow::Result<Box<dyn Playback>> {
        log::info!("[PLAYER] Pretending to play. [uri = {uri}, looped = {looped}]");
        Ok(Box::new(NullPlayback))
    }
}
