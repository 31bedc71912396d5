use std::sync::Arc;

use budilnik::appsettings::AppSettings;
use budilnik::notify::{NullMediaPlayer, ShellCommandRunner};
use budilnik::scheduling::AlarmService;
use budilnik::timemath::SystemClock;
use budilnik::{AlarmKind, InMemorySettingsBridge};

/// Demo wiring: an in-memory settings backend, a logging media player and a
/// real shell command runner. Creates one 10-second timer alarm and prints
/// the core's event stream until Ctrl-C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    pretty_env_logger::init();

    let settings = AppSettings::load().unwrap_or_else(|err| {
        log::warn!("[MAIN] Falling back to default settings. [error = {err}]");
        AppSettings::default()
    });

    let (handle, mut events) = AlarmService::start(
        Arc::new(InMemorySettingsBridge::new()),
        Arc::new(NullMediaPlayer),
        Arc::new(ShellCommandRunner),
        Arc::new(SystemClock),
        settings.scheduling,
    );

    let id = handle.create_alarm().await?;
    handle.set_kind(id, AlarmKind::Timer).await?;
    handle.set_duration(id, 10).await?;
    handle.set_label(id, "demo timer".to_owned()).await?;
    handle.enable(id).await?;
    log::info!("[MAIN] Demo timer armed. [alarm_id = {id}]");

    loop {
        tokio::select! {
            Some(event) = events.recv() => println!("event: {event:?}"),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
