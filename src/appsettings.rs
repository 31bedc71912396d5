use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Scheduling policy knobs. Clock alarms get the classic fixed 9-minute
/// snooze; timer alarms use the user-configurable one.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SchedulingSettings {
    pub clock_snooze_secs: u32,
    pub timer_snooze_secs: u32,
    /// Upper bound on unattended sound playback.
    pub sound_ceiling_secs: u64,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            clock_snooze_secs: 9 * 60,
            timer_snooze_secs: 5 * 60,
            sound_ceiling_secs: 20 * 60,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppSettings {
    pub scheduling: SchedulingSettings,
}

impl AppSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_policy() {
        let settings = SchedulingSettings::default();

        assert_eq!(settings.clock_snooze_secs, 540);
        assert_eq!(settings.timer_snooze_secs, 300);
        assert_eq!(settings.sound_ceiling_secs, 1200);
    }
}
