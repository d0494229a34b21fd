use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Timelike, Utc};
use serde_json::Value;
use tracing::warn;

use crate::alarm::manager::{AlarmManager, FiredAlarm};
use crate::alarm::model::{AlarmSound, AlarmTime, save_alarm_file};
use crate::effects::Effect;
use crate::settings::{Settings, SettingsStore};
use crate::stopwatch::{CountdownTimer, Stopwatch};
use crate::style;
use crate::timezone::ClockZone;

/// Strings the front-end shows, refreshed once per tick.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub time_text: String,
    pub date_text: String,
}

#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub fired: Vec<FiredAlarm>,
    pub timer_finished: bool,
}

/// Mutations requested from outside the tick thread (the companion API).
/// Applied between ticks so HTTP handlers never touch controller state.
#[derive(Debug, Clone)]
pub enum ControlCommand {
    AddAlarm {
        time: AlarmTime,
        label: String,
        sound: AlarmSound,
        repeat: bool,
    },
    RemoveAlarm(u64),
    ToggleAlarm(u64),
    SetSetting {
        key: String,
        value: Value,
    },
}

/// The application controller: sole owner of the settings store, alarm
/// manager, and stopwatch/timer, constructed once at startup and driven by
/// the periodic tick.
pub struct ClockController {
    settings: SettingsStore,
    alarms: AlarmManager,
    alarms_path: PathBuf,
    stopwatch: Stopwatch,
    timer: Option<CountdownTimer>,
    zone: ClockZone,
    effects: Sender<Effect>,
    display: DisplayState,
    last_voice_slot: Option<i64>,
}

impl ClockController {
    pub fn new(
        settings: SettingsStore,
        alarms: AlarmManager,
        alarms_path: PathBuf,
        effects: Sender<Effect>,
    ) -> Self {
        let mut controller = Self {
            settings,
            alarms,
            alarms_path,
            stopwatch: Stopwatch::new(),
            timer: None,
            zone: ClockZone::Local,
            effects,
            display: DisplayState::default(),
            last_voice_slot: None,
        };
        controller.refresh_zone();
        controller
    }

    /// One pass of the clock tick loop: refresh the display strings, run the
    /// alarm check, recompute the countdown, and hand any side effects to the
    /// effects thread. Never blocks.
    pub fn tick(&mut self, now_utc: DateTime<Utc>, mono: Instant) -> TickOutcome {
        let wall = self.zone.wall_time(now_utc);
        let settings = self.settings.settings();

        self.display.time_text = style::format_time(
            settings.clock_style,
            wall.time(),
            settings.time_format,
            settings.show_seconds,
        );
        self.display.date_text = if settings.show_date {
            let mut text = style::format_date(wall.date());
            if !self.zone.is_local() {
                text.push_str(&format!(" ({})", self.zone.name()));
            }
            text
        } else {
            String::new()
        };

        let fired = self.alarms.check(now_utc.with_timezone(&Local));
        if fired.iter().any(|fire| !fire.repeat) {
            self.persist_alarms();
        }
        for fire in &fired {
            self.send_effect(Effect::AlarmFired(fire.clone()));
        }

        let timer_finished = self
            .timer
            .as_mut()
            .is_some_and(|timer| timer.tick(mono));
        if timer_finished {
            self.send_effect(Effect::TimerFinished);
        }

        if self.settings.settings().voice_enabled && wall.time().minute() == 0 {
            let hour_slot = now_utc.timestamp().div_euclid(3600);
            if self.last_voice_slot != Some(hour_slot) {
                self.last_voice_slot = Some(hour_slot);
                let announcement = style::hourly_announcement(
                    wall.time(),
                    self.settings.settings().time_format,
                );
                self.send_effect(Effect::Speak(announcement));
            }
        }

        TickOutcome {
            fired,
            timer_finished,
        }
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn settings(&self) -> &Settings {
        self.settings.settings()
    }

    pub fn zone(&self) -> ClockZone {
        self.zone
    }

    /// Mutates settings, persists them, and re-derives the display zone.
    pub fn update_settings(&mut self, mutate: impl FnOnce(&mut Settings)) {
        self.settings.update(mutate);
        self.refresh_zone();
    }

    pub fn reset_settings(&mut self) {
        self.settings.reset_to_defaults();
        self.refresh_zone();
    }

    pub fn flush_settings(&self) {
        if let Err(err) = self.settings.save() {
            warn!("failed to flush settings on exit: {err:#}");
        }
    }

    pub fn alarms(&self) -> &AlarmManager {
        &self.alarms
    }

    pub fn add_alarm(
        &mut self,
        time: AlarmTime,
        label: impl Into<String>,
        sound: AlarmSound,
        repeat: bool,
    ) -> u64 {
        let id = self.alarms.add(time, label, sound, repeat);
        self.persist_alarms();
        id
    }

    pub fn remove_alarm(&mut self, id: u64) -> bool {
        let removed = self.alarms.remove(id);
        if removed {
            self.persist_alarms();
        }
        removed
    }

    pub fn toggle_alarm(&mut self, id: u64) -> Option<bool> {
        let toggled = self.alarms.toggle(id);
        if toggled.is_some() {
            self.persist_alarms();
        }
        toggled
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn stopwatch_mut(&mut self) -> &mut Stopwatch {
        &mut self.stopwatch
    }

    pub fn timer(&self) -> Option<&CountdownTimer> {
        self.timer.as_ref()
    }

    pub fn timer_mut(&mut self) -> Option<&mut CountdownTimer> {
        self.timer.as_mut()
    }

    /// Arms a fresh countdown without starting it.
    pub fn set_timer(&mut self, target: Duration) {
        self.timer = Some(CountdownTimer::new(target));
    }

    pub fn clear_timer(&mut self) {
        self.timer = None;
    }

    /// Speaks the current time on demand (menu action, tray action).
    pub fn speak_current_time(&mut self, now_utc: DateTime<Utc>) {
        let wall = self.zone.wall_time(now_utc);
        let text = style::spoken_time(wall.time(), self.settings.settings().time_format);
        self.send_effect(Effect::Speak(text));
    }

    pub fn apply_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::AddAlarm {
                time,
                label,
                sound,
                repeat,
            } => {
                self.add_alarm(time, label, sound, repeat);
            }
            ControlCommand::RemoveAlarm(id) => {
                self.remove_alarm(id);
            }
            ControlCommand::ToggleAlarm(id) => {
                self.toggle_alarm(id);
            }
            ControlCommand::SetSetting { key, value } => {
                if let Err(err) = self.settings.apply_update(&key, &value) {
                    warn!("rejected settings update: {err}");
                }
                self.refresh_zone();
            }
        }
    }

    fn refresh_zone(&mut self) {
        let name = &self.settings.settings().timezone;
        self.zone = match ClockZone::parse(name) {
            Some(zone) => zone,
            None => {
                warn!("unknown timezone '{name}', falling back to local time");
                ClockZone::Local
            }
        };
    }

    fn persist_alarms(&self) {
        if let Err(err) = save_alarm_file(&self.alarms_path, &self.alarms.export()) {
            warn!("failed to persist alarms: {err:#}");
        }
    }

    fn send_effect(&self, effect: Effect) {
        if self.effects.send(effect).is_err() {
            warn!("effects channel closed; dropping side effect");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::alarm::model::load_alarm_file;
    use crate::settings::Theme;
    use crate::style::ClockStyle;

    fn controller() -> (ClockController, Receiver<Effect>, TempDir) {
        let dir = tempdir().expect("tempdir");
        let settings = SettingsStore::load(&dir.path().join("clock_settings.json"));
        let alarms_path = dir.path().join("alarms.json");
        let (sender, receiver) = mpsc::channel();
        let controller =
            ClockController::new(settings, AlarmManager::new(), alarms_path, sender);
        (controller, receiver, dir)
    }

    fn utc_for_local(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 1, 5, hour, minute, second)
            .single()
            .expect("unambiguous")
            .with_timezone(&Utc)
    }

    fn drain(receiver: &Receiver<Effect>) -> Vec<Effect> {
        let mut effects = Vec::new();
        while let Ok(effect) = receiver.try_recv() {
            effects.push(effect);
        }
        effects
    }

    #[test]
    fn tick_formats_display_per_settings() {
        let (mut controller, _receiver, _dir) = controller();
        controller.update_settings(|settings| {
            settings.show_seconds = false;
            settings.show_date = true;
        });

        controller.tick(utc_for_local(14, 30, 45), Instant::now());
        assert_eq!(controller.display().time_text, "14:30");
        assert!(controller.display().date_text.contains("2026"));

        controller.update_settings(|settings| {
            settings.time_format = crate::style::TimeFormat::Hour12;
            settings.show_date = false;
        });
        controller.tick(utc_for_local(14, 30, 45), Instant::now());
        assert_eq!(controller.display().time_text, "02:30 PM");
        assert!(controller.display().date_text.is_empty());
    }

    #[test]
    fn fired_alarm_reaches_effects_and_is_persisted_disabled() {
        let (mut controller, receiver, dir) = controller();
        let time = AlarmTime::new(7, 30).expect("valid");
        let id = controller.add_alarm(time, "Wake", AlarmSound::Chime, false);

        let outcome = controller.tick(utc_for_local(7, 30, 2), Instant::now());
        assert_eq!(outcome.fired.len(), 1);
        assert_eq!(outcome.fired[0].id, id);

        let effects = drain(&receiver);
        assert!(matches!(effects.as_slice(), [Effect::AlarmFired(fire)] if fire.id == id));

        let stored = load_alarm_file(&dir.path().join("alarms.json")).expect("persisted");
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].enabled);
    }

    #[test]
    fn countdown_completion_sends_one_effect() {
        let (mut controller, receiver, _dir) = controller();
        let origin = Instant::now();
        controller.set_timer(Duration::from_secs(5));
        controller
            .timer_mut()
            .expect("timer armed")
            .start(origin);

        let mut finished = 0;
        for seconds in 1..=8 {
            let outcome = controller.tick(
                utc_for_local(10, 0, seconds),
                origin + Duration::from_secs(u64::from(seconds)),
            );
            if outcome.timer_finished {
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
        let timer_effects = drain(&receiver)
            .into_iter()
            .filter(|effect| matches!(effect, Effect::TimerFinished))
            .count();
        assert_eq!(timer_effects, 1);
        assert_eq!(
            controller
                .timer()
                .expect("timer")
                .remaining(origin + Duration::from_secs(9)),
            Duration::ZERO
        );
    }

    #[test]
    fn hourly_announcement_fires_once_when_voice_enabled() {
        let (mut controller, receiver, _dir) = controller();
        controller.update_settings(|settings| settings.voice_enabled = true);

        controller.tick(utc_for_local(14, 0, 0), Instant::now());
        controller.tick(utc_for_local(14, 0, 1), Instant::now());
        controller.tick(utc_for_local(14, 0, 30), Instant::now());

        let spoken: Vec<_> = drain(&receiver)
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Speak(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(spoken, ["It's 14 hundred hours"]);
    }

    #[test]
    fn voice_disabled_stays_silent_at_the_hour() {
        let (mut controller, receiver, _dir) = controller();
        controller.tick(utc_for_local(14, 0, 0), Instant::now());
        assert!(drain(&receiver).is_empty());
    }

    #[test]
    fn api_commands_mutate_alarms_and_settings() {
        let (mut controller, _receiver, _dir) = controller();

        controller.apply_command(ControlCommand::AddAlarm {
            time: AlarmTime::new(6, 0).expect("valid"),
            label: "Mobile".to_string(),
            sound: AlarmSound::Beep,
            repeat: true,
        });
        assert_eq!(controller.alarms().len(), 1);
        let id = controller.alarms().iter().next().expect("alarm").id;

        controller.apply_command(ControlCommand::ToggleAlarm(id));
        assert!(!controller.alarms().iter().next().expect("alarm").enabled);

        controller.apply_command(ControlCommand::SetSetting {
            key: "theme".to_string(),
            value: json!("dark"),
        });
        assert_eq!(controller.settings().theme, Theme::Dark);

        // Bad updates are logged and dropped, never applied.
        controller.apply_command(ControlCommand::SetSetting {
            key: "volume".to_string(),
            value: json!(400),
        });
        assert_eq!(controller.settings().volume, 80);

        controller.apply_command(ControlCommand::RemoveAlarm(id));
        assert!(controller.alarms().is_empty());
    }

    #[test]
    fn timezone_setting_shifts_display_only() {
        let (mut controller, _receiver, _dir) = controller();
        controller.update_settings(|settings| {
            settings.timezone = "Asia/Tokyo".to_string();
            settings.clock_style = ClockStyle::Digital;
        });
        assert_eq!(controller.zone().name(), "Asia/Tokyo");

        // Display shows the named zone in the date line.
        controller.tick(Utc.with_ymd_and_hms(2026, 1, 5, 3, 30, 0).single().expect("valid"), Instant::now());
        assert!(controller.display().date_text.contains("Asia/Tokyo"));
        assert!(controller.display().time_text.starts_with("12:30"));
    }

    #[test]
    fn unknown_timezone_falls_back_to_local() {
        let (mut controller, _receiver, _dir) = controller();
        controller.update_settings(|settings| settings.timezone = "Mars/Olympus".to_string());
        assert!(controller.zone().is_local());
    }

    #[test]
    fn speak_current_time_uses_active_format() {
        let (mut controller, receiver, _dir) = controller();
        controller.speak_current_time(utc_for_local(14, 7, 0));
        let spoken = drain(&receiver);
        assert!(
            matches!(spoken.as_slice(), [Effect::Speak(text)] if text == "The time is 14 07")
        );
    }
}
