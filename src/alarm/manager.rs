use chrono::{DateTime, Local, Timelike};

use crate::alarm::model::{Alarm, AlarmSound, AlarmTime};

/// A single alarm trigger observed by [`AlarmManager::check`]. Carries
/// everything the notification side effects need so they can run off-thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredAlarm {
    pub id: u64,
    pub time: AlarmTime,
    pub label: String,
    pub sound: AlarmSound,
    pub repeat: bool,
}

#[derive(Debug, Clone)]
struct TrackedAlarm {
    alarm: Alarm,
    last_fired_slot: Option<i64>,
}

/// Owns the alarm list and the fire-once-per-minute bookkeeping. All access
/// happens on the tick thread; side effects are the caller's concern and can
/// never affect fired-state accounting here.
#[derive(Debug)]
pub struct AlarmManager {
    alarms: Vec<TrackedAlarm>,
    next_id: u64,
}

impl AlarmManager {
    pub fn new() -> Self {
        Self::from_alarms(Vec::new())
    }

    pub fn from_alarms(alarms: Vec<Alarm>) -> Self {
        let next_id = alarms.iter().map(|alarm| alarm.id + 1).max().unwrap_or(1);
        let tracked = alarms
            .into_iter()
            .map(|alarm| TrackedAlarm {
                alarm,
                last_fired_slot: None,
            })
            .collect();
        Self {
            alarms: tracked,
            next_id,
        }
    }

    /// Adds a new alarm, enabled by default. Duplicate trigger times are
    /// allowed.
    pub fn add(
        &mut self,
        time: AlarmTime,
        label: impl Into<String>,
        sound: AlarmSound,
        repeat: bool,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.alarms.push(TrackedAlarm {
            alarm: Alarm {
                id,
                time,
                label: label.into(),
                sound,
                repeat,
                enabled: true,
            },
            last_fired_slot: None,
        });
        id
    }

    /// Removes the alarm with the given id. Unknown ids are a no-op, not an
    /// error.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.alarms.len();
        self.alarms.retain(|tracked| tracked.alarm.id != id);
        self.alarms.len() != before
    }

    /// Flips the enabled flag and returns the new state, or `None` for an
    /// unknown id.
    pub fn toggle(&mut self, id: u64) -> Option<bool> {
        let tracked = self
            .alarms
            .iter_mut()
            .find(|tracked| tracked.alarm.id == id)?;
        tracked.alarm.enabled = !tracked.alarm.enabled;
        Some(tracked.alarm.enabled)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alarm> {
        self.alarms.iter().map(|tracked| &tracked.alarm)
    }

    pub fn export(&self) -> Vec<Alarm> {
        self.iter().cloned().collect()
    }

    /// Compares `now` against every enabled alarm. An alarm fires when the
    /// (hour, minute) matches and it has not already fired in this minute
    /// slot, so any number of ticks inside the same minute fire it once.
    /// Non-repeating alarms are disabled immediately after firing. A process
    /// suspended across its trigger minute skips the fire entirely.
    pub fn check(&mut self, now: DateTime<Local>) -> Vec<FiredAlarm> {
        let slot = minute_slot(&now);
        let hour = now.hour();
        let minute = now.minute();

        let mut fired = Vec::new();
        for tracked in &mut self.alarms {
            if !tracked.alarm.enabled {
                continue;
            }
            if tracked.alarm.time.hour() != hour || tracked.alarm.time.minute() != minute {
                continue;
            }
            if tracked.last_fired_slot == Some(slot) {
                continue;
            }
            tracked.last_fired_slot = Some(slot);
            if !tracked.alarm.repeat {
                tracked.alarm.enabled = false;
            }
            fired.push(FiredAlarm {
                id: tracked.alarm.id,
                time: tracked.alarm.time,
                label: tracked.alarm.label.clone(),
                sound: tracked.alarm.sound,
                repeat: tracked.alarm.repeat,
            });
        }
        fired
    }
}

impl Default for AlarmManager {
    fn default() -> Self {
        Self::new()
    }
}

fn minute_slot(now: &DateTime<Local>) -> i64 {
    now.timestamp().div_euclid(60)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn local(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .expect("unambiguous local time")
    }

    fn manager_with(time: AlarmTime, repeat: bool) -> (AlarmManager, u64) {
        let mut manager = AlarmManager::new();
        let id = manager.add(time, "test", AlarmSound::Default, repeat);
        (manager, id)
    }

    #[test]
    fn fires_once_per_matching_minute() {
        let time = AlarmTime::new(7, 30).expect("valid");
        let (mut manager, id) = manager_with(time, true);

        let start = local(2026, 1, 5, 7, 30, 0);
        let first = manager.check(start);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, id);

        for offset in [1, 15, 42, 59] {
            let again = manager.check(start + Duration::seconds(offset));
            assert!(again.is_empty(), "refired at +{offset}s");
        }
    }

    #[test]
    fn disabled_alarm_never_fires() {
        let time = AlarmTime::new(7, 30).expect("valid");
        let (mut manager, id) = manager_with(time, true);
        assert_eq!(manager.toggle(id), Some(false));

        assert!(manager.check(local(2026, 1, 5, 7, 30, 0)).is_empty());
    }

    #[test]
    fn non_repeating_alarm_auto_disables() {
        let time = AlarmTime::new(9, 0).expect("valid");
        let (mut manager, id) = manager_with(time, false);

        let fired = manager.check(local(2026, 1, 5, 9, 0, 12));
        assert_eq!(fired.len(), 1);
        assert!(!fired[0].repeat);
        let alarm = manager.iter().find(|alarm| alarm.id == id).expect("alarm");
        assert!(!alarm.enabled);

        // The next day it stays silent.
        assert!(manager.check(local(2026, 1, 6, 9, 0, 0)).is_empty());
    }

    #[test]
    fn repeating_alarm_stays_enabled_and_fires_next_day() {
        let time = AlarmTime::new(9, 0).expect("valid");
        let (mut manager, id) = manager_with(time, true);

        assert_eq!(manager.check(local(2026, 1, 5, 9, 0, 0)).len(), 1);
        let alarm = manager.iter().find(|alarm| alarm.id == id).expect("alarm");
        assert!(alarm.enabled);
        assert_eq!(manager.check(local(2026, 1, 6, 9, 0, 0)).len(), 1);
    }

    #[test]
    fn midnight_rollover_fires_exactly_at_zero_hour() {
        let time = AlarmTime::new(0, 0).expect("valid");
        let (mut manager, id) = manager_with(time, true);

        let mut fired_at = Vec::new();
        let start = local(2026, 1, 5, 23, 59, 0);
        // Half-minute ticks from 23:59:00 through 00:01:00.
        for step in 0..=4 {
            let now = start + Duration::seconds(step * 30);
            for fire in manager.check(now) {
                fired_at.push((now, fire.id));
            }
        }

        assert_eq!(fired_at.len(), 1);
        assert_eq!(fired_at[0].0, local(2026, 1, 6, 0, 0, 0));
        assert_eq!(fired_at[0].1, id);
        let alarm = manager.iter().find(|alarm| alarm.id == id).expect("alarm");
        assert!(alarm.enabled);
    }

    #[test]
    fn missed_minute_is_skipped_not_fired_late() {
        let time = AlarmTime::new(7, 30).expect("valid");
        let (mut manager, _) = manager_with(time, false);

        assert!(manager.check(local(2026, 1, 5, 7, 29, 59)).is_empty());
        // Simulated suspend: next tick lands after the trigger minute.
        assert!(manager.check(local(2026, 1, 5, 7, 31, 2)).is_empty());
    }

    #[test]
    fn duplicate_trigger_times_both_fire() {
        let time = AlarmTime::new(6, 15).expect("valid");
        let mut manager = AlarmManager::new();
        manager.add(time, "first", AlarmSound::Beep, true);
        manager.add(time, "second", AlarmSound::Bell, true);

        let fired = manager.check(local(2026, 1, 5, 6, 15, 30));
        assert_eq!(fired.len(), 2);
    }

    #[test]
    fn remove_and_toggle_of_unknown_id_are_noops() {
        let mut manager = AlarmManager::new();
        assert!(!manager.remove(99));
        assert_eq!(manager.toggle(99), None);
    }

    #[test]
    fn ids_keep_counting_after_load() {
        let time = AlarmTime::new(8, 0).expect("valid");
        let mut manager = AlarmManager::from_alarms(vec![Alarm {
            id: 5,
            time,
            label: String::new(),
            sound: AlarmSound::Default,
            repeat: false,
            enabled: true,
        }]);
        assert_eq!(manager.add(time, "next", AlarmSound::Default, false), 6);
    }
}
