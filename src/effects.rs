use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use tracing::{info, warn};

use crate::alarm::manager::FiredAlarm;

/// Side effects produced by the tick loop. Dispatched over a channel so the
/// tick is never delayed by a slow backend.
#[derive(Debug, Clone)]
pub enum Effect {
    AlarmFired(FiredAlarm),
    TimerFinished,
    Speak(String),
}

/// Seam for the sound/notification/voice backends. The backends themselves
/// are external collaborators; a failing notifier downgrades the effect to a
/// no-op and never reaches back into alarm bookkeeping.
pub trait Notifier: Send {
    fn alarm_fired(&mut self, alarm: &FiredAlarm) -> Result<()>;
    fn timer_finished(&mut self) -> Result<()>;
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Default notifier: structured log lines in place of sound and speech.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alarm_fired(&mut self, alarm: &FiredAlarm) -> Result<()> {
        info!(
            "ALARM {} [{}] at {} (sound: {})",
            alarm.id, alarm.label, alarm.time, alarm.sound
        );
        Ok(())
    }

    fn timer_finished(&mut self) -> Result<()> {
        info!("timer finished");
        Ok(())
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        info!("speak: {text}");
        Ok(())
    }
}

/// Handle for the background effect thread. Joins on drop once every sender
/// is gone.
pub struct EffectsWorker {
    join: Option<JoinHandle<()>>,
}

pub fn spawn(notifier: Box<dyn Notifier>) -> (Sender<Effect>, EffectsWorker) {
    let (sender, receiver) = mpsc::channel();
    let join = thread::spawn(move || run_worker(receiver, notifier));
    (sender, EffectsWorker { join: Some(join) })
}

impl Drop for EffectsWorker {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_worker(receiver: Receiver<Effect>, mut notifier: Box<dyn Notifier>) {
    while let Ok(effect) = receiver.recv() {
        let outcome = match &effect {
            Effect::AlarmFired(alarm) => notifier.alarm_fired(alarm),
            Effect::TimerFinished => notifier.timer_finished(),
            Effect::Speak(text) => notifier.speak(text),
        };
        if let Err(err) = outcome {
            warn!("notification side effect failed, continuing: {err:#}");
        }
    }
}
