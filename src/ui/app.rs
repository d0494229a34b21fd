use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Local, Utc};
use eframe::egui::{self, Color32, ComboBox, RichText, ScrollArea, TopBottomPanel, Ui};

use crate::alarm::model::{AlarmSound, AlarmTime};
use crate::api::{self, ApiSharedState};
use crate::plugin::PluginRegistry;
use crate::settings::Theme;
use crate::stopwatch::Phase;
use crate::tick::ClockController;

const STATUS_TTL: Duration = Duration::from_secs(5);

pub fn run_gui(
    controller: ClockController,
    plugins: PluginRegistry,
    api_state: Option<Arc<Mutex<ApiSharedState>>>,
) -> Result<()> {
    let (width, height) = controller.settings().window_size();
    let initial_theme = controller.settings().theme;
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("deskclock")
            .with_inner_size([width, height])
            .with_min_inner_size([480.0, 400.0]),
        ..Default::default()
    };

    let app = DeskClockApp::new(controller, plugins, api_state);
    eframe::run_native(
        "deskclock",
        native_options,
        Box::new(move |cc| {
            apply_theme(&cc.egui_ctx, initial_theme);
            Ok(Box::new(app))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to launch deskclock GUI: {err}"))?;

    Ok(())
}

fn apply_theme(ctx: &egui::Context, theme: Theme) {
    let visuals = match theme {
        Theme::Light => egui::Visuals::light(),
        Theme::Dark => {
            let mut visuals = egui::Visuals::dark();
            visuals.override_text_color = Some(Color32::from_rgb(226, 234, 246));
            visuals.panel_fill = Color32::from_rgb(8, 16, 26);
            visuals.window_fill = Color32::from_rgb(12, 20, 32);
            visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 18, 30);
            visuals.widgets.inactive.bg_fill = Color32::from_rgb(16, 24, 38);
            visuals.widgets.hovered.bg_fill = Color32::from_rgb(26, 42, 62);
            visuals.widgets.active.bg_fill = Color32::from_rgb(34, 60, 88);
            visuals.selection.bg_fill = Color32::from_rgb(43, 148, 178);
            visuals
        }
    };
    ctx.set_visuals(visuals);
}

#[derive(Debug, Clone)]
struct AlarmRow {
    id: u64,
    time_text: String,
    label: String,
    sound_text: &'static str,
    repeat: bool,
    enabled: bool,
}

struct DeskClockApp {
    controller: ClockController,
    plugins: PluginRegistry,
    api_state: Option<Arc<Mutex<ApiSharedState>>>,
    alarm_time_input: String,
    alarm_label_input: String,
    alarm_sound_input: AlarmSound,
    alarm_repeat_input: bool,
    timer_input: String,
    timezone_input: String,
    status_message: Option<(String, Instant)>,
    applied_theme: Option<Theme>,
    last_inner_size: Option<(f32, f32)>,
}

impl DeskClockApp {
    fn new(
        controller: ClockController,
        plugins: PluginRegistry,
        api_state: Option<Arc<Mutex<ApiSharedState>>>,
    ) -> Self {
        let timezone_input = controller.settings().timezone.clone();
        Self {
            controller,
            plugins,
            api_state,
            alarm_time_input: "07:30".to_string(),
            alarm_label_input: String::new(),
            alarm_sound_input: AlarmSound::Default,
            alarm_repeat_input: false,
            timer_input: "05:00".to_string(),
            timezone_input,
            status_message: None,
            applied_theme: None,
            last_inner_size: None,
        }
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.status_message = Some((text.into(), Instant::now() + STATUS_TTL));
    }

    fn draw_controls(&mut self, ui: &mut Ui) {
        let settings = self.controller.settings().clone();
        ui.horizontal_wrapped(|ui| {
            let format_label = if settings.time_format.is_24h() {
                "12H Format"
            } else {
                "24H Format"
            };
            if ui.button(format_label).clicked() {
                self.controller
                    .update_settings(|s| s.time_format = s.time_format.toggled());
            }

            let theme_label = match settings.theme {
                Theme::Light => "Dark Theme",
                Theme::Dark => "Light Theme",
            };
            if ui.button(theme_label).clicked() {
                self.controller.update_settings(|s| s.theme = s.theme.toggled());
            }

            if ui
                .button(format!("Style: {}", settings.clock_style.label()))
                .clicked()
            {
                self.controller
                    .update_settings(|s| s.clock_style = s.clock_style.cycled());
            }

            let mut show_seconds = settings.show_seconds;
            if ui
                .add_enabled(
                    settings.clock_style.supports_seconds(),
                    egui::Checkbox::new(&mut show_seconds, "Seconds"),
                )
                .changed()
            {
                self.controller.update_settings(|s| s.show_seconds = show_seconds);
            }

            let mut show_date = settings.show_date;
            if ui.checkbox(&mut show_date, "Date").changed() {
                self.controller.update_settings(|s| s.show_date = show_date);
            }

            let mut voice_enabled = settings.voice_enabled;
            if ui.checkbox(&mut voice_enabled, "Voice").changed() {
                self.controller.update_settings(|s| s.voice_enabled = voice_enabled);
            }

            if ui.button("Speak Time").clicked() {
                self.controller.speak_current_time(Utc::now());
            }

            let mut volume = settings.volume;
            if ui
                .add(egui::Slider::new(&mut volume, 0..=100).text("Volume"))
                .changed()
            {
                self.controller.update_settings(|s| s.volume = volume);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Timezone:");
            ui.text_edit_singleline(&mut self.timezone_input);
            if ui.button("Apply").clicked() {
                let name = self.timezone_input.trim().to_string();
                if crate::timezone::ClockZone::parse(&name).is_some() {
                    self.controller.update_settings(|s| s.timezone = name.clone());
                    self.set_status(format!("Timezone: {}", self.controller.zone().name()));
                } else {
                    self.set_status(format!("Unknown timezone '{name}'"));
                }
            }
            if ui.button("Reset Settings").clicked() {
                self.controller.reset_settings();
                self.timezone_input = self.controller.settings().timezone.clone();
                self.set_status("Settings reset to defaults");
            }
        });
    }

    fn draw_clock(&self, ui: &mut Ui) {
        let settings = self.controller.settings();
        ui.vertical_centered(|ui| {
            ui.add_space(12.0);
            ui.label(
                RichText::new(&self.controller.display().time_text)
                    .monospace()
                    .size(settings.font_size as f32),
            );
            if settings.show_date {
                ui.label(RichText::new(&self.controller.display().date_text).size(15.0));
            }
            ui.add_space(12.0);
        });
    }

    fn draw_alarms(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label("Time:");
            ui.add(egui::TextEdit::singleline(&mut self.alarm_time_input).desired_width(60.0));
            ui.label("Label:");
            ui.add(egui::TextEdit::singleline(&mut self.alarm_label_input).desired_width(120.0));
            ComboBox::from_label("")
                .selected_text(self.alarm_sound_input.as_str())
                .show_ui(ui, |ui| {
                    for sound in AlarmSound::ALL {
                        ui.selectable_value(&mut self.alarm_sound_input, sound, sound.as_str());
                    }
                });
            ui.checkbox(&mut self.alarm_repeat_input, "Repeat");
            if ui.button("Add Alarm").clicked() {
                match self.alarm_time_input.parse::<AlarmTime>() {
                    Ok(time) => {
                        let label = if self.alarm_label_input.trim().is_empty() {
                            "Alarm".to_string()
                        } else {
                            self.alarm_label_input.trim().to_string()
                        };
                        let id = self.controller.add_alarm(
                            time,
                            label,
                            self.alarm_sound_input,
                            self.alarm_repeat_input,
                        );
                        self.alarm_label_input.clear();
                        self.set_status(format!("Added alarm #{id} at {time}"));
                    }
                    Err(err) => self.set_status(err.to_string()),
                }
            }
        });

        let rows: Vec<AlarmRow> = self
            .controller
            .alarms()
            .iter()
            .map(|alarm| AlarmRow {
                id: alarm.id,
                time_text: alarm.time.to_string(),
                label: alarm.label.clone(),
                sound_text: alarm.sound.as_str(),
                repeat: alarm.repeat,
                enabled: alarm.enabled,
            })
            .collect();

        if rows.is_empty() {
            ui.label("No alarms configured.");
            return;
        }

        let mut toggle_id = None;
        let mut remove_id = None;
        ScrollArea::vertical().max_height(140.0).show(ui, |ui| {
            egui::Grid::new("alarm-grid").striped(true).show(ui, |ui| {
                for row in &rows {
                    let mut enabled = row.enabled;
                    if ui.checkbox(&mut enabled, "").changed() {
                        toggle_id = Some(row.id);
                    }
                    ui.monospace(&row.time_text);
                    ui.label(&row.label);
                    ui.label(row.sound_text);
                    ui.label(if row.repeat { "repeats" } else { "once" });
                    if ui.button("Remove").clicked() {
                        remove_id = Some(row.id);
                    }
                    ui.end_row();
                }
            });
        });

        if let Some(id) = toggle_id
            && let Some(enabled) = self.controller.toggle_alarm(id)
        {
            self.set_status(format!(
                "Alarm #{id} {}",
                if enabled { "enabled" } else { "disabled" }
            ));
        }
        if let Some(id) = remove_id {
            self.controller.remove_alarm(id);
            self.set_status(format!("Removed alarm #{id}"));
        }
    }

    fn draw_stopwatch(&mut self, ui: &mut Ui, mono: Instant) {
        let phase = self.controller.stopwatch().phase();
        let elapsed = self.controller.stopwatch().elapsed(mono);
        ui.horizontal(|ui| {
            ui.monospace(format_elapsed(elapsed));
            match phase {
                Phase::Stopped => {
                    if ui.button("Start").clicked() {
                        self.controller.stopwatch_mut().start(mono);
                    }
                }
                Phase::Running => {
                    if ui.button("Pause").clicked() {
                        self.controller.stopwatch_mut().pause(mono);
                    }
                    if ui.button("Lap").clicked() {
                        self.controller.stopwatch_mut().lap(mono);
                    }
                }
                Phase::Paused => {
                    if ui.button("Resume").clicked() {
                        self.controller.stopwatch_mut().resume(mono);
                    }
                }
            }
            if phase != Phase::Stopped && ui.button("Reset").clicked() {
                self.controller.stopwatch_mut().reset();
            }
        });

        let laps: Vec<String> = self
            .controller
            .stopwatch()
            .laps()
            .iter()
            .enumerate()
            .map(|(index, lap)| format!("Lap {}: {}", index + 1, format_elapsed(*lap)))
            .collect();
        if !laps.is_empty() {
            ScrollArea::vertical()
                .id_salt("laps")
                .max_height(80.0)
                .show(ui, |ui| {
                    for lap in &laps {
                        ui.monospace(lap);
                    }
                });
        }
    }

    fn draw_timer(&mut self, ui: &mut Ui, mono: Instant) {
        ui.horizontal(|ui| {
            ui.label("Duration:");
            ui.add(egui::TextEdit::singleline(&mut self.timer_input).desired_width(70.0));
            if ui.button("Start Timer").clicked() {
                match parse_duration_input(&self.timer_input) {
                    Some(target) => {
                        self.controller.set_timer(target);
                        if let Some(timer) = self.controller.timer_mut() {
                            timer.start(mono);
                        }
                        self.set_status(format!("Timer started for {}", self.timer_input.trim()));
                    }
                    None => self.set_status("Invalid timer duration, expected MM:SS"),
                }
            }
            if self.controller.timer().is_some() && ui.button("Cancel").clicked() {
                self.controller.clear_timer();
            }
        });

        let timer_view = self.controller.timer().map(|timer| {
            (
                timer.remaining(mono),
                timer.target(),
                timer.phase(),
                timer.is_completed(),
            )
        });
        if let Some((remaining, target, phase, completed)) = timer_view {
            ui.horizontal(|ui| {
                if completed {
                    ui.label(RichText::new("Timer finished").strong());
                } else {
                    ui.monospace(format!(
                        "Remaining: {} / {}",
                        format_remaining(remaining),
                        format_remaining(target)
                    ));
                    match phase {
                        Phase::Running => {
                            if ui.button("Pause").clicked()
                                && let Some(timer) = self.controller.timer_mut()
                            {
                                timer.pause(mono);
                            }
                        }
                        Phase::Paused => {
                            if ui.button("Resume").clicked()
                                && let Some(timer) = self.controller.timer_mut()
                            {
                                timer.resume(mono);
                            }
                        }
                        Phase::Stopped => {}
                    }
                }
            });
        }
    }

    fn draw_plugins(&mut self, ui: &mut Ui) {
        let names: Vec<String> = self
            .plugins
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in &names {
            let mut enabled = self.plugins.is_enabled(name);
            let description = self.plugins.description(name).unwrap_or("");
            let mut response = ui.checkbox(&mut enabled, name.as_str());
            if !description.is_empty() {
                response = response.on_hover_text(description);
            }
            if response.changed() {
                if enabled {
                    if let Err(err) = self.plugins.enable(name) {
                        self.set_status(format!("Failed to enable '{name}': {err:#}"));
                    }
                } else {
                    self.plugins.disable(name);
                }
            }
        }

        for (plugin_name, item) in self.plugins.menu_items() {
            if ui.button(item.label).clicked() {
                match self.plugins.execute(&plugin_name, item.action, Local::now()) {
                    Ok(Some(result)) => self.set_status(result),
                    Ok(None) => {}
                    Err(err) => self.set_status(format!("Plugin error: {err:#}")),
                }
            }
        }
    }
}

impl eframe::App for DeskClockApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now_utc = Utc::now();
        let mono = Instant::now();

        if let Some(state) = &self.api_state {
            let commands = match state.lock() {
                Ok(mut guard) => guard.drain_commands(),
                Err(_) => Vec::new(),
            };
            for command in commands {
                self.controller.apply_command(command);
            }
        }

        let outcome = self.controller.tick(now_utc, mono);
        for fire in &outcome.fired {
            self.set_status(format!("Alarm: {} ({})", fire.label, fire.time));
        }
        if outcome.timer_finished {
            self.set_status("Timer finished");
        }

        if let Some(state) = &self.api_state
            && let Ok(mut guard) = state.lock()
        {
            guard.snapshot = api::build_snapshot(&self.controller, mono);
        }

        let theme = self.controller.settings().theme;
        if self.applied_theme != Some(theme) {
            apply_theme(ctx, theme);
            self.applied_theme = Some(theme);
        }

        let rect = ctx.input(|input| input.screen_rect());
        self.last_inner_size = Some((rect.width(), rect.height()));

        TopBottomPanel::top("controls").show(ctx, |ui| {
            self.draw_controls(ui);
        });

        TopBottomPanel::bottom("status").show(ctx, |ui| {
            let status = match &self.status_message {
                Some((text, expires)) if *expires > Instant::now() => text.clone(),
                _ => "Ready".to_string(),
            };
            ui.label(status);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_clock(ui);
            ui.separator();
            egui::CollapsingHeader::new("Alarms")
                .default_open(true)
                .show(ui, |ui| self.draw_alarms(ui));
            egui::CollapsingHeader::new("Stopwatch")
                .default_open(false)
                .show(ui, |ui| self.draw_stopwatch(ui, mono));
            egui::CollapsingHeader::new("Timer")
                .default_open(false)
                .show(ui, |ui| self.draw_timer(ui, mono));
            egui::CollapsingHeader::new("Plugins")
                .default_open(false)
                .show(ui, |ui| self.draw_plugins(ui));
        });

        ctx.request_repaint_after(Duration::from_millis(200));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some((width, height)) = self.last_inner_size {
            let geometry = format!("{}x{}", width.round() as u32, height.round() as u32);
            self.controller
                .update_settings(|s| s.window_geometry = geometry.clone());
        }
        self.controller.flush_settings();
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let centis = elapsed.as_millis() / 10;
    let minutes = centis / 6_000;
    let seconds = (centis / 100) % 60;
    let hundredths = centis % 100;
    format!("{minutes:02}:{seconds:02}.{hundredths:02}")
}

fn format_remaining(remaining: Duration) -> String {
    let seconds = remaining.as_millis().div_ceil(1_000);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn parse_duration_input(text: &str) -> Option<Duration> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parts: Vec<&str> = trimmed.split(':').collect();
    let seconds = match parts.as_slice() {
        [seconds] => seconds.parse::<u64>().ok()?,
        [minutes, seconds] => {
            let minutes = minutes.parse::<u64>().ok()?;
            let seconds = seconds.parse::<u64>().ok()?;
            if seconds >= 60 {
                return None;
            }
            minutes * 60 + seconds
        }
        [hours, minutes, seconds] => {
            let hours = hours.parse::<u64>().ok()?;
            let minutes = minutes.parse::<u64>().ok()?;
            let seconds = seconds.parse::<u64>().ok()?;
            if minutes >= 60 || seconds >= 60 {
                return None;
            }
            (hours * 60 + minutes) * 60 + seconds
        }
        _ => return None,
    };
    if seconds == 0 {
        return None;
    }
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_formats_as_minutes_seconds_hundredths() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00.00");
        assert_eq!(format_elapsed(Duration::from_millis(61_230)), "01:01.23");
        assert_eq!(format_elapsed(Duration::from_secs(3_599)), "59:59.00");
    }

    #[test]
    fn remaining_rounds_up_to_whole_seconds() {
        assert_eq!(format_remaining(Duration::from_millis(4_001)), "00:05");
        assert_eq!(format_remaining(Duration::from_secs(300)), "05:00");
        assert_eq!(format_remaining(Duration::ZERO), "00:00");
    }

    #[test]
    fn duration_input_accepts_common_shapes() {
        assert_eq!(parse_duration_input("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration_input("05:00"), Some(Duration::from_secs(300)));
        assert_eq!(
            parse_duration_input("1:00:30"),
            Some(Duration::from_secs(3_630))
        );
        assert_eq!(parse_duration_input("5:90"), None);
        assert_eq!(parse_duration_input("0"), None);
        assert_eq!(parse_duration_input("soon"), None);
    }
}
