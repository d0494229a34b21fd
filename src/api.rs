use std::collections::VecDeque;
use std::io::Read;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{info, warn};

use crate::alarm::model::{AlarmSound, AlarmTime};
use crate::settings;
use crate::tick::{ClockController, ControlCommand};

#[derive(Debug, Clone, Serialize)]
pub struct AlarmSnapshot {
    pub id: u64,
    pub time: String,
    pub label: String,
    pub sound: String,
    pub repeat: bool,
    pub enabled: bool,
}

/// Read-only reflection of controller state, published by the tick thread
/// once per tick. HTTP handlers only ever see this copy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub time: String,
    pub date: String,
    pub timezone: String,
    pub format_24h: bool,
    pub theme: String,
    pub voice_enabled: bool,
    pub alarms: Vec<AlarmSnapshot>,
    pub stopwatch_elapsed_ms: u64,
    pub timer_remaining_ms: Option<u64>,
    pub updated_unix_ms: i64,
}

pub fn build_snapshot(controller: &ClockController, mono: Instant) -> StatusSnapshot {
    let settings = controller.settings();
    StatusSnapshot {
        time: controller.display().time_text.clone(),
        date: controller.display().date_text.clone(),
        timezone: controller.zone().name().to_string(),
        format_24h: settings.time_format.is_24h(),
        theme: settings.theme.as_str().to_string(),
        voice_enabled: settings.voice_enabled,
        alarms: controller
            .alarms()
            .iter()
            .map(|alarm| AlarmSnapshot {
                id: alarm.id,
                time: alarm.time.to_string(),
                label: alarm.label.clone(),
                sound: alarm.sound.to_string(),
                repeat: alarm.repeat,
                enabled: alarm.enabled,
            })
            .collect(),
        stopwatch_elapsed_ms: controller.stopwatch().elapsed(mono).as_millis() as u64,
        timer_remaining_ms: controller
            .timer()
            .map(|timer| timer.remaining(mono).as_millis() as u64),
        updated_unix_ms: Utc::now().timestamp_millis(),
    }
}

/// State shared between the HTTP thread and the tick thread: the published
/// snapshot going out, and the command queue coming in.
#[derive(Debug, Default)]
pub struct ApiSharedState {
    pub snapshot: StatusSnapshot,
    commands: VecDeque<ControlCommand>,
}

impl ApiSharedState {
    pub fn push_command(&mut self, command: ControlCommand) {
        self.commands.push_back(command);
    }

    pub fn drain_commands(&mut self) -> Vec<ControlCommand> {
        self.commands.drain(..).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

pub struct ApiServer {
    pub state: Arc<Mutex<ApiSharedState>>,
    stop: Arc<AtomicBool>,
    http_join: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn start(config: ApiServerConfig) -> Result<Self> {
        let bind = format!("{}:{}", config.bind_addr, config.port);
        let server = Server::http(&bind)
            .map_err(|err| anyhow::anyhow!("failed to start companion API on {bind}: {err}"))?;
        info!("companion API listening on http://{bind}");
        let state = Arc::new(Mutex::new(ApiSharedState::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let state_for_thread = Arc::clone(&state);
        let stop_for_thread = Arc::clone(&stop);
        let http_join =
            thread::spawn(move || run_server_loop(server, state_for_thread, stop_for_thread));
        Ok(Self {
            state,
            stop,
            http_join: Some(http_join),
        })
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.http_join.take() {
            let _ = join.join();
        }
    }
}

fn run_server_loop(server: Server, state: Arc<Mutex<ApiSharedState>>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => handle_request(request, &state),
            Ok(None) => continue,
            Err(_) => continue,
        }
    }
}

fn handle_request(mut request: tiny_http::Request, state: &Arc<Mutex<ApiSharedState>>) {
    let url = request.url().to_string();
    let (path, _query) = split_path_query(&url);

    let body = if request.method() == &Method::Post {
        let mut text = String::new();
        if request.as_reader().read_to_string(&mut text).is_err() {
            let _ = send_text(request, StatusCode(400), "unreadable request body");
            return;
        }
        Some(text)
    } else {
        None
    };

    let mut guard = match state.lock() {
        Ok(guard) => guard,
        Err(_) => {
            let _ = send_text(request, StatusCode(500), "internal state lock error");
            return;
        }
    };

    match (request.method().clone(), path) {
        (Method::Get, "/status") => {
            #[derive(Serialize)]
            struct Features {
                alarms: bool,
                stopwatch: bool,
                timer: bool,
                voice: bool,
            }
            #[derive(Serialize)]
            struct StatusResponse<'a> {
                status: &'static str,
                version: &'static str,
                features: Features,
                snapshot: &'a StatusSnapshot,
            }

            let payload = StatusResponse {
                status: "running",
                version: env!("CARGO_PKG_VERSION"),
                features: Features {
                    alarms: true,
                    stopwatch: true,
                    timer: true,
                    voice: guard.snapshot.voice_enabled,
                },
                snapshot: &guard.snapshot,
            };
            let _ = send_json(request, StatusCode(200), &payload);
        }
        (Method::Get, "/time") => {
            #[derive(Serialize)]
            struct TimeResponse<'a> {
                time: &'a str,
                date: &'a str,
                timezone: &'a str,
                format_24h: bool,
                server_iso_local: String,
            }

            let payload = TimeResponse {
                time: &guard.snapshot.time,
                date: &guard.snapshot.date,
                timezone: &guard.snapshot.timezone,
                format_24h: guard.snapshot.format_24h,
                server_iso_local: Local::now().to_rfc3339(),
            };
            let _ = send_json(request, StatusCode(200), &payload);
        }
        (Method::Get, "/alarms") => {
            #[derive(Serialize)]
            struct AlarmsResponse<'a> {
                count: usize,
                alarms: &'a [AlarmSnapshot],
            }

            let payload = AlarmsResponse {
                count: guard.snapshot.alarms.len(),
                alarms: &guard.snapshot.alarms,
            };
            let _ = send_json(request, StatusCode(200), &payload);
        }
        (Method::Get, "/healthz") => {
            let _ = send_text(request, StatusCode(200), "ok");
        }
        (Method::Post, "/alarm") => {
            let body = body.unwrap_or_default();
            match parse_add_alarm(&body) {
                Ok(command) => {
                    guard.push_command(command);
                    let _ = send_json(request, StatusCode(200), &serde_json::json!({"accepted": true}));
                }
                Err(reason) => {
                    let _ = send_json(
                        request,
                        StatusCode(400),
                        &serde_json::json!({"accepted": false, "error": reason}),
                    );
                }
            }
        }
        (Method::Post, "/settings") => {
            let body = body.unwrap_or_default();
            match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(map)) => {
                    let mut accepted = 0;
                    let mut ignored = Vec::new();
                    for (key, value) in map {
                        if settings::KNOWN_KEYS.contains(&key.as_str()) {
                            accepted += 1;
                            guard.push_command(ControlCommand::SetSetting { key, value });
                        } else {
                            ignored.push(key);
                        }
                    }
                    let _ = send_json(
                        request,
                        StatusCode(200),
                        &serde_json::json!({"accepted": accepted, "ignored": ignored}),
                    );
                }
                _ => {
                    let _ = send_json(
                        request,
                        StatusCode(400),
                        &serde_json::json!({"accepted": false, "error": "expected a JSON object"}),
                    );
                }
            }
        }
        _ => {
            let _ = send_text(request, StatusCode(404), "not found");
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddAlarmRequest {
    time: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    sound: Option<String>,
    #[serde(default)]
    repeat: Option<bool>,
}

/// Validates a POST /alarm body up front so malformed input is rejected at
/// the point of creation and never enqueued.
fn parse_add_alarm(body: &str) -> Result<ControlCommand, String> {
    let request: AddAlarmRequest =
        serde_json::from_str(body).map_err(|err| format!("invalid request body: {err}"))?;
    let time = AlarmTime::from_str(&request.time).map_err(|err| err.to_string())?;
    let sound = match request.sound.as_deref() {
        Some(text) => AlarmSound::from_str(text).map_err(|err| err.to_string())?,
        None => AlarmSound::Default,
    };
    Ok(ControlCommand::AddAlarm {
        time,
        label: request.label.unwrap_or_else(|| "Alarm".to_string()),
        sound,
        repeat: request.repeat.unwrap_or(false),
    })
}

fn split_path_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

fn send_json<T: Serialize>(
    request: tiny_http::Request,
    status: StatusCode,
    body: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    let content_type = Header::from_str("Content-Type: application/json; charset=utf-8")
        .map_err(|_| anyhow::anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_data(payload)
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn send_text(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    let content_type = Header::from_str("Content-Type: text/plain; charset=utf-8")
        .map_err(|_| anyhow::anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_string(body.to_string())
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

/// Publishes the latest snapshot and returns any queued commands. Called by
/// whichever thread drives the tick.
pub fn exchange(
    state: &Arc<Mutex<ApiSharedState>>,
    snapshot: StatusSnapshot,
) -> Vec<ControlCommand> {
    match state.lock() {
        Ok(mut guard) => {
            guard.snapshot = snapshot;
            guard.drain_commands()
        }
        Err(_) => {
            warn!("companion API state lock poisoned; skipping exchange");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_add_alarm_accepts_minimal_body() {
        let command = parse_add_alarm(r#"{"time": "07:30"}"#).expect("valid");
        match command {
            ControlCommand::AddAlarm {
                time,
                label,
                sound,
                repeat,
            } => {
                assert_eq!(time.to_string(), "07:30");
                assert_eq!(label, "Alarm");
                assert_eq!(sound, AlarmSound::Default);
                assert!(!repeat);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_add_alarm_rejects_malformed_time() {
        let err = parse_add_alarm(r#"{"time": "25:00"}"#).expect_err("out of range");
        assert!(err.contains("out of range"));
        let err = parse_add_alarm(r#"{"time": "soon"}"#).expect_err("malformed");
        assert!(err.contains("invalid alarm time"));
        let err = parse_add_alarm("not json").expect_err("bad body");
        assert!(err.contains("invalid request body"));
    }

    #[test]
    fn parse_add_alarm_rejects_unknown_sound() {
        let err =
            parse_add_alarm(r#"{"time": "07:30", "sound": "gong"}"#).expect_err("unknown sound");
        assert!(err.contains("unknown alarm sound"));
    }

    #[test]
    fn command_queue_drains_in_order() {
        let mut state = ApiSharedState::default();
        state.push_command(ControlCommand::RemoveAlarm(1));
        state.push_command(ControlCommand::ToggleAlarm(2));

        let drained = state.drain_commands();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], ControlCommand::RemoveAlarm(1)));
        assert!(matches!(drained[1], ControlCommand::ToggleAlarm(2)));
        assert!(state.drain_commands().is_empty());
    }

    #[test]
    fn split_path_query_separates_components() {
        assert_eq!(split_path_query("/status"), ("/status", None));
        assert_eq!(split_path_query("/time?tz=utc"), ("/time", Some("tz=utc")));
    }
}
