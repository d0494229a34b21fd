use std::collections::BTreeMap;

use anyhow::{Result, bail};
use chrono::{DateTime, Datelike, Local};
use tracing::info;

/// A menu entry contributed by a plugin: the action token passed back to
/// [`Plugin::execute_action`] and the label shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub action: &'static str,
    pub label: &'static str,
}

/// Capability interface for optional features. Loading untrusted code is an
/// external-collaborator concern; implementations here are compiled in and
/// registered by name.
pub trait Plugin: Send {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str {
        ""
    }
    fn initialize(&mut self) -> Result<()>;
    fn cleanup(&mut self);
    fn menu_items(&self) -> Vec<MenuItem>;
    fn execute_action(&mut self, action: &str, now: DateTime<Local>) -> Result<String>;
}

struct RegisteredPlugin {
    plugin: Box<dyn Plugin>,
    enabled: bool,
}

/// Registry keyed by plugin name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        let name = plugin.name().to_string();
        self.plugins.insert(
            name,
            RegisteredPlugin {
                plugin,
                enabled: false,
            },
        );
    }

    pub fn enable(&mut self, name: &str) -> Result<()> {
        let Some(registered) = self.plugins.get_mut(name) else {
            bail!("unknown plugin '{name}'");
        };
        if !registered.enabled {
            registered.plugin.initialize()?;
            registered.enabled = true;
            info!("plugin '{name}' enabled");
        }
        Ok(())
    }

    pub fn disable(&mut self, name: &str) -> bool {
        match self.plugins.get_mut(name) {
            Some(registered) if registered.enabled => {
                registered.plugin.cleanup();
                registered.enabled = false;
                true
            }
            _ => false,
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.plugins
            .get(name)
            .is_some_and(|registered| registered.enabled)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.plugins
            .get(name)
            .map(|registered| registered.plugin.description())
    }

    /// Menu entries of every enabled plugin, paired with the owning plugin
    /// name.
    pub fn menu_items(&self) -> Vec<(String, MenuItem)> {
        self.plugins
            .iter()
            .filter(|(_, registered)| registered.enabled)
            .flat_map(|(name, registered)| {
                registered
                    .plugin
                    .menu_items()
                    .into_iter()
                    .map(move |item| (name.clone(), item))
            })
            .collect()
    }

    /// Runs an action on an enabled plugin. `Ok(None)` means the plugin is
    /// unknown or disabled.
    pub fn execute(
        &mut self,
        name: &str,
        action: &str,
        now: DateTime<Local>,
    ) -> Result<Option<String>> {
        match self.plugins.get_mut(name) {
            Some(registered) if registered.enabled => {
                registered.plugin.execute_action(action, now).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// Built-in plugin showing calendar facts about the current date.
#[derive(Default)]
pub struct DateInfoPlugin;

impl Plugin for DateInfoPlugin {
    fn name(&self) -> &'static str {
        "date-info"
    }

    fn description(&self) -> &'static str {
        "Shows day-of-year, ISO week and quarter for the current date"
    }

    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn cleanup(&mut self) {}

    fn menu_items(&self) -> Vec<MenuItem> {
        vec![
            MenuItem {
                action: "date_info",
                label: "Show Date Info",
            },
            MenuItem {
                action: "week_number",
                label: "Show Week Number",
            },
        ]
    }

    fn execute_action(&mut self, action: &str, now: DateTime<Local>) -> Result<String> {
        match action {
            "date_info" => Ok(format!(
                "{} — day {} of the year, Q{}",
                now.format("%A, %B %d, %Y"),
                now.ordinal(),
                (now.month0() / 3) + 1
            )),
            "week_number" => {
                let week = now.iso_week();
                Ok(format!("Week {} of {}", week.week(), week.year()))
            }
            other => bail!("unknown action '{other}' for date-info"),
        }
    }
}
