use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use telbridge_bus::CallState;

/// Daemon configuration, TOML.
///
/// The bulk-hangup state set is configurable on purpose: the legacy
/// downstream semantics for which states `hangup_waiting_or_background`
/// covers are inherited, not documented, so deployments can adjust the
/// set without a rebuild.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_modem_path")]
    pub modem_path: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_call_slots")]
    pub call_slots: u32,
    #[serde(default = "default_bulk_hangup_states")]
    pub bulk_hangup_states: Vec<String>,
}

fn default_modem_path() -> String {
    "/modem0".to_string()
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_call_slots() -> u32 {
    7
}

fn default_bulk_hangup_states() -> Vec<String> {
    vec!["incoming".to_string(), "held".to_string(), "waiting".to_string()]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            modem_path: default_modem_path(),
            debounce_ms: default_debounce_ms(),
            call_slots: default_call_slots(),
            bulk_hangup_states: default_bulk_hangup_states(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Parsed bulk-hangup set; unknown state names are dropped with a
    /// warning rather than rejected.
    pub fn hangup_states(&self) -> Vec<CallState> {
        self.bulk_hangup_states
            .iter()
            .filter_map(|name| {
                let state = CallState::from_remote(name);
                if state.is_none() {
                    log::warn!("ignoring unknown bulk_hangup_states entry {name:?}");
                }
                state
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_legacy_semantics() {
        let config = BridgeConfig::default();
        assert_eq!(config.call_slots, 7);
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(
            config.hangup_states(),
            vec![CallState::Incoming, CallState::Held, CallState::Waiting]
        );
    }

    #[test]
    fn toml_overrides_and_unknown_states_are_dropped() {
        let config = BridgeConfig::from_toml(
            r#"
            modem_path = "/ril_0"
            debounce_ms = 150
            bulk_hangup_states = ["held", "ringing"]
            "#,
        )
        .expect("parse");
        assert_eq!(config.modem_path, "/ril_0");
        assert_eq!(config.debounce_window(), Duration::from_millis(150));
        assert_eq!(config.hangup_states(), vec![CallState::Held]);
    }
}
