//! Effect settings persistence
//!
//! Stores the full chain state and processing order in a simple
//! `section.key=value` text file. Unknown keys are ignored so older builds
//! can read files written by newer ones.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use vela_audio::{ChainState, EffectSlot, ReverbPreset, DEFAULT_ORDER};

/// Errors that can occur while reading or writing settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Persisted effect settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub chain: ChainState,
    pub order: [EffectSlot; 5],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chain: ChainState::default(),
            order: DEFAULT_ORDER,
        }
    }
}

impl Settings {
    /// Load settings from the default location
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring settings file");
                Self::default()
            }
        }
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::config_path())
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())?;
        Ok(())
    }

    /// Get the default settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vela")
            .join("fx.conf")
    }

    /// Parse settings from `key=value` lines
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(SettingsError::Parse {
                    line: line_no,
                    message: format!("expected key=value, got '{}'", line),
                });
            };

            settings
                .apply(key.trim(), value.trim())
                .map_err(|message| SettingsError::Parse {
                    line: line_no,
                    message,
                })?;
        }

        Ok(settings)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        let chain = &mut self.chain;
        match key {
            "chain.order" => self.order = parse_order(value)?,

            "eq.enabled" => chain.eq.enabled = parse_bool(value)?,
            "eq.low" => chain.eq.low = parse_num(value)?,
            "eq.mid" => chain.eq.mid = parse_num(value)?,
            "eq.high" => chain.eq.high = parse_num(value)?,

            "compressor.enabled" => chain.compressor.enabled = parse_bool(value)?,
            "compressor.threshold" => chain.compressor.threshold = parse_num(value)?,
            "compressor.ratio" => chain.compressor.ratio = parse_num(value)?,
            "compressor.attack" => chain.compressor.attack = parse_num(value)?,
            "compressor.release" => chain.compressor.release = parse_num(value)?,
            "compressor.knee" => chain.compressor.knee = parse_num(value)?,
            "compressor.makeup_gain" => chain.compressor.makeup_gain = parse_num(value)?,

            "filter.enabled" => chain.filter.enabled = parse_bool(value)?,
            "filter.highpass" => chain.filter.highpass = parse_num(value)?,
            "filter.highpass_q" => chain.filter.highpass_q = parse_num(value)?,
            "filter.lowpass" => chain.filter.lowpass = parse_num(value)?,
            "filter.lowpass_q" => chain.filter.lowpass_q = parse_num(value)?,

            "delay.enabled" => chain.delay.enabled = parse_bool(value)?,
            "delay.time" => chain.delay.time = parse_num(value)?,
            "delay.feedback" => chain.delay.feedback = parse_num(value)?,
            "delay.ping_pong" => chain.delay.ping_pong = parse_bool(value)?,
            "delay.mix" => chain.delay.mix = parse_num(value)?,

            "reverb.enabled" => chain.reverb.enabled = parse_bool(value)?,
            "reverb.preset" => {
                chain.reverb.preset = ReverbPreset::from_str(value).map_err(|e| e.to_string())?
            }
            "reverb.pre_delay_ms" => chain.reverb.pre_delay_ms = parse_num(value)?,
            "reverb.mix" => chain.reverb.mix = parse_num(value)?,

            _ => tracing::debug!(key, "ignoring unknown settings key"),
        }
        Ok(())
    }

    /// Serialize settings to `key=value` lines
    pub fn serialize(&self) -> String {
        let c = &self.chain;
        let order: Vec<&str> = self.order.iter().map(|slot| slot.name()).collect();

        let lines = [
            "# Vela effect settings".to_string(),
            format!("chain.order={}", order.join(",")),
            String::new(),
            format!("eq.enabled={}", c.eq.enabled),
            format!("eq.low={}", c.eq.low),
            format!("eq.mid={}", c.eq.mid),
            format!("eq.high={}", c.eq.high),
            String::new(),
            format!("compressor.enabled={}", c.compressor.enabled),
            format!("compressor.threshold={}", c.compressor.threshold),
            format!("compressor.ratio={}", c.compressor.ratio),
            format!("compressor.attack={}", c.compressor.attack),
            format!("compressor.release={}", c.compressor.release),
            format!("compressor.knee={}", c.compressor.knee),
            format!("compressor.makeup_gain={}", c.compressor.makeup_gain),
            String::new(),
            format!("filter.enabled={}", c.filter.enabled),
            format!("filter.highpass={}", c.filter.highpass),
            format!("filter.highpass_q={}", c.filter.highpass_q),
            format!("filter.lowpass={}", c.filter.lowpass),
            format!("filter.lowpass_q={}", c.filter.lowpass_q),
            String::new(),
            format!("delay.enabled={}", c.delay.enabled),
            format!("delay.time={}", c.delay.time),
            format!("delay.feedback={}", c.delay.feedback),
            format!("delay.ping_pong={}", c.delay.ping_pong),
            format!("delay.mix={}", c.delay.mix),
            String::new(),
            format!("reverb.enabled={}", c.reverb.enabled),
            format!("reverb.preset={}", c.reverb.preset),
            format!("reverb.pre_delay_ms={}", c.reverb.pre_delay_ms),
            format!("reverb.mix={}", c.reverb.mix),
        ];

        lines.join("\n") + "\n"
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(format!("expected a boolean, got '{}'", value)),
    }
}

fn parse_num(value: &str) -> Result<f32, String> {
    match value.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("expected a number, got '{}'", value)),
    }
}

fn parse_order(value: &str) -> Result<[EffectSlot; 5], String> {
    let slots = value
        .split(',')
        .map(|name| name.parse::<EffectSlot>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    let order: [EffectSlot; 5] = slots
        .try_into()
        .map_err(|_| "chain.order must list all five effects".to_string())?;
    if EffectSlot::ALL.iter().any(|slot| !order.contains(slot)) {
        return Err("chain.order must list each effect once".to_string());
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_parse_values() {
        let content = "\
# Comment
eq.enabled=on
eq.mid=-4.5
delay.ping_pong=true
reverb.preset=large-hall
chain.order=reverb,delay,compressor,filter,eq
";
        let settings = Settings::parse(content).unwrap();
        assert!(settings.chain.eq.enabled);
        assert_eq!(settings.chain.eq.mid, -4.5);
        assert!(settings.chain.delay.ping_pong);
        assert_eq!(settings.chain.reverb.preset, ReverbPreset::LargeHall);
        assert_eq!(settings.order[0], EffectSlot::Reverb);
        assert_eq!(settings.order[4], EffectSlot::Eq);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let settings = Settings::parse("chorus.depth=0.5\neq.low=2").unwrap();
        assert_eq!(settings.chain.eq.low, 2.0);
    }

    #[test]
    fn test_malformed_value_reports_line() {
        let err = Settings::parse("# header\neq.low=loud").unwrap_err();
        match err {
            SettingsError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {}", other),
        }

        assert!(Settings::parse("reverb.preset=stadium").is_err());
        assert!(Settings::parse("just some text").is_err());
    }

    #[test]
    fn test_order_must_be_permutation() {
        assert!(Settings::parse("chain.order=eq,eq,delay,reverb,filter").is_err());
        assert!(Settings::parse("chain.order=eq,delay").is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut settings = Settings::default();
        settings.chain.compressor.enabled = true;
        settings.chain.compressor.makeup_gain = 3.5;
        settings.chain.filter.lowpass = 8000.0;
        settings.chain.reverb.preset = ReverbPreset::Cathedral;
        settings.chain.reverb.pre_delay_ms = 25.0;
        settings.order = [
            EffectSlot::Filter,
            EffectSlot::Eq,
            EffectSlot::Compressor,
            EffectSlot::Reverb,
            EffectSlot::Delay,
        ];

        let parsed = Settings::parse(&settings.serialize()).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("vela-settings-{}", std::process::id()));
        let path = dir.join("fx.conf");

        let mut settings = Settings::default();
        settings.chain.delay.time = 0.75;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("vela-settings-missing/none.conf");
        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Io(_))
        ));
    }
}
