//! Settings persistence for Vela - the effect chain state on disk

mod settings;

pub use settings::{Settings, SettingsError};
