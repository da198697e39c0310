//! # Audio Settings
//!
//! Tunables for the channel manager and its backends.

use serde::{Deserialize, Serialize};

use crate::clip::Channel;
use crate::error::{PlaybackError, Result};

/// Audio subsystem settings.
///
/// Every field has a serde default, so partial JSON documents load:
///
/// ```
/// use core_playback::config::AudioSettings;
///
/// let settings = AudioSettings::from_json(r#"{ "force_streaming_backend": true }"#).unwrap();
/// assert!(settings.force_streaming_backend);
/// assert_eq!(settings.loop_start_ceiling, 50_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Always use the streaming-element strategy.
    ///
    /// Default: false.
    #[serde(default)]
    pub force_streaming_backend: bool,

    /// Route persistent-pool effects through the node-graph strategy even on
    /// constrained devices.
    ///
    /// Default: false.
    #[serde(default)]
    pub legacy_static_effect_mode: bool,

    /// Parsed loop-start values above this many sample frames are discarded.
    ///
    /// Default: 50000.
    #[serde(default = "default_loop_start_ceiling")]
    pub loop_start_ceiling: u64,

    /// Log channel transitions at `info` instead of `debug`.
    ///
    /// Default: false.
    #[serde(default)]
    pub debug_logging: bool,

    /// Prefix for asset URLs.
    ///
    /// Default: `"audio/"`.
    #[serde(default = "default_audio_root")]
    pub audio_root: String,

    /// Fade-in applied when music or ambient sound is replayed (seconds).
    ///
    /// Default: 0.5.
    #[serde(default = "default_replay_fade_time")]
    pub replay_fade_time: f64,

    /// Ticks per second used by fade emulation.
    ///
    /// Default: 60.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,

    /// Per-channel master volumes.
    #[serde(default)]
    pub master_volumes: MasterVolumes,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            force_streaming_backend: false,
            legacy_static_effect_mode: false,
            loop_start_ceiling: default_loop_start_ceiling(),
            debug_logging: false,
            audio_root: default_audio_root(),
            replay_fade_time: default_replay_fade_time(),
            tick_rate: default_tick_rate(),
            master_volumes: MasterVolumes::default(),
        }
    }
}

impl AudioSettings {
    /// Parse settings from a JSON document and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| PlaybackError::InvalidSettings(e.to_string()))?;
        settings
            .validate()
            .map_err(PlaybackError::InvalidSettings)?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.tick_rate == 0 {
            return Err("tick_rate must be > 0".to_string());
        }

        if !self.replay_fade_time.is_finite() || self.replay_fade_time < 0.0 {
            return Err("replay_fade_time must be a non-negative number".to_string());
        }

        self.master_volumes.validate()?;

        Ok(())
    }

    /// Seconds between two fade-emulation ticks.
    pub fn tick_interval(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }
}

/// Master volume per channel, each `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterVolumes {
    #[serde(default = "default_master_volume")]
    pub music: u8,
    #[serde(default = "default_master_volume")]
    pub ambient: u8,
    #[serde(default = "default_master_volume")]
    pub jingle: u8,
    #[serde(default = "default_master_volume")]
    pub effects: u8,
}

impl Default for MasterVolumes {
    fn default() -> Self {
        Self {
            music: default_master_volume(),
            ambient: default_master_volume(),
            jingle: default_master_volume(),
            effects: default_master_volume(),
        }
    }
}

impl MasterVolumes {
    /// Master volume that applies to `channel`.
    ///
    /// Both effect pools share the effects volume.
    pub fn get(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Music => self.music,
            Channel::Ambient => self.ambient,
            Channel::Jingle => self.jingle,
            Channel::OneShotEffect | Channel::PersistentEffect => self.effects,
        }
    }

    pub fn set(&mut self, channel: Channel, volume: u8) {
        let volume = volume.min(100);
        match channel {
            Channel::Music => self.music = volume,
            Channel::Ambient => self.ambient = volume,
            Channel::Jingle => self.jingle = volume,
            Channel::OneShotEffect | Channel::PersistentEffect => self.effects = volume,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("music", self.music),
            ("ambient", self.ambient),
            ("jingle", self.jingle),
            ("effects", self.effects),
        ] {
            if value > 100 {
                return Err(format!("master volume '{}' must be <= 100", name));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_loop_start_ceiling() -> u64 {
    50_000
}

fn default_audio_root() -> String {
    "audio/".to_string()
}

fn default_replay_fade_time() -> f64 {
    0.5
}

fn default_tick_rate() -> u32 {
    60
}

fn default_master_volume() -> u8 {
    100
}
