//! Clip descriptors, channels and save snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What to play and at which parameters.
///
/// Two clips refer to the same asset when their names match; parameters are
/// ignored for that comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub name: String,
    /// `0..=100`
    pub volume: u8,
    /// Playback-rate factor, `0.5..=1.5`.
    pub pitch: f64,
    /// `-100..=100`
    pub pan: i8,
}

impl AudioClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: 100,
            pitch: 1.0,
            pan: 0,
        }
    }

    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = volume.min(100);
        self
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = if pitch.is_finite() {
            pitch.clamp(0.5, 1.5)
        } else {
            1.0
        };
        self
    }

    pub fn with_pan(mut self, pan: i8) -> Self {
        self.pan = pan.clamp(-100, 100);
        self
    }

    /// Whether `other` names the same asset.
    pub fn same_asset(&self, other: &AudioClip) -> bool {
        self.name == other.name
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Serializable record of a channel's clip and position, for save files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSnapshot {
    pub name: String,
    pub volume: u8,
    pub pitch: f64,
    pub pan: i8,
    /// Playback position in seconds.
    pub pos: f64,
}

impl AudioSnapshot {
    /// Snapshot of a silent channel.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            volume: 0,
            pitch: 1.0,
            pan: 0,
            pos: 0.0,
        }
    }

    pub fn from_clip(clip: &AudioClip, pos: f64) -> Self {
        Self {
            name: clip.name.clone(),
            volume: clip.volume,
            pitch: clip.pitch,
            pan: clip.pan,
            pos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn clip(&self) -> AudioClip {
        AudioClip::new(self.name.clone())
            .with_volume(self.volume)
            .with_pitch(self.pitch)
            .with_pan(self.pan)
    }
}

/// Asset folder an audio file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCategory {
    /// Background music
    Bgm,
    /// Background sound
    Bgs,
    /// Music effect (jingle)
    Me,
    /// Sound effect
    Se,
}

impl AudioCategory {
    pub fn folder(&self) -> &'static str {
        match self {
            AudioCategory::Bgm => "bgm",
            AudioCategory::Bgs => "bgs",
            AudioCategory::Me => "me",
            AudioCategory::Se => "se",
        }
    }

    /// Channel that plays assets from this folder.
    pub fn channel(&self) -> Channel {
        match self {
            AudioCategory::Bgm => Channel::Music,
            AudioCategory::Bgs => Channel::Ambient,
            AudioCategory::Me => Channel::Jingle,
            AudioCategory::Se => Channel::OneShotEffect,
        }
    }
}

impl fmt::Display for AudioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

/// Logical playback slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Music,
    Ambient,
    Jingle,
    OneShotEffect,
    PersistentEffect,
}

impl Channel {
    pub fn category(&self) -> AudioCategory {
        match self {
            Channel::Music => AudioCategory::Bgm,
            Channel::Ambient => AudioCategory::Bgs,
            Channel::Jingle => AudioCategory::Me,
            Channel::OneShotEffect | Channel::PersistentEffect => AudioCategory::Se,
        }
    }

    /// Name used in events and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Music => "music",
            Channel::Ambient => "ambient",
            Channel::Jingle => "jingle",
            Channel::OneShotEffect | Channel::PersistentEffect => "effect",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
