//! Plugin-style preload commands.
//!
//! ```text
//! PreloadBGM <name> [volume] [pitch%] [pan]
//! PreloadBGS <name> [volume] [pitch%] [pan]
//! PreloadME  <name> [volume] [pitch%] [pan]
//! ```
//!
//! Command names are case-insensitive. Pitch is given in percent
//! (`100` = normal speed).

use crate::clip::{AudioCategory, AudioClip};
use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    Preload {
        category: AudioCategory,
        clip: AudioClip,
    },
}

impl AudioCommand {
    /// Parse a command with pre-split arguments.
    ///
    /// Returns `Ok(None)` for commands this module does not handle. The name
    /// argument is taken verbatim, so it may contain spaces.
    pub fn parse<S: AsRef<str>>(command: &str, args: &[S]) -> Result<Option<Self>> {
        let category = match command.to_ascii_lowercase().as_str() {
            "preloadbgm" => AudioCategory::Bgm,
            "preloadbgs" => AudioCategory::Bgs,
            "preloadme" => AudioCategory::Me,
            _ => return Ok(None),
        };

        let name = args
            .first()
            .map(|a| a.as_ref().trim())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| PlaybackError::InvalidCommand(format!("{command}: missing clip name")))?;

        let mut clip = AudioClip::new(name);
        if let Some(volume) = args.get(1) {
            clip = clip.with_volume(parse_arg::<u8>(command, "volume", volume.as_ref())?);
        }
        if let Some(pitch) = args.get(2) {
            let percent = parse_arg::<u16>(command, "pitch", pitch.as_ref())?;
            clip = clip.with_pitch(percent as f64 / 100.0);
        }
        if let Some(pan) = args.get(3) {
            clip = clip.with_pan(parse_arg::<i8>(command, "pan", pan.as_ref())?);
        }

        Ok(Some(AudioCommand::Preload { category, clip }))
    }

    /// Parse a whitespace-separated command line. Names cannot contain spaces.
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();
        Self::parse(command, &args)
    }
}

fn parse_arg<T: std::str::FromStr>(command: &str, field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        PlaybackError::InvalidCommand(format!("{command}: invalid {field} '{value}'"))
    })
}
