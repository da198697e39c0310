//! Shared fixtures: synthetic Ogg/MP4 streams and a wired-up channel manager.

#![allow(dead_code)]

use bridge_desktop::{HeadlessAudioPlatform, MemoryAssetFetcher, VirtualClock};
use core_playback::{AudioChannelManager, AudioSettings};
use core_runtime::config::CoreConfig;
use core_runtime::events::{AudioEvent, ChannelEvents, EventBus};
use std::sync::Arc;

pub const SAMPLE_RATE: u32 = 44_100;
pub const FRAME: f64 = 1.0 / 60.0;

// ============================================================================
// Ogg
// ============================================================================

pub fn ogg_page(granule: u64, packets: &[&[u8]]) -> Vec<u8> {
    let mut table = Vec::new();
    let mut body = Vec::new();
    for packet in packets {
        let mut remaining = packet.len();
        loop {
            let segment = remaining.min(255);
            table.push(segment as u8);
            remaining -= segment;
            if segment < 255 {
                break;
            }
        }
        body.extend_from_slice(packet);
    }

    let mut page = Vec::new();
    page.extend_from_slice(b"OggS");
    page.extend_from_slice(&[0, 0]);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&[0u8; 12]);
    page.push(table.len() as u8);
    page.extend_from_slice(&table);
    page.extend_from_slice(&body);
    page
}

pub fn vorbis_identification(sample_rate: u32) -> Vec<u8> {
    let mut packet = vec![1];
    packet.extend_from_slice(b"vorbis");
    packet.extend_from_slice(&0u32.to_le_bytes());
    packet.push(2);
    packet.extend_from_slice(&sample_rate.to_le_bytes());
    packet.extend_from_slice(&[0u8; 13]);
    packet
}

pub fn vorbis_comment(entries: &[&str]) -> Vec<u8> {
    let mut packet = vec![3];
    packet.extend_from_slice(b"vorbis");
    let vendor = b"fixture";
    packet.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    packet.extend_from_slice(vendor);
    packet.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        packet.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        packet.extend_from_slice(entry.as_bytes());
    }
    packet.push(1);
    packet
}

/// Vorbis stream of `seconds` at [`SAMPLE_RATE`] carrying `comments`.
pub fn ogg_track(seconds: f64, comments: &[&str]) -> Vec<u8> {
    let granule = (seconds * SAMPLE_RATE as f64) as u64;
    let mut data = ogg_page(0, &[&vorbis_identification(SAMPLE_RATE)]);
    data.extend(ogg_page(0, &[&vorbis_comment(comments)]));
    data.extend(ogg_page(granule, &[&[0u8; 64]]));
    data
}

// ============================================================================
// MP4
// ============================================================================

pub fn atom(name: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(name);
    out.extend_from_slice(body);
    out
}

/// M4A-style file with an `mvhd` timescale/duration and iTunes-style loop
/// tags in `udta`.
pub fn m4a_track(timescale: u32, duration: u32, loop_start: u64, loop_length: u64) -> Vec<u8> {
    let mut mvhd = vec![0u8; 4];
    mvhd.extend_from_slice(&[0u8; 8]);
    mvhd.extend_from_slice(&timescale.to_be_bytes());
    mvhd.extend_from_slice(&duration.to_be_bytes());
    mvhd.extend_from_slice(&[0u8; 80]);

    let mut tags = Vec::new();
    for (key, value) in [("LOOPSTART", loop_start), ("LOOPLENGTH", loop_length)] {
        tags.extend_from_slice(key.as_bytes());
        tags.push(0);
        tags.extend_from_slice(&[0u8; 15]);
        tags.extend_from_slice(value.to_string().as_bytes());
        tags.push(0);
    }

    let mut moov_body = atom(b"mvhd", &mvhd);
    moov_body.extend(atom(b"udta", &tags));

    let mut data = atom(b"ftyp", b"M4A \0\0\0\0isomiso2");
    data.extend(atom(b"moov", &moov_body));
    data.extend(atom(b"mdat", &[0u8; 32]));
    data
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub clock: VirtualClock,
    pub platform: Arc<HeadlessAudioPlatform>,
    pub fetcher: Arc<MemoryAssetFetcher>,
    pub bus: EventBus,
    pub manager: AudioChannelManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(AudioSettings::default())
    }

    pub fn with_settings(settings: AudioSettings) -> Self {
        let clock = VirtualClock::new();
        Self::with_platform(HeadlessAudioPlatform::new(clock.clone()), clock, settings)
    }

    pub fn with_platform(
        platform: HeadlessAudioPlatform,
        clock: VirtualClock,
        settings: AudioSettings,
    ) -> Self {
        let platform = Arc::new(platform);
        let fetcher = Arc::new(MemoryAssetFetcher::new());
        let bus = EventBus::new(256);
        let config = CoreConfig::builder()
            .asset_fetcher(fetcher.clone())
            .audio_platform(platform.clone())
            .event_bus(bus.clone())
            .build()
            .expect("valid core config");
        let manager = AudioChannelManager::new(&config, settings).expect("valid settings");

        Self {
            clock,
            platform,
            fetcher,
            bus,
            manager,
        }
    }

    /// Register an Ogg asset of `seconds` under `folder/name`.
    pub fn add_track(&self, folder: &str, name: &str, seconds: f64) {
        self.add_asset(folder, name, ogg_track(seconds, &[]));
    }

    pub fn add_asset(&self, folder: &str, name: &str, data: Vec<u8>) {
        self.fetcher
            .insert(format!("audio/{folder}/{name}.ogg"), data);
    }

    /// Advance the clock by `seconds` in 60 Hz frames, ticking the manager
    /// after each one.
    pub fn run_for(&mut self, seconds: f64) {
        let frames = (seconds / FRAME).ceil() as usize;
        for _ in 0..frames {
            self.clock.advance(FRAME);
            self.manager.update();
        }
    }

    pub fn subscribe(&self) -> ChannelEvents {
        ChannelEvents::new(self.bus.subscribe())
    }
}

/// Drain every audio event currently buffered.
pub fn drain_audio_events(events: &mut ChannelEvents) -> Vec<AudioEvent> {
    events.drain()
}
