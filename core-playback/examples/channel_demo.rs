//! # Channel Manager Walkthrough
//!
//! Plays music, interrupts it with a jingle, fires a few effects and prints
//! the channel events, all against the headless platform and a virtual clock.
//!
//! Run with: `cargo run --example channel_demo --package core-playback`
//!
//! Pass a game directory (or a base URL) to play real assets from
//! `<root>/audio/...`:
//! `cargo run --example channel_demo --package core-playback -- /path/to/game`

use anyhow::Context;
use bridge_desktop::{
    HeadlessAudioPlatform, MemoryAssetFetcher, ReqwestAssetFetcher, TokioAssetFetcher, VirtualClock,
};
use bridge_traits::{AssetFetcher, LogLevel};
use core_playback::{AudioChannelManager, AudioClip, AudioSettings};
use core_runtime::config::CoreConfig;
use core_runtime::events::{ChannelEvents, EventBus};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::Arc;

const FRAME: f64 = 1.0 / 60.0;

/// Minimal Vorbis header pages so the demo runs without real assets.
fn synthetic_track(seconds: f64, loop_tags: &[&str]) -> Vec<u8> {
    fn page(granule: u64, packet: &[u8]) -> Vec<u8> {
        let mut out = b"OggS\0\0".to_vec();
        out.extend_from_slice(&granule.to_le_bytes());
        out.extend_from_slice(&[0u8; 12]);
        let mut table = vec![255u8; packet.len() / 255];
        table.push((packet.len() % 255) as u8);
        out.push(table.len() as u8);
        out.extend_from_slice(&table);
        out.extend_from_slice(packet);
        out
    }

    let rate: u32 = 44_100;
    let mut ident = b"\x01vorbis\0\0\0\0\x02".to_vec();
    ident.extend_from_slice(&rate.to_le_bytes());
    ident.extend_from_slice(&[0u8; 13]);

    let mut comment = b"\x03vorbis\x04\0\0\0demo".to_vec();
    comment.extend_from_slice(&(loop_tags.len() as u32).to_le_bytes());
    for tag in loop_tags {
        comment.extend_from_slice(&(tag.len() as u32).to_le_bytes());
        comment.extend_from_slice(tag.as_bytes());
    }
    comment.push(1);

    let mut data = page(0, &ident);
    data.extend(page(0, &comment));
    data.extend(page((seconds * rate as f64) as u64, &[0u8; 16]));
    data
}

fn demo_fetcher() -> Arc<dyn AssetFetcher> {
    Arc::new(
        MemoryAssetFetcher::new()
            .with_asset(
                "audio/bgm/Field.ogg",
                synthetic_track(20.0, &["LOOPSTART=88200", "LOOPLENGTH=441000"]),
            )
            .with_asset("audio/me/Victory.ogg", synthetic_track(2.0, &[]))
            .with_asset("audio/se/Cursor.ogg", synthetic_track(0.2, &[])),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    )
    .context("failed to initialise logging")?;

    let clock = VirtualClock::new();
    let fetcher: Arc<dyn AssetFetcher> = match std::env::args().nth(1) {
        Some(base) if base.starts_with("http") => Arc::new(ReqwestAssetFetcher::new(base)),
        Some(dir) => Arc::new(TokioAssetFetcher::with_root(dir)),
        None => demo_fetcher(),
    };
    let bus = EventBus::new(64);
    let mut events = ChannelEvents::new(bus.subscribe());

    let config = CoreConfig::builder()
        .asset_fetcher(fetcher)
        .audio_platform(Arc::new(HeadlessAudioPlatform::new(clock.clone())))
        .event_bus(bus)
        .build()
        .context("invalid core configuration")?;

    let settings = AudioSettings {
        debug_logging: true,
        ..AudioSettings::default()
    };
    let mut audio = AudioChannelManager::new(&config, settings)?;

    audio.play_music(AudioClip::new("Field").with_volume(90), 0.0);
    audio.flush_loads().await;

    for frame in 0..(12.0 / FRAME) as usize {
        match frame {
            180 => audio.play_jingle(AudioClip::new("Victory")),
            420 | 450 | 480 => audio.play_one_shot(AudioClip::new("Cursor").with_pan(-40)),
            _ => {}
        }
        audio.flush_loads().await;
        clock.advance(FRAME);
        audio.update();
    }

    let saved = audio.save_music();
    println!("saved music: {} at {:.2}s", saved.name, saved.pos);

    for url in audio.check_errors() {
        println!("failed to load {url}");
    }

    for event in events.drain() {
        println!("[{:?}] {} {}", event.severity(), event.channel(), event.clip());
    }

    Ok(())
}
