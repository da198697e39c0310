mod common;

use async_trait::async_trait;
use bridge_desktop::{HeadlessAudioPlatform, MemoryAssetFetcher, VirtualClock};
use bridge_traits::{error::Result as BridgeResult, AssetFetcher, BridgeError};
use bytes::Bytes;
use common::{ogg_track, FRAME};
use core_playback::{
    HeaderXorCipher, LoadContext, PlaybackBackend, PlaybackError, PlaybackState, StrategyKind,
    FADE_EPSILON,
};
use mockall::mock;
use parking_lot::Mutex;
use std::sync::Arc;

mock! {
    pub Fetcher {}

    #[async_trait]
    impl AssetFetcher for Fetcher {
        async fn fetch(&self, url: &str) -> BridgeResult<Bytes>;
    }
}

const URL: &str = "audio/bgm/Field.ogg";
const KEY: &str = "00112233445566778899aabbccddeeff";

fn setup() -> (VirtualClock, LoadContext, MemoryAssetFetcher) {
    let clock = VirtualClock::new();
    let platform = Arc::new(HeadlessAudioPlatform::new(clock.clone()));
    let fetcher = MemoryAssetFetcher::new().with_asset(
        URL,
        ogg_track(10.0, &["LOOPSTART=88200", "LOOPLENGTH=176400"]),
    );
    (clock, LoadContext::new(platform), fetcher)
}

async fn loaded(kind: StrategyKind) -> (VirtualClock, PlaybackBackend) {
    let (clock, ctx, fetcher) = setup();
    let mut backend = PlaybackBackend::new(URL, kind);
    backend.load(&fetcher, &ctx).await;
    assert_eq!(backend.state(), PlaybackState::Ready);
    (clock, backend)
}

fn tick(clock: &VirtualClock, backend: &mut PlaybackBackend, frames: usize) {
    for _ in 0..frames {
        clock.advance(FRAME);
        backend.update();
    }
}

#[tokio::test]
async fn test_streaming_fade_out_converges_within_duration_plus_one_tick() {
    let (clock, mut backend) = loaded(StrategyKind::StreamingElement).await;
    backend.play(true, 0.0);
    assert_eq!(backend.output_gain(), 1.0);

    backend.fade_out(0.5);
    assert!(backend.is_fading());

    tick(&clock, &mut backend, 29);
    assert!(backend.is_fading(), "fade finished early");
    assert!(backend.output_gain() > FADE_EPSILON);

    tick(&clock, &mut backend, 2);
    assert!(!backend.is_fading());
    assert!(backend.output_gain() < FADE_EPSILON);
}

#[tokio::test]
async fn test_streaming_fade_in_never_exceeds_target() {
    let (clock, mut backend) = loaded(StrategyKind::StreamingElement).await;
    let mut params = backend.params();
    params.gain = 0.6;
    backend.set_params(params);
    backend.play(true, 0.0);

    backend.fade_in(0.25);
    let mut peak: f64 = 0.0;
    for _ in 0..30 {
        tick(&clock, &mut backend, 1);
        peak = peak.max(backend.output_gain());
    }
    assert!(!backend.is_fading());
    assert!(peak <= 0.6 + f64::EPSILON);
    assert_eq!(backend.output_gain(), 0.6);
}

#[tokio::test]
async fn test_node_graph_fade_uses_clock_ramp() {
    let (clock, mut backend) = loaded(StrategyKind::NodeGraph).await;
    backend.play(true, 0.0);
    backend.fade_out(1.0);

    clock.advance(0.5);
    assert!((backend.output_gain() - 0.5).abs() < 1e-9);
    assert!(backend.is_fading());

    clock.advance(0.5);
    backend.update();
    assert!(!backend.is_fading());
    assert_eq!(backend.output_gain(), 0.0);
}

#[tokio::test]
async fn test_replay_after_stop_is_safe_noop() {
    for kind in [StrategyKind::NodeGraph, StrategyKind::StreamingElement] {
        let (_clock, mut backend) = loaded(kind).await;
        backend.play(true, 1.0);
        backend.stop();

        backend.replay();

        assert_eq!(backend.state(), PlaybackState::Stopped);
        assert!(!backend.has_media());
        assert_eq!(backend.seek(), 0.0);
    }
}

#[tokio::test]
async fn test_pause_then_replay_resumes_position() {
    for kind in [StrategyKind::NodeGraph, StrategyKind::StreamingElement] {
        let (clock, mut backend) = loaded(kind).await;
        backend.play(true, 0.0);
        tick(&clock, &mut backend, 60);
        backend.pause();
        let paused_at = backend.seek();

        clock.advance(5.0);
        backend.update();
        assert!((backend.seek() - paused_at).abs() < 1e-9, "{kind:?}");

        backend.replay();
        assert_eq!(backend.state(), PlaybackState::Playing);
        clock.advance(0.5);
        assert!((backend.seek() - (paused_at + 0.5)).abs() < 1e-6, "{kind:?}");
    }
}

#[tokio::test]
async fn test_looping_wraps_into_window_and_fires_hook() {
    for kind in [StrategyKind::NodeGraph, StrategyKind::StreamingElement] {
        let (clock, mut backend) = loaded(kind).await;
        let loops = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&loops);
        backend.set_on_loop(move || *counter.lock() += 1);

        backend.play(true, 0.0);
        // window is [2, 6]; run to 7 s
        tick(&clock, &mut backend, 420);

        assert_eq!(*loops.lock(), 1, "{kind:?}");
        let position = backend.seek();
        assert!((2.0..6.0).contains(&position), "{kind:?}: {position}");
        assert_eq!(backend.state(), PlaybackState::Playing);
    }
}

#[tokio::test]
async fn test_non_looping_end_stops_and_fires_listener() {
    let (clock, mut backend) = loaded(StrategyKind::StreamingElement).await;
    let stopped = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&stopped);
    backend.add_stop_listener(move || *counter.lock() += 1);

    backend.play(false, 9.0);
    tick(&clock, &mut backend, 90);

    assert_eq!(backend.state(), PlaybackState::Stopped);
    assert_eq!(*stopped.lock(), 1);
}

#[tokio::test]
async fn test_fetch_failure_is_recorded_not_thrown() {
    let clock = VirtualClock::new();
    let ctx = LoadContext::new(Arc::new(HeadlessAudioPlatform::new(clock)));
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .times(1)
        .returning(|_| Err(BridgeError::OperationFailed("HTTP 503".to_string())));

    let mut backend = PlaybackBackend::new(URL, StrategyKind::NodeGraph);
    backend.play(true, 0.0);
    backend.load(&fetcher, &ctx).await;
    backend.load(&fetcher, &ctx).await;

    assert!(backend.is_errored());
    let err = backend.error().cloned().expect("error recorded");
    assert!(matches!(err, PlaybackError::FetchFailed { .. }));
    assert!(err.is_transient());
    assert!(!backend.has_media());
}

#[tokio::test]
async fn test_missing_asset_maps_to_not_found() {
    let clock = VirtualClock::new();
    let ctx = LoadContext::new(Arc::new(HeadlessAudioPlatform::new(clock)));
    let fetcher = MemoryAssetFetcher::new();

    let mut backend = PlaybackBackend::new("audio/se/Missing.ogg", StrategyKind::StreamingElement);
    backend.load(&fetcher, &ctx).await;

    assert!(matches!(backend.error(), Some(PlaybackError::AssetNotFound(_))));
}

#[tokio::test]
async fn test_encrypted_asset_is_decrypted_before_parsing() {
    let cipher = Arc::new(HeaderXorCipher::from_hex(KEY).unwrap());
    let clock = VirtualClock::new();
    let ctx = LoadContext::new(Arc::new(HeadlessAudioPlatform::new(clock)))
        .with_decryptor(Some(cipher.clone()));
    let plain = ogg_track(8.0, &["LOOPSTART=44100", "LOOPLENGTH=88200"]);
    let fetcher = MemoryAssetFetcher::new()
        .with_asset("audio/bgm/Secret.rpgmvo", cipher.encrypt_bytes(&plain));

    let mut backend = PlaybackBackend::new("audio/bgm/Secret.rpgmvo", StrategyKind::NodeGraph);
    backend.load(&fetcher, &ctx).await;

    assert!(backend.is_ready());
    assert_eq!(backend.metadata().loop_start_seconds(), 1.0);
    assert_eq!(backend.duration(), 8.0);
}

#[tokio::test]
async fn test_undecryptable_asset_errors() {
    let cipher = Arc::new(HeaderXorCipher::from_hex(KEY).unwrap());
    let clock = VirtualClock::new();
    let ctx = LoadContext::new(Arc::new(HeadlessAudioPlatform::new(clock)))
        .with_decryptor(Some(cipher));
    let fetcher = MemoryAssetFetcher::new()
        .with_asset("audio/bgm/Plain.rpgmvo", ogg_track(8.0, &[]));

    let mut backend = PlaybackBackend::new("audio/bgm/Plain.rpgmvo", StrategyKind::NodeGraph);
    backend.load(&fetcher, &ctx).await;

    assert!(matches!(backend.error(), Some(PlaybackError::Decryption(_))));
}

#[tokio::test]
async fn test_constrained_device_selects_streaming() {
    let clock = VirtualClock::new();
    let platform = HeadlessAudioPlatform::new(clock).with_capabilities(
        bridge_traits::PlatformCapabilities {
            constrained_device: true,
            supports_ogg: true,
        },
    );

    let backend = PlaybackBackend::for_platform(URL, &platform, Default::default());
    assert_eq!(backend.kind(), StrategyKind::StreamingElement);
}
