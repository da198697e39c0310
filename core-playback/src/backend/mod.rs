//! # Playback Backend
//!
//! One playable instance of one asset. A backend owns its media handle
//! exclusively and is owned by exactly one channel slot or preload-registry
//! entry at a time.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──begin_load──> Loading ──finish_load(Ok)──> Ready
//!                                  │                          │ play
//!                                  │ finish_load(Err)         ▼
//!                                  ▼                 Playing ⇄ Paused
//!                               Errored                       │ stop
//!                                                             ▼
//!                                                          Stopped
//! ```
//!
//! `Stopped` and `Errored` are terminal: the media handle is gone and a new
//! backend is required to play the asset again.
//!
//! ## Deferral
//!
//! Control calls made before the media handle exists (`play`, `pause`,
//! `replay`, fades) are queued as one-shot ready listeners and replayed in
//! call order once loading finishes. A backend stopped while its fetch is in
//! flight discards the eventual result.

mod node_graph;
mod streaming;
pub mod strategy;

pub use node_graph::NodeGraphStrategy;
pub use strategy::{PlaybackParams, PlaybackStrategy, StrategyKind, StrategySelection, TickOutcome};
pub use streaming::StreamingElementStrategy;

use bridge_traits::{AssetFetcher, AudioDecryptor, AudioPlatform};
use bytes::Bytes;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{PlaybackError, Result};
use crate::loop_metadata::{LoopMetadata, LoopMetadataReader};

/// Unique identifier of a backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId(Uuid);

impl BackendId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BackendId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Uninitialized,
    Loading,
    Ready,
    Playing,
    Paused,
    /// Terminal; resources released.
    Stopped,
    /// Terminal; loading failed.
    Errored,
}

impl PlaybackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Stopped | PlaybackState::Errored)
    }

    fn awaits_media(&self) -> bool {
        matches!(self, PlaybackState::Uninitialized | PlaybackState::Loading)
    }
}

/// Everything a backend needs to turn fetched bytes into a strategy.
#[derive(Clone)]
pub struct LoadContext {
    pub platform: Arc<dyn AudioPlatform>,
    pub decryptor: Option<Arc<dyn AudioDecryptor>>,
    pub reader: LoopMetadataReader,
    /// Fade-emulation ticks per second.
    pub tick_rate: u32,
}

impl LoadContext {
    pub fn new(platform: Arc<dyn AudioPlatform>) -> Self {
        Self {
            platform,
            decryptor: None,
            reader: LoopMetadataReader::default(),
            tick_rate: 60,
        }
    }

    pub fn with_decryptor(mut self, decryptor: Option<Arc<dyn AudioDecryptor>>) -> Self {
        self.decryptor = decryptor;
        self
    }

    pub fn with_reader(mut self, reader: LoopMetadataReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_rate = tick_rate.max(1);
        self
    }

    fn decrypt(&self, data: Bytes) -> Result<Bytes> {
        match &self.decryptor {
            Some(decryptor) if decryptor.has_encrypted_audio() => decryptor
                .decrypt(data)
                .map_err(|e| PlaybackError::Decryption(e.to_string())),
            _ => Ok(data),
        }
    }
}

type ReadyListener = Box<dyn FnOnce(&mut PlaybackBackend) + Send>;
type StopListener = Box<dyn FnOnce() + Send>;
type LoopHook = Box<dyn FnMut() + Send>;

/// A single logical audio source.
pub struct PlaybackBackend {
    id: BackendId,
    url: String,
    kind: StrategyKind,
    state: PlaybackState,
    strategy: Option<Box<dyn PlaybackStrategy>>,
    metadata: LoopMetadata,
    params: PlaybackParams,
    looping: bool,
    started: bool,
    persistent: bool,
    error: Option<PlaybackError>,
    ready_listeners: VecDeque<ReadyListener>,
    stop_listeners: Vec<StopListener>,
    on_loop: Option<LoopHook>,
}

impl fmt::Debug for PlaybackBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackBackend")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("params", &self.params)
            .field("looping", &self.looping)
            .field("error", &self.error)
            .finish()
    }
}

impl PlaybackBackend {
    /// New backend for `url` that will play through `kind`.
    pub fn new(url: impl Into<String>, kind: StrategyKind) -> Self {
        Self {
            id: BackendId::new(),
            url: url.into(),
            kind,
            state: PlaybackState::Uninitialized,
            strategy: None,
            metadata: LoopMetadata::default(),
            params: PlaybackParams::default(),
            looping: false,
            started: false,
            persistent: false,
            error: None,
            ready_listeners: VecDeque::new(),
            stop_listeners: Vec::new(),
            on_loop: None,
        }
    }

    /// New backend with its strategy chosen from `platform` capabilities.
    pub fn for_platform(
        url: impl Into<String>,
        platform: &dyn AudioPlatform,
        selection: StrategySelection,
    ) -> Self {
        Self::new(url, StrategyKind::select(platform, selection))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> BackendId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Error recorded by a failed load.
    pub fn error(&self) -> Option<&PlaybackError> {
        self.error.as_ref()
    }

    pub fn metadata(&self) -> &LoopMetadata {
        &self.metadata
    }

    pub fn params(&self) -> PlaybackParams {
        self.params
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether the media handle exists.
    pub fn has_media(&self) -> bool {
        self.strategy.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.has_media() && !self.state.is_terminal()
    }

    pub fn is_loading(&self) -> bool {
        self.state.awaits_media()
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_errored(&self) -> bool {
        self.state == PlaybackState::Errored
    }

    /// Not torn down: loading, ready, playing or paused.
    pub fn is_alive(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Whether `play` was ever requested, including deferred requests.
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn is_fading(&self) -> bool {
        self.strategy.as_ref().map(|s| s.is_fading()).unwrap_or(false)
    }

    /// Gain currently reaching the output, 0 without media.
    pub fn output_gain(&self) -> f64 {
        self.strategy.as_ref().map(|s| s.output_gain()).unwrap_or(0.0)
    }

    /// Media duration in seconds, 0 without media.
    pub fn duration(&self) -> f64 {
        self.strategy.as_ref().map(|s| s.duration()).unwrap_or(0.0)
    }

    /// Elapsed playback position in the current source, in seconds.
    ///
    /// Both strategies report the same thing: the position inside the media,
    /// wrapped into the loop window while looping.
    pub fn seek(&self) -> f64 {
        self.strategy.as_ref().map(|s| s.position()).unwrap_or(0.0)
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Run `listener` once the media handle exists.
    ///
    /// Runs immediately when the backend is already ready; dropped when the
    /// backend is terminal.
    pub fn add_ready_listener<F>(&mut self, listener: F)
    where
        F: FnOnce(&mut PlaybackBackend) + Send + 'static,
    {
        if self.state.awaits_media() {
            self.ready_listeners.push_back(Box::new(listener));
        } else if self.is_ready() {
            listener(self);
        }
    }

    /// Run `listener` once when the backend stops, fails, or (when
    /// persistent) reaches its natural end.
    ///
    /// A listener added to a terminal backend runs immediately.
    pub fn add_stop_listener<F>(&mut self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.state.is_terminal() {
            listener();
        } else {
            self.stop_listeners.push(Box::new(listener));
        }
    }

    /// Hook invoked every time playback wraps to the loop start.
    pub fn set_on_loop<F>(&mut self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_loop = Some(Box::new(hook));
    }

    /// A persistent backend rewinds and stays loaded at its natural end
    /// instead of tearing down.
    pub fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    fn fire_stop_listeners(&mut self) {
        for listener in self.stop_listeners.drain(..) {
            listener();
        }
    }

    fn defer<F>(&mut self, op: F)
    where
        F: FnOnce(&mut PlaybackBackend) + Send + 'static,
    {
        self.ready_listeners.push_back(Box::new(op));
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Move to `Loading` and return the URL to fetch.
    ///
    /// Returns `None` unless the backend is `Uninitialized`.
    pub fn begin_load(&mut self) -> Option<String> {
        if self.state != PlaybackState::Uninitialized {
            return None;
        }
        self.state = PlaybackState::Loading;
        debug!(backend = %self.id, url = %self.url, "Loading audio");
        Some(self.url.clone())
    }

    /// Deliver the fetch result for this backend.
    ///
    /// Ignored unless the backend is still `Loading`. Success builds the
    /// strategy and drains ready listeners in FIFO order. Failure records the
    /// error, drops pending ready listeners and fires stop listeners once.
    pub fn finish_load(&mut self, result: Result<Bytes>, ctx: &LoadContext) {
        if self.state != PlaybackState::Loading {
            debug!(
                backend = %self.id,
                state = ?self.state,
                "Discarding load result for backend that is no longer loading"
            );
            return;
        }

        match result.and_then(|data| self.build_strategy(data, ctx)) {
            Ok(strategy) => {
                debug!(
                    backend = %self.id,
                    kind = ?strategy.kind(),
                    duration = strategy.duration(),
                    loop_start = self.metadata.loop_start_seconds(),
                    loop_length = self.metadata.loop_length_seconds(),
                    "Audio ready"
                );
                self.kind = strategy.kind();
                self.strategy = Some(strategy);
                self.state = PlaybackState::Ready;
                while let Some(listener) = self.ready_listeners.pop_front() {
                    listener(self);
                }
            }
            Err(e) => self.fail(e),
        }
    }

    /// Fetch and load the asset.
    ///
    /// Never fails: errors are recorded on the backend.
    #[instrument(skip_all, fields(backend = %self.id, url = %self.url))]
    pub async fn load(&mut self, fetcher: &dyn AssetFetcher, ctx: &LoadContext) {
        let Some(url) = self.begin_load() else {
            return;
        };
        let result = fetcher
            .fetch(&url)
            .await
            .map_err(|e| PlaybackError::from_fetch(&url, e));
        self.finish_load(result, ctx);
    }

    fn build_strategy(&mut self, data: Bytes, ctx: &LoadContext) -> Result<Box<dyn PlaybackStrategy>> {
        let data = ctx.decrypt(data)?;
        self.metadata = ctx.reader.read(&data);
        let hint = self.metadata.decode_hint();

        if self.kind == StrategyKind::NodeGraph {
            if let Some(graph) = ctx.platform.audio_graph() {
                let buffer = graph.decode(data, hint)?;
                let window = self.metadata.window(buffer.duration());
                return Ok(Box::new(NodeGraphStrategy::new(graph, buffer, window)));
            }
            debug!(backend = %self.id, "No audio graph available, falling back to streaming");
        }

        let element = ctx.platform.create_media_element(data, hint)?;
        let window = self.metadata.window(element.duration());
        Ok(Box::new(StreamingElementStrategy::new(
            element,
            window,
            ctx.tick_rate,
        )))
    }

    fn fail(&mut self, err: PlaybackError) {
        warn!(backend = %self.id, url = %self.url, error = %err, "Failed to load audio");
        self.state = PlaybackState::Errored;
        self.error = Some(err);
        self.ready_listeners.clear();
        self.fire_stop_listeners();
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Start playback from `offset` seconds.
    pub fn play(&mut self, looping: bool, offset: f64) {
        self.started = true;
        if self.state.awaits_media() {
            self.defer(move |b| b.play(looping, offset));
            return;
        }
        let Some(strategy) = self.strategy.as_mut() else {
            warn!(backend = %self.id, state = ?self.state, "play() on a backend without media");
            return;
        };
        strategy.start(looping, offset, self.params);
        self.looping = looping;
        self.state = PlaybackState::Playing;
    }

    /// Pause, keeping the media handle for a later [`replay`](Self::replay).
    pub fn pause(&mut self) {
        if self.state.awaits_media() {
            self.defer(|b| b.pause());
            return;
        }
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.pause();
            self.state = PlaybackState::Paused;
        }
    }

    /// Resume from the paused position.
    ///
    /// Needs the media handle: after [`stop`](Self::stop) this only logs a
    /// warning.
    pub fn replay(&mut self) {
        if self.state.awaits_media() {
            self.defer(|b| b.replay());
            return;
        }
        let Some(strategy) = self.strategy.as_mut() else {
            warn!(
                backend = %self.id,
                state = ?self.state,
                "replay() after stop has no media to resume; call pause() instead of stop()"
            );
            return;
        };
        match self.state {
            PlaybackState::Paused => strategy.resume(self.params),
            PlaybackState::Ready => strategy.start(self.looping, 0.0, self.params),
            _ => return,
        }
        self.started = true;
        self.state = PlaybackState::Playing;
    }

    /// Halt playback and release every resource. Terminal.
    pub fn stop(&mut self) {
        if let Some(mut strategy) = self.strategy.take() {
            strategy.stop();
        }
        self.ready_listeners.clear();
        if self.state != PlaybackState::Errored {
            self.state = PlaybackState::Stopped;
        }
        self.fire_stop_listeners();
    }

    /// Move the playback position.
    pub fn set_time(&mut self, seconds: f64) {
        match self.strategy.as_mut() {
            Some(strategy) => strategy.set_position(seconds),
            None => warn!(
                backend = %self.id,
                state = ?self.state,
                "set_time() on a backend without media"
            ),
        }
    }

    /// Update gain, pitch and pan on the live output.
    pub fn set_params(&mut self, params: PlaybackParams) {
        self.params = params;
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.apply_params(params);
        }
    }

    /// Ramp from silence to the current gain over `duration` seconds.
    pub fn fade_in(&mut self, duration: f64) {
        if self.state.awaits_media() {
            self.defer(move |b| b.fade_in(duration));
            return;
        }
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.fade_in(duration, self.params);
        }
    }

    /// Ramp to silence over `duration` seconds.
    pub fn fade_out(&mut self, duration: f64) {
        if self.state.awaits_media() {
            self.defer(move |b| b.fade_out(duration));
            return;
        }
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.fade_out(duration);
        }
    }

    /// Per-frame poll: advances fades and detects loop wraps and natural end.
    pub fn update(&mut self) -> TickOutcome {
        let Some(strategy) = self.strategy.as_mut() else {
            return TickOutcome::Continue;
        };
        let outcome = strategy.tick();
        if self.state != PlaybackState::Playing {
            return TickOutcome::Continue;
        }

        match outcome {
            TickOutcome::Continue => {}
            TickOutcome::Looped => {
                if let Some(hook) = self.on_loop.as_mut() {
                    hook();
                }
            }
            TickOutcome::Ended if self.persistent => {
                strategy.pause();
                strategy.set_position(0.0);
                self.state = PlaybackState::Ready;
                self.fire_stop_listeners();
            }
            TickOutcome::Ended => {
                debug!(backend = %self.id, "Playback reached natural end");
                self.stop();
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::{HeadlessAudioPlatform, VirtualClock};
    use parking_lot::Mutex;

    fn ctx(platform: Arc<HeadlessAudioPlatform>) -> LoadContext {
        LoadContext::new(platform)
    }

    fn loaded(kind: StrategyKind, platform: &Arc<HeadlessAudioPlatform>) -> PlaybackBackend {
        let mut backend = PlaybackBackend::new("audio/bgm/Theme.ogg", kind);
        backend.begin_load();
        backend.finish_load(Ok(Bytes::from_static(b"pcm")), &ctx(Arc::clone(platform)));
        backend
    }

    #[test]
    fn test_deferred_calls_run_in_order_after_load() {
        let platform = Arc::new(HeadlessAudioPlatform::new(VirtualClock::new()));
        let mut backend = PlaybackBackend::new("audio/bgm/Theme.ogg", StrategyKind::NodeGraph);
        let order = Arc::new(Mutex::new(Vec::new()));

        backend.begin_load();
        backend.play(true, 0.0);
        let seen = Arc::clone(&order);
        backend.add_ready_listener(move |b| seen.lock().push(b.state()));
        backend.pause();
        assert_eq!(backend.state(), PlaybackState::Loading);

        backend.finish_load(Ok(Bytes::from_static(b"pcm")), &ctx(platform));
        assert_eq!(*order.lock(), vec![PlaybackState::Playing]);
        assert_eq!(backend.state(), PlaybackState::Paused);
        assert!(backend.has_started());
    }

    #[test]
    fn test_stop_fires_listeners_once_and_releases_media() {
        let platform = Arc::new(HeadlessAudioPlatform::new(VirtualClock::new()));
        let mut backend = loaded(StrategyKind::NodeGraph, &platform);
        let fired = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&fired);
        backend.add_stop_listener(move || *counter.lock() += 1);

        backend.play(false, 0.0);
        backend.stop();
        backend.stop();

        assert_eq!(*fired.lock(), 1);
        assert_eq!(backend.state(), PlaybackState::Stopped);
        assert!(!backend.has_media());
        assert_eq!(backend.seek(), 0.0);
    }

    #[test]
    fn test_replay_after_stop_is_noop() {
        let platform = Arc::new(HeadlessAudioPlatform::new(VirtualClock::new()));
        let mut backend = loaded(StrategyKind::StreamingElement, &platform);
        backend.play(true, 0.0);
        backend.stop();

        backend.replay();
        backend.set_time(3.0);

        assert_eq!(backend.state(), PlaybackState::Stopped);
        assert!(!backend.has_media());
    }

    #[test]
    fn test_result_after_stop_is_discarded() {
        let platform = Arc::new(HeadlessAudioPlatform::new(VirtualClock::new()));
        let mut backend = PlaybackBackend::new("audio/se/Cursor.ogg", StrategyKind::NodeGraph);
        backend.begin_load();
        backend.play(false, 0.0);
        backend.stop();

        backend.finish_load(Ok(Bytes::from_static(b"pcm")), &ctx(Arc::clone(&platform)));

        assert_eq!(backend.state(), PlaybackState::Stopped);
        assert_eq!(platform.chains_created(), 0);
    }

    #[test]
    fn test_failed_load_is_errored_and_fires_stop_listeners() {
        let platform = Arc::new(HeadlessAudioPlatform::new(VirtualClock::new()));
        let mut backend = PlaybackBackend::new("audio/me/Fanfare.ogg", StrategyKind::NodeGraph);
        let fired = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&fired);
        backend.add_stop_listener(move || *flag.lock() = true);
        backend.begin_load();
        backend.play(false, 0.0);

        backend.finish_load(
            Err(PlaybackError::AssetNotFound("audio/me/Fanfare.ogg".into())),
            &ctx(platform),
        );

        assert!(backend.is_errored());
        assert!(matches!(backend.error(), Some(PlaybackError::AssetNotFound(_))));
        assert!(*fired.lock());
        assert!(!backend.is_ready());
    }

    #[test]
    fn test_node_graph_falls_back_without_graph() {
        let platform = Arc::new(HeadlessAudioPlatform::streaming_only(VirtualClock::new()));
        let backend = loaded(StrategyKind::NodeGraph, &platform);
        assert_eq!(backend.kind(), StrategyKind::StreamingElement);
        assert!(backend.is_ready());
    }

    #[test]
    fn test_seek_reports_media_position_for_both_strategies() {
        for kind in [StrategyKind::NodeGraph, StrategyKind::StreamingElement] {
            let clock = VirtualClock::new();
            let platform = Arc::new(HeadlessAudioPlatform::new(clock.clone()));
            let mut backend = loaded(kind, &platform);
            clock.advance(100.0);
            backend.play(false, 2.0);
            clock.advance(1.5);
            assert!((backend.seek() - 3.5).abs() < 1e-6, "{kind:?}: {}", backend.seek());
        }
    }

    #[test]
    fn test_natural_end_stops_backend() {
        let clock = VirtualClock::new();
        let platform = Arc::new(HeadlessAudioPlatform::new(clock.clone()));
        let mut backend = loaded(StrategyKind::NodeGraph, &platform);
        backend.play(false, 0.0);

        clock.advance(backend.duration() + 0.1);
        assert_eq!(backend.update(), TickOutcome::Ended);
        assert_eq!(backend.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_persistent_backend_rewinds_at_end() {
        let clock = VirtualClock::new();
        let platform = Arc::new(HeadlessAudioPlatform::new(clock.clone()));
        let mut backend = loaded(StrategyKind::StreamingElement, &platform);
        backend.set_persistent(true);
        backend.play(false, 0.0);

        clock.advance(backend.duration() + 0.1);
        assert_eq!(backend.update(), TickOutcome::Ended);
        assert_eq!(backend.state(), PlaybackState::Ready);
        assert!(backend.has_media());
        assert_eq!(backend.seek(), 0.0);
    }
}
