//! # Audio Channel Manager
//!
//! Public controller owning every playing backend, one slot per channel:
//!
//! | Channel            | Holds                                  | Notes |
//! |--------------------|----------------------------------------|-------|
//! | Music              | at most one backend + current clip     | suspended by jingles |
//! | Ambient            | at most one backend + current clip     | |
//! | Jingle             | at most one backend                    | plays once, then resumes Music |
//! | One-shot effects   | any number of fire-and-forget backends | pruned before each spawn |
//! | Persistent effects | backends loaded once per session       | never evicted |
//!
//! ## Driving the manager
//!
//! The manager never blocks and never spawns. The host:
//!
//! 1. calls control methods (`play_music`, `play_jingle`, ...) from its frame
//!    loop,
//! 2. pumps queued asset fetches with [`flush_loads`](AudioChannelManager::flush_loads)
//!    (or fetches them itself and hands results to
//!    [`complete_load`](AudioChannelManager::complete_load)),
//! 3. calls [`update`](AudioChannelManager::update) once per frame at
//!    `tick_rate` to advance fades and detect loop wraps and natural ends.
//!
//! Control calls made while an asset is still loading are deferred inside the
//! backend and replayed in order once it is ready.

use bridge_traits::AssetFetcher;
use bytes::Bytes;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AudioEvent, CoreEvent, EventBus};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::backend::{
    BackendId, LoadContext, PlaybackBackend, PlaybackParams, PlaybackState, StrategySelection,
    TickOutcome,
};
use crate::clip::{AudioCategory, AudioClip, AudioSnapshot, Channel};
use crate::commands::AudioCommand;
use crate::config::AudioSettings;
use crate::error::{PlaybackError, Result};
use crate::loop_metadata::LoopMetadataReader;
use crate::registry::PreloadRegistry;

/// Notifications raised from backend listeners, processed on the next
/// [`AudioChannelManager::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelSignal {
    JingleEnded(BackendId),
}

type SignalQueue = Arc<Mutex<VecDeque<ChannelSignal>>>;

#[derive(Debug, Default)]
struct ChannelSlot {
    backend: Option<PlaybackBackend>,
    current: Option<AudioClip>,
    /// Position to start from when playback begins late (after a jingle).
    offset: f64,
}

impl ChannelSlot {
    /// Whether `clip` is the clip this slot is playing.
    fn is_current(&self, clip: &AudioClip) -> bool {
        self.backend.is_some() && self.current.as_ref().is_some_and(|c| c.same_asset(clip))
    }

    fn backend_id(&self) -> Option<BackendId> {
        self.backend.as_ref().map(|b| b.id())
    }
}

#[derive(Debug)]
struct PooledBackend {
    clip: AudioClip,
    backend: PlaybackBackend,
}

/// Controller for every audio channel.
pub struct AudioChannelManager {
    fetcher: Arc<dyn AssetFetcher>,
    ctx: LoadContext,
    settings: AudioSettings,
    event_bus: Option<EventBus>,
    supports_ogg: bool,
    music: ChannelSlot,
    ambient: ChannelSlot,
    jingle: ChannelSlot,
    one_shots: Vec<PooledBackend>,
    persistent: Vec<PooledBackend>,
    /// Outgoing crossfade backends, stopped once their fade completes.
    fade_tails: Vec<PlaybackBackend>,
    registry: PreloadRegistry,
    pending_loads: VecDeque<(BackendId, String)>,
    signals: SignalQueue,
}

impl std::fmt::Debug for AudioChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChannelManager")
            .field("settings", &self.settings)
            .field("music", &self.music)
            .field("ambient", &self.ambient)
            .field("jingle", &self.jingle)
            .field("one_shots", &self.one_shots.len())
            .field("persistent", &self.persistent.len())
            .field("fade_tails", &self.fade_tails.len())
            .field("pending_loads", &self.pending_loads.len())
            .finish()
    }
}

impl AudioChannelManager {
    /// Build a manager from the core configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidSettings`] if `settings` fail validation.
    pub fn new(config: &CoreConfig, settings: AudioSettings) -> Result<Self> {
        settings.validate().map_err(PlaybackError::InvalidSettings)?;

        let ctx = LoadContext::new(Arc::clone(&config.audio_platform))
            .with_decryptor(config.decryptor.clone())
            .with_reader(LoopMetadataReader::new(settings.loop_start_ceiling))
            .with_tick_rate(settings.tick_rate);
        let supports_ogg = config.audio_platform.capabilities().supports_ogg;

        debug!(
            force_streaming = settings.force_streaming_backend,
            legacy_static_effects = settings.legacy_static_effect_mode,
            supports_ogg,
            encrypted = config.has_encrypted_audio(),
            "Audio channel manager created"
        );

        Ok(Self {
            fetcher: Arc::clone(&config.asset_fetcher),
            ctx,
            settings,
            event_bus: config.event_bus.clone(),
            supports_ogg,
            music: ChannelSlot::default(),
            ambient: ChannelSlot::default(),
            jingle: ChannelSlot::default(),
            one_shots: Vec::new(),
            persistent: Vec::new(),
            fade_tails: Vec::new(),
            registry: PreloadRegistry::new(),
            pending_loads: VecDeque::new(),
            signals: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    pub fn music_backend(&self) -> Option<&PlaybackBackend> {
        self.music.backend.as_ref()
    }

    pub fn ambient_backend(&self) -> Option<&PlaybackBackend> {
        self.ambient.backend.as_ref()
    }

    pub fn jingle_backend(&self) -> Option<&PlaybackBackend> {
        self.jingle.backend.as_ref()
    }

    pub fn current_music(&self) -> Option<&AudioClip> {
        self.music.current.as_ref()
    }

    pub fn current_ambient(&self) -> Option<&AudioClip> {
        self.ambient.current.as_ref()
    }

    pub fn one_shot_count(&self) -> usize {
        self.one_shots.len()
    }

    pub fn one_shots(&self) -> impl Iterator<Item = &PlaybackBackend> {
        self.one_shots.iter().map(|p| &p.backend)
    }

    pub fn persistent_count(&self) -> usize {
        self.persistent.len()
    }

    pub fn persistent_backend(&self, name: &str) -> Option<&PlaybackBackend> {
        self.persistent
            .iter()
            .find(|p| p.clip.name == name)
            .map(|p| &p.backend)
    }

    pub fn fade_tail_count(&self) -> usize {
        self.fade_tails.len()
    }

    pub fn registry(&self) -> &PreloadRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PreloadRegistry {
        &mut self.registry
    }

    /// Whether a jingle is playing or about to.
    pub fn is_jingle_active(&self) -> bool {
        self.jingle.backend.as_ref().is_some_and(|b| b.is_alive())
    }

    // ========================================================================
    // Asset URLs and backend construction
    // ========================================================================

    /// URL of `name` in `category`, rewritten for encrypted assets.
    pub fn asset_url(&self, category: AudioCategory, name: &str) -> String {
        let ext = if self.supports_ogg { ".ogg" } else { ".m4a" };
        let url = format!(
            "{}{}/{}{}",
            self.settings.audio_root,
            category.folder(),
            urlencoding::encode(name),
            ext
        );
        match &self.ctx.decryptor {
            Some(decryptor) if decryptor.has_encrypted_audio() => decryptor.encrypted_url(&url),
            _ => url,
        }
    }

    fn params_for(&self, channel: Channel, clip: &AudioClip) -> PlaybackParams {
        PlaybackParams::for_clip(clip, self.settings.master_volumes.get(channel))
    }

    fn create_backend(&mut self, channel: Channel, clip: &AudioClip) -> PlaybackBackend {
        let url = self.asset_url(channel.category(), &clip.name);
        let selection = StrategySelection {
            force_streaming: self.settings.force_streaming_backend,
            prefer_node_graph: channel == Channel::PersistentEffect
                && self.settings.legacy_static_effect_mode,
        };
        let mut backend = PlaybackBackend::for_platform(url, self.ctx.platform.as_ref(), selection);
        backend.set_params(self.params_for(channel, clip));

        if let Some(bus) = self.event_bus.clone() {
            let name = clip.name.clone();
            backend.set_on_loop(move || {
                bus.emit(CoreEvent::Audio(AudioEvent::Looped {
                    channel: channel.as_str().to_string(),
                    clip: name.clone(),
                }))
                .ok();
            });
        }

        if let Some(url) = backend.begin_load() {
            self.pending_loads.push_back((backend.id(), url));
        }
        backend
    }

    /// A preloaded backend for `clip` if one is alive, otherwise a new one.
    fn obtain_backend(&mut self, channel: Channel, clip: &AudioClip) -> PlaybackBackend {
        match self.registry.claim(channel.category(), &clip.name) {
            Some(entry) => {
                debug!(channel = %channel, clip = %clip.name, "Using preloaded backend");
                let mut backend = entry.backend;
                backend.set_params(self.params_for(channel, clip));
                backend
            }
            None => self.create_backend(channel, clip),
        }
    }

    // ========================================================================
    // Music
    // ========================================================================

    /// Play `clip` on the music channel from `offset` seconds.
    ///
    /// The same clip name only updates volume, pitch and pan. A different
    /// clip stops the previous backend first. While a jingle is active the
    /// new backend loads but stays silent until the jingle ends.
    pub fn play_music(&mut self, clip: AudioClip, offset: f64) {
        if self.music.is_current(&clip) {
            self.update_slot_params(Channel::Music, &clip);
            return;
        }
        self.stop_music();
        if clip.is_empty() {
            return;
        }

        let mut backend = self.obtain_backend(Channel::Music, &clip);
        if !self.is_jingle_active() {
            backend.play(true, offset);
            self.emit(AudioEvent::Started {
                channel: Channel::Music.as_str().to_string(),
                clip: clip.name.clone(),
            });
        }
        self.log_transition(Channel::Music, "play", &clip.name);
        self.music = ChannelSlot {
            backend: Some(backend),
            current: Some(clip),
            offset,
        };
    }

    /// Play from a saved snapshot, fading in.
    pub fn replay_music(&mut self, snapshot: &AudioSnapshot) {
        self.replay_slot(Channel::Music, snapshot);
    }

    /// Snapshot of the current music for a save file.
    pub fn save_music(&self) -> AudioSnapshot {
        save_slot(&self.music)
    }

    /// Restore music saved with [`save_music`](Self::save_music).
    pub fn restore_music(&mut self, snapshot: &AudioSnapshot) {
        if snapshot.is_empty() {
            self.stop_music();
        } else {
            self.replay_music(snapshot);
        }
    }

    pub fn stop_music(&mut self) {
        self.stop_slot(Channel::Music);
    }

    pub fn pause_music(&mut self) {
        self.pause_slot(Channel::Music);
    }

    pub fn resume_music(&mut self) {
        self.resume_slot(Channel::Music);
    }

    /// Fade the music out. The current clip is forgotten, so playing the same
    /// name again restarts it.
    pub fn fade_out_music(&mut self, duration: f64) {
        self.fade_out_slot(Channel::Music, duration);
    }

    pub fn fade_in_music(&mut self, duration: f64) {
        self.fade_in_slot(Channel::Music, duration);
    }

    /// Switch music to `clip`, fading the old track out and the new one in
    /// over `duration` seconds.
    pub fn crossfade_music(&mut self, clip: AudioClip, duration: f64) {
        if self.music.is_current(&clip) {
            self.update_slot_params(Channel::Music, &clip);
            return;
        }

        if let Some(mut old) = self.music.backend.take() {
            if old.is_ready() {
                old.fade_out(duration);
                self.fade_tails.push(old);
            } else {
                old.stop();
            }
        }
        self.music.current = None;
        if clip.is_empty() {
            return;
        }

        let mut backend = self.obtain_backend(Channel::Music, &clip);
        if !self.is_jingle_active() {
            backend.play(true, 0.0);
            backend.fade_in(duration);
            self.emit(AudioEvent::Started {
                channel: Channel::Music.as_str().to_string(),
                clip: clip.name.clone(),
            });
        }
        self.log_transition(Channel::Music, "crossfade", &clip.name);
        self.music = ChannelSlot {
            backend: Some(backend),
            current: Some(clip),
            offset: 0.0,
        };
    }

    // ========================================================================
    // Ambient
    // ========================================================================

    /// Play `clip` on the ambient channel. Same rules as
    /// [`play_music`](Self::play_music), but jingles do not interrupt it.
    pub fn play_ambient(&mut self, clip: AudioClip, offset: f64) {
        if self.ambient.is_current(&clip) {
            self.update_slot_params(Channel::Ambient, &clip);
            return;
        }
        self.stop_ambient();
        if clip.is_empty() {
            return;
        }

        let mut backend = self.obtain_backend(Channel::Ambient, &clip);
        backend.play(true, offset);
        self.emit(AudioEvent::Started {
            channel: Channel::Ambient.as_str().to_string(),
            clip: clip.name.clone(),
        });
        self.log_transition(Channel::Ambient, "play", &clip.name);
        self.ambient = ChannelSlot {
            backend: Some(backend),
            current: Some(clip),
            offset,
        };
    }

    pub fn replay_ambient(&mut self, snapshot: &AudioSnapshot) {
        self.replay_slot(Channel::Ambient, snapshot);
    }

    pub fn save_ambient(&self) -> AudioSnapshot {
        save_slot(&self.ambient)
    }

    pub fn restore_ambient(&mut self, snapshot: &AudioSnapshot) {
        if snapshot.is_empty() {
            self.stop_ambient();
        } else {
            self.replay_ambient(snapshot);
        }
    }

    pub fn stop_ambient(&mut self) {
        self.stop_slot(Channel::Ambient);
    }

    pub fn pause_ambient(&mut self) {
        self.pause_slot(Channel::Ambient);
    }

    pub fn resume_ambient(&mut self) {
        self.resume_slot(Channel::Ambient);
    }

    pub fn fade_out_ambient(&mut self, duration: f64) {
        self.fade_out_slot(Channel::Ambient, duration);
    }

    pub fn fade_in_ambient(&mut self, duration: f64) {
        self.fade_in_slot(Channel::Ambient, duration);
    }

    // ========================================================================
    // Jingle
    // ========================================================================

    /// Play `clip` once on the jingle channel.
    ///
    /// Music is paused, not stopped, and resumes with a fade-in when the
    /// jingle ends, fails to load, or is stopped.
    pub fn play_jingle(&mut self, clip: AudioClip) {
        if let Some(mut previous) = self.jingle.backend.take() {
            previous.stop();
        }
        self.jingle.current = None;
        if clip.is_empty() {
            return;
        }

        if let Some(music) = self.music.backend.as_mut() {
            if music.is_alive() {
                if music.has_started() {
                    self.music.offset = music.seek();
                }
                music.pause();
                let position_ms = (self.music.offset * 1000.0) as u64;
                if let Some(current) = self.music.current.clone() {
                    self.emit(AudioEvent::Paused {
                        channel: Channel::Music.as_str().to_string(),
                        clip: current.name,
                        position_ms,
                    });
                }
            }
        }

        let mut backend = self.obtain_backend(Channel::Jingle, &clip);
        let signals = Arc::clone(&self.signals);
        let id = backend.id();
        backend.add_stop_listener(move || {
            signals.lock().push_back(ChannelSignal::JingleEnded(id));
        });
        backend.play(false, 0.0);

        self.emit(AudioEvent::Started {
            channel: Channel::Jingle.as_str().to_string(),
            clip: clip.name.clone(),
        });
        self.log_transition(Channel::Jingle, "play", &clip.name);
        self.jingle = ChannelSlot {
            backend: Some(backend),
            current: Some(clip),
            offset: 0.0,
        };
    }

    /// Stop the jingle and resume music.
    pub fn stop_jingle(&mut self) {
        let Some(mut backend) = self.jingle.backend.take() else {
            return;
        };
        backend.stop();
        if let Some(clip) = self.jingle.current.take() {
            self.emit(AudioEvent::Stopped {
                channel: Channel::Jingle.as_str().to_string(),
                clip: clip.name,
            });
        }
        self.resume_after_jingle();
    }

    pub fn fade_out_jingle(&mut self, duration: f64) {
        if let Some(backend) = self.jingle.backend.as_mut() {
            backend.fade_out(duration);
        }
    }

    fn finish_jingle(&mut self, id: BackendId) {
        if self.jingle.backend_id() != Some(id) {
            return;
        }
        self.jingle.backend = None;
        let clip = self.jingle.current.take().map(|c| c.name).unwrap_or_default();
        self.log_transition(Channel::Jingle, "finished", &clip);
        self.resume_after_jingle();
        self.emit(AudioEvent::JingleFinished { clip });
    }

    fn resume_after_jingle(&mut self) {
        let fade = self.settings.replay_fade_time;
        let Some(current) = self.music.current.clone() else {
            return;
        };
        let Some(music) = self.music.backend.as_mut() else {
            return;
        };
        if !music.is_alive() || music.is_playing() {
            return;
        }

        if music.has_started() {
            music.replay();
        } else {
            music.play(true, self.music.offset);
        }
        music.fade_in(fade);
        let position_ms = (music.seek() * 1000.0) as u64;
        self.emit(AudioEvent::Resumed {
            channel: Channel::Music.as_str().to_string(),
            clip: current.name,
            position_ms,
        });
    }

    // ========================================================================
    // Effects
    // ========================================================================

    /// Fire-and-forget effect. Finished effects are pruned first.
    pub fn play_one_shot(&mut self, clip: AudioClip) {
        if clip.is_empty() {
            return;
        }
        let before = self.one_shots.len();
        self.one_shots.retain(|p| p.backend.is_alive());
        let pruned = before - self.one_shots.len();
        if pruned > 0 {
            self.log_transition(Channel::OneShotEffect, "prune", &pruned.to_string());
        }

        let mut backend = self.obtain_backend(Channel::OneShotEffect, &clip);
        backend.play(false, 0.0);
        self.log_transition(Channel::OneShotEffect, "play", &clip.name);
        self.one_shots.push(PooledBackend { clip, backend });
    }

    pub fn stop_one_shots(&mut self) {
        for pooled in self.one_shots.iter_mut() {
            pooled.backend.stop();
        }
        self.one_shots.clear();
    }

    /// Load `clip` into the persistent pool unless it is already there.
    pub fn load_persistent(&mut self, clip: &AudioClip) {
        if clip.is_empty() || self.persistent.iter().any(|p| p.clip.same_asset(clip)) {
            return;
        }
        let mut backend = self.create_backend(Channel::PersistentEffect, clip);
        backend.set_persistent(true);
        self.log_transition(Channel::PersistentEffect, "load", &clip.name);
        self.persistent.push(PooledBackend {
            clip: clip.clone(),
            backend,
        });
    }

    /// Play an effect from the persistent pool, loading it on first use.
    pub fn play_persistent(&mut self, clip: AudioClip) {
        self.load_persistent(&clip);
        let params = self.params_for(Channel::PersistentEffect, &clip);
        for pooled in self
            .persistent
            .iter_mut()
            .filter(|p| p.clip.same_asset(&clip))
        {
            pooled.backend.set_params(params);
            pooled.backend.play(false, 0.0);
        }
    }

    /// Stop every channel except the persistent pool.
    pub fn stop_all(&mut self) {
        self.stop_music();
        self.stop_ambient();
        if let Some(mut jingle) = self.jingle.backend.take() {
            jingle.stop();
        }
        self.jingle.current = None;
        self.stop_one_shots();
        for mut tail in self.fade_tails.drain(..) {
            tail.stop();
        }
    }

    // ========================================================================
    // Volume, preload, commands
    // ========================================================================

    /// Change a channel's master volume and apply it to live backends.
    pub fn set_master_volume(&mut self, channel: Channel, volume: u8) {
        self.settings.master_volumes.set(channel, volume);
        let master = self.settings.master_volumes.get(channel);
        match channel {
            Channel::Music | Channel::Ambient | Channel::Jingle => {
                let slot = self.slot_mut(channel);
                if let (Some(backend), Some(clip)) = (slot.backend.as_mut(), slot.current.as_ref()) {
                    backend.set_params(PlaybackParams::for_clip(clip, master));
                }
            }
            Channel::OneShotEffect | Channel::PersistentEffect => {
                for pooled in self.one_shots.iter_mut().chain(self.persistent.iter_mut()) {
                    pooled
                        .backend
                        .set_params(PlaybackParams::for_clip(&pooled.clip, master));
                }
            }
        }
    }

    /// Start fetching `clip` so a later play starts without a fetch.
    pub fn preload(&mut self, category: AudioCategory, clip: AudioClip) -> BackendId {
        let backend = self.create_backend(category.channel(), &clip);
        self.registry.preload(category, clip, backend)
    }

    pub fn apply_command(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Preload { category, clip } => {
                self.preload(category, clip);
            }
        }
    }

    /// URLs of backends whose load failed.
    pub fn check_errors(&self) -> Vec<String> {
        let slots = [&self.music, &self.ambient, &self.jingle]
            .into_iter()
            .filter_map(|slot| slot.backend.as_ref());
        let pools = self
            .one_shots
            .iter()
            .chain(self.persistent.iter())
            .map(|p| &p.backend);

        let mut urls: Vec<String> = slots
            .chain(pools)
            .filter(|b| b.is_errored())
            .map(|b| b.url().to_string())
            .collect();
        urls.extend(self.registry.errored_urls());

        for url in &urls {
            error!(url = %url, "Failed to load audio");
        }
        urls
    }

    // ========================================================================
    // Loading
    // ========================================================================

    pub fn pending_load_count(&self) -> usize {
        self.pending_loads.len()
    }

    /// Hand queued fetches to a host that runs its own I/O.
    ///
    /// Deliver each result with [`complete_load`](Self::complete_load).
    pub fn take_pending_loads(&mut self) -> Vec<(BackendId, String)> {
        self.pending_loads.drain(..).collect()
    }

    /// Fetch every queued asset concurrently and deliver the results in
    /// queue order. Returns the number of loads delivered.
    pub async fn flush_loads(&mut self) -> usize {
        let pending = self.take_pending_loads();
        if pending.is_empty() {
            return 0;
        }

        let fetches = pending.iter().map(|(_, url)| {
            let fetcher = Arc::clone(&self.fetcher);
            let url = url.clone();
            async move {
                fetcher
                    .fetch(&url)
                    .await
                    .map_err(|e| PlaybackError::from_fetch(&url, e))
            }
        });
        let results = join_all(fetches).await;

        let count = pending.len();
        for ((id, _), result) in pending.into_iter().zip(results) {
            self.complete_load(id, result);
        }
        count
    }

    /// Deliver the fetch result for backend `id`.
    ///
    /// Results for backends that were stopped or dropped meanwhile are
    /// discarded.
    pub fn complete_load(&mut self, id: BackendId, result: Result<Bytes>) {
        let ctx = self.ctx.clone();
        let Some((channel, clip, backend)) = self.locate(id) else {
            debug!(backend = %id, "Discarding load result for a dropped backend");
            return;
        };
        backend.finish_load(result, &ctx);

        let failure = backend.error().map(|e| (e.to_string(), e.is_transient()));
        if let Some((message, recoverable)) = failure {
            self.emit(AudioEvent::LoadFailed {
                channel: channel.as_str().to_string(),
                clip,
                message,
                recoverable,
            });
        }
    }

    fn locate(&mut self, id: BackendId) -> Option<(Channel, String, &mut PlaybackBackend)> {
        for (channel, slot) in [
            (Channel::Music, &mut self.music),
            (Channel::Ambient, &mut self.ambient),
            (Channel::Jingle, &mut self.jingle),
        ] {
            if slot.backend_id() == Some(id) {
                let clip = slot.current.as_ref().map(|c| c.name.clone()).unwrap_or_default();
                return slot.backend.as_mut().map(|b| (channel, clip, b));
            }
        }

        for (channel, pool) in [
            (Channel::OneShotEffect, &mut self.one_shots),
            (Channel::PersistentEffect, &mut self.persistent),
        ] {
            if let Some(pooled) = pool.iter_mut().find(|p| p.backend.id() == id) {
                return Some((channel, pooled.clip.name.clone(), &mut pooled.backend));
            }
        }

        if let Some(tail) = self.fade_tails.iter_mut().find(|b| b.id() == id) {
            return Some((Channel::Music, String::new(), tail));
        }

        self.registry
            .get_mut(id)
            .map(|(category, entry)| (category.channel(), entry.clip.name.clone(), &mut entry.backend))
    }

    // ========================================================================
    // Frame tick
    // ========================================================================

    /// Per-frame tick.
    ///
    /// Advances every backend, retires finished crossfade tails and handles
    /// jingle completion.
    pub fn update(&mut self) {
        for slot in [&mut self.music, &mut self.ambient, &mut self.jingle] {
            if let Some(backend) = slot.backend.as_mut() {
                backend.update();
            }
        }

        for pooled in self.one_shots.iter_mut() {
            if pooled.backend.update() == TickOutcome::Ended {
                debug!(clip = %pooled.clip.name, "Effect finished");
            }
        }
        for pooled in self.persistent.iter_mut() {
            pooled.backend.update();
        }

        self.fade_tails.retain_mut(|tail| {
            tail.update();
            if tail.is_alive() && tail.is_fading() {
                return true;
            }
            tail.stop();
            false
        });

        let signals: Vec<ChannelSignal> = self.signals.lock().drain(..).collect();
        for signal in signals {
            match signal {
                ChannelSignal::JingleEnded(id) => self.finish_jingle(id),
            }
        }
    }

    // ========================================================================
    // Slot helpers
    // ========================================================================

    fn slot_mut(&mut self, channel: Channel) -> &mut ChannelSlot {
        match channel {
            Channel::Ambient => &mut self.ambient,
            Channel::Jingle => &mut self.jingle,
            _ => &mut self.music,
        }
    }

    fn update_slot_params(&mut self, channel: Channel, clip: &AudioClip) {
        let params = self.params_for(channel, clip);
        let slot = self.slot_mut(channel);
        if let Some(backend) = slot.backend.as_mut() {
            backend.set_params(params);
        }
        slot.current = Some(clip.clone());
    }

    fn replay_slot(&mut self, channel: Channel, snapshot: &AudioSnapshot) {
        let clip = snapshot.clip();
        if self.slot_mut(channel).is_current(&clip) {
            self.update_slot_params(channel, &clip);
            return;
        }

        match channel {
            Channel::Music => self.play_music(clip, snapshot.pos),
            _ => self.play_ambient(clip, snapshot.pos),
        }
        let fade = self.settings.replay_fade_time;
        if let Some(backend) = self.slot_mut(channel).backend.as_mut() {
            backend.fade_in(fade);
        }
    }

    fn stop_slot(&mut self, channel: Channel) {
        let slot = self.slot_mut(channel);
        let backend = slot.backend.take();
        let current = slot.current.take();
        slot.offset = 0.0;

        if let Some(mut backend) = backend {
            backend.stop();
            let name = current.map(|c| c.name).unwrap_or_default();
            self.log_transition(channel, "stop", &name);
            self.emit(AudioEvent::Stopped {
                channel: channel.as_str().to_string(),
                clip: name,
            });
        }
    }

    fn pause_slot(&mut self, channel: Channel) {
        let slot = self.slot_mut(channel);
        let (Some(backend), Some(clip)) = (slot.backend.as_mut(), slot.current.clone()) else {
            return;
        };
        if !backend.is_playing() {
            return;
        }
        backend.pause();
        let position = backend.seek();
        slot.offset = position;
        self.log_transition(channel, "pause", &clip.name);
        self.emit(AudioEvent::Paused {
            channel: channel.as_str().to_string(),
            clip: clip.name,
            position_ms: (position * 1000.0) as u64,
        });
    }

    fn resume_slot(&mut self, channel: Channel) {
        if channel == Channel::Music && self.is_jingle_active() {
            return;
        }
        let slot = self.slot_mut(channel);
        let (Some(backend), Some(clip)) = (slot.backend.as_mut(), slot.current.clone()) else {
            return;
        };
        if backend.state() != PlaybackState::Paused {
            return;
        }
        backend.replay();
        let position = backend.seek();
        self.log_transition(channel, "resume", &clip.name);
        self.emit(AudioEvent::Resumed {
            channel: channel.as_str().to_string(),
            clip: clip.name,
            position_ms: (position * 1000.0) as u64,
        });
    }

    fn fade_out_slot(&mut self, channel: Channel, duration: f64) {
        let slot = self.slot_mut(channel);
        if slot.current.is_none() {
            return;
        }
        if let Some(backend) = slot.backend.as_mut() {
            backend.fade_out(duration);
            slot.current = None;
        }
    }

    fn fade_in_slot(&mut self, channel: Channel, duration: f64) {
        let slot = self.slot_mut(channel);
        if slot.current.is_none() {
            return;
        }
        if let Some(backend) = slot.backend.as_mut() {
            backend.fade_in(duration);
        }
    }

    fn emit(&self, event: AudioEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Audio(event)).ok();
        }
    }

    fn log_transition(&self, channel: Channel, action: &str, clip: &str) {
        if self.settings.debug_logging {
            info!(channel = %channel, clip, "Audio {}", action);
        } else {
            debug!(channel = %channel, clip, "Audio {}", action);
        }
    }
}

fn save_slot(slot: &ChannelSlot) -> AudioSnapshot {
    match &slot.current {
        Some(clip) => {
            let pos = slot.backend.as_ref().map(|b| b.seek()).unwrap_or(0.0);
            AudioSnapshot::from_clip(clip, pos)
        }
        None => AudioSnapshot::empty(),
    }
}
