//! # Event Bus System
//!
//! Provides an event-driven surface for the audio core using
//! `tokio::sync::broadcast`. Hosts subscribe to learn when channels start,
//! stop, loop or fail without polling the channel manager.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │ Channel manager├────────────>│ EventBus  ├──────────────>│ Subscriber │
//! └────────────────┘             │(broadcast)│               └────────────┘
//!                                │           │   subscribe   ┌────────────┐
//!                                │           ├──────────────>│ Subscriber │
//!                                └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AudioEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Audio(AudioEvent::Started {
//!         channel: "music".to_string(),
//!         clip: "Theme1".to_string(),
//!     }))
//!     .ok();
//!
//! let received = subscriber.recv().await.unwrap();
//! assert_eq!(received.as_audio().map(|e| e.clip()), Some("Theme1"));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped; treat it as shutdown.
//!
//! Emitting with no subscribers returns `Err`; producers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError, TryRecvError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Channel playback events
    Audio(AudioEvent),
}

impl CoreEvent {
    /// The audio event, if this is one.
    pub fn as_audio(&self) -> Option<&AudioEvent> {
        match self {
            CoreEvent::Audio(event) => Some(event),
        }
    }
}

/// How loudly a host should surface an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events raised by the channel manager.
///
/// `channel` is one of `music`, `ambient`, `jingle` or `effect`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AudioEvent {
    /// A clip started on a channel.
    Started { channel: String, clip: String },
    /// A channel was paused.
    Paused {
        channel: String,
        clip: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// A paused channel resumed.
    Resumed {
        channel: String,
        clip: String,
        /// Position when resumed (milliseconds).
        position_ms: u64,
    },
    /// A channel was stopped.
    Stopped { channel: String, clip: String },
    /// A looping clip wrapped back to its loop start.
    Looped { channel: String, clip: String },
    /// Fetching or decoding a clip failed.
    LoadFailed {
        channel: String,
        clip: String,
        /// Human-readable error message.
        message: String,
        /// Whether retrying the load may succeed.
        recoverable: bool,
    },
    /// A jingle finished and the channels it interrupted were restored.
    JingleFinished { clip: String },
}

impl AudioEvent {
    /// Channel the event refers to.
    pub fn channel(&self) -> &str {
        match self {
            AudioEvent::Started { channel, .. }
            | AudioEvent::Paused { channel, .. }
            | AudioEvent::Resumed { channel, .. }
            | AudioEvent::Stopped { channel, .. }
            | AudioEvent::Looped { channel, .. }
            | AudioEvent::LoadFailed { channel, .. } => channel,
            AudioEvent::JingleFinished { .. } => "jingle",
        }
    }

    /// Clip the event refers to.
    pub fn clip(&self) -> &str {
        match self {
            AudioEvent::Started { clip, .. }
            | AudioEvent::Paused { clip, .. }
            | AudioEvent::Resumed { clip, .. }
            | AudioEvent::Stopped { clip, .. }
            | AudioEvent::Looped { clip, .. }
            | AudioEvent::LoadFailed { clip, .. }
            | AudioEvent::JingleFinished { clip } => clip,
        }
    }

    /// Unrecoverable load failures are errors; loops are noise.
    pub fn severity(&self) -> EventSeverity {
        match self {
            AudioEvent::LoadFailed {
                recoverable: false, ..
            } => EventSeverity::Error,
            AudioEvent::LoadFailed { .. } => EventSeverity::Warning,
            AudioEvent::Looped { .. } => EventSeverity::Debug,
            _ => EventSeverity::Info,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Channel Subscriber
// ============================================================================

/// Subscriber that yields [`AudioEvent`]s, optionally for a single channel.
///
/// Built for frame-driven hosts: [`drain`](Self::drain) never waits and
/// skips over lag, so a host that polls once per frame cannot stall on a
/// burst of one-shot effects.
///
/// ```rust
/// use core_runtime::events::{ChannelEvents, EventBus};
///
/// let bus = EventBus::new(64);
/// let mut music = ChannelEvents::new(bus.subscribe()).only("music");
/// assert!(music.drain().is_empty());
/// ```
pub struct ChannelEvents {
    receiver: Receiver<CoreEvent>,
    channel: Option<String>,
    missed: u64,
}

impl ChannelEvents {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            channel: None,
            missed: 0,
        }
    }

    /// Restrict to events of `channel` (`music`, `ambient`, `jingle`, `effect`).
    pub fn only(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    fn accepts(&self, event: &AudioEvent) -> bool {
        self.channel
            .as_deref()
            .map_or(true, |channel| event.channel() == channel)
    }

    /// Wait for the next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<AudioEvent, RecvError> {
        loop {
            let CoreEvent::Audio(event) = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Every matching event queued right now.
    pub fn drain(&mut self) -> Vec<AudioEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(CoreEvent::Audio(event)) => {
                    if self.accepts(&event) {
                        events.push(event);
                    }
                }
                Err(TryRecvError::Lagged(n)) => self.missed += n,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            }
        }
    }

    /// Events dropped because this subscriber fell behind.
    pub fn missed(&self) -> u64 {
        self.missed
    }
}

impl fmt::Debug for ChannelEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEvents")
            .field("channel", &self.channel)
            .field("missed", &self.missed)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started(channel: &str, clip: &str) -> CoreEvent {
        CoreEvent::Audio(AudioEvent::Started {
            channel: channel.to_string(),
            clip: clip.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started("music", "Theme1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = started("ambient", "Rain");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_channel_events_filter() {
        let bus = EventBus::new(10);
        let mut music = ChannelEvents::new(bus.subscribe()).only("music");

        bus.emit(started("effect", "Cursor1")).unwrap();
        bus.emit(started("music", "Theme1")).unwrap();

        let received = music.recv().await.unwrap();
        assert_eq!(received.clip(), "Theme1");
        assert!(music.drain().is_empty());
    }

    #[test]
    fn test_drain_skips_lag() {
        let bus = EventBus::new(2);
        let mut events = ChannelEvents::new(bus.subscribe());

        for i in 0..5 {
            bus.emit(started("effect", &format!("Se{}", i))).unwrap();
        }

        let drained = events.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].clip(), "Se4");
        assert_eq!(events.missed(), 3);
    }

    #[test]
    fn test_event_severity() {
        let fatal = AudioEvent::LoadFailed {
            channel: "music".to_string(),
            clip: "Theme1".to_string(),
            message: "missing".to_string(),
            recoverable: false,
        };
        assert_eq!(fatal.severity(), EventSeverity::Error);

        let looped = AudioEvent::Looped {
            channel: "music".to_string(),
            clip: "Theme1".to_string(),
        };
        assert_eq!(looped.severity(), EventSeverity::Debug);
        assert!(EventSeverity::Error > EventSeverity::Info);
    }

    #[test]
    fn test_jingle_finished_channel() {
        let event = AudioEvent::JingleFinished {
            clip: "Victory1".to_string(),
        };
        assert_eq!(event.channel(), "jingle");
        assert_eq!(event.clip(), "Victory1");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Audio(AudioEvent::JingleFinished {
            clip: "Victory1".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Audio\""));
        assert!(json.contains("\"event\":\"JingleFinished\""));
        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
