//! Reader bridge implementation.

use bookdrop_core::{
    Error, TagUid,
    constants::{DEFAULT_AFI_OFF, DEFAULT_AFI_ON},
};
use bookdrop_wire::{ReaderCommand, ReaderEvent, decode_event};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The two sentinel AFI bytes a reader installation is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AfiProfile {
    /// Byte meaning "security on" (gates alarm).
    pub on: u8,

    /// Byte meaning "security off" (item may leave).
    pub off: u8,
}

impl AfiProfile {
    /// Create a profile with validation.
    ///
    /// # Errors
    /// Returns `Error::Config` if both sentinels are the same byte — the
    /// bridge could then never tell a secured tag from a released one.
    pub fn new(on: u8, off: u8) -> bookdrop_core::Result<Self> {
        if on == off {
            return Err(Error::Config(format!(
                "AFI sentinels must differ, both are {on}"
            )));
        }
        Ok(Self { on, off })
    }

    /// Sentinel byte for the desired security state.
    #[must_use]
    pub fn byte_for(&self, secure: bool) -> u8 {
        if secure { self.on } else { self.off }
    }
}

impl Default for AfiProfile {
    fn default() -> Self {
        Self {
            on: DEFAULT_AFI_ON,
            off: DEFAULT_AFI_OFF,
        }
    }
}

/// Configuration for the reader bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// AFI sentinel bytes for this installation.
    pub afi: AfiProfile,

    /// Capacity of the frame and command channels per connection.
    pub channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            afi: AfiProfile::default(),
            channel_capacity: 32,
        }
    }
}

/// A decoded, AFI-translated event from the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Reader is connected and ready.
    Connected,

    /// Bulk scan result.
    TagsDetected(Vec<TagUid>),

    /// A tag entered the field.
    TagDetected(TagUid),

    /// A tag left the field.
    TagRemoved(TagUid),

    /// Result of a set-AFI command, with the raw byte already mapped
    /// against the configured profile.
    AfiSetResult {
        /// Tag the command addressed.
        uid: TagUid,
        /// Tag now carries the "security on" sentinel.
        on: bool,
        /// The write took.
        success: bool,
    },

    /// A frame was dropped; reason uses the wire error taxonomy.
    Error {
        /// Human-readable reason for the drop.
        reason: String,
    },
}

/// Transport-facing half of a reader connection.
///
/// Whatever speaks to the physical reader (or the [`MockReader`] in tests)
/// pushes whole inbound frames into `frames` and drains outbound command
/// frames from `commands`.
///
/// [`MockReader`]: crate::mock::MockReader
#[derive(Debug)]
pub struct ReaderLink {
    /// Inbound frames, reader to kiosk.
    pub frames: mpsc::Sender<String>,

    /// Outbound command frames, kiosk to reader.
    pub commands: mpsc::Receiver<String>,
}

/// Bridge-side half of the current connection.
#[derive(Debug)]
struct BridgeSide {
    frames: mpsc::Receiver<String>,
    commands: mpsc::Sender<String>,
}

/// The Device Event Bridge.
///
/// Owns the single reader connection, decodes frames into [`BridgeEvent`]s
/// and sends fire-and-forget commands. See the crate docs for the overall
/// architecture.
#[derive(Debug)]
pub struct ReaderBridge {
    afi: AfiProfile,
    capacity: usize,
    side: Option<BridgeSide>,
}

impl ReaderBridge {
    /// Create a bridge with the given configuration. No connection is bound
    /// yet; call [`accept`](Self::accept).
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            afi: config.afi,
            capacity: config.channel_capacity,
            side: None,
        }
    }

    /// The AFI profile this bridge translates with.
    #[must_use]
    pub fn afi(&self) -> AfiProfile {
        self.afi
    }

    /// Bind a new reader connection, returning the transport-facing half.
    ///
    /// Any previous connection is dropped: its frame sender starts failing
    /// and its queued-but-unread events are discarded, so a reconnecting
    /// reader can never double-deliver.
    pub fn accept(&mut self) -> ReaderLink {
        if self.side.is_some() {
            debug!("replacing stale reader connection");
        }

        let (frame_tx, frame_rx) = mpsc::channel(self.capacity);
        let (cmd_tx, cmd_rx) = mpsc::channel(self.capacity);

        self.side = Some(BridgeSide {
            frames: frame_rx,
            commands: cmd_tx,
        });

        ReaderLink {
            frames: frame_tx,
            commands: cmd_rx,
        }
    }

    /// Whether a reader connection is currently bound.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.side.is_some()
    }

    /// Ask the reader to report every tag currently in the field.
    ///
    /// Fire-and-forget: without a live connection the request is dropped.
    pub fn request_scan(&mut self) {
        self.send(ReaderCommand::DetectTags);
    }

    /// Ask the reader to write the AFI sentinel for `secure` onto one tag.
    ///
    /// Fire-and-forget; the outcome arrives later as
    /// [`BridgeEvent::AfiSetResult`].
    pub fn set_afi(&mut self, uid: &TagUid, secure: bool) {
        let afi = self.afi.byte_for(secure);
        self.send(ReaderCommand::SetAfi {
            uid: uid.clone(),
            afi,
        });
    }

    fn send(&mut self, command: ReaderCommand) {
        let Some(side) = &self.side else {
            warn!(?command, "no reader connection, dropping command");
            return;
        };

        if let Err(err) = side.commands.try_send(command.encode()) {
            warn!(%err, "reader command channel unavailable, dropping command");
        }
    }

    /// Receive the next event from the current connection.
    ///
    /// Returns `None` when no connection is bound or the transport side hung
    /// up; after a hang-up the bridge is ready for a fresh
    /// [`accept`](Self::accept). Cancel-safe, so it can sit in a `select!`
    /// arm of the engine loop.
    pub async fn next_event(&mut self) -> Option<BridgeEvent> {
        let frame = {
            let side = self.side.as_mut()?;
            side.frames.recv().await
        };

        match frame {
            Some(frame) => Some(self.translate(&frame)),
            None => {
                debug!("reader connection closed");
                self.side = None;
                None
            }
        }
    }

    fn translate(&self, frame: &str) -> BridgeEvent {
        match decode_event(frame) {
            Ok(ReaderEvent::Connected) => BridgeEvent::Connected,
            Ok(ReaderEvent::TagsDetected(tags)) => {
                BridgeEvent::TagsDetected(tags.into_iter().map(|t| t.uid).collect())
            }
            Ok(ReaderEvent::TagDetected(tag)) => BridgeEvent::TagDetected(tag.uid),
            Ok(ReaderEvent::TagRemoved(tag)) => BridgeEvent::TagRemoved(tag.uid),
            Ok(ReaderEvent::AfiSetResult { uid, afi, success }) => {
                if !success {
                    warn!(%uid, "reader reported failed AFI write");
                }
                BridgeEvent::AfiSetResult {
                    uid,
                    on: afi == self.afi.on,
                    success,
                }
            }
            Err(err) => {
                warn!(frame, %err, "dropping malformed reader frame");
                BridgeEvent::Error {
                    reason: err.to_string(),
                }
            }
        }
    }
}
