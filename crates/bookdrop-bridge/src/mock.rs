//! Mock reader for testing and development.
//!
//! Plays the transport-facing half of a [`ReaderLink`]: tests present and
//! remove tags, confirm AFI writes, inject raw frames, and observe the
//! commands the kiosk sends — all without physical hardware.

use bookdrop_wire::ReaderCommand;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bridge::{ReaderBridge, ReaderLink};
use crate::error::{BridgeError, Result};

/// Programmable reader standing in for the physical device.
///
/// # Examples
///
/// ```
/// use bookdrop_bridge::{BridgeConfig, BridgeEvent, MockReader, ReaderBridge};
///
/// #[tokio::main]
/// async fn main() -> bookdrop_bridge::Result<()> {
///     let mut bridge = ReaderBridge::new(BridgeConfig::default());
///     let reader = MockReader::connect(&mut bridge);
///
///     reader.announce().await?;
///     reader.present_tag("E0040100123478AB").await?;
///
///     assert_eq!(bridge.next_event().await, Some(BridgeEvent::Connected));
///     assert!(matches!(
///         bridge.next_event().await,
///         Some(BridgeEvent::TagDetected(_))
///     ));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockReader {
    frames: mpsc::Sender<String>,
    commands: mpsc::Receiver<String>,
}

impl MockReader {
    /// Bind this mock as the bridge's current connection.
    #[must_use]
    pub fn connect(bridge: &mut ReaderBridge) -> Self {
        let ReaderLink { frames, commands } = bridge.accept();
        Self { frames, commands }
    }

    /// Send the ready handshake.
    ///
    /// # Errors
    /// Returns an error if the bridge side of the channel is gone.
    pub async fn announce(&self) -> Result<()> {
        self.send_frame(r#"{"event":"connected"}"#).await
    }

    /// Report a single tag entering the field.
    ///
    /// # Errors
    /// Returns an error if the bridge side of the channel is gone.
    pub async fn present_tag(&self, uid: &str) -> Result<()> {
        self.send_frame(&format!(
            r#"{{"event":"tagDetected","tag":{{"uid":"{uid}"}}}}"#
        ))
        .await
    }

    /// Report a bulk scan result.
    ///
    /// # Errors
    /// Returns an error if the bridge side of the channel is gone.
    pub async fn present_tags(&self, uids: &[&str]) -> Result<()> {
        let tags = uids
            .iter()
            .map(|uid| format!(r#"{{"uid":"{uid}"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        self.send_frame(&format!(r#"{{"event":"tagsDetected","tags":[{tags}]}}"#))
            .await
    }

    /// Report a tag leaving the field.
    ///
    /// # Errors
    /// Returns an error if the bridge side of the channel is gone.
    pub async fn remove_tag(&self, uid: &str) -> Result<()> {
        self.send_frame(&format!(
            r#"{{"event":"tagRemoved","tag":{{"uid":"{uid}"}}}}"#
        ))
        .await
    }

    /// Report the result of a set-AFI command.
    ///
    /// # Errors
    /// Returns an error if the bridge side of the channel is gone.
    pub async fn confirm_afi(&self, uid: &str, afi: u8, success: bool) -> Result<()> {
        self.send_frame(&format!(
            r#"{{"event":"setAFIResult","UID":"{uid}","AFI":{afi},"success":{success}}}"#
        ))
        .await
    }

    /// Inject a raw frame, valid or not. Used to exercise the malformed
    /// frame path.
    ///
    /// # Errors
    /// Returns an error if the bridge side of the channel is gone.
    pub async fn send_frame(&self, frame: &str) -> Result<()> {
        self.frames
            .send(frame.to_string())
            .await
            .map_err(|_| BridgeError::channel_closed("bridge dropped the frame channel"))
    }

    /// Receive the next decoded command the kiosk sent.
    ///
    /// Returns `None` once the bridge has dropped the command channel.
    /// Frames that fail to decode are skipped; the bridge only ever encodes
    /// well-formed commands, so a skip indicates a test injected garbage on
    /// the wrong side.
    pub async fn next_command(&mut self) -> Option<ReaderCommand> {
        loop {
            let frame = self.commands.recv().await?;
            match ReaderCommand::decode(&frame) {
                Ok(command) => return Some(command),
                Err(err) => debug!(%frame, %err, "skipping undecodable command frame"),
            }
        }
    }

    /// Non-blocking variant of [`next_command`](Self::next_command).
    pub fn try_next_command(&mut self) -> Option<ReaderCommand> {
        loop {
            let frame = self.commands.try_recv().ok()?;
            match ReaderCommand::decode(&frame) {
                Ok(command) => return Some(command),
                Err(err) => debug!(%frame, %err, "skipping undecodable command frame"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeConfig, BridgeEvent};
    use bookdrop_core::TagUid;

    #[tokio::test]
    async fn test_mock_reader_bulk_presentation() {
        let mut bridge = ReaderBridge::new(BridgeConfig::default());
        let reader = MockReader::connect(&mut bridge);

        reader.present_tags(&["AAAA1111", "BBBB2222"]).await.unwrap();

        assert_eq!(
            bridge.next_event().await,
            Some(BridgeEvent::TagsDetected(vec![
                TagUid::new("AAAA1111").unwrap(),
                TagUid::new("BBBB2222").unwrap(),
            ]))
        );
    }

    #[tokio::test]
    async fn test_mock_reader_remove_tag() {
        let mut bridge = ReaderBridge::new(BridgeConfig::default());
        let reader = MockReader::connect(&mut bridge);

        reader.remove_tag("AAAA1111").await.unwrap();
        assert_eq!(
            bridge.next_event().await,
            Some(BridgeEvent::TagRemoved(TagUid::new("AAAA1111").unwrap()))
        );
    }

    #[tokio::test]
    async fn test_try_next_command_empty() {
        let mut bridge = ReaderBridge::new(BridgeConfig::default());
        let mut reader = MockReader::connect(&mut bridge);

        assert_eq!(reader.try_next_command(), None);

        bridge.request_scan();
        assert_eq!(reader.try_next_command(), Some(ReaderCommand::DetectTags));
    }
}
