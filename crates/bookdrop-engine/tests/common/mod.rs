//! Shared harness for return-flow integration tests.
//!
//! Wires a mock reader, a scriptable backend and a running engine task the
//! way the kiosk shell would, and exposes the two observation points tests
//! care about: the UI notification stream and the command frames the
//! engine sends to the reader.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use bookdrop_bridge::{BridgeConfig, MockReader, ReaderBridge};
use bookdrop_core::{BinId, MaterialId, TagUid};
use bookdrop_engine::backend::mock::MockBackend;
use bookdrop_engine::{
    BinSortingConfig, EngineConfig, EngineHandle, ReturnEngine, TableSeriesDirectory,
    UiNotification,
};
use bookdrop_wire::ReaderCommand;

/// Per-observation deadline; a kiosk event cycle is microseconds, so two
/// seconds means "never".
pub const DEADLINE: Duration = Duration::from_secs(2);

pub fn uid(s: &str) -> TagUid {
    TagUid::new(s).unwrap()
}

pub fn mid(s: &str) -> MaterialId {
    MaterialId::new(s).unwrap()
}

pub fn bin(s: &str) -> BinId {
    BinId::new(s).unwrap()
}

/// Three destinations: codes "1" and "2" are mapped, everything else falls
/// back to bin3.
pub fn three_bin_config() -> BinSortingConfig {
    let mut config = BinSortingConfig::single(bin("bin3"));
    config.destinations = vec![bin("bin1"), bin("bin2"), bin("bin3")];
    config.mapping.insert("1".to_string(), bin("bin1"));
    config.mapping.insert("2".to_string(), bin("bin2"));
    config
}

/// A running kiosk: engine task plus every handle a test needs.
pub struct Kiosk {
    pub reader: MockReader,
    pub backend: MockBackend,
    pub handle: EngineHandle,
    pub notifications: mpsc::Receiver<UiNotification>,
    pub engine: JoinHandle<()>,
}

/// Start an engine over the given series directory and the three-bin
/// sorting config.
pub fn start(directory: TableSeriesDirectory) -> Kiosk {
    let mut bridge = ReaderBridge::new(BridgeConfig::default());
    let reader = MockReader::connect(&mut bridge);
    let backend = MockBackend::new();

    let (engine, handle, notifications) = ReturnEngine::new(
        bridge,
        backend.clone(),
        directory,
        EngineConfig::new(three_bin_config()),
    )
    .unwrap();

    Kiosk {
        reader,
        backend,
        handle,
        notifications,
        engine: tokio::spawn(engine.run()),
    }
}

impl Kiosk {
    /// Next UI notification, failing the test on a stall.
    pub async fn next_notification(&mut self) -> UiNotification {
        timeout(DEADLINE, self.notifications.recv())
            .await
            .expect("timed out waiting for a UI notification")
            .expect("engine closed the notification channel")
    }

    /// Skip notifications until one matches.
    pub async fn await_notification(
        &mut self,
        mut matcher: impl FnMut(&UiNotification) -> bool,
    ) -> UiNotification {
        loop {
            let notification = self.next_notification().await;
            if matcher(&notification) {
                return notification;
            }
        }
    }

    /// Next command frame the engine sent to the reader.
    pub async fn next_command(&mut self) -> ReaderCommand {
        timeout(DEADLINE, self.reader.next_command())
            .await
            .expect("timed out waiting for a reader command")
            .expect("bridge closed the command channel")
    }
}
