//! Drives a complete return session against the mock reader and backend.
//!
//! A patron returns a novel and a two-disc audiobook; the second disc gets
//! picked up too early while its security bit is being written, which
//! exercises the attention-set recovery path. Run with:
//!
//! ```sh
//! RUST_LOG=debug cargo run -p bookdrop-engine --example return_session
//! ```

use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use bookdrop_bridge::{BridgeConfig, BridgeError, MockReader, ReaderBridge};
use bookdrop_core::{BinId, MaterialId, TagUid};
use bookdrop_engine::backend::mock::MockBackend;
use bookdrop_engine::{
    BinSortingConfig, CheckInResponse, EngineConfig, ReturnEngine, TableSeriesDirectory,
    UiNotification,
};
use bookdrop_wire::ReaderCommand;

const NOVEL_TAG: &str = "E004AAAA00000001";
const DISC1_TAG: &str = "E004BBBB00000001";
const DISC2_TAG: &str = "E004BBBB00000002";
const AUDIOBOOK: &str = "5010941603";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Sorting: code "1" is the fiction bin, everything else falls back.
    let mut bin_sorting = BinSortingConfig::single(BinId::new("other")?);
    bin_sorting.destinations = vec![BinId::new("fiction")?, BinId::new("other")?];
    bin_sorting.mapping.insert("1".into(), BinId::new("fiction")?);

    // The audiobook's two discs form one series; the novel is unlisted and
    // resolves to a single-tag material keyed by its UID.
    let mut directory = TableSeriesDirectory::new();
    directory.insert_series(
        MaterialId::new(AUDIOBOOK)?,
        vec![TagUid::new(DISC1_TAG)?, TagUid::new(DISC2_TAG)?],
    );

    let backend = MockBackend::new();
    backend.script(
        &MaterialId::new(NOVEL_TAG)?,
        CheckInResponse::accepted(MaterialId::new(NOVEL_TAG)?)
            .with_properties("Dune", "Frank Herbert")
            .with_sort_bin("1")
            .with_patron("patron17"),
    );
    backend.script(
        &MaterialId::new(AUDIOBOOK)?,
        CheckInResponse::accepted(MaterialId::new(AUDIOBOOK)?)
            .with_properties("The Hobbit", "J.R.R. Tolkien")
            .with_sort_bin("9")
            .with_patron("patron17"),
    );

    let mut bridge = ReaderBridge::new(BridgeConfig::default());
    let reader = MockReader::connect(&mut bridge);

    let (engine, handle, mut notifications) = ReturnEngine::new(
        bridge,
        backend,
        directory,
        EngineConfig::new(bin_sorting),
    )?;
    let engine_task = tokio::spawn(engine.run());
    let firmware_task = tokio::spawn(firmware(reader));

    // The UI side: watch the session until both materials are sorted.
    let mut sorted = 0;
    while sorted < 2 {
        let Some(notification) = notifications.recv().await else {
            break;
        };
        match notification {
            UiNotification::MaterialUpdated(view) => {
                info!(material = %view.id, status = %view.status, title = ?view.title, "update");
            }
            UiNotification::AttentionRequired { material_id } => {
                info!(material = %material_id, "please put the item back on the pad");
            }
            UiNotification::AttentionCleared => info!("all items recovered"),
            UiNotification::MaterialSorted { material_id, bin } => {
                info!(material = %material_id, %bin, "sorted");
                sorted += 1;
            }
            UiNotification::MaterialFailed {
                material_id,
                message,
            } => info!(material = %material_id, %message, "failed"),
            UiNotification::ReaderReady => info!("reader ready"),
            UiNotification::BridgeIssue { reason } => info!(%reason, "bridge issue"),
        }
    }

    let summary = handle.end_session().await?;
    info!(session = %summary.session_id, "session ended");
    for (patron, lines) in &summary.receipts {
        info!(%patron, returns = lines.len(), "receipt group");
    }
    for bin in &summary.bins {
        info!(bin = %bin.id, materials = bin.len(), page = bin.pager.current_page, "bin");
    }

    drop(handle);
    engine_task.await?;
    firmware_task.await??;
    Ok(())
}

/// Stands in for the reader firmware: presents the items, then answers
/// set-AFI commands — dropping the second disc once before confirming it.
async fn firmware(mut reader: MockReader) -> Result<(), BridgeError> {
    reader.announce().await?;
    reader.present_tag(NOVEL_TAG).await?;
    reader.present_tags(&[DISC1_TAG, DISC2_TAG]).await?;

    let mut disc2_dropped = false;
    while let Some(command) = reader.next_command().await {
        match command {
            ReaderCommand::DetectTags => {}
            ReaderCommand::SetAfi { uid, afi } => {
                if uid.as_str() == DISC2_TAG && !disc2_dropped {
                    disc2_dropped = true;
                    // Impatient patron: the disc leaves the pad before the
                    // write lands, then comes back.
                    reader.remove_tag(DISC2_TAG).await?;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    reader.present_tag(DISC2_TAG).await?;
                    continue;
                }
                reader.confirm_afi(uid.as_str(), afi, true).await?;
            }
        }
    }
    Ok(())
}
