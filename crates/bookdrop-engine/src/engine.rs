//! The return engine event loop.
//!
//! One task owns everything: the reader bridge, the material working set,
//! the attention set, the sorter and the receipt ledger. Hardware events,
//! backend replies and control requests arrive as discrete messages and are
//! processed strictly in arrival order — state is never touched from two
//! places at once by construction.
//!
//! The only suspension points are the channel reads themselves. A check-in
//! call is dispatched to a short-lived task and its reply re-enters the
//! loop as a message, so other materials keep flowing while the backend
//! thinks. There is no cap on how many materials may be in flight at once;
//! a kiosk pad physically bounds the working set, so the engine carries no
//! admission control.

use std::collections::HashMap;
use std::sync::Arc;

use bookdrop_bridge::{BridgeEvent, ReaderBridge};
use bookdrop_core::{MaterialId, TagUid};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{BackendResult, CheckInResponse, CirculationBackend};
use crate::correlator::{MaterialCorrelator, Observation};
use crate::notify::{MaterialView, UiNotification};
use crate::receipt::ReceiptLedger;
use crate::recovery::AttentionSet;
use crate::series::SeriesDirectory;
use crate::sorter::{Bin, BinSorter, BinSortingConfig};
use crate::transition::{self, Effect, Outcome};

/// Configuration for the return engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sorting destinations and mapping table.
    pub bin_sorting: BinSortingConfig,

    /// Capacity of the UI notification channel.
    pub notification_capacity: usize,
}

impl EngineConfig {
    /// Engine configuration with the default channel sizing.
    #[must_use]
    pub fn new(bin_sorting: BinSortingConfig) -> Self {
        Self {
            bin_sorting,
            notification_capacity: 64,
        }
    }
}

/// What a session leaves behind when it ends.
#[derive(Debug)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: Uuid,

    /// Timestamp stamped on every check-in of the session.
    pub started_at: DateTime<Utc>,

    /// Accepted check-in replies grouped by patron, for the receipt
    /// collaborator.
    pub receipts: HashMap<String, Vec<CheckInResponse>>,

    /// Destination contents at session end.
    pub bins: Vec<Bin>,
}

#[derive(Debug)]
struct SessionStamp {
    id: Uuid,
    started_at: DateTime<Utc>,
}

impl SessionStamp {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

/// Backend reply routed back into the event loop.
#[derive(Debug)]
struct CheckInReply {
    material_id: MaterialId,
    result: BackendResult<CheckInResponse>,
}

enum EngineControl {
    EndSession {
        reply: oneshot::Sender<SessionSummary>,
    },
}

/// The engine task is gone; no more sessions can be ended through this
/// handle.
#[derive(Debug, thiserror::Error)]
#[error("Return engine stopped")]
pub struct EngineStopped;

/// Control handle held by the kiosk shell.
///
/// Dropping the handle stops the engine once its channels drain.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    control: mpsc::Sender<EngineControl>,
}

impl EngineHandle {
    /// End the current session: discard all material/bin state and hand
    /// back the receipt ledger and bin contents. The engine immediately
    /// starts a fresh session.
    ///
    /// # Errors
    /// Returns [`EngineStopped`] if the engine task has exited.
    pub async fn end_session(&self) -> std::result::Result<SessionSummary, EngineStopped> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(EngineControl::EndSession { reply: tx })
            .await
            .map_err(|_| EngineStopped)?;
        rx.await.map_err(|_| EngineStopped)
    }
}

/// The return-processing engine. See the module docs for the execution
/// model.
pub struct ReturnEngine<B, D> {
    bridge: ReaderBridge,
    backend: Arc<B>,
    correlator: MaterialCorrelator<D>,
    sorter: BinSorter,
    attention: AttentionSet,
    receipts: ReceiptLedger,
    session: SessionStamp,
    notifications: mpsc::Sender<UiNotification>,
    reply_tx: mpsc::Sender<CheckInReply>,
    reply_rx: mpsc::Receiver<CheckInReply>,
    control_rx: mpsc::Receiver<EngineControl>,
}

impl<B, D> ReturnEngine<B, D>
where
    B: CirculationBackend + 'static,
    D: SeriesDirectory,
{
    /// Build an engine over an already-connected bridge.
    ///
    /// Returns the engine (to be driven with [`run`](Self::run)), the
    /// control handle, and the UI notification stream.
    ///
    /// # Errors
    /// Returns a configuration error if the bin sorting table is
    /// inconsistent.
    pub fn new(
        bridge: ReaderBridge,
        backend: B,
        directory: D,
        config: EngineConfig,
    ) -> bookdrop_core::Result<(Self, EngineHandle, mpsc::Receiver<UiNotification>)> {
        let sorter = BinSorter::new(config.bin_sorting)?;
        let (notify_tx, notify_rx) = mpsc::channel(config.notification_capacity);
        let (reply_tx, reply_rx) = mpsc::channel(32);
        let (control_tx, control_rx) = mpsc::channel(4);

        let engine = Self {
            bridge,
            backend: Arc::new(backend),
            correlator: MaterialCorrelator::new(directory),
            sorter,
            attention: AttentionSet::new(),
            receipts: ReceiptLedger::new(),
            session: SessionStamp::new(),
            notifications: notify_tx,
            reply_tx,
            reply_rx,
            control_rx,
        };

        Ok((
            engine,
            EngineHandle {
                control: control_tx,
            },
            notify_rx,
        ))
    }

    /// Drive the event loop until the reader connection closes or every
    /// control handle is dropped.
    pub async fn run(mut self) {
        info!(session = %self.session.id, "return engine started");

        loop {
            tokio::select! {
                event = self.bridge.next_event() => match event {
                    Some(event) => self.handle_bridge_event(event).await,
                    None => {
                        info!("reader connection closed, stopping engine");
                        break;
                    }
                },
                Some(reply) = self.reply_rx.recv() => self.handle_reply(reply).await,
                control = self.control_rx.recv() => match control {
                    Some(EngineControl::EndSession { reply }) => {
                        let _ = reply.send(self.end_session());
                    }
                    None => {
                        debug!("all engine handles dropped, stopping engine");
                        break;
                    }
                },
            }
        }
    }

    async fn handle_bridge_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Connected => {
                info!("reader ready, requesting scan");
                self.bridge.request_scan();
                self.notify(UiNotification::ReaderReady).await;
            }
            BridgeEvent::TagsDetected(uids) => {
                for uid in uids {
                    self.tag_detected(uid).await;
                }
            }
            BridgeEvent::TagDetected(uid) => self.tag_detected(uid).await,
            BridgeEvent::TagRemoved(uid) => self.tag_removed(uid).await,
            BridgeEvent::AfiSetResult { uid, on, success } => {
                self.afi_result(uid, on, success).await;
            }
            BridgeEvent::Error { reason } => {
                warn!(%reason, "bridge reported an error");
                self.notify(UiNotification::BridgeIssue { reason }).await;
            }
        }
    }

    async fn tag_detected(&mut self, uid: TagUid) {
        let Observation {
            material_id,
            arrival,
        } = self.correlator.observe(uid.clone());
        debug!(%uid, %material_id, ?arrival, "tag detected");

        let outcome = match self.correlator.material(&material_id) {
            Some(material) => transition::on_tag_arrival(material, &uid),
            None => return,
        };
        self.apply(&material_id, outcome).await;
    }

    async fn tag_removed(&mut self, uid: TagUid) {
        let Some(material_id) = self.correlator.mark_removed(&uid) else {
            debug!(%uid, "removal for unknown tag, ignoring");
            return;
        };
        debug!(%uid, %material_id, "tag removed");

        let outcome = match self.correlator.material(&material_id) {
            Some(material) => transition::on_tag_removed(material),
            None => return,
        };
        self.apply(&material_id, outcome).await;
    }

    async fn afi_result(&mut self, uid: TagUid, on: bool, success: bool) {
        if !success {
            warn!(%uid, "reader could not write AFI");
            self.notify(UiNotification::BridgeIssue {
                reason: "AFI not set".to_string(),
            })
            .await;
            return;
        }

        let Some(material_id) = self.correlator.owner_of(&uid).cloned() else {
            debug!(%uid, "AFI result for unknown tag, ignoring");
            return;
        };

        if !on {
            // A return session only ever secures tags; a confirmed "off"
            // must not regress a tag that was already confirmed on.
            warn!(%uid, "ignoring AFI-off confirmation during return session");
            return;
        }

        let outcome = {
            let Some(material) = self.correlator.material_mut(&material_id) else {
                return;
            };
            material.confirm_afi(&uid);
            transition::on_afi_confirmed(material)
        };
        self.apply(&material_id, outcome).await;
    }

    async fn handle_reply(&mut self, reply: CheckInReply) {
        let CheckInReply {
            material_id,
            result,
        } = reply;

        let outcome = {
            let Some(material) = self.correlator.material_mut(&material_id) else {
                debug!(%material_id, "check-in reply for unknown material, ignoring");
                return;
            };
            material.loading = false;

            if let Ok(response) = &result
                && response.ok
            {
                if let Some(properties) = &response.item_properties {
                    material.title = properties.title.clone();
                    material.author = properties.author.clone();
                }
                material.sort_bin = response.sort_bin.clone();
                material.snapshot = Some(response.clone());
            }

            transition::on_check_in_reply(material, &result)
        };

        match &result {
            Ok(response) if response.ok => self.receipts.record(response.clone()),
            Ok(response) => {
                debug!(%material_id, message = ?response.screen_message, "check-in rejected");
            }
            Err(err) => warn!(%material_id, %err, "check-in call failed"),
        }

        self.apply(&material_id, outcome).await;
    }

    async fn apply(&mut self, material_id: &MaterialId, outcome: Outcome) {
        let mut status_changed = false;
        if let Some(target) = outcome.status {
            let Some(material) = self.correlator.material_mut(material_id) else {
                return;
            };
            match material.set_status(target) {
                Ok(()) => {
                    info!(%material_id, status = %target, "material transitioned");
                    status_changed = true;
                }
                Err(err) => {
                    error!(%material_id, %err, "refusing transition");
                    return;
                }
            }
        }

        let mut retire = false;
        for effect in outcome.effects {
            match effect {
                Effect::RequestCheckIn => self.dispatch_check_in(material_id),
                Effect::SetAfi(uid) => self.bridge.set_afi(&uid, true),
                Effect::SetAfiAll => {
                    let uids: Vec<TagUid> = self
                        .correlator
                        .material(material_id)
                        .map(|m| m.tags().iter().map(|t| t.uid.clone()).collect())
                        .unwrap_or_default();
                    for uid in uids {
                        self.bridge.set_afi(&uid, true);
                    }
                }
                Effect::AssignToBin => {
                    let sort_code = self
                        .correlator
                        .material(material_id)
                        .and_then(|m| m.sort_bin().map(str::to_string));
                    let bin = self.sorter.assign(sort_code.as_deref(), material_id);
                    self.notify(UiNotification::MaterialSorted {
                        material_id: material_id.clone(),
                        bin,
                    })
                    .await;
                }
                Effect::RequireAttention => {
                    if self.attention.insert(material_id) {
                        self.notify(UiNotification::AttentionRequired {
                            material_id: material_id.clone(),
                        })
                        .await;
                    }
                }
                Effect::ReleaseAttention => {
                    if self.attention.remove(material_id) {
                        self.notify(UiNotification::AttentionCleared).await;
                    }
                }
                Effect::NotifyFailed(message) => {
                    if let Some(material) = self.correlator.material_mut(material_id) {
                        material.message = Some(message.clone());
                    }
                    self.notify(UiNotification::MaterialFailed {
                        material_id: material_id.clone(),
                        message,
                    })
                    .await;
                }
                Effect::Retire => retire = true,
            }
        }

        // The UI hears about the new state before a terminal material is
        // dropped from the working set.
        if status_changed && let Some(material) = self.correlator.material(material_id) {
            self.notify(UiNotification::MaterialUpdated(MaterialView::from(material)))
                .await;
        }

        if retire {
            self.correlator.retire(material_id);
        }
    }

    fn dispatch_check_in(&mut self, material_id: &MaterialId) {
        let Some(material) = self.correlator.material_mut(material_id) else {
            return;
        };
        material.loading = true;

        let backend = Arc::clone(&self.backend);
        let reply_tx = self.reply_tx.clone();
        let id = material_id.clone();
        let timestamp = self.session.started_at;
        debug!(material_id = %id, "dispatching check-in");

        tokio::spawn(async move {
            let result = backend.check_in(&id, timestamp).await;
            if reply_tx
                .send(CheckInReply {
                    material_id: id,
                    result,
                })
                .await
                .is_err()
            {
                debug!("engine gone before check-in reply could be delivered");
            }
        });
    }

    fn end_session(&mut self) -> SessionSummary {
        info!(
            session = %self.session.id,
            open_materials = self.correlator.len(),
            "ending session"
        );

        let summary = SessionSummary {
            session_id: self.session.id,
            started_at: self.session.started_at,
            receipts: self.receipts.take(),
            bins: self.sorter.bins().to_vec(),
        };

        self.correlator.clear();
        self.attention.clear();
        self.sorter.clear();
        self.session = SessionStamp::new();
        summary
    }

    async fn notify(&self, notification: UiNotification) {
        if self.notifications.send(notification).await.is_err() {
            warn!("UI notification receiver gone, dropping notification");
        }
    }
}
