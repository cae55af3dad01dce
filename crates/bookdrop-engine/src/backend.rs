//! Circulation backend interface.
//!
//! The engine talks to the library's circulation system through one call:
//! check-in. The trait keeps that seam narrow so tests and the demo can
//! script replies without a SIP2 gateway anywhere near them.

use bookdrop_core::MaterialId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result type alias for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors from the circulation backend transport.
///
/// These cover the call not completing at all; a completed call that
/// *rejects* the return is not an error here — it comes back as a
/// [`CheckInResponse`] with `ok == false`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The backend did not answer in time.
    #[error("Backend timeout after {0}ms")]
    Timeout(u64),

    /// The backend answered something that does not decode.
    #[error("Malformed backend reply: {0}")]
    Protocol(String),
}

/// Item metadata the backend returns with a successful check-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProperties {
    /// Item title, if the catalog knows it.
    pub title: Option<String>,

    /// Item author, if the catalog knows it.
    pub author: Option<String>,
}

/// Reply to a check-in call, kept whole as the material's backend snapshot.
///
/// Field names follow the gateway's JSON casing so a recorded reply can be
/// replayed verbatim into receipt rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    /// The circulation system accepted the return.
    pub ok: bool,

    /// Echo of the item identifier the call was made for.
    pub item_identifier: MaterialId,

    /// User-facing message, present on rejections and some acceptances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_message: Option<String>,

    /// Catalog metadata for the item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_properties: Option<ItemProperties>,

    /// Sort code choosing the physical destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_bin: Option<String>,

    /// Patron the item was checked out to; groups receipt lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patron_identifier: Option<String>,
}

impl CheckInResponse {
    /// A successful check-in for `item`.
    #[must_use]
    pub fn accepted(item: MaterialId) -> Self {
        Self {
            ok: true,
            item_identifier: item,
            screen_message: None,
            item_properties: None,
            sort_bin: None,
            patron_identifier: None,
        }
    }

    /// A rejected check-in for `item` with the backend's screen message.
    #[must_use]
    pub fn rejected(item: MaterialId, screen_message: impl Into<String>) -> Self {
        Self {
            ok: false,
            item_identifier: item,
            screen_message: Some(screen_message.into()),
            item_properties: None,
            sort_bin: None,
            patron_identifier: None,
        }
    }

    /// Attach catalog metadata.
    #[must_use]
    pub fn with_properties(mut self, title: impl Into<String>, author: impl Into<String>) -> Self {
        self.item_properties = Some(ItemProperties {
            title: Some(title.into()),
            author: Some(author.into()),
        });
        self
    }

    /// Attach a sort code.
    #[must_use]
    pub fn with_sort_bin(mut self, code: impl Into<String>) -> Self {
        self.sort_bin = Some(code.into());
        self
    }

    /// Attach the patron identifier.
    #[must_use]
    pub fn with_patron(mut self, patron: impl Into<String>) -> Self {
        self.patron_identifier = Some(patron.into());
        self
    }
}

/// The circulation system seen from the return engine.
///
/// Implementations must be cheap to share: the engine wraps the backend in
/// an `Arc` and calls it from short-lived dispatch tasks so the event loop
/// never blocks on the network.
pub trait CirculationBackend: Send + Sync {
    /// Record `material_id` as returned.
    ///
    /// `timestamp` is the session timestamp the kiosk stamps on the whole
    /// return transaction, not the per-call wall clock.
    fn check_in(
        &self,
        material_id: &MaterialId,
        timestamp: DateTime<Utc>,
    ) -> impl Future<Output = BackendResult<CheckInResponse>> + Send;
}

pub mod mock {
    //! Scriptable backend for testing and development.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;
    use tracing::debug;

    use super::{BackendError, BackendResult, CheckInResponse, CirculationBackend};
    use bookdrop_core::MaterialId;
    use chrono::{DateTime, Utc};

    #[derive(Default)]
    struct State {
        scripts: HashMap<MaterialId, Vec<BackendResult<CheckInResponse>>>,
        holds: HashMap<MaterialId, oneshot::Receiver<()>>,
        releases: HashMap<MaterialId, oneshot::Sender<()>>,
        calls: Vec<(MaterialId, DateTime<Utc>)>,
    }

    /// In-memory circulation backend with scripted replies.
    ///
    /// Replies are queued per material id and consumed in order; the last
    /// reply sticks, so a single script answers repeated attempts. A call
    /// for an unscripted material fails with a protocol error — silence
    /// here would mask test bugs.
    ///
    /// [`hold`](MockBackend::hold) parks the next call for a material until
    /// [`release`](MockBackend::release), which is how ordering tests keep a
    /// check-in in flight while other events arrive.
    #[derive(Clone, Default)]
    pub struct MockBackend {
        state: Arc<Mutex<State>>,
    }

    impl MockBackend {
        /// Create an empty backend; script replies before use.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful or rejecting reply for `material`.
        pub fn script(&self, material: &MaterialId, response: CheckInResponse) {
            self.lock().scripts.entry(material.clone()).or_default().push(Ok(response));
        }

        /// Queue a transport failure for `material`.
        pub fn script_failure(&self, material: &MaterialId, error: BackendError) {
            self.lock().scripts.entry(material.clone()).or_default().push(Err(error));
        }

        /// Park the next call for `material` until [`release`](Self::release).
        pub fn hold(&self, material: &MaterialId) {
            let (tx, rx) = oneshot::channel();
            let mut state = self.lock();
            state.holds.insert(material.clone(), rx);
            state.releases.insert(material.clone(), tx);
        }

        /// Let a held call proceed.
        pub fn release(&self, material: &MaterialId) {
            if let Some(tx) = self.lock().releases.remove(material) {
                let _ = tx.send(());
            }
        }

        /// Calls observed so far, in arrival order.
        #[must_use]
        pub fn calls(&self) -> Vec<(MaterialId, DateTime<Utc>)> {
            self.lock().calls.clone()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    impl CirculationBackend for MockBackend {
        async fn check_in(
            &self,
            material_id: &MaterialId,
            timestamp: DateTime<Utc>,
        ) -> BackendResult<CheckInResponse> {
            let hold = {
                let mut state = self.lock();
                state.calls.push((material_id.clone(), timestamp));
                state.holds.remove(material_id)
            };

            if let Some(rx) = hold {
                debug!(%material_id, "check-in held, waiting for release");
                let _ = rx.await;
            }

            let mut state = self.lock();
            let queue = state.scripts.get_mut(material_id).ok_or_else(|| {
                BackendError::Protocol(format!("no scripted reply for {material_id}"))
            })?;
            if queue.len() > 1 {
                Ok(queue.remove(0)?)
            } else {
                queue
                    .first()
                    .cloned()
                    .ok_or_else(|| {
                        BackendError::Protocol(format!("no scripted reply for {material_id}"))
                    })?
            }
        }
    }

}
