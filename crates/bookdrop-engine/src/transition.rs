//! Return lifecycle transitions as pure functions.
//!
//! Each function looks at a material (after the triggering event has been
//! applied to its tag list) and decides what should happen: an optional
//! status change plus a list of [`Effect`]s. Nothing here touches the
//! bridge, the backend or the UI — the engine loop interprets the outcome,
//! which keeps every guard unit-testable without channels or tasks.

use bookdrop_core::{MaterialStatus, TagUid};

use crate::backend::{BackendResult, CheckInResponse};
use crate::material::Material;

/// Fallback reason when the backend rejects without a screen message or
/// fails outright.
pub const GENERIC_CHECKIN_FAILURE: &str = "Return was not successful";

/// Side effect for the engine loop to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a check-in request for this material.
    RequestCheckIn,

    /// Ask the reader to secure one tag.
    SetAfi(TagUid),

    /// Ask the reader to secure every tag of the material.
    SetAfiAll,

    /// Route the material to its sorting destination.
    AssignToBin,

    /// Park the material in the attention set; a tag is missing while the
    /// secure step is underway.
    RequireAttention,

    /// Release the material from the attention set.
    ReleaseAttention,

    /// Surface a failure with a user-facing reason.
    NotifyFailed(String),

    /// Drop the material from the working set.
    Retire,
}

/// Decision produced by a transition function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Status to move to, if any. `None` means "transition not taken".
    pub status: Option<MaterialStatus>,

    /// Effects to carry out, in order.
    pub effects: Vec<Effect>,
}

impl Outcome {
    fn none() -> Self {
        Self::default()
    }
}

/// A tag of `material` was detected (already applied to the tag list).
#[must_use]
pub fn on_tag_arrival(material: &Material, uid: &TagUid) -> Outcome {
    match material.status() {
        // The secure step is underway; any (re)detection retries the AFI
        // write for that tag alone. Tags whose AFI already succeeded are
        // not reset by this.
        MaterialStatus::AwaitingAfi => Outcome {
            status: None,
            effects: vec![Effect::SetAfi(uid.clone())],
        },

        MaterialStatus::Collecting if !material.is_loading() && material.series_complete() => {
            Outcome {
                status: Some(MaterialStatus::CheckingIn),
                effects: vec![Effect::RequestCheckIn],
            }
        }

        // Collecting but incomplete, or a check-in already in flight: the
        // tag list is updated and the guard re-evaluates on the next event.
        _ => Outcome::none(),
    }
}

/// A tag of `material` was removed (already applied to the tag list).
#[must_use]
pub fn on_tag_removed(material: &Material) -> Outcome {
    match material.status() {
        MaterialStatus::AwaitingAfi => Outcome {
            status: None,
            effects: vec![Effect::RequireAttention],
        },
        // While collecting, removal just blocks the next completeness check.
        _ => Outcome::none(),
    }
}

/// The backend reply for `material`'s check-in arrived.
#[must_use]
pub fn on_check_in_reply(material: &Material, reply: &BackendResult<CheckInResponse>) -> Outcome {
    match reply {
        Ok(response) if response.ok => {
            let mut effects = vec![Effect::SetAfiAll];
            if material.any_tag_removed() {
                effects.push(Effect::RequireAttention);
            }
            Outcome {
                status: Some(MaterialStatus::AwaitingAfi),
                effects,
            }
        }
        Ok(response) => Outcome {
            status: Some(MaterialStatus::Error),
            effects: vec![
                Effect::NotifyFailed(
                    response
                        .screen_message
                        .clone()
                        .unwrap_or_else(|| GENERIC_CHECKIN_FAILURE.to_string()),
                ),
                Effect::Retire,
            ],
        },
        Err(_) => Outcome {
            status: Some(MaterialStatus::Error),
            effects: vec![
                Effect::NotifyFailed(GENERIC_CHECKIN_FAILURE.to_string()),
                Effect::Retire,
            ],
        },
    }
}

/// The reader confirmed one more AFI write for `material` (already applied
/// to the tag list).
#[must_use]
pub fn on_afi_confirmed(material: &Material) -> Outcome {
    if material.status() == MaterialStatus::AwaitingAfi && material.all_afi_on() {
        Outcome {
            status: Some(MaterialStatus::Sorted),
            effects: vec![
                Effect::AssignToBin,
                Effect::ReleaseAttention,
                Effect::Retire,
            ],
        }
    } else {
        Outcome::none()
    }
}
