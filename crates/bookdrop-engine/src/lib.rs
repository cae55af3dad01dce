//! RFID return-processing engine for the Bookdrop kiosk.
//!
//! This crate reconciles two independent asynchronous sources — tag events
//! from the reader bridge and check-in confirmations from the circulation
//! backend — into a per-material lifecycle that ends with the item secured
//! and routed to a physical sorting destination.
//!
//! # Architecture
//!
//! ```text
//!                 ┌────────────┐   events    ┌──────────────────────────┐
//! RFID reader ───►│ReaderBridge│────────────►│       ReturnEngine       │
//!             ◄───│ (bridge)   │◄──commands──│  ┌────────────────────┐  │
//!                 └────────────┘             │  │ MaterialCorrelator │  │
//!                                            │  │ transition guards  │  │
//!        ┌───────────────────┐   check-in    │  │ AttentionSet       │  │
//!        │CirculationBackend │◄──────────────│  │ BinSorter          │  │
//!        │      (trait)      │───reply──────►│  │ ReceiptLedger      │  │
//!        └───────────────────┘               │  └────────────────────┘  │
//!                                            └──────────┬───────────────┘
//!                                                       │ UiNotification
//!                                                       ▼
//!                                                 kiosk UI shell
//! ```
//!
//! The pieces talk through direct typed channels and method calls; there is
//! no process-wide event bus. Transition guards live in [`transition`] as
//! pure functions, the loop in [`engine`] interprets their effects.
//!
//! # Lifecycle
//!
//! A material moves `Collecting → CheckingIn → AwaitingAfi → Sorted`, or
//! `CheckingIn → Error` on a backend rejection. Tag removal never fails a
//! material: while collecting it just blocks the completeness guard, and
//! after check-in it parks the material in the attention set until the tag
//! is put back (see [`recovery`]).

pub mod backend;
pub mod correlator;
pub mod engine;
pub mod material;
pub mod notify;
pub mod receipt;
pub mod recovery;
pub mod series;
pub mod sorter;
pub mod transition;

pub use backend::{
    BackendError, BackendResult, CheckInResponse, CirculationBackend, ItemProperties,
};
pub use correlator::{MaterialCorrelator, Observation};
pub use engine::{EngineConfig, EngineHandle, EngineStopped, ReturnEngine, SessionSummary};
pub use material::{Material, TagArrival};
pub use notify::{MaterialView, UiNotification};
pub use receipt::ReceiptLedger;
pub use recovery::AttentionSet;
pub use series::{SeriesDirectory, TableSeriesDirectory};
pub use sorter::{Bin, BinSorter, BinSortingConfig, Pager};
pub use transition::{Effect, GENERIC_CHECKIN_FAILURE, Outcome};
