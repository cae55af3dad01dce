//! Receipt ledger: raw backend replies grouped for the receipt collaborator.
//!
//! Every accepted check-in is recorded here, including materials whose AFI
//! step later fails — the circulation system has them as returned either
//! way, and the receipt must say so.

use std::collections::HashMap;

use bookdrop_core::constants::UNKNOWN_PATRON_GROUP;

use crate::backend::CheckInResponse;

/// Accepted check-in replies grouped by patron identifier.
#[derive(Debug, Default)]
pub struct ReceiptLedger {
    groups: HashMap<String, Vec<CheckInResponse>>,
}

impl ReceiptLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one accepted reply under its patron group.
    pub fn record(&mut self, response: CheckInResponse) {
        let group = response
            .patron_identifier
            .clone()
            .unwrap_or_else(|| UNKNOWN_PATRON_GROUP.to_string());
        self.groups.entry(group).or_default().push(response);
    }

    /// All groups recorded so far.
    #[must_use]
    pub fn grouped(&self) -> &HashMap<String, Vec<CheckInResponse>> {
        &self.groups
    }

    /// Total number of recorded replies across groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Whether anything has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Hand the ledger over, leaving this one empty.
    #[must_use]
    pub fn take(&mut self) -> HashMap<String, Vec<CheckInResponse>> {
        std::mem::take(&mut self.groups)
    }
}
