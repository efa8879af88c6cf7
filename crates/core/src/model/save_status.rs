use std::fmt;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Synchronization state of the local draft against the grading service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SaveStatus {
    /// Nothing to save yet.
    #[default]
    Idle,
    /// Local draft is ahead of the remote copy.
    Unsaved,
    /// A network call is outstanding.
    Saving,
    /// Remote copy matched the draft as of the last successful call.
    Saved,
    /// Last call failed; the draft may still be ahead of the remote copy.
    Error,
}

impl SaveStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Unsaved => "unsaved",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }

    /// States from which the pre-submit flush has something to reconcile.
    #[must_use]
    pub fn needs_flush(self) -> bool {
        matches!(self, Self::Unsaved | Self::Error)
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable view of the tracker: status plus draft revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveState {
    pub status: SaveStatus,
    /// Number of draft mutations seen so far. Never decreases.
    pub revision: u64,
}

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

/// Proof that the holder owns the current `saving` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    id: u64,
    revision: u64,
}

impl SaveTicket {
    /// Draft revision captured when the dispatch began.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Pure `idle → unsaved → saving → {saved | error}` state machine.
///
/// Only one ticket owns the status at a time. A mutation recorded while a
/// ticket is live keeps the status at `saving` and turns the settlement into
/// `unsaved`, whatever the outcome of the call.
///
/// A ticket taken over by [`begin_exclusive`](Self::begin_exclusive) still
/// stands for a network call. It no longer moves the status, but `begin`
/// refuses until it settles.
#[derive(Debug, Clone, Default)]
pub struct SaveTracker {
    status: SaveStatus,
    revision: u64,
    next_ticket: u64,
    in_flight: Option<SaveTicket>,
    orphaned: Vec<SaveTicket>,
}

impl SaveTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> SaveStatus {
        self.status
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn state(&self) -> SaveState {
        SaveState {
            status: self.status,
            revision: self.revision,
        }
    }

    /// True while any call is outstanding, including superseded ones.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some() || !self.orphaned.is_empty()
    }

    /// Record a draft mutation.
    pub fn mark_dirty(&mut self) {
        self.revision += 1;
        if self.in_flight.is_none() {
            self.status = SaveStatus::Unsaved;
        }
    }

    /// Enter `saving` unless a call is already outstanding.
    pub fn begin(&mut self) -> Option<SaveTicket> {
        if self.is_saving() {
            return None;
        }
        Some(self.issue())
    }

    /// Enter `saving` unconditionally, orphaning any outstanding ticket.
    ///
    /// Used by the terminal submit, which must not be overwritten by a save
    /// that settles after it started.
    pub fn begin_exclusive(&mut self) -> SaveTicket {
        if let Some(previous) = self.in_flight.take() {
            self.orphaned.push(previous);
        }
        self.issue()
    }

    /// Settle the call identified by `ticket`.
    ///
    /// Returns `false` and leaves the status untouched when the ticket no
    /// longer owns it. An orphaned ticket is released either way.
    pub fn settle(&mut self, ticket: SaveTicket, ok: bool) -> bool {
        if self.in_flight != Some(ticket) {
            self.orphaned.retain(|t| *t != ticket);
            return false;
        }
        self.in_flight = None;
        self.status = if self.revision > ticket.revision {
            SaveStatus::Unsaved
        } else if ok {
            SaveStatus::Saved
        } else {
            SaveStatus::Error
        };
        true
    }

    fn issue(&mut self) -> SaveTicket {
        self.next_ticket += 1;
        let ticket = SaveTicket {
            id: self.next_ticket,
            revision: self.revision,
        };
        self.in_flight = Some(ticket);
        self.status = SaveStatus::Saving;
        ticket
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
