//! Crate-wide error types.
//!
//! Every fallible operation returns [`Result`]. There is no global error
//! state and nothing retries internally; a failed call leaves the table,
//! the plan and the packet exactly as they were.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from table mutation, plan construction and packet rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Insert would grow the table past [`FLOW_ID_MAX`](crate::flow::FLOW_ID_MAX).
    #[error("flow id {flow_id} exceeds the table capacity limit")]
    CapacityExceeded { flow_id: u32 },

    /// Delete or query addressed a slot outside the table.
    #[error("no flow with id {0}")]
    UnknownFlow(u32),

    /// Entry violates the schedule invariants.
    #[error("invalid entry for flow {flow_id}: {reason}")]
    InvalidEntry { flow_id: u32, reason: &'static str },

    /// Plan construction would produce more events than the builder allows.
    #[error("schedule plan too large: {events} events")]
    PlanTooLarge { events: u64 },

    /// The least common multiple of the flow periods does not fit in u64.
    #[error("macro-period overflows u64")]
    MacroPeriodOverflow,

    /// Packet is too short for the requested read or rewrite.
    #[error("packet truncated: need {needed} bytes, have {len}")]
    Truncated { needed: usize, len: usize },

    /// `trdp_to_tt` was called on a packet that is not TRDP.
    #[error("packet is not a TRDP packet")]
    NotTrdp,

    /// `tt_to_trdp` was called on a packet that is not TT.
    #[error("packet is not a TT packet")]
    NotTt,

    /// Dispatch requested while the context has no send table.
    #[error("schedule context has no send table")]
    NoSendTable,

    /// Dispatch requested against a table with no populated entries.
    #[error("send table has no flows to schedule")]
    NoFlows,

    /// Next-event query before any successful dispatch.
    #[error("no schedule plan has been dispatched")]
    NoPlan,

    /// Batch download committed with a different entry count than announced.
    #[error("flow download announced {expected} entries, got {got}")]
    DownloadCount { expected: u32, got: u32 },

    /// Batch download received more entries than announced.
    #[error("flow download overflow: more than {expected} entries pushed")]
    DownloadOverflow { expected: u32 },
}
