//! # ttflow-core
//!
//! Deterministic time-triggered (TT) transmission scheduling for the send
//! path of a virtual switch port.
//!
//! Every flow is periodic: one packet per `period`, first sent at
//! `base_offset`. The scheduler folds all periods into a macro-period (the
//! LCM), enumerates and sorts every transmission instant within it, and
//! answers "which flow transmits next at time `t`" with a binary search
//! under modular time. The codec moves packets between their raw UDP form
//! (TRDP, destination port 63000) and the shim-encapsulated TT form
//! (EtherType 0x88D7) used on the wire.
//!
//! ## Quick start
//!
//! ```
//! use ttflow_core::{Direction, FlowEntry, ScheduleContext};
//!
//! let ctx = ScheduleContext::new(true);
//! for (flow_id, period, base_offset) in [(1, 1000, 0), (2, 1500, 500)] {
//!     ctx.insert(Direction::Send, FlowEntry {
//!         flow_id,
//!         buffer_id: flow_id,
//!         period,
//!         base_offset,
//!         packet_size: 256,
//!     })?;
//! }
//! ctx.dispatch()?;
//!
//! // The two periods fold into a 3000ns macro-period; at t=250 the next
//! // transmission is flow 2's first, 250ns away.
//! let next = ctx.next_event(250)?;
//! assert_eq!(next.flow_id, 2);
//! assert_eq!(next.send_offset, 250);
//! # Ok::<(), ttflow_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Control plane → [`FlowTable`] → [`SchedulePlan`] → [`TransmitTimer`]
//!
//! The table takes one control-plane writer and any number of packet-path
//! readers; tables, slots and plans are published through atomic handle
//! swaps and reclaimed when their last reader lets go. Queries are
//! wait-free. The scheduler never arms timers itself; [`TransmitTimer`] is
//! a host-side driver over the exposed timings.

pub mod clock;
pub mod context;
pub mod control;
pub mod error;
pub mod flow;
pub mod packet;
pub mod schedule;
pub mod shim;
pub mod table;
pub mod timer;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use context::{ContextStatus, Direction, ScheduleContext, ScheduleState};
pub use control::{CommitSummary, Download, FlowMod, FlowModCommand, PendingMods};
pub use error::{Error, Result};
pub use flow::{FLOW_ID_MAX, FlowEntry};
pub use packet::PacketBuf;
pub use schedule::{NextSend, PLAN_EVENTS_MAX, ScheduleEvent, SchedulePlan};
pub use shim::{ETH_P_TT, SHIM_LEN, ShimHeader, TT_PORT, is_trdp, is_tt, trdp_to_tt, tt_to_trdp};
pub use table::{FlowTable, TABLE_MIN};
pub use timer::TransmitTimer;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
