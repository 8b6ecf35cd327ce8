//! Per-flow schedule entries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest flow id a table will accept. Flow ids double as dense slot
/// indices, so this bounds table growth.
pub const FLOW_ID_MAX: u32 = 1024;

/// Scheduling record for one periodic flow.
///
/// A flow emits one packet per `period`, the first at `base_offset` within
/// the macro-period. The entry is immutable once inserted; replacing a flow
/// means inserting a new entry under the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEntry {
    /// Flow identifier, unique within a port. Also the table slot index.
    pub flow_id: u32,
    /// Handle into the external per-flow packet buffer.
    pub buffer_id: u32,
    /// Transmission period in nanoseconds. Always positive.
    pub period: u64,
    /// First transmission instant within the macro-period. Always below
    /// `period`.
    pub base_offset: u64,
    /// Packet size in octets.
    pub packet_size: u32,
}

impl FlowEntry {
    /// Check the schedule invariants: positive period, offset inside the
    /// period, flow id within the table limit.
    pub fn validate(&self) -> Result<()> {
        if self.period == 0 {
            return Err(Error::InvalidEntry {
                flow_id: self.flow_id,
                reason: "period is zero",
            });
        }
        if self.base_offset >= self.period {
            return Err(Error::InvalidEntry {
                flow_id: self.flow_id,
                reason: "base offset is not below the period",
            });
        }
        if self.flow_id > FLOW_ID_MAX {
            return Err(Error::CapacityExceeded {
                flow_id: self.flow_id,
            });
        }
        Ok(())
    }
}
