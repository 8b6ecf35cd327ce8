//! Per-vport schedule context.
//!
//! A [`ScheduleContext`] binds the arrive and send flow tables, the current
//! [`SchedulePlan`] and the timer flag for one virtual switch port. Table
//! and plan handles are published through atomic swaps; a reader either
//! sees the previous version intact or the new one intact. The context is
//! owned by its port, with one control-plane writer and any number of
//! packet-path readers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flow::FlowEntry;
use crate::schedule::{NextSend, SchedulePlan};
use crate::table::FlowTable;

/// Which of the port's two flow tables an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Flows this port transmits.
    Send,
    /// Flows expected to arrive at this port.
    Arrive,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::Arrive => write!(f, "arrive"),
        }
    }
}

/// Visible lifecycle of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    /// No plan has been dispatched.
    Empty,
    /// A plan exists; no timer is armed.
    Planned,
    /// A plan exists and a timer driver is running against it.
    Armed,
}

impl std::fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Planned => write!(f, "planned"),
            Self::Armed => write!(f, "armed"),
        }
    }
}

/// Point-in-time context summary for operators.
#[derive(Debug, Clone, Serialize)]
pub struct ContextStatus {
    pub state: ScheduleState,
    pub edge_port: bool,
    pub send_flows: u32,
    pub send_capacity: usize,
    pub arrive_flows: u32,
    pub arrive_capacity: usize,
    pub macro_period: Option<u64>,
    pub plan_events: Option<usize>,
}

/// Schedule state for one virtual switch port.
pub struct ScheduleContext {
    arrive_table: ArcSwapOption<FlowTable>,
    send_table: ArcSwapOption<FlowTable>,
    plan: ArcSwapOption<SchedulePlan>,
    timer_armed: AtomicBool,
    edge_port: bool,
}

impl ScheduleContext {
    /// Create an empty context. `edge_port` marks a port attached directly
    /// to an end-station; policy outside the scheduler consumes it.
    pub fn new(edge_port: bool) -> Self {
        Self {
            arrive_table: ArcSwapOption::const_empty(),
            send_table: ArcSwapOption::const_empty(),
            plan: ArcSwapOption::const_empty(),
            timer_armed: AtomicBool::new(false),
            edge_port,
        }
    }

    pub fn is_edge_port(&self) -> bool {
        self.edge_port
    }

    fn table_cell(&self, direction: Direction) -> &ArcSwapOption<FlowTable> {
        match direction {
            Direction::Send => &self.send_table,
            Direction::Arrive => &self.arrive_table,
        }
    }

    /// Current table handle for a direction, if one has been created.
    pub fn table(&self, direction: Direction) -> Option<Arc<FlowTable>> {
        self.table_cell(direction).load_full()
    }

    /// Look up a live entry. This is the control-plane query operation and
    /// is safe from any thread.
    pub fn lookup(&self, direction: Direction, flow_id: u32) -> Option<Arc<FlowEntry>> {
        self.table(direction)?.lookup(flow_id)
    }

    /// Insert an entry into a direction's table, creating the table on
    /// first use. Single control-plane writer only.
    pub fn insert(&self, direction: Direction, entry: FlowEntry) -> Result<()> {
        let cell = self.table_cell(direction);
        let table = cell.load_full().unwrap_or_else(FlowTable::new);
        let table = table.insert(entry)?;
        cell.store(Some(table));
        Ok(())
    }

    /// Delete an entry from a direction's table. Single writer only.
    pub fn delete(&self, direction: Direction, flow_id: u32) -> Result<()> {
        let Some(table) = self.table_cell(direction).load_full() else {
            return Err(Error::UnknownFlow(flow_id));
        };
        let table = table.delete(flow_id)?;
        self.table_cell(direction).store(Some(table));
        Ok(())
    }

    /// Drop a direction's whole table, the clear-old step before a fresh
    /// download. The current plan, if any, stays in force until the next
    /// dispatch. Single writer only.
    pub fn clear(&self, direction: Direction) {
        self.table_cell(direction).store(None);
    }

    /// Rebuild the send plan from the current send-table snapshot and
    /// publish it atomically.
    ///
    /// On failure the prior plan remains in force. In-flight queries
    /// against a displaced plan keep their handle until they return.
    pub fn dispatch(&self) -> Result<()> {
        let table = self.send_table.load_full().ok_or(Error::NoSendTable)?;
        let plan = SchedulePlan::build(&table)?;
        self.plan.store(Some(Arc::new(plan)));
        Ok(())
    }

    /// Retire the current plan without replacing it. Used when the send
    /// table has been emptied and a stale plan must not keep firing.
    pub fn clear_plan(&self) {
        self.plan.store(None);
    }

    /// Current plan handle, if a dispatch has succeeded.
    pub fn plan(&self) -> Option<Arc<SchedulePlan>> {
        self.plan.load_full()
    }

    /// Which flow transmits next at `now_ns`. Wait-free; fails only when
    /// no plan has been dispatched.
    pub fn next_event(&self, now_ns: u64) -> Result<NextSend> {
        let plan = self.plan.load_full().ok_or(Error::NoPlan)?;
        Ok(plan.next_event(now_ns))
    }

    /// Record whether a timer driver is running. The scheduler itself
    /// never arms timers; drivers flip this around their lifetime.
    pub fn set_armed(&self, armed: bool) {
        self.timer_armed.store(armed, Ordering::Release);
    }

    pub fn state(&self) -> ScheduleState {
        if self.plan.load().is_none() {
            ScheduleState::Empty
        } else if self.timer_armed.load(Ordering::Acquire) {
            ScheduleState::Armed
        } else {
            ScheduleState::Planned
        }
    }

    /// Operator-facing summary of the context.
    pub fn status(&self) -> ContextStatus {
        let send = self.send_table.load_full();
        let arrive = self.arrive_table.load_full();
        let plan = self.plan.load_full();
        ContextStatus {
            state: self.state(),
            edge_port: self.edge_port,
            send_flows: send.as_ref().map_or(0, |t| t.num_items()),
            send_capacity: send.as_ref().map_or(0, |t| t.capacity()),
            arrive_flows: arrive.as_ref().map_or(0, |t| t.num_items()),
            arrive_capacity: arrive.as_ref().map_or(0, |t| t.capacity()),
            macro_period: plan.as_ref().map(|p| p.macro_period()),
            plan_events: plan.as_ref().map(|p| p.events().len()),
        }
    }
}

impl std::fmt::Debug for ScheduleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleContext")
            .field("state", &self.state())
            .field("edge_port", &self.edge_port)
            .finish()
    }
}
