//! Control-plane flow mods and batch download application.
//!
//! A controller frames schedule changes as a download: a start request
//! announcing how many mods follow, the mods themselves, and an end request
//! that commits. [`Download`] mirrors that framing on the datapath side;
//! wire parsing of the controller messages stays with the collaborator that
//! owns the connection.
//!
//! Mods carry an `execute_time`; a committed mod whose time has not come
//! yet is parked in [`PendingMods`] and applied by a later `apply_due`
//! sweep. Commits that touched the send table re-dispatch the plan so the
//! timer picks the new schedule up on its next query.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::context::{Direction, ScheduleContext};
use crate::error::{Error, Result};
use crate::flow::FlowEntry;

/// What a flow mod does to the addressed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowModCommand {
    Add,
    Delete,
}

/// One schedule change from the controller.
///
/// `port` names the vport whose context the mod addresses; routing a mod
/// to that context is the job of whoever owns the port map, so
/// [`Download::commit`] takes the already-resolved context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMod {
    pub port: u16,
    pub direction: Direction,
    pub command: FlowModCommand,
    pub flow_id: u32,
    /// First transmission instant within the period, nanoseconds.
    pub base_offset: u64,
    /// Transmission period, nanoseconds.
    pub period: u64,
    pub buffer_id: u32,
    pub packet_size: u32,
    /// Absolute time at which the mod takes effect; 0 applies immediately.
    pub execute_time: u64,
}

impl FlowMod {
    fn entry(&self) -> FlowEntry {
        FlowEntry {
            flow_id: self.flow_id,
            buffer_id: self.buffer_id,
            period: self.period,
            base_offset: self.base_offset,
            packet_size: self.packet_size,
        }
    }

    /// Apply to the context's tables. Returns whether the send table was
    /// touched.
    fn apply(&self, ctx: &ScheduleContext) -> Result<bool> {
        match self.command {
            FlowModCommand::Add => ctx.insert(self.direction, self.entry())?,
            FlowModCommand::Delete => ctx.delete(self.direction, self.flow_id)?,
        }
        Ok(self.direction == Direction::Send)
    }
}

/// Outcome of a committed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    /// Mods applied immediately.
    pub applied: usize,
    /// Mods parked for a later `apply_due`.
    pub deferred: usize,
    /// Whether the send plan was rebuilt.
    pub redispatched: bool,
}

/// One controller-framed batch of flow mods.
#[derive(Debug)]
pub struct Download {
    expected: u32,
    mods: Vec<FlowMod>,
}

impl Download {
    /// Open a download that announced `expected` mods.
    pub fn begin(expected: u32) -> Self {
        Self {
            expected,
            mods: Vec::with_capacity(expected as usize),
        }
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// Add a mod to the batch. Rejects more mods than announced.
    pub fn push(&mut self, flow_mod: FlowMod) -> Result<()> {
        if self.mods.len() as u32 >= self.expected {
            return Err(Error::DownloadOverflow {
                expected: self.expected,
            });
        }
        self.mods.push(flow_mod);
        Ok(())
    }

    /// Commit the batch against a context at time `now_ns`.
    ///
    /// Verifies the announced count before touching anything. Due mods are
    /// applied in push order; mods with a future `execute_time` move into
    /// `pending`. A commit that changed the send table rebuilds the plan,
    /// or retires it when the last send flow was deleted.
    ///
    /// Mods apply independently, as the controller sent them: when one
    /// fails mid-batch the earlier ones stay applied and the error is
    /// returned.
    pub fn commit(
        self,
        ctx: &ScheduleContext,
        pending: &mut PendingMods,
        now_ns: u64,
    ) -> Result<CommitSummary> {
        let got = self.mods.len() as u32;
        if got != self.expected {
            return Err(Error::DownloadCount {
                expected: self.expected,
                got,
            });
        }

        let mut applied = 0;
        let mut deferred = 0;
        let mut send_touched = false;
        for flow_mod in self.mods {
            if flow_mod.execute_time > now_ns {
                pending.defer(flow_mod);
                deferred += 1;
                continue;
            }
            send_touched |= flow_mod.apply(ctx)?;
            applied += 1;
        }

        let redispatched = redispatch(ctx, send_touched)?;
        info!(
            "flow download committed: {applied} applied, {deferred} deferred, \
             redispatched={redispatched}"
        );
        Ok(CommitSummary {
            applied,
            deferred,
            redispatched,
        })
    }
}

/// Mods committed ahead of their `execute_time`, kept in execution order.
#[derive(Debug, Default)]
pub struct PendingMods {
    mods: Vec<FlowMod>,
}

impl PendingMods {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// Earliest execute time in the queue, for hosts that want to sleep
    /// until the next sweep is useful.
    pub fn next_execute_time(&self) -> Option<u64> {
        self.mods.first().map(|m| m.execute_time)
    }

    fn defer(&mut self, flow_mod: FlowMod) {
        let at = self
            .mods
            .partition_point(|m| m.execute_time <= flow_mod.execute_time);
        self.mods.insert(at, flow_mod);
    }

    /// Apply every queued mod due at `now_ns`, re-dispatching when the
    /// send table changed. Returns how many mods ran.
    pub fn apply_due(&mut self, ctx: &ScheduleContext, now_ns: u64) -> Result<usize> {
        let due = self.mods.partition_point(|m| m.execute_time <= now_ns);
        if due == 0 {
            return Ok(0);
        }

        let mut send_touched = false;
        for flow_mod in self.mods.drain(..due) {
            debug!(
                "applying deferred {:?} for flow {} ({})",
                flow_mod.command, flow_mod.flow_id, flow_mod.direction
            );
            send_touched |= flow_mod.apply(ctx)?;
        }
        redispatch(ctx, send_touched)?;
        Ok(due)
    }
}

fn redispatch(ctx: &ScheduleContext, send_touched: bool) -> Result<bool> {
    if !send_touched {
        return Ok(false);
    }
    match ctx.dispatch() {
        Ok(()) => Ok(true),
        // The batch removed the last send flow; a stale plan must not keep
        // the timer firing.
        Err(Error::NoFlows) => {
            ctx.clear_plan();
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScheduleState;

    fn add(direction: Direction, flow_id: u32, period: u64, base_offset: u64) -> FlowMod {
        FlowMod {
            port: 1,
            direction,
            command: FlowModCommand::Add,
            flow_id,
            base_offset,
            period,
            buffer_id: flow_id,
            packet_size: 64,
            execute_time: 0,
        }
    }

    fn delete(direction: Direction, flow_id: u32) -> FlowMod {
        FlowMod {
            command: FlowModCommand::Delete,
            ..add(direction, flow_id, 1, 0)
        }
    }

    #[test]
    fn commit_applies_and_redispatches() {
        let ctx = ScheduleContext::new(false);
        let mut pending = PendingMods::new();

        let mut dl = Download::begin(2);
        dl.push(add(Direction::Send, 1, 1000, 0)).unwrap();
        dl.push(add(Direction::Send, 2, 1500, 500)).unwrap();
        let summary = dl.commit(&ctx, &mut pending, 0).unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.deferred, 0);
        assert!(summary.redispatched);
        assert_eq!(ctx.plan().unwrap().macro_period(), 3000);
    }

    #[test]
    fn arrive_only_commit_does_not_dispatch() {
        let ctx = ScheduleContext::new(false);
        let mut pending = PendingMods::new();

        let mut dl = Download::begin(1);
        dl.push(add(Direction::Arrive, 1, 1000, 0)).unwrap();
        let summary = dl.commit(&ctx, &mut pending, 0).unwrap();

        assert!(!summary.redispatched);
        assert_eq!(ctx.state(), ScheduleState::Empty);
        assert!(ctx.lookup(Direction::Arrive, 1).is_some());
    }

    #[test]
    fn count_mismatch_mutates_nothing() {
        let ctx = ScheduleContext::new(false);
        let mut pending = PendingMods::new();

        let mut dl = Download::begin(3);
        dl.push(add(Direction::Send, 1, 1000, 0)).unwrap();
        let err = dl.commit(&ctx, &mut pending, 0).unwrap_err();

        assert_eq!(
            err,
            Error::DownloadCount {
                expected: 3,
                got: 1
            }
        );
        assert!(ctx.table(Direction::Send).is_none());
        assert!(pending.is_empty());
    }

    #[test]
    fn push_past_announced_count_fails() {
        let mut dl = Download::begin(1);
        dl.push(add(Direction::Send, 1, 1000, 0)).unwrap();
        let err = dl.push(add(Direction::Send, 2, 1000, 0)).unwrap_err();
        assert_eq!(err, Error::DownloadOverflow { expected: 1 });
    }

    #[test]
    fn future_mods_wait_for_their_execute_time() {
        let ctx = ScheduleContext::new(false);
        let mut pending = PendingMods::new();

        let mut dl = Download::begin(2);
        dl.push(add(Direction::Send, 1, 1000, 0)).unwrap();
        let mut later = add(Direction::Send, 2, 1500, 500);
        later.execute_time = 5000;
        dl.push(later).unwrap();

        let summary = dl.commit(&ctx, &mut pending, 1000).unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.deferred, 1);
        assert_eq!(ctx.plan().unwrap().macro_period(), 1000);
        assert_eq!(pending.next_execute_time(), Some(5000));

        // Not due yet.
        assert_eq!(pending.apply_due(&ctx, 4999).unwrap(), 0);
        assert_eq!(ctx.plan().unwrap().macro_period(), 1000);

        // Due now; the plan reflects both flows.
        assert_eq!(pending.apply_due(&ctx, 5000).unwrap(), 1);
        assert!(pending.is_empty());
        assert_eq!(ctx.plan().unwrap().macro_period(), 3000);
    }

    #[test]
    fn deferred_mods_apply_in_execute_time_order() {
        let ctx = ScheduleContext::new(false);
        let mut pending = PendingMods::new();

        // Two mods on the same flow id: the add at t=2000, a replacing add
        // at t=3000. Order decides the surviving period.
        let mut first = add(Direction::Send, 1, 1000, 0);
        first.execute_time = 2000;
        let mut second = add(Direction::Send, 1, 4000, 0);
        second.execute_time = 3000;

        let mut dl = Download::begin(2);
        dl.push(second.clone()).unwrap();
        dl.push(first.clone()).unwrap();
        dl.commit(&ctx, &mut pending, 0).unwrap();

        assert_eq!(pending.apply_due(&ctx, 10_000).unwrap(), 2);
        assert_eq!(ctx.lookup(Direction::Send, 1).unwrap().period, 4000);
    }

    #[test]
    fn deleting_last_send_flow_retires_the_plan() {
        let ctx = ScheduleContext::new(false);
        let mut pending = PendingMods::new();

        let mut dl = Download::begin(1);
        dl.push(add(Direction::Send, 1, 1000, 0)).unwrap();
        dl.commit(&ctx, &mut pending, 0).unwrap();
        assert_eq!(ctx.state(), ScheduleState::Planned);

        let mut dl = Download::begin(1);
        dl.push(delete(Direction::Send, 1)).unwrap();
        let summary = dl.commit(&ctx, &mut pending, 0).unwrap();
        assert!(!summary.redispatched);
        assert_eq!(ctx.state(), ScheduleState::Empty);
    }

    #[test]
    fn clear_then_download_rebuilds_from_scratch() {
        let ctx = ScheduleContext::new(false);
        let mut pending = PendingMods::new();

        let mut dl = Download::begin(2);
        dl.push(add(Direction::Send, 1, 1000, 0)).unwrap();
        dl.push(add(Direction::Send, 2, 1500, 500)).unwrap();
        dl.commit(&ctx, &mut pending, 0).unwrap();

        ctx.clear(Direction::Send);
        let mut dl = Download::begin(1);
        dl.push(add(Direction::Send, 7, 2000, 0)).unwrap();
        dl.commit(&ctx, &mut pending, 0).unwrap();

        let plan = ctx.plan().unwrap();
        assert_eq!(plan.macro_period(), 2000);
        assert_eq!(plan.events().len(), 1);
        assert_eq!(plan.events()[0].flow_id, 7);
        assert!(ctx.lookup(Direction::Send, 1).is_none());
    }
}
