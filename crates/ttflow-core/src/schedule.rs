//! Macro-period schedule plans and next-event queries.
//!
//! A plan is built from one flow table snapshot: the macro-period is the
//! LCM of every populated period, and the event list enumerates each flow's
//! arithmetic progression `base_offset, base_offset + period, ...` within
//! it, sorted by send time. Queries reduce the wall clock modulo the
//! macro-period and binary-search the event list, so they are wait-free and
//! O(log n) regardless of how far the clock has run.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::flow::FlowEntry;
use crate::table::FlowTable;

/// Upper bound on events in a single plan. A build whose LCM expansion
/// would exceed this is rejected and the prior plan stays in force.
pub const PLAN_EVENTS_MAX: u64 = 1 << 20;

/// One transmission instant within the macro-period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleEvent {
    /// Offset from the start of the macro-period, nanoseconds.
    pub send_time: u64,
    pub flow_id: u32,
}

/// Answer to a next-event query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NextSend {
    /// Flow that transmits next.
    pub flow_id: u32,
    /// Gap from this event to the one after it, nanoseconds.
    pub wait_time: u64,
    /// Offset to add to the query time to reach the firing instant.
    pub send_offset: u64,
}

/// Immutable transmission schedule spanning one macro-period.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulePlan {
    macro_period: u64,
    events: Box<[ScheduleEvent]>,
}

impl SchedulePlan {
    /// Build a plan from a table snapshot.
    ///
    /// Fails with [`Error::NoFlows`] on a table with no populated entries,
    /// [`Error::MacroPeriodOverflow`] when the period LCM leaves u64, and
    /// [`Error::PlanTooLarge`] past [`PLAN_EVENTS_MAX`]. Entries added to
    /// the table while the build runs may or may not be reflected; the next
    /// build will include them.
    pub fn build(table: &FlowTable) -> Result<Self> {
        let entries: Vec<Arc<FlowEntry>> = table.entries().collect();
        if entries.is_empty() {
            return Err(Error::NoFlows);
        }

        let mut macro_period: u64 = 1;
        for entry in &entries {
            macro_period =
                lcm(macro_period, entry.period).ok_or(Error::MacroPeriodOverflow)?;
        }

        let size: u64 = entries.iter().map(|e| macro_period / e.period).sum();
        if size > PLAN_EVENTS_MAX {
            return Err(Error::PlanTooLarge { events: size });
        }

        let mut events = Vec::with_capacity(size as usize);
        for entry in &entries {
            let mut offset = entry.base_offset;
            while offset < macro_period {
                events.push(ScheduleEvent {
                    send_time: offset,
                    flow_id: entry.flow_id,
                });
                offset += entry.period;
            }
        }
        events.sort_unstable_by_key(|event| event.send_time);

        let ties = events
            .windows(2)
            .filter(|pair| pair[0].send_time == pair[1].send_time)
            .count();
        if ties > 0 {
            // The schedule prescribes simultaneous transmissions; the
            // egress path has to serialize or drop them.
            warn!("schedule plan contains {ties} tied send times");
        }
        debug!(
            "built schedule plan: macro_period={macro_period}ns, {} events from {} flows",
            events.len(),
            entries.len()
        );

        Ok(Self {
            macro_period,
            events: events.into_boxed_slice(),
        })
    }

    /// Least common multiple of all flow periods, nanoseconds.
    pub fn macro_period(&self) -> u64 {
        self.macro_period
    }

    /// The sorted transmission instants.
    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    /// Which flow transmits next at `now_ns`.
    ///
    /// The result's `send_offset` added to `now_ns` gives the absolute
    /// firing instant; `wait_time` is the gap to the event after that, for
    /// callers that rearm a periodic timer.
    pub fn next_event(&self, now_ns: u64) -> NextSend {
        let mod_time = now_ns % self.macro_period;
        let idx = self.first_after(mod_time);
        let next_idx = (idx + 1) % self.events.len();
        let current = self.events[idx];

        let wait_time = if next_idx == 0 {
            self.events[0].send_time + self.macro_period - current.send_time
        } else {
            self.events[next_idx].send_time - current.send_time
        };
        let send_offset = if mod_time > current.send_time {
            self.macro_period - mod_time + current.send_time
        } else {
            current.send_time - mod_time
        };

        NextSend {
            flow_id: current.flow_id,
            wait_time,
            send_offset,
        }
    }

    /// Index of the first event strictly after `mod_time`, wrapping to 0
    /// when `mod_time` is at or past the last event of the period.
    fn first_after(&self, mod_time: u64) -> usize {
        let mut left = 0;
        let mut right = self.events.len();
        while left < right {
            let mid = left + (right - left) / 2;
            if self.events[mid].send_time <= mod_time {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        left % self.events.len()
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

fn lcm(a: u64, b: u64) -> Option<u64> {
    (a / gcd(a, b)).checked_mul(b)
}
