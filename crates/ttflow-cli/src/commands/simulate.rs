use std::path::Path;

use ttflow_core::{Clock, VirtualClock};

use super::{CommandResult, context_for, load_flows};

/// Walk the schedule event by event on a virtual clock, printing each
/// firing. Purely deterministic; nothing sleeps.
pub fn run(file: &Path, count: u32, start: u64) -> CommandResult {
    let ctx = context_for(load_flows(file)?)?;
    let plan = ctx.plan().ok_or("dispatch did not produce a plan")?;
    let clock = VirtualClock::new(start);

    println!(
        "Simulating {count} firings from t={start} ns (macro-period {} ns)\n",
        plan.macro_period()
    );
    for i in 1..=count {
        let next = ctx.next_event(clock.now_ns())?;
        clock.advance(next.send_offset);
        let entry = ctx
            .lookup(ttflow_core::Direction::Send, next.flow_id)
            .ok_or_else(|| format!("flow {} missing from table", next.flow_id))?;
        println!(
            "  #{i:<4} t={:<12} flow {:<4} ({} octets, buffer {})",
            clock.now_ns(),
            next.flow_id,
            entry.packet_size,
            entry.buffer_id
        );
    }
    Ok(())
}
