use std::path::Path;

use super::{CommandResult, context_for, load_flows};

pub fn run(file: &Path, at: u64, json: bool) -> CommandResult {
    let ctx = context_for(load_flows(file)?)?;
    let next = ctx.next_event(at)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&next)?);
        return Ok(());
    }

    println!("At t={at} ns:");
    println!("  flow {} fires in {} ns (t={})", next.flow_id, next.send_offset, at + next.send_offset);
    println!("  gap to the following event: {} ns", next.wait_time);
    Ok(())
}
