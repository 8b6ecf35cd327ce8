use std::path::Path;

use super::{CommandResult, context_for, load_flows};

pub fn run(file: &Path, json: bool) -> CommandResult {
    let flows = load_flows(file)?;
    let n_flows = flows.len();
    let ctx = context_for(flows)?;
    let plan = ctx.plan().ok_or("dispatch did not produce a plan")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*plan)?);
        return Ok(());
    }

    println!(
        "Macro-period: {} ns ({} flows, {} events)\n",
        plan.macro_period(),
        n_flows,
        plan.events().len()
    );
    println!("  {:>12}  {:>8}", "send_time", "flow");
    for event in plan.events() {
        println!("  {:>12}  {:>8}", event.send_time, event.flow_id);
    }
    Ok(())
}
