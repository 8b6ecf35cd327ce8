pub mod next;
pub mod plan;
pub mod shim;
pub mod simulate;

use std::error::Error;
use std::path::Path;

use ttflow_core::{Direction, FlowEntry, ScheduleContext};

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Load a flow set: a JSON array of schedule entries.
pub fn load_flows(path: &Path) -> Result<Vec<FlowEntry>, Box<dyn Error>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let flows: Vec<FlowEntry> =
        serde_json::from_str(&data).map_err(|e| format!("invalid flow set: {e}"))?;
    if flows.is_empty() {
        return Err("flow set is empty".into());
    }
    Ok(flows)
}

/// Build a dispatched context whose send table holds the flow set.
pub fn context_for(flows: Vec<FlowEntry>) -> Result<ScheduleContext, Box<dyn Error>> {
    let ctx = ScheduleContext::new(true);
    for flow in flows {
        ctx.insert(Direction::Send, flow)?;
    }
    ctx.dispatch()?;
    Ok(ctx)
}
