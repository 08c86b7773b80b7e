pub mod create;
pub mod delete;
pub mod import;
pub mod kinds;
pub mod list;
pub mod read;
pub mod sandbox;
pub mod update;

use steadystate_connect::ResourceKind;
use steadystate_core::{HostState, InstanceRecord};

/// Look up a tracked instance and its kind
pub(crate) fn tracked<'a>(
    state: &'a HostState,
    name: &str,
) -> anyhow::Result<(&'a InstanceRecord, ResourceKind)> {
    let record = state
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("'{}' is not tracked (see `steady list`)", name))?;
    let kind = record.resource_type.parse::<ResourceKind>()?;
    Ok((record, kind))
}
