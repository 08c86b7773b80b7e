use crate::host::{self, Host};
use colored::Colorize;
use steadystate_connect::ResourceKind;
use steadystate_core::ResourceData;

pub async fn handle(host: &Host, name: &str, kind: ResourceKind, attrs: &str) -> anyhow::Result<()> {
    let attrs = host::parse_attrs(attrs)?;

    let lock = host.state.acquire_lock().await?;
    let mut state = host.state.load().await?;
    if let Some(existing) = state.get(name) {
        anyhow::bail!(
            "'{}' is already tracked as {} ({})",
            name,
            existing.resource_type,
            existing.id
        );
    }

    println!("{}", format!("Creating {} {}...", kind, name).blue());
    let mut data = ResourceData::with_attributes(kind.type_name(), attrs.clone());
    let result = kind
        .create(&host.config.engine, &host.context(), &host.api, &mut data)
        .await;

    // A token assigned before a later failure is still tracked, together
    // with the attributes that were asked for
    match (&result, data.id()) {
        (Err(_), Some(id)) => {
            let requested = ResourceData::from_state(kind.type_name(), id, attrs);
            host.commit(&mut state, name, &requested).await?;
        }
        _ => host.commit(&mut state, name, &data).await?,
    }
    lock.release().await?;

    match result {
        Ok(()) => {
            println!(
                "{} {} ({})",
                "✓ Created".green(),
                name.cyan(),
                data.id().unwrap_or_default()
            );
            host::print_attributes(&data);
            Ok(())
        }
        Err(diagnostics) => {
            if let Some(id) = data.id() {
                eprintln!(
                    "{}",
                    format!("'{}' exists as {} but did not settle", name, id).yellow()
                );
            }
            host::print_last_observed(&diagnostics, &data);
            Err(host::failed("create", name, &diagnostics))
        }
    }
}
