use super::tracked;
use crate::host::{self, Host};
use colored::Colorize;

pub async fn handle(host: &Host, name: &str, attrs: &str) -> anyhow::Result<()> {
    let changes = host::parse_attrs(attrs)?;

    let lock = host.state.acquire_lock().await?;
    let mut state = host.state.load().await?;
    let (record, kind) = tracked(&state, name)?;
    let mut data = record.to_data();
    data.merge(changes);

    println!("{}", format!("Updating {} {}...", kind, name).blue());
    let result = kind
        .update(&host.config.engine, &host.context(), &host.api, &mut data)
        .await;

    match result {
        Ok(summary) => {
            host.commit(&mut state, name, &data).await?;
            lock.release().await?;

            if summary.add + summary.replace + summary.remove == 0 {
                println!("{} {} is up to date", "✓".green(), name.cyan());
            } else {
                println!("{} {}: {}", "✓ Updated".green(), name.cyan(), summary);
            }
            host::print_attributes(&data);
            Ok(())
        }
        Err(diagnostics) => {
            // The merged attributes were not applied; state keeps the last
            // committed view
            host.save_sandbox().await?;
            lock.release().await?;
            host::print_last_observed(&diagnostics, &data);
            Err(host::failed("update", name, &diagnostics))
        }
    }
}
