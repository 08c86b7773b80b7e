use super::tracked;
use crate::host::{self, Host};
use colored::Colorize;

pub async fn handle(host: &Host, name: &str) -> anyhow::Result<()> {
    let lock = host.state.acquire_lock().await?;
    let mut state = host.state.load().await?;
    let (record, kind) = tracked(&state, name)?;
    let mut data = record.to_data();

    println!("{}", format!("Deleting {} {}...", kind, name).yellow());
    let result = kind
        .delete(&host.config.engine, &host.context(), &host.api, &mut data)
        .await;

    match result {
        Ok(()) => {
            host.commit(&mut state, name, &data).await?;
            lock.release().await?;
            println!("{} {}", "✓ Deleted".green(), name.cyan());
            Ok(())
        }
        Err(diagnostics) => {
            host.save_sandbox().await?;
            lock.release().await?;
            Err(host::failed("delete", name, &diagnostics))
        }
    }
}
