use super::tracked;
use crate::host::{self, Host};
use colored::Colorize;
use steadystate_core::ReadOutcome;

pub async fn handle(host: &Host, name: &str) -> anyhow::Result<()> {
    let lock = host.state.acquire_lock().await?;
    let mut state = host.state.load().await?;
    let (record, kind) = tracked(&state, name)?;
    let mut data = record.to_data();

    let result = kind
        .read(&host.config.engine, &host.context(), &host.api, &mut data)
        .await;

    match result {
        Ok(outcome) => {
            host.commit(&mut state, name, &data).await?;
            lock.release().await?;

            match outcome {
                ReadOutcome::Found => {
                    println!(
                        "{} {} ({})",
                        "✓".green(),
                        name.cyan(),
                        data.id().unwrap_or_default()
                    );
                    host::print_attributes(&data);
                }
                ReadOutcome::Removed => {
                    println!(
                        "{}",
                        format!("'{}' no longer exists remotely; stopped tracking it", name)
                            .yellow()
                    );
                }
            }
            Ok(())
        }
        Err(diagnostics) => {
            host.save_sandbox().await?;
            lock.release().await?;
            Err(host::failed("read", name, &diagnostics))
        }
    }
}
