use crate::host::{self, Host};
use colored::Colorize;
use steadystate_connect::ResourceKind;

pub async fn handle(host: &Host, name: &str, kind: ResourceKind, id: &str) -> anyhow::Result<()> {
    let lock = host.state.acquire_lock().await?;
    let mut state = host.state.load().await?;
    if state.get(name).is_some() {
        anyhow::bail!("'{}' is already tracked", name);
    }

    let result = kind
        .import(&host.config.engine, &host.context(), &host.api, id)
        .await;

    match result {
        Ok(data) => {
            host.commit(&mut state, name, &data).await?;
            lock.release().await?;
            println!("{} {} ({})", "✓ Imported".green(), name.cyan(), id);
            host::print_attributes(&data);
            Ok(())
        }
        Err(diagnostics) => {
            host.save_sandbox().await?;
            lock.release().await?;
            Err(host::failed("import", name, &diagnostics))
        }
    }
}
