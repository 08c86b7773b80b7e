use crate::host::Host;
use colored::Colorize;

pub async fn handle(host: &Host) -> anyhow::Result<()> {
    let state = host.state.load().await?;

    if state.instances.is_empty() {
        println!("{}", "No tracked resources".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<20} {:<36} {:<40} {}", "NAME", "TYPE", "ID", "UPDATED").bold()
    );
    for (name, record) in &state.instances {
        println!(
            "{:<20} {:<36} {:<40} {}",
            name.cyan(),
            record.resource_type,
            record.id,
            record.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
