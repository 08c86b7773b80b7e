use crate::SandboxCommands;
use crate::host::Host;
use colored::Colorize;

pub async fn handle(host: &Host, command: SandboxCommands) -> anyhow::Result<()> {
    if let SandboxCommands::Show = command {
        println!("{}", serde_json::to_string_pretty(&host.api.describe())?);
        return Ok(());
    }

    let lock = host.state.acquire_lock().await?;
    let added = match command {
        SandboxCommands::Instance { instance_id } => {
            host.api.add_instance(&instance_id);
            format!("instance {}", instance_id)
        }
        SandboxCommands::Queue {
            instance_id,
            queue_id,
        } => {
            host.api.add_queue(&instance_id, &queue_id)?;
            format!("queue {} in {}", queue_id, instance_id)
        }
        SandboxCommands::QuickConnect {
            instance_id,
            quick_connect_id,
            name,
        } => {
            let name = name.unwrap_or_else(|| quick_connect_id.clone());
            host.api
                .add_quick_connect(&instance_id, &quick_connect_id, &name)?;
            format!("quick connect {} in {}", quick_connect_id, instance_id)
        }
        SandboxCommands::PhoneNumber {
            instance_id,
            phone_number_id,
        } => {
            host.api.add_phone_number(&instance_id, &phone_number_id)?;
            format!("phone number {} in {}", phone_number_id, instance_id)
        }
        SandboxCommands::ContactFlow {
            instance_id,
            contact_flow_id,
        } => {
            host.api.add_contact_flow(&instance_id, &contact_flow_id)?;
            format!("contact flow {} in {}", contact_flow_id, instance_id)
        }
        SandboxCommands::Show => return Ok(()),
    };

    host.save_sandbox().await?;
    lock.release().await?;
    println!("{} {}", "✓ Added".green(), added);
    Ok(())
}
