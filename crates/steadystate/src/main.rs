mod commands;
mod host;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use steadystate_connect::ResourceKind;

#[derive(Parser)]
#[command(name = "steady")]
#[command(about = "Converge remote resources to what you declared, one identity at a time", long_about = None)]
struct Cli {
    /// Project directory holding .steadystate/
    #[arg(short = 'C', long, global = true, env = "STEADYSTATE_DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a resource and start tracking it
    Create {
        /// Instance name in the state file
        name: String,
        /// Resource type (see `steady kinds`)
        #[arg(short, long)]
        kind: ResourceKind,
        /// Desired attributes as a JSON object
        #[arg(short, long)]
        attrs: String,
    },
    /// Refresh a tracked resource from the remote
    Read {
        name: String,
    },
    /// Merge new attributes and converge the remote
    Update {
        name: String,
        /// Attributes to change, as a JSON object
        #[arg(short, long)]
        attrs: String,
    },
    /// Delete a tracked resource
    Delete {
        name: String,
    },
    /// Start tracking an existing resource by its identity
    Import {
        name: String,
        /// Identity token, e.g. inst-1,https://example.com
        id: String,
        #[arg(short, long)]
        kind: ResourceKind,
    },
    /// List tracked resources
    List,
    /// List supported resource types
    Kinds,
    /// Seed or inspect the local sandbox API
    #[command(subcommand)]
    Sandbox(SandboxCommands),
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub(crate) enum SandboxCommands {
    /// Add an instance
    Instance { instance_id: String },
    /// Add a queue to an instance
    Queue {
        instance_id: String,
        queue_id: String,
    },
    /// Add a quick connect to an instance
    QuickConnect {
        instance_id: String,
        quick_connect_id: String,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Add a phone number to an instance
    PhoneNumber {
        instance_id: String,
        phone_number_id: String,
    },
    /// Add a contact flow to an instance
    ContactFlow {
        instance_id: String,
        contact_flow_id: String,
    },
    /// Print the sandbox contents
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("steadystate {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Kinds => {
            commands::kinds::handle();
            return Ok(());
        }
        _ => {}
    }

    let project_root = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let host = host::Host::open(&project_root).await?;

    match cli.command {
        Commands::Create { name, kind, attrs } => {
            commands::create::handle(&host, &name, kind, &attrs).await?;
        }
        Commands::Read { name } => {
            commands::read::handle(&host, &name).await?;
        }
        Commands::Update { name, attrs } => {
            commands::update::handle(&host, &name, &attrs).await?;
        }
        Commands::Delete { name } => {
            commands::delete::handle(&host, &name).await?;
        }
        Commands::Import { name, id, kind } => {
            commands::import::handle(&host, &name, kind, &id).await?;
        }
        Commands::List => {
            commands::list::handle(&host).await?;
        }
        Commands::Sandbox(cmd) => {
            commands::sandbox::handle(&host, cmd).await?;
        }
        // Answered before the project was opened
        Commands::Version | Commands::Kinds => {}
    }

    Ok(())
}
