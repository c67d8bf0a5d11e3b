//! FarmFusion CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the document table and its indexes
//! farmfusion-cli migrate
//!
//! # Create one permission per capability and a "Super Admin" role
//! farmfusion-cli seed
//!
//! # Create an admin holding the "Super Admin" role
//! farmfusion-cli admin create -e ama@farm.example -f Ama -l Mensah -p 'S0il&Seed!' -r "Super Admin"
//! ```
//!
//! Every command reads `DATABASE_URL` (from the environment or `.env`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "farmfusion-cli")]
#[command(author, version, about = "FarmFusion CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed permissions and the super admin role
    Seed,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Initial password
        #[arg(short, long, env = "FARMFUSION_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Name of the role to assign
        #[arg(short, long)]
        role: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed => {
            commands::seed::run().await?;
        }
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                first_name,
                last_name,
                password,
                role,
            } => {
                let input = commands::admin::CreateAdmin {
                    email,
                    first_name,
                    last_name,
                    password,
                    role,
                };
                commands::admin::create_user(input).await?;
            }
        },
    }
    Ok(())
}
