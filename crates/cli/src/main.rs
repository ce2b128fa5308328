//! Marigold CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! mg-cli migrate
//!
//! # Create an admin user (or promote an existing account)
//! mg-cli admin create -e admin@example.com -n "Admin Name" -p "a long password"
//!
//! # Seed a demo catalog for local development
//! mg-cli seed
//!
//! # Fill nested address blocks on orders written by older releases
//! mg-cli backfill orders --dry-run
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin create` - Create or promote admin users
//! - `seed` - Seed the database with a demo catalog
//! - `backfill orders` - Backfill nested address blocks on legacy orders

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mg-cli")]
#[command(author, version, about = "Marigold CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database with a demo catalog
    Seed,
    /// Backfill data on rows written by older releases
    Backfill {
        #[command(subcommand)]
        target: BackfillTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user, or promote an existing account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (minimum 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum BackfillTarget {
    /// Synthesize the nested shipping block on orders that only carry the
    /// flat address columns
    Orders {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
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
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&email, &name, &password).await?;
            }
        },
        Commands::Seed => commands::seed::run().await?,
        Commands::Backfill { target } => match target {
            BackfillTarget::Orders { dry_run } => {
                commands::backfill::orders(dry_run).await?;
            }
        },
    }
    Ok(())
}
