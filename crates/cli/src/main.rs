//! Grocery CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! grocery-cli migrate
//!
//! # Create a verified superuser (password from GROCERY_SUPERUSER_PASSWORD)
//! grocery-cli user create-superuser -e admin@example.com -u admin
//!
//! # Block or restore logins for an account
//! grocery-cli user disable -e someone@example.com
//! grocery-cli user enable -e someone@example.com
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create-superuser` - Provision a staff account without email verification
//! - `user disable` / `user enable` - Toggle whether an account may log in

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "grocery-cli")]
#[command(author, version, about = "Grocery list API tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a verified staff superuser
    CreateSuperuser {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Username
        #[arg(short, long)]
        username: String,

        /// Password
        #[arg(long, env = "GROCERY_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Prevent an account from logging in
    Disable {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
    /// Allow a disabled account to log in again
    Enable {
        /// Email address
        #[arg(short, long)]
        email: String,
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
        Commands::User { action } => match action {
            UserAction::CreateSuperuser {
                email,
                username,
                password,
            } => {
                commands::user::create_superuser(&email, &username, &password).await?;
            }
            UserAction::Disable { email } => commands::user::set_active(&email, false).await?,
            UserAction::Enable { email } => commands::user::set_active(&email, true).await?,
        },
    }
    Ok(())
}
