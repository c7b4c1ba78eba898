//! Shelfdesk CLI - Headless shell over the admin panel state layer.
//!
//! # Usage
//!
//! ```bash
//! # List products, optionally filtered by name or category
//! shelfdesk products list --search lamp
//!
//! # Show one product
//! shelfdesk products show 42
//!
//! # Add a product
//! shelfdesk products add --name "Desk Lamp" --price 24.00 --stock 7 --category Lighting
//!
//! # Change some fields of a product
//! shelfdesk products edit 42 --price 19.99
//!
//! # Delete a product
//! shelfdesk products delete 42
//! ```
//!
//! Every run signs in with `SHELFDESK_ADMIN_EMAIL` / `SHELFDESK_ADMIN_PASSWORD`,
//! performs one operation and signs out again.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;

use clap::{Args, Parser, Subcommand};

use shelfdesk_admin::{AdminConfig, telemetry};
use shelfdesk_core::ProductId;

mod commands;
mod error;

use commands::AdminSession;
use error::CliError;

#[derive(Parser)]
#[command(name = "shelfdesk")]
#[command(author, version, about = "Shelfdesk admin panel from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage catalog products
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products
    List {
        /// Only show products whose name or category contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one product, read fresh from the backend
    Show {
        /// Product ID
        id: ProductId,
    },
    /// Add a product
    Add(NewProduct),
    /// Change fields of a product
    Edit {
        /// Product ID
        id: ProductId,

        #[command(flatten)]
        changes: ProductChanges,
    },
    /// Delete a product
    Delete {
        /// Product ID
        id: ProductId,
    },
}

/// Field values for a new product.
#[derive(Args)]
pub struct NewProduct {
    /// Product name
    #[arg(short, long)]
    pub name: String,

    /// Unit price
    #[arg(short, long)]
    pub price: String,

    /// Units on hand
    #[arg(short, long)]
    pub stock: String,

    /// Free-form description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Category used by search
    #[arg(short, long)]
    pub category: Option<String>,
}

/// Fields to change on an existing product. Omitted fields keep their value.
#[derive(Args)]
pub struct ProductChanges {
    /// New name
    #[arg(short, long)]
    pub name: Option<String>,

    /// New unit price
    #[arg(short, long)]
    pub price: Option<String>,

    /// New stock level
    #[arg(short, long)]
    pub stock: Option<String>,

    /// New description (empty to clear)
    #[arg(short, long)]
    pub description: Option<String>,

    /// New category (empty to clear)
    #[arg(short, long)]
    pub category: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AdminConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Tracing is not installed yet
            let _ = writeln!(std::io::stderr(), "Configuration error: {e}");
            std::process::exit(2);
        }
    };
    let _telemetry = telemetry::init(&config);

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &AdminConfig) -> Result<(), CliError> {
    let session = AdminSession::open(config).await?;
    let mut out = std::io::stdout().lock();

    let result = match cli.command {
        Commands::Products { action } => match action {
            ProductAction::List { search } => {
                commands::products::list(&session, search.as_deref(), &mut out)
            }
            ProductAction::Show { id } => commands::products::show(&session, id, &mut out).await,
            ProductAction::Add(new) => commands::products::add(&session, new, &mut out).await,
            ProductAction::Edit { id, changes } => {
                commands::products::edit(&session, id, changes, &mut out).await
            }
            ProductAction::Delete { id } => {
                commands::products::delete(&session, id, &mut out).await
            }
        },
    };

    // Sign out even when the command failed
    session.close().await?;
    result
}
