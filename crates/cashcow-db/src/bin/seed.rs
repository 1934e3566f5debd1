//! # Seed Data Generator
//!
//! Prepares a development database: schema, permission catalogue, one
//! administrator holding every permission.
//!
//! ## Usage
//! ```bash
//! # Defaults (./cashcow.db, admin@cashcow.local)
//! cargo run -p cashcow-db --bin seed
//!
//! # Config file and admin account
//! cargo run -p cashcow-db --bin seed -- --config ./cashcow.toml \
//!     --email admin@example.com --password 'Adm1n-pass!'
//!
//! # Specify database path
//! cargo run -p cashcow-db --bin seed -- --db ./data/cashcow.db
//! ```
//!
//! When the administrator is created, its activation token is printed once.
//! It cannot be recovered later.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cashcow_core::{CandidatePassword, NewPermission, NewUser, PasswordHasher, TokenScope};
use cashcow_db::{AppConfig, Database, DbError};

/// Default permission catalogue.
const PERMISSIONS: &[(&str, &str)] = &[
    ("users:read", "View farmer accounts"),
    ("users:write", "Edit and delete farmer accounts"),
    ("cattle:read", "View cattle records"),
    ("cattle:write", "Create and edit cattle records"),
    ("listings:read", "View marketplace listings"),
    ("listings:write", "Create and edit marketplace listings"),
    ("catalogue:write", "Manage breeds and regions"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut email = String::from("admin@cashcow.local");
    let mut password = String::from("Ch4nge-me!");

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--config" | "-c", Some(v)) => config_path = Some(PathBuf::from(v)),
            ("--db" | "-d", Some(v)) => db_path = Some(PathBuf::from(v)),
            ("--email" | "-e", Some(v)) => email = v,
            ("--password" | "-p", Some(v)) => password = v,
            ("--help" | "-h", _) => {
                println!("Usage: seed [--config FILE] [--db PATH] [--email EMAIL] [--password PASSWORD]");
                return Ok(());
            }
            (flag, _) => bail!("unknown or incomplete argument: {flag}"),
        }
        i += 2;
    }

    let mut config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    info!(path = %config.database.path.display(), "Seeding database");
    let db = Database::new(config.to_db_config())
        .await
        .context("opening database")?;

    // Permission catalogue
    let permissions = db.permissions();
    let existing = permissions.list_all().await?;
    for (code, description) in PERMISSIONS {
        if existing.iter().any(|p| p.code == *code) {
            continue;
        }
        permissions
            .create(&NewPermission::new(*code, *description))
            .await
            .with_context(|| format!("creating permission {code}"))?;
        info!(code, "Permission created");
    }

    // Administrator
    let hasher = PasswordHasher::new(config.auth.hashing)?;
    let ttls = config.token_ttls()?;
    let (admin, activation) = match db.users().get_by_email(&email).await {
        Ok(user) => {
            info!(user_id = user.id, "Administrator already exists");
            (user, None)
        }
        Err(DbError::NotFound { .. }) => {
            let input = NewUser {
                farmer_id: None,
                email: email.clone(),
                phone_number: None,
                first_name: "Cash".to_string(),
                last_name: "Cow".to_string(),
                middle_name: String::new(),
                password: CandidatePassword::new(password),
            };
            let user = db
                .users()
                .create(&input, &hasher)
                .await
                .context("creating administrator")?;
            let token = db
                .tokens()
                .issue(user.id, ttls.activation, TokenScope::Activation)
                .await?;
            info!(user_id = user.id, "Administrator created");
            (user, Some(token))
        }
        Err(e) => return Err(e.into()),
    };

    let codes: Vec<&str> = PERMISSIONS.iter().map(|(code, _)| *code).collect();
    permissions.grant(admin.id, &codes).await?;
    info!(user_id = admin.id, granted = codes.len(), "Permissions granted");

    if let Some(token) = activation {
        println!("Activation token for {email} (shown once):");
        println!("{}", serde_json::to_string_pretty(&token)?);
    }

    db.close().await;
    Ok(())
}
