//! CLI auth command handlers for status, save, refresh, and logout.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::token::expires_at;
use crate::auth::CredentialManager;
use crate::config::TetherConfig;

fn manager(config: &TetherConfig) -> CredentialManager {
    config.credential_manager(Arc::new(config.file_credential_store()), None)
}

/// Handle `tether auth status`.
pub async fn handle_status(config: &TetherConfig) -> Result<(), Box<dyn std::error::Error>> {
    let manager = manager(config);
    println!("Credentials: {}", config.file_credential_store().path().display());

    let Some(access_token) = manager.access_token() else {
        println!("❌ Not logged in");
        return Ok(());
    };

    match expires_at(&access_token) {
        Some(expiry) if expiry <= Utc::now() => println!("⚠️  Access token expired at {expiry}"),
        Some(expiry) => {
            let remaining = expiry - Utc::now();
            println!("✅ Access token valid until {expiry} ({}m left)", remaining.num_minutes());
            if manager.is_token_near_expiry(config.credentials.near_expiry_threshold) {
                println!("   Near expiry; the next request will refresh it");
            }
        }
        None => println!("✅ Access token present (expiry unknown)"),
    }
    println!(
        "   Refresh token: {}",
        if manager.refresh_token().is_some() { "present" } else { "missing" }
    );
    Ok(())
}

/// Handle `tether auth save`.
pub async fn handle_save(
    config: &TetherConfig,
    access_token: &str,
    refresh_token: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    manager(config).save_credentials(access_token, refresh_token)?;
    println!("✅ Credentials saved");
    Ok(())
}

/// Handle `tether auth refresh`.
pub async fn handle_refresh(config: &TetherConfig) -> Result<(), Box<dyn std::error::Error>> {
    let manager = manager(config);
    match manager.refresh().await? {
        Some(_) => println!("✅ Access token refreshed"),
        None => {
            eprintln!("❌ Refresh failed; stored credentials were cleared");
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Handle `tether auth logout`.
pub async fn handle_logout(config: &TetherConfig) -> Result<(), Box<dyn std::error::Error>> {
    manager(config).clear_credentials();
    println!("✅ Logged out");
    Ok(())
}
