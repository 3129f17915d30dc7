//! CLI entry point for Tether.

pub mod auth;

use clap::{Parser, Subcommand};

use crate::classify::classify;
use crate::config::TetherConfig;
use crate::error::{ErrorResponse, UNKNOWN_ERROR};
use crate::handlers::{ErrorHandlerChain, HandlerContext};

/// Tether CLI
#[derive(Parser, Debug)]
#[command(name = "tether", version, about = "Tether: inspect error handling and manage stored credentials")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show how a backend failure would be classified and handled
    Classify(ClassifyArgs),
    /// List the error taxonomy
    Taxonomy(TaxonomyArgs),
    /// Credential management
    Auth(AuthArgs),
}

/// Arguments for `tether classify`.
#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Numeric backend code (e.g. 4203)
    pub code: i32,

    /// Stable error identifier (e.g. LICENSE_QUOTA_EXCEEDED)
    #[arg(short, long)]
    pub error_code: Option<String>,

    /// Raw backend message
    #[arg(short, long, default_value = "")]
    pub message: String,
}

/// Arguments for `tether taxonomy`.
#[derive(Parser, Debug)]
pub struct TaxonomyArgs {
    /// Only show codes containing this text
    pub filter: Option<String>,
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Show stored credential status
    Status,
    /// Store a token pair
    Save(SaveArgs),
    /// Exchange the refresh token for a new access token
    Refresh,
    /// Remove stored credentials
    Logout,
}

/// Arguments for `tether auth save`.
#[derive(Parser, Debug)]
pub struct SaveArgs {
    /// Access token
    pub access_token: String,

    /// Refresh token
    #[arg(short, long)]
    pub refresh_token: Option<String>,
}

/// Handle `tether classify`.
pub fn handle_classify(config: &TetherConfig, args: &ClassifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let taxonomy = config.taxonomy()?;
    let error_code = args
        .error_code
        .clone()
        .unwrap_or_else(|| taxonomy.error_code_for(args.code).to_string());
    let response = ErrorResponse::new(args.code, error_code, args.message.clone());

    let classification = classify(&response);
    let chain = ErrorHandlerChain::new(
        HandlerContext::builder()
            .taxonomy(taxonomy.clone())
            .config(config.handlers.clone())
            .build(),
    );
    let entry = taxonomy.lookup(&response.error_code);

    println!("error_code: {}", response.error_code);
    println!("category:   {classification}");
    println!("handler:    {}", chain.select(&response).unwrap_or("none"));
    println!("severity:   {}", entry.severity);
    println!("retryable:  {}", taxonomy.is_response_retryable(&response));
    println!("message:    {}", taxonomy.user_message(&response.error_code, Some(&args.message)));
    if let Some(guidance) = taxonomy.guidance(&response.error_code) {
        match &guidance.route {
            Some(route) => println!("guidance:   {} ({}, {route})", guidance.action, guidance.kind),
            None => println!("guidance:   {} ({})", guidance.action, guidance.kind),
        }
    }
    if response.error_code == UNKNOWN_ERROR {
        println!("note:       code {} is not in the taxonomy", args.code);
    }
    Ok(())
}

/// Handle `tether taxonomy`.
pub fn handle_taxonomy(config: &TetherConfig, args: &TaxonomyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let taxonomy = config.taxonomy()?;
    let filter = args.filter.as_deref().map(str::to_ascii_uppercase);
    for code in taxonomy.error_codes() {
        if filter.as_deref().is_some_and(|f| !code.contains(f)) {
            continue;
        }
        let entry = taxonomy.lookup(code);
        println!(
            "{code:<32} {:<15} {:<9} {}",
            entry.category.as_ref(),
            entry.severity.as_ref(),
            if entry.retryable { "retryable" } else { "-" }
        );
    }
    Ok(())
}
