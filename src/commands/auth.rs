//! Authentication commands for the Homekeep CLI.
//!
//! Provides login, register, logout, status, whoami and token.

use clap::Args;
use homekeep_core::{
    CoordinatorState, IdentitySnapshot, SessionCoordinator, SessionError, SharedIdentity,
    UserProfile,
};
use std::io::{self, BufRead, Write};

use super::config_cmd::OutputFormat;
use crate::config::Config;

/// Sign in with email and password
#[derive(Args)]
pub struct LoginCommand {
    /// Account email
    #[arg(long, short)]
    email: String,

    /// Password (read from stdin if omitted)
    #[arg(long)]
    password: Option<String>,
}

/// Create an account and its first household
#[derive(Args)]
pub struct RegisterCommand {
    /// Account email
    #[arg(long, short)]
    email: String,

    /// Name of the household to create
    #[arg(long)]
    household: String,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    /// Password (read from stdin if omitted)
    #[arg(long)]
    password: Option<String>,
}

/// Show the signed-in user and households
#[derive(Args)]
pub struct WhoamiCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Errors that can occur in authentication commands
#[derive(Debug)]
pub enum AuthError {
    /// I/O error
    IoError(io::Error),
    /// Session coordinator rejected the request
    Session(SessionError),
    /// Command needs a signed-in user
    NotSignedIn,
    /// Output serialization failed
    Output(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::IoError(e) => write!(f, "I/O error: {}", e),
            AuthError::Session(e) => write!(f, "{}", e),
            AuthError::NotSignedIn => {
                write!(f, "Not signed in. Run 'homekeep login' to sign in.")
            }
            AuthError::Output(e) => write!(f, "Failed to format output: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<io::Error> for AuthError {
    fn from(e: io::Error) -> Self {
        AuthError::IoError(e)
    }
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        AuthError::Session(e)
    }
}

impl LoginCommand {
    pub async fn run(&self, coordinator: &SessionCoordinator) -> Result<(), AuthError> {
        let password = password_or_prompt(self.password.as_deref())?;

        let identity = coordinator.login(&self.email, &password).await?;
        println!("Signed in as {}", identity.display_name());

        // Wait for the memberships so the summary is complete
        let identity = coordinator.reconcile().await.unwrap_or(identity);
        print_households(&identity);
        Ok(())
    }
}

impl RegisterCommand {
    pub async fn run(&self, coordinator: &SessionCoordinator) -> Result<(), AuthError> {
        let password = password_or_prompt(self.password.as_deref())?;
        let profile = UserProfile::new(self.first_name.clone(), self.last_name.clone());

        let identity = coordinator
            .register(&self.email, &password, profile, &self.household)
            .await?;

        println!("Welcome, {}!", identity.display_name());
        print_households(&identity);
        Ok(())
    }
}

impl WhoamiCommand {
    pub async fn run(&self, coordinator: &SessionCoordinator) -> Result<(), AuthError> {
        let identity = admitted_identity(coordinator).await?;

        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&*identity)
                    .map_err(|e| AuthError::Output(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Text => {
                println!("User: {} <{}>", identity.display_name(), identity.email);
                println!("ID:   {}", identity.user_id);
                println!();
                print_households(&identity);
            }
        }
        Ok(())
    }
}

/// Sign out locally and at the identity service
pub async fn logout(coordinator: &SessionCoordinator) {
    coordinator.logout().await;
}

/// Show authentication status
pub async fn status(coordinator: &SessionCoordinator, config: &Config) {
    let cached = coordinator.start();
    coordinator.reconcile().await;

    println!("Identity service: {}", config.authority_url.value);

    let Some(identity) = coordinator
        .current_identity()
        .filter(|identity| identity.is_authenticated())
    else {
        if cached.is_some() {
            println!("Signed out (the identity service no longer recognizes the session).");
        } else {
            println!("Not signed in. Run 'homekeep login' to sign in.");
        }
        return;
    };

    match coordinator.state() {
        CoordinatorState::Settled(_) => println!("Signed in as {}", identity.display_name()),
        other => println!("Signed in as {} ({})", identity.display_name(), other),
    }
    match identity.default_household_id() {
        Some(id) => println!("Default household: {}", id),
        None => println!("Default household: none"),
    }
}

/// Print the current session token
pub async fn token(coordinator: &SessionCoordinator) -> Result<(), AuthError> {
    admitted_identity(coordinator).await?;

    match coordinator.get_access_token().await? {
        Some(token) => {
            println!("{}", token);
            Ok(())
        }
        None => Err(AuthError::NotSignedIn),
    }
}

/// Route admission for commands that need a signed-in user.
async fn admitted_identity(
    coordinator: &SessionCoordinator,
) -> Result<SharedIdentity, AuthError> {
    if !coordinator.ensure_authenticated().await {
        return Err(AuthError::NotSignedIn);
    }

    coordinator.start();
    coordinator
        .reconcile()
        .await
        .filter(|identity| identity.is_authenticated())
        .ok_or(AuthError::NotSignedIn)
}

fn print_households(identity: &IdentitySnapshot) {
    if identity.households.is_empty() {
        println!("No households yet.");
        return;
    }

    println!("Households:");
    for (i, membership) in identity.households.iter().enumerate() {
        let marker = if i == 0 { " (default)" } else { "" };
        println!(
            "  {} {} [{}] joined {}{}",
            membership.household_id,
            membership.household_name,
            membership.role,
            membership.joined_at.format("%Y-%m-%d"),
            marker
        );
    }
}

fn password_or_prompt(given: Option<&str>) -> Result<String, AuthError> {
    if let Some(password) = given {
        return Ok(password.to_string());
    }

    print!("Password: ");
    io::stdout().flush()?;
    read_password(&mut io::stdin().lock())
}

fn read_password(input: &mut impl BufRead) -> Result<String, AuthError> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
