use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::Password;

use bricks_lib::auth::{
    CredentialStore, LoginOrchestrator, LogoutOrchestrator, LogoutOutcome, ProviderClient,
    Session, SessionValidator, SystemBrowser,
};
use bricks_lib::config::{AppConfig, DEFAULT_CONFIG_PATH};
use bricks_lib::{printer, AuthError};

/// Bricks CLI
#[derive(Parser, Debug)]
#[command(name = "bricks-cli", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BRICKS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in with your browser
    Login {
        /// GitHub client ID for login, client secret will be prompted.
        #[arg(long)]
        client_id: Option<String>,
    },
    /// Check if current session is authenticated
    Status,
    /// Logout from the current user session
    Logout,
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AuthError>() {
                Some(auth) => printer::error(&format!("{}: {}", auth.category().label(), auth)),
                None => printer::error(&format!("{:#}", e)),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        printer::banner();
        return Ok(());
    };

    let mut config = AppConfig::load(&cli.config)?;
    if let Commands::Login {
        client_id: Some(client_id),
    } = &command
    {
        let client_secret: String = Password::new()
            .with_prompt("Client Secret")
            .interact()
            .context("Prompt failed")?;
        config.github_auth.override_client(client_id, &client_secret);
    }

    let auth_config = &config.github_auth;
    let provider = Arc::new(ProviderClient::new(auth_config)?);
    let mut session = Session::load(CredentialStore::new(&auth_config.auth_file_path));

    match command {
        Commands::Login { .. } => {
            if SessionValidator::new(&provider).is_authenticated(&session)? {
                printer::success("You have already been authenticated");
                return Ok(());
            }
            printer::info("Please login to your Github account using the opened browser window");
            let credential = LoginOrchestrator::new(auth_config, provider.clone(), SystemBrowser)
                .perform_login(&mut session)?;
            printer::success(&format!(
                "Welcome, {} you have been authenticated!",
                credential.account_id
            ));
        }
        Commands::Status => {
            if SessionValidator::new(&provider).is_authenticated(&session)? {
                printer::success("You are authenticated");
            } else {
                printer::error("You are not authenticated");
            }
        }
        Commands::Logout => match LogoutOrchestrator::new(&provider).logout(&mut session)? {
            LogoutOutcome::NotAuthenticated => {
                printer::warning("User isn't logged in, no reason to log out")
            }
            LogoutOutcome::LoggedOut => printer::success("Successfully logged out"),
            LogoutOutcome::RevokedWithStaleFile(e) => {
                printer::error(&format!("Failed to remove authentication file: {}", e));
                printer::success("Successfully logged out");
            }
        },
    }
    Ok(())
}
