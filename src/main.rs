use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prscout::bookmarks::{self, BookmarkStore};
use prscout::config::{self, Theme};
use prscout::credentials::{self, CredentialSource, KeyringCredentials};
use prscout::engine::{CycleOutcome, Engine};
use prscout::fetch;
use prscout::github::{ApiError, GitHubApi, GitHubClient};
use prscout::notify::DesktopNotifier;
use prscout::output;
use prscout::scheduler::Scheduler;
use prscout::state;

const EXIT_SUCCESS: i32 = 0;
const EXIT_AUTH: i32 = 1;
const EXIT_NETWORK: i32 = 2;
const EXIT_RATE_LIMIT: i32 = 3;
const EXIT_CONFIG: i32 = 4;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the watcher daemon (default if no subcommand)
    Watch,
    /// Run a single reconciliation cycle and exit
    Check,
    /// Show open PRs across all categories
    Status,
    /// Open a PR in the browser by its index in the combined listing
    Open {
        /// Index of the PR to open (1-based, most recently updated first)
        index: usize,
    },
    /// Inspect or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Store the GitHub personal access token (prompts if omitted)
    SetToken { token: Option<String> },
    /// Remove the stored token
    ClearToken,
    /// Set the polling interval in seconds (minimum 10)
    SetInterval { seconds: u64 },
    /// Set the color theme
    SetTheme {
        #[arg(value_enum)]
        theme: Theme,
    },
    /// Show or hide the footer in status output
    SetFooter { shown: bool },
}

#[derive(Parser, Debug)]
#[command(name = "prscout")]
#[command(about = "Watches GitHub for pull requests assigned to you", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "prscout=debug" } else { "prscout=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.unwrap_or(Commands::Watch);
    let exit_code = match command {
        Commands::Watch => run_watch().await,
        Commands::Check => run_check().await,
        Commands::Status => run_status().await,
        Commands::Open { index } => run_open(index).await,
        Commands::Config { action } => run_config(action).await,
    };

    std::process::exit(exit_code);
}

fn build_engine() -> Result<Engine<GitHubClient, KeyringCredentials, DesktopNotifier, BookmarkStore>, i32> {
    let api = match GitHubClient::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create GitHub client: {}", e);
            return Err(EXIT_NETWORK);
        }
    };

    let store = match BookmarkStore::open(&bookmarks::resolve_store_path()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Bookmark store error: {}", e);
            return Err(EXIT_CONFIG);
        }
    };

    Ok(Engine::new(
        api,
        KeyringCredentials,
        DesktopNotifier::new(),
        store,
        state::get_state_path(),
    ))
}

async fn run_watch() -> i32 {
    if let Err(e) = config::ensure_config_dir() {
        eprintln!("Config error: {:#}", e);
        return EXIT_CONFIG;
    }

    let engine = match build_engine() {
        Ok(e) => e,
        Err(code) => return code,
    };

    let scheduler = Scheduler::new(engine, config::get_settings_path());

    // SIGHUP re-reads configuration, the counterpart of the extension's
    // options-changed message. `prscout config …` prints a reminder.
    #[cfg(unix)]
    {
        let handle = scheduler.handle();
        tokio::spawn(async move {
            let mut hangup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGHUP handler");
                    return;
                }
            };
            while hangup.recv().await.is_some() {
                handle.config_changed();
            }
        });
    }

    match scheduler.run().await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Watcher stopped: {:#}", e);
            EXIT_CONFIG
        }
    }
}

async fn run_check() -> i32 {
    let mut engine = match build_engine() {
        Ok(e) => e,
        Err(code) => return code,
    };

    match engine.run_cycle().await {
        Ok(CycleOutcome::Completed(report)) => {
            println!(
                "{} assigned, {} new, {} no longer assigned",
                report.assigned, report.new, report.vanished
            );
            EXIT_SUCCESS
        }
        Ok(CycleOutcome::ConfigMissing) => {
            eprintln!("No GitHub token configured. Run `prscout config set-token` first.");
            EXIT_CONFIG
        }
        Ok(CycleOutcome::AuthFailed) => {
            eprintln!("GitHub rejected the token. Update it with `prscout config set-token`.");
            EXIT_AUTH
        }
        Ok(CycleOutcome::RateLimited(reset)) => {
            eprintln!("GitHub rate limit exceeded; resets at {}.", reset);
            EXIT_RATE_LIMIT
        }
        Ok(CycleOutcome::FetchFailed) => {
            eprintln!("Could not reach GitHub. Check your network connection.");
            EXIT_NETWORK
        }
        Err(e) => {
            eprintln!("Check failed: {:#}", e);
            EXIT_CONFIG
        }
    }
}

/// Read the token, treating "not configured" as a setup error.
async fn require_token() -> Result<String, i32> {
    match KeyringCredentials.token().await {
        Ok(Some(token)) => Ok(token),
        Ok(None) => {
            eprintln!("No GitHub token configured. Run `prscout config set-token` first.");
            Err(EXIT_CONFIG)
        }
        Err(e) => {
            eprintln!("Credential error: {:#}", e);
            Err(EXIT_CONFIG)
        }
    }
}

/// Resolve the login of the token's user, using the cached identity when
/// available and persisting it when freshly fetched.
async fn resolve_login(client: &GitHubClient, token: &str) -> Result<String, i32> {
    let state_path = state::get_state_path();
    let mut watch_state = match state::load_state(&state_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("State error: {:#}", e);
            return Err(EXIT_CONFIG);
        }
    };

    if let Some(user) = &watch_state.user {
        return Ok(user.login.clone());
    }

    match client.fetch_authenticated_user(token).await {
        Ok(identity) => {
            watch_state.user = Some(state::CachedUser {
                login: identity.login.clone(),
                id: identity.id,
            });
            if let Err(e) = state::save_state(&state_path, &watch_state) {
                eprintln!("State error: {:#}", e);
                return Err(EXIT_CONFIG);
            }
            Ok(identity.login)
        }
        Err(e) => Err(report_api_error(e)),
    }
}

fn report_api_error(error: ApiError) -> i32 {
    eprintln!("{}", error);
    match error {
        ApiError::Auth => EXIT_AUTH,
        ApiError::RateLimited { .. } => EXIT_RATE_LIMIT,
        ApiError::Network(_) | ApiError::Status(_) => EXIT_NETWORK,
    }
}

async fn run_status() -> i32 {
    let token = match require_token().await {
        Ok(t) => t,
        Err(code) => return code,
    };
    let client = match GitHubClient::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create GitHub client: {}", e);
            return EXIT_NETWORK;
        }
    };
    let login = match resolve_login(&client, &token).await {
        Ok(l) => l,
        Err(code) => return code,
    };

    let settings = match config::load_settings(&config::get_settings_path()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            return EXIT_CONFIG;
        }
    };
    let use_colors = output::should_use_colors(settings.theme);

    let results = fetch::fetch_all_categories(&client, &token, &login).await;
    let mut any_succeeded = false;
    for (category, result) in results {
        if result.is_ok() {
            any_succeeded = true;
        }
        let section = output::CategoryResult { category, result };
        print!("{}", output::format_category_section(&section, use_colors));
        println!();
    }

    if let Some(footer) = output::format_footer(settings.show_footer) {
        println!("{}", footer);
    }

    if any_succeeded {
        EXIT_SUCCESS
    } else {
        eprintln!("All queries failed. Check your network connection and GitHub token.");
        EXIT_NETWORK
    }
}

async fn run_open(index: usize) -> i32 {
    let token = match require_token().await {
        Ok(t) => t,
        Err(code) => return code,
    };
    let client = match GitHubClient::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create GitHub client: {}", e);
            return EXIT_NETWORK;
        }
    };
    let login = match resolve_login(&client, &token).await {
        Ok(l) => l,
        Err(code) => return code,
    };

    let mut all_prs = Vec::new();
    for (_, result) in fetch::fetch_all_categories(&client, &token, &login).await {
        if let Ok(prs) = result {
            all_prs.extend(prs);
        }
    }

    let mut unique_prs = fetch::dedupe_by_url(all_prs);
    unique_prs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    if index < 1 || index > unique_prs.len() {
        eprintln!(
            "Invalid index {}. Must be between 1 and {}.",
            index,
            unique_prs.len()
        );
        return EXIT_CONFIG;
    }

    let pr = &unique_prs[index - 1];
    if let Err(e) = prscout::browser::open_url(&pr.url) {
        eprintln!("Failed to open browser: {}", e);
        return EXIT_NETWORK;
    }

    println!("Opening {} in browser: {}", pr.label(), pr.url);
    EXIT_SUCCESS
}

async fn run_config(action: ConfigAction) -> i32 {
    match action {
        ConfigAction::Show => config_show().await,
        ConfigAction::SetToken { token } => config_set_token(token).await,
        ConfigAction::ClearToken => config_clear_token().await,
        ConfigAction::SetInterval { seconds } => config_set(|s| s.set_polling_interval(seconds)),
        ConfigAction::SetTheme { theme } => config_set(|s| {
            s.theme = theme;
            Ok(())
        }),
        ConfigAction::SetFooter { shown } => config_set(|s| {
            s.show_footer = shown;
            Ok(())
        }),
    }
}

async fn config_show() -> i32 {
    let settings = match config::load_settings(&config::get_settings_path()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            return EXIT_CONFIG;
        }
    };

    let token_state = match KeyringCredentials.token().await {
        Ok(Some(_)) => "configured",
        Ok(None) => "not configured",
        Err(_) => "keyring unavailable",
    };

    println!("Token:            {}", token_state);
    println!("Polling interval: {}s", settings.polling_interval_secs);
    println!("Theme:            {:?}", settings.theme);
    println!("Show footer:      {}", settings.show_footer);
    EXIT_SUCCESS
}

async fn config_set_token(token: Option<String>) -> i32 {
    let token = match token {
        Some(t) => t.trim().to_string(),
        None => match credentials::prompt_for_token() {
            Ok(t) => t,
            Err(e) => {
                eprintln!("{:#}", e);
                return EXIT_CONFIG;
            }
        },
    };

    if token.is_empty() {
        eprintln!("Token cannot be empty.");
        return EXIT_CONFIG;
    }

    // Validate against the API before persisting anything
    let client = match GitHubClient::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create GitHub client: {}", e);
            return EXIT_NETWORK;
        }
    };
    let identity = match client.fetch_authenticated_user(&token).await {
        Ok(identity) => identity,
        Err(ApiError::Auth) => {
            eprintln!("GitHub rejected that token; it was not stored.");
            return EXIT_AUTH;
        }
        Err(e) => {
            eprintln!("Could not validate token ({}); it was not stored.", e);
            return EXIT_NETWORK;
        }
    };

    if let Err(e) = credentials::store_token(token).await {
        eprintln!("Failed to store token: {}", e);
        return EXIT_CONFIG;
    }

    // Credential changed, so replace the cached identity with the one the
    // new token resolved to.
    let state_path = state::get_state_path();
    match state::load_state(&state_path) {
        Ok(mut watch_state) => {
            watch_state.user = Some(state::CachedUser {
                login: identity.login.clone(),
                id: identity.id,
            });
            if let Err(e) = state::save_state(&state_path, &watch_state) {
                eprintln!("Warning: failed to update cached identity: {:#}", e);
            }
        }
        Err(e) => eprintln!("Warning: failed to read state file: {:#}", e),
    }

    println!("Token stored. Authenticated as {}.", identity.login);
    print_reload_hint();
    EXIT_SUCCESS
}

async fn config_clear_token() -> i32 {
    if let Err(e) = credentials::delete_token().await {
        eprintln!("Failed to remove token: {}", e);
        return EXIT_CONFIG;
    }
    println!("Token removed.");
    print_reload_hint();
    EXIT_SUCCESS
}

/// Load settings, apply a mutation, and save — rejecting invalid values
/// before anything is persisted.
fn config_set(mutate: impl FnOnce(&mut config::Settings) -> anyhow::Result<()>) -> i32 {
    let path = config::get_settings_path();
    let mut settings = match config::load_settings(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            return EXIT_CONFIG;
        }
    };

    if let Err(e) = mutate(&mut settings) {
        eprintln!("{:#}", e);
        return EXIT_CONFIG;
    }

    if let Err(e) = config::save_settings(&path, &settings) {
        eprintln!("Failed to save settings: {:#}", e);
        return EXIT_CONFIG;
    }

    println!("Saved.");
    print_reload_hint();
    EXIT_SUCCESS
}

fn print_reload_hint() {
    #[cfg(unix)]
    println!("If `prscout watch` is running, send it SIGHUP to apply the change immediately.");
}
