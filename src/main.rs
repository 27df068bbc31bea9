//! pr-tracker CLI entry point.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use pr_tracker::config::{self, AppConfig};
use pr_tracker::db::{self, pool::DbPool, pull_requests, sync_log, tracking};
use pr_tracker::models::PrKey;
use pr_tracker::services::github_client::{validate_repository, GitHubClient, GitHubClientConfig};
use pr_tracker::services::sync_engine::{SyncConfig, SyncEngine};

#[derive(Parser, Debug)]
#[command(name = "pr-tracker")]
#[command(version)]
#[command(about = "Track open GitHub pull requests by a set of authors", long_about = None)]
struct Args {
    /// Database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to $PR_TRACKER_CONFIG or the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a GitHub personal access token
    Auth {
        token: String,
    },

    /// Forget the stored token
    Logout,

    /// Manage tracked authors
    Authors {
        #[command(subcommand)]
        action: ListAction,
    },

    /// Manage tracked repositories (owner/repo)
    Repositories {
        #[command(subcommand)]
        action: ListAction,
    },

    /// Fetch open pull requests and reconcile them with the database
    Sync {
        /// Keep syncing until interrupted
        #[arg(long)]
        watch: bool,

        /// Seconds between syncs in watch mode
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show tracked pull requests and what changed since acknowledgment
    Prs,

    /// Mark a pull request as seen
    Ack {
        repository: String,
        number: i64,
    },

    /// Show recent sync history
    Log {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ListAction {
    List,
    Add { name: String },
    Remove { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = config::load_config(args.config.as_deref()).context("Failed to load config")?;
    let db_path = config.resolve_db_path(args.db.as_deref());
    log::debug!("using database {}", db_path.display());

    let pool = db::initialize(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match args.command {
        Commands::Auth { token } => auth(&pool, &config, token).await,
        Commands::Logout => {
            if tracking::delete_user(&pool).await? {
                println!("Logged out");
            } else {
                println!("Not logged in");
            }
            Ok(())
        }
        command => {
            let token = resolve_token(&pool).await?;
            run_authenticated(&pool, &config, token, command).await
        }
    }
}

async fn auth(pool: &DbPool, config: &AppConfig, token: String) -> Result<()> {
    if let Some(user) = tracking::get_user(pool).await? {
        bail!("Already authenticated as {}; run `pr-tracker logout` first", user.username);
    }

    let client = build_client(config, token.clone())?;
    let user = client
        .get_authenticated_user()
        .await
        .context("GitHub rejected the token")?;
    tracking::save_user(pool, &user.login, &token).await?;
    println!("Authenticated as {}", user.login);
    Ok(())
}

/// Token from the environment, falling back to the stored user.
async fn resolve_token(pool: &DbPool) -> Result<String> {
    if let Ok(token) = std::env::var(config::TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Ok(token);
        }
    }
    match tracking::get_user(pool).await? {
        Some(user) => Ok(user.access_token),
        None => bail!(
            "Not authenticated; run `pr-tracker auth <token>` or set {}",
            config::TOKEN_ENV
        ),
    }
}

fn build_client(config: &AppConfig, token: String) -> Result<GitHubClient> {
    let client = GitHubClient::new(GitHubClientConfig {
        base_url: config.github_api_url.clone(),
        token,
        timeout_secs: config.request_timeout_secs,
    })?;
    Ok(client)
}

async fn run_authenticated(
    pool: &DbPool,
    config: &AppConfig,
    token: String,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Authors { action } => match action {
            ListAction::List => print_list(&tracking::get_tracked_authors(pool).await?, "authors"),
            ListAction::Add { name } => {
                if tracking::add_tracked_author(pool, &name).await? {
                    println!("Tracking author {}", name.trim());
                } else {
                    println!("Author {} is already tracked", name.trim());
                }
            }
            ListAction::Remove { name } => {
                if !tracking::remove_tracked_author(pool, &name).await? {
                    bail!("Author {} is not tracked", name.trim());
                }
                println!("Stopped tracking author {}", name.trim());
            }
        },
        Commands::Repositories { action } => match action {
            ListAction::List => print_list(
                &tracking::get_tracked_repositories(pool).await?,
                "repositories",
            ),
            ListAction::Add { name } => {
                if tracking::add_tracked_repository(pool, &name).await? {
                    println!("Tracking repository {}", name.trim());
                } else {
                    println!("Repository {} is already tracked", name.trim());
                }
            }
            ListAction::Remove { name } => {
                if !tracking::remove_tracked_repository(pool, &name).await? {
                    bail!("Repository {} is not tracked", name.trim());
                }
                println!("Stopped tracking repository {}", name.trim());
            }
        },
        Commands::Sync { watch, interval } => {
            let sync_config = SyncConfig {
                interval_secs: interval.unwrap_or(config.sync_interval_secs).max(1),
                max_concurrent_requests: config.max_concurrent_requests,
            };
            let engine = SyncEngine::new(pool.clone(), build_client(config, token)?, sync_config);

            if watch {
                let every = Duration::from_secs(engine.config().interval_secs);
                println!("Syncing every {}s, press Ctrl-C to stop", every.as_secs());
                engine.run_periodic(every).await?;
            } else {
                let result = engine.run_sync().await.context("Sync failed")?;
                println!(
                    "{} new, {} updated, {} removed in {}ms",
                    result.new_count, result.updated_count, result.removed_count, result.duration_ms
                );
                for error in &result.errors {
                    println!("  error: {}", error);
                }
            }
        }
        Commands::Prs => {
            let prs = pull_requests::get_all_pull_requests(pool).await?;
            if prs.is_empty() {
                println!("No tracked pull requests");
            }
            for pr in prs {
                println!("{}", pr.display_string());
                println!("  {}", pr.url());
                for update in pr.updates_since_last_ack() {
                    println!("  * {}", update);
                }
            }
        }
        Commands::Ack { repository, number } => {
            validate_repository(&repository)?;
            let key = PrKey::new(repository, number);
            if !pull_requests::acknowledge_pull_request(pool, &key, Utc::now()).await? {
                bail!("{} is not tracked", key);
            }
            println!("Acknowledged {}", key);
        }
        Commands::Log { limit } => {
            for entry in sync_log::get_sync_log(pool, limit.max(1)).await? {
                let when = chrono::DateTime::from_timestamp(entry.timestamp, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| entry.timestamp.to_string());
                let message = match entry.failure() {
                    Some(error) => Some(error.to_string()),
                    None => entry.message.clone(),
                };
                println!(
                    "{} {} {}{}{}",
                    when,
                    entry.operation,
                    entry.status,
                    entry.repository.map(|r| format!(" [{}]", r)).unwrap_or_default(),
                    message.map(|m| format!(": {}", m)).unwrap_or_default(),
                );
            }
        }
        Commands::Auth { .. } | Commands::Logout => bail!("command does not use a token"),
    }
    Ok(())
}

fn print_list(items: &[String], what: &str) {
    if items.is_empty() {
        println!("No tracked {}", what);
    }
    for item in items {
        println!("{}", item);
    }
}
