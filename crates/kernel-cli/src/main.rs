use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use contracts::{EngineSettings, ReviewQuiz};
use kernel_api::{default_sqlite_path, serve, EngineApi};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "kernel-cli", about = "Operator tools for the GOAT account engine")]
struct Cli {
    /// TOML file with engine settings; missing keys keep their defaults.
    #[arg(long, env = "GOAT_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database holding the account collections.
    #[arg(long, env = "GOAT_SQLITE_PATH")]
    sqlite: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Serve the HTTP and WebSocket API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
    /// Create the administrator on an empty database.
    Bootstrap,
    /// List every account.
    Accounts,
    /// Print one account as JSON.
    Inspect { account_id: String },
    /// Print the student ranking.
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print a student's weak questions and review quiz status.
    Review { account_id: String },
    /// Print the most recent commands from the audit trail.
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the effective settings as TOML.
    Settings,
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<EngineSettings> {
    let Some(path) = path else {
        return Ok(EngineSettings::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_settings(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_settings(raw: &str) -> anyhow::Result<EngineSettings> {
    Ok(toml::from_str(raw)?)
}

fn open_api(cli: &Cli) -> anyhow::Result<EngineApi> {
    let settings = load_settings(cli.config.as_deref())?;
    let sqlite_path = cli
        .sqlite
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_sqlite_path()));
    EngineApi::open_sqlite(&sqlite_path, settings, None)
        .with_context(|| format!("failed to open sqlite store {}", sqlite_path.display()))
}

fn bootstrap(api: &mut EngineApi) -> anyhow::Result<()> {
    match api.bootstrap() {
        Ok(Some(admin)) => {
            println!(
                "created administrator {} (username={} secret={})",
                admin.account_id, admin.username, admin.secret
            );
        }
        Ok(None) => info!("store already holds accounts; bootstrap skipped"),
        Err(err) => bail!("bootstrap failed: {err}"),
    }
    if let Some(error) = api.last_persistence_error() {
        bail!("persistence error after bootstrap: {error}");
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut api = open_api(&cli)?;

    match cli.command {
        CliCommand::Serve { addr } => {
            bootstrap(&mut api)?;
            println!("serving api on http://{addr}");
            serve(addr, api).await?;
        }
        CliCommand::Bootstrap => bootstrap(&mut api)?,
        CliCommand::Accounts => {
            for account in api.engine().accounts().iter() {
                println!(
                    "{:<14} {:<8?} {:<24} {:<28} xp={} coins={}",
                    account.account_id,
                    account.role,
                    account.username,
                    account.display_name,
                    account.progress.xp,
                    account.coins
                );
            }
        }
        CliCommand::Inspect { account_id } => {
            let mut account = api.engine().account(&account_id)?.clone();
            account.credentials.secret_hash.clear();
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        CliCommand::Leaderboard { limit } => {
            for entry in api.engine().leaderboard(limit) {
                println!(
                    "{:>3}. {:<28} grade={} level={} xp={}",
                    entry.rank, entry.display_name, entry.grade_index, entry.level, entry.xp
                );
            }
        }
        CliCommand::Review { account_id } => {
            let engine = api.engine();
            let limit = engine.settings().review_quiz_size;
            for weak in engine.weak_questions(&account_id, limit)? {
                println!(
                    "{:<12} {:<10} error_rate={:.2} seen={}",
                    weak.question_id, weak.chapter_id, weak.error_rate, weak.seen
                );
            }
            match engine.review_quiz(&account_id)? {
                ReviewQuiz::Ready { quiz, .. } => {
                    println!("review quiz ready: {} question(s)", quiz.questions.len());
                }
                ReviewQuiz::NeedsMoreData {
                    available,
                    required,
                } => {
                    println!("review quiz locked: {available}/{required} weak question(s)");
                }
            }
        }
        CliCommand::Audit { limit } => {
            for entry in api.recent_commands(limit)? {
                let status = if entry.result.accepted {
                    "accepted".to_string()
                } else {
                    entry
                        .result
                        .error
                        .map(|error| error.to_string())
                        .unwrap_or_else(|| "rejected".to_string())
                };
                println!(
                    "{} {:<16} {:<14} {}",
                    entry.recorded_at.to_rfc3339(),
                    entry.command.command_id,
                    entry.command.actor_id,
                    status
                );
            }
        }
        CliCommand::Settings => {
            println!("{}", toml::to_string_pretty(api.engine().settings())?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let settings = parse_settings("starting_coins_student = 75\nguild_max_members = 4\n")
            .expect("valid toml");
        assert_eq!(settings.starting_coins_student, 75);
        assert_eq!(settings.guild_max_members, 4);
        assert_eq!(
            settings.quiz_completion_xp,
            EngineSettings::default().quiz_completion_xp
        );
    }

    #[test]
    fn unknown_value_types_are_rejected() {
        assert!(parse_settings("starting_coins_student = \"many\"").is_err());
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["kernel-cli", "--sqlite", "x.sqlite", "leaderboard"])
            .expect("parses");
        assert_eq!(cli.sqlite, Some(PathBuf::from("x.sqlite")));
        assert!(matches!(cli.command, CliCommand::Leaderboard { limit: 10 }));

        let cli = Cli::try_parse_from(["kernel-cli", "inspect", "student:3"]).expect("parses");
        assert!(matches!(
            cli.command,
            CliCommand::Inspect { ref account_id } if account_id == "student:3"
        ));
    }
}
