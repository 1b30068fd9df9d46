mod render;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use refund_flow::{
    AppState, ClientConfig, ResultView, Session, UploadRequest, analyze_issue, sign_in, sign_out,
    submit, summarize_files, views::HistoryRow,
};
use std::{path::PathBuf, process::ExitCode};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "refund")]
#[command(about = "Upload receipts and check refund eligibility")]
struct Cli {
    /// Refund backend base URL.
    #[arg(long, global = true, env = "REFUND_API_BASE_URL")]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in to the refund backend.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "REFUND_PASSWORD", hide_env_values = true)]
        password: String,
        /// Keep the sign-in for this session only.
        #[arg(long)]
        no_remember: bool,
    },
    /// Forget the stored sign-in.
    Logout,
    /// Show who is signed in.
    Whoami,
    /// Upload receipts and product photos, then analyze the case.
    Upload(UploadArgs),
    /// Analyze an issue description, optionally for an existing case.
    Analyze {
        #[arg(long)]
        issue: String,
        #[arg(long)]
        case_id: Option<String>,
    },
    /// Overview of the last analysis and recent cases.
    Dashboard,
    /// Eligibility report for the last analysis.
    Result,
    /// List past analyses, newest first.
    History {
        #[arg(long)]
        limit: Option<usize>,
        /// Print the stored entries as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Make a history entry the last analysis and show its report.
    Open { index: usize },
    /// Remove the last analysis, the history, or both.
    Clear {
        #[arg(long)]
        last: bool,
        #[arg(long)]
        history: bool,
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args)]
struct UploadArgs {
    /// Receipt file (PDF, PNG or JPEG); repeat for several.
    #[arg(long = "receipt")]
    receipts: Vec<PathBuf>,
    /// Product photo; repeat for several.
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    #[arg(long)]
    issue: Option<String>,
    /// Your own reference for the purchase.
    #[arg(long)]
    case_id: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "refund_client=info,refund_flow=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    let state = AppState::from_config(&config);
    info!(base_url = %state.api.base_url(), "Using refund backend");

    match cli.command {
        Command::Login {
            email,
            password,
            no_remember,
        } => {
            let session =
                sign_in(&state.api, &state.sessions, &email, &password, !no_remember).await?;
            println!("{}", render::session(Some(&session)));
        }
        Command::Logout => {
            sign_out(&state.sessions).await?;
            println!("Signed out");
        }
        Command::Whoami => {
            let session = state.sessions.current().await?;
            println!("{}", render::session(session.as_ref()));
        }
        Command::Upload(args) => {
            require_session(&state).await?;
            println!("Receipts: {}", summarize_files(&args.receipts));
            println!("Images:   {}", summarize_files(&args.images));

            let request = UploadRequest {
                receipt_files: args.receipts,
                product_images: args.images,
                issue_description: args.issue.unwrap_or_default(),
                case_id: args.case_id,
            };
            let entry = submit(&state.api, &state.history, &request).await?;
            println!();
            print!("{}", render::result(&ResultView::build(Some(&entry))));
        }
        Command::Analyze { issue, case_id } => {
            require_session(&state).await?;
            let entry =
                analyze_issue(&state.api, &state.history, &issue, case_id.as_deref()).await?;
            print!("{}", render::result(&ResultView::build(Some(&entry))));
        }
        Command::Dashboard => {
            let session = require_session(&state).await?;
            print!("{}", render::dashboard(&state.dashboard().await?, &session));
        }
        Command::Result => {
            require_session(&state).await?;
            print!("{}", render::result(&state.result().await?));
        }
        Command::History { limit, json } => {
            require_session(&state).await?;
            let mut entries = state.history.list().await?;
            if let Some(limit) = limit {
                entries.truncate(limit);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("History is empty.");
            } else {
                let rows: Vec<HistoryRow> = entries
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| HistoryRow::from_entry(index, entry))
                    .collect();
                print!("{}", render::history(&rows));
            }
        }
        Command::Open { index } => {
            require_session(&state).await?;
            let entry = state
                .history
                .open(index)
                .await?
                .with_context(|| format!("No history entry at index {index}"))?;
            print!("{}", render::result(&ResultView::build(Some(&entry))));
        }
        Command::Clear { last, history, all } => {
            if !(last || history || all) {
                bail!("Nothing to clear; pass --last, --history or --all");
            }
            if last || all {
                state.history.clear_last().await?;
                println!("Cleared the last analysis");
            }
            if history || all {
                state.history.clear_history().await?;
                println!("Cleared the history");
            }
        }
    }
    Ok(())
}

async fn require_session(state: &AppState) -> Result<Session> {
    state
        .sessions
        .current()
        .await?
        .context("Not signed in; run `refund login` first")
}
