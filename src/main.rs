mod api;
mod cli;
mod config;
mod confirm;
mod error;
mod forms;
mod guard;
mod modal;
mod models;
mod navbar;
mod notify;
mod refresh;
mod render;
mod screens;
mod session;
#[cfg(test)]
mod testing;
mod transcript;

use anyhow::Result;
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "libra", about = "Terminal client for the library management API")]
pub struct Args {
    #[arg(
        short,
        long,
        value_name = "LINE",
        action = clap::ArgAction::Append,
        help = "Run a slash command and exit (repeatable)"
    )]
    pub command: Vec<String>,

    #[arg(long, env = "LIBRA_API_URL", help = "API base URL (overrides config)")]
    pub base_url: Option<String>,

    #[arg(long, value_name = "N", help = "Rows per page in admin lists")]
    pub per_page: Option<u32>,

    #[arg(long, help = "Auto-confirm prompts in --command mode")]
    pub yes: bool,

    #[arg(long, help = "Do not persist the session token")]
    pub no_persist: bool,

    #[arg(long, help = "Session transcripts directory")]
    pub transcripts_dir: Option<PathBuf>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Verbose output (print API calls)")]
    pub verbose: bool,

    #[arg(long, help = "Debug output (print settings)")]
    pub debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    if let Some(base_url) = &args.base_url {
        cfg.api.base_url = Some(base_url.clone());
    }
    if let Some(per_page) = args.per_page {
        cfg.api.per_page = Some(per_page);
    }
    if args.no_persist {
        cfg.session.persist = Some(false);
    }
    if args.yes {
        cfg.ui.assume_yes = Some(true);
    }

    if let Err(errors) = cfg.validate() {
        for e in &errors {
            eprintln!("Config error: {}: {}", e.field, e.message);
        }
        return Err(anyhow::anyhow!("Invalid configuration"));
    }

    let token_file = if cfg.session.persist() {
        cfg.session.resolve_token_file()
    } else {
        None
    };

    if args.debug {
        eprintln!("[DEBUG] API base URL: {}", cfg.base_url());
        eprintln!("[DEBUG] Per page: {}", cfg.api.per_page());
        eprintln!("[DEBUG] Timeout: {} ms", cfg.api.timeout_ms());
        eprintln!("[DEBUG] Token file: {:?}", token_file);
        eprintln!(
            "[DEBUG] Confirm destructive: {}, assume yes: {}",
            cfg.ui.confirm_destructive(), cfg.ui.assume_yes()
        );
    }

    let transcripts_dir = match &args.transcripts_dir {
        Some(dir) => dir.clone(),
        None => dirs::home_dir()
            .map(Ok)
            .unwrap_or_else(std::env::current_dir)?
            .join(".libra")
            .join("sessions"),
    };
    std::fs::create_dir_all(&transcripts_dir)?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let transcript_path = transcripts_dir.join(format!("{}.jsonl", session_id));
    let transcript =
        transcript::Transcript::new(&transcript_path, &session_id, cfg.base_url())?.shared();

    let client = api::Client::new(cfg.base_url(), cfg.api.per_page(), cfg.api.timeout_ms())
        .with_verbose(args.verbose)
        .with_transcript(transcript.clone());

    let store: Box<dyn session::TokenStore> = match &token_file {
        Some(path) => Box::new(session::FileTokenStore::new(path)),
        None => Box::new(session::MemoryTokenStore::default()),
    };
    let mut session = session::SessionContext::new(store);
    match session.initialize(&client) {
        session::InitOutcome::Anonymous => {}
        session::InitOutcome::Restored(user) => {
            transcript::record(Some(&transcript), |t| {
                t.session_restored(user.id, user.role.as_str())
            });
            if args.verbose {
                eprintln!("[VERBOSE] Restored session for {}", user.email);
            }
        }
        session::InitOutcome::Expired(reason) => {
            transcript::record(Some(&transcript), |t| t.session_expired(&reason));
            if args.verbose {
                eprintln!("[VERBOSE] Stored session rejected: {}", reason);
            }
        }
    }

    if let Some(err) = session.take_store_error() {
        eprintln!("Warning: could not clear the saved session: {:#}", err);
    }

    let interactive = args.command.is_empty();
    let confirmer = confirm::PromptConfirmer::new(interactive, cfg.ui.assume_yes())
        .with_enabled(cfg.ui.confirm_destructive());

    let ctx = cli::Context {
        session_id,
        base_url: cfg.base_url().to_string(),
        per_page: cfg.api.per_page(),
        api: Arc::new(client),
        session: RefCell::new(session),
        transcript: Some(transcript),
        notifier: notify::TerminalNotifier::new(),
        confirmer: Box::new(confirmer),
        navbar: navbar::Navbar::new(cfg.ui.notifications(), cfg.ui.profile_menu()),
        view: RefCell::new(cli::View::Auth(Default::default())),
    };
    cli::start(&ctx);

    if interactive {
        cli::run_repl(ctx)
    } else {
        cli::run_once(&ctx, &args.command)
    }
}
