use std::io;

use clap::Parser;
use log::error;

use mailharvest::app::{self, AppResult, Settings};
use mailharvest::config::{self, Account, Config, ConfigError, ImapSecurity, DEFAULT_CONFIG_PATH};
use mailharvest::message::HeaderField;
use mailharvest::output::default_output_path;
use mailharvest::scan::{CancelFlag, ScanOptions, ScanState, TraversalEngine};
use mailharvest::store::StoreClient;
use mailharvest::ui::ConsoleProgress;

type Engine = TraversalEngine<Box<dyn StoreClient + Send>>;

/// Collects the email addresses found in the headers of an IMAP mailbox into a CSV file
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    /// IMAP server address (overrides the configured account)
    #[clap(long)]
    server: Option<String>,

    /// IMAP server port (993 implies TLS)
    #[clap(long)]
    port: Option<u16>,

    /// IMAP username
    #[clap(short, long)]
    user: Option<String>,

    /// Connect without TLS
    #[clap(long, conflicts_with = "starttls")]
    plain: bool,

    /// Upgrade a plaintext connection with STARTTLS
    #[clap(long)]
    starttls: bool,

    /// Output CSV file (default: addresses-<timestamp>.csv in the configured directory)
    #[clap(short, long)]
    output: Option<String>,

    /// Folder to scan, may be repeated (default: ask, or all with --no-prompt)
    #[clap(long = "folder")]
    folders: Vec<String>,

    /// Header to read addresses from, may be repeated (default: To, From, Cc)
    #[clap(long = "header")]
    headers: Vec<HeaderField>,

    /// Do not ask; scan every folder and header
    #[clap(long)]
    no_prompt: bool,

    /// Reuse message counts from the counting pass instead of re-selecting empty folders
    #[clap(long)]
    cache_counts: bool,

    /// Write the addresses collected so far when the scan fails or is interrupted
    #[clap(long)]
    save_partial: bool,

    /// Store a prompted password in the system keyring
    #[clap(long)]
    remember: bool,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.debug { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .parse_default_env()
        .init();

    let code = match run(args) {
        Ok(()) => 0,
        Err(e) if e.is_interrupt() => {
            println!("❗ Address export interrupted.");
            e.exit_code()
        }
        Err(e) => {
            error!("{:?}", e);
            eprintln!("❌ {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> AppResult<()> {
    let config = Config::load(&args.config)?;
    let settings = settings(&args, &config)?;

    let mut store = app::login(&settings)?;
    let catalog = app::list(&mut store)?;

    let plan = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut out = io::stdout();
        app::plan(&catalog, &settings, &mut input, &mut out)?
    };

    let cancel = CancelFlag::new();
    let engine = TraversalEngine::new(store, plan)
        .with_options(settings.options.clone())
        .with_cancel(cancel.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (engine, result) = runtime.block_on(scan_until_interrupted(engine, cancel))?;

    let (mut store, session) = engine.into_parts();
    if session.state() != ScanState::Interrupted {
        app::logout(&mut store);
    }

    app::save(&settings, &session, result.is_ok())?;
    result
}

/// Runs the blocking scan on a worker thread and turns Ctrl-C into a cancellation.
async fn scan_until_interrupted(mut engine: Engine, cancel: CancelFlag) -> AppResult<(Engine, AppResult<()>)> {
    let mut task = tokio::task::spawn_blocking(move || {
        let mut progress = ConsoleProgress::new(0);
        let result = app::scan(&mut engine, &mut progress);
        match &result {
            Ok(()) => progress.finish(),
            Err(_) => progress.abandon(),
        }
        (engine, result)
    });

    tokio::select! {
        joined = &mut task => return Ok(joined?),
        Ok(()) = tokio::signal::ctrl_c() => {}
    }

    cancel.cancel();
    Ok(task.await?)
}

fn settings(args: &Args, config: &Config) -> AppResult<Settings> {
    let mut account = match &args.server {
        Some(server) => Account {
            name: server.clone(),
            imap_server: server.clone(),
            imap_username: args.user.clone().ok_or(ConfigError::NoAccount)?,
            ..Account::default()
        },
        None => config.current_account()?.clone(),
    };

    if let Some(user) = &args.user {
        account.imap_username = user.clone();
    }
    if let Some(port) = args.port {
        account.imap_port = port;
        account.imap_security = ImapSecurity::for_port(port);
    }
    if args.plain {
        account.imap_security = ImapSecurity::None;
    } else if args.starttls {
        account.imap_security = ImapSecurity::StartTLS;
    }

    let output = match &args.output {
        Some(path) => config::expand(path),
        None => default_output_path(&config::expand(&config.scan.output_dir)),
    };

    let headers_explicit = !args.headers.is_empty();
    let headers = if headers_explicit {
        args.headers.clone()
    } else {
        config.scan.headers.clone()
    };

    Ok(Settings {
        account,
        output,
        folders: args.folders.clone(),
        headers,
        headers_explicit,
        interactive: !args.no_prompt,
        options: ScanOptions {
            cache_counts: args.cache_counts,
        },
        save_partial: args.save_partial,
        remember_password: args.remember,
    })
}
