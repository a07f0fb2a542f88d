use anyhow::Context;
use atp_client::{HttpIdentityResolver, IdentityResolver};
use atp_oauth::{CallbackParams, OAuthClient, OAuthClientConfig, OAuthStore};
use clap::Parser;
use repo_kit::actions::{Action, GlobalAction, SessionAction};
use repo_kit::bootstrap::SessionBootstrap;
use repo_kit::commands::{self, Command};
use repo_kit::middleware::{
    ActiveSession, LoggingMiddleware, LoginFlow, RepositoryMiddleware, SessionMiddleware,
};
use repo_kit::state::AppState;
use repo_kit::store::Store;
use repo_kit::{logger, views};
use repo_kit_config::{paths, AppConfig, LastSignedIn};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Browse and bulk-delete records in your AT Protocol repository
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Redirect URL from the authorization server, completes a pending login
    #[arg(long, value_name = "URL")]
    callback: Option<Url>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_file = logger::init()?;
    log::info!("Starting repo-kit");

    let config = AppConfig::load();
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let identity: Arc<dyn IdentityResolver> = Arc::new(HttpIdentityResolver::new(
        config.plc_directory_url()?,
        config.handle_resolver_url()?,
    )?);
    let oauth = OAuthClient::new(
        OAuthClientConfig {
            client_id: config.client_id(),
            redirect_uri: config.redirect_url()?.to_string(),
        },
        identity.clone(),
        OAuthStore::new(paths::oauth_store_dir()?),
    )?;
    let bootstrap = Arc::new(SessionBootstrap::new(
        Arc::new(oauth),
        LastSignedIn::open_default()?,
        config.oauth_scope.clone(),
    ));
    let login = LoginFlow::from_config(&config)?;
    let active = ActiveSession::default();

    // Middleware executes in this order
    let mut store = Store::new(AppState::new(config));
    store.add_middleware(Box::new(LoggingMiddleware::new()));
    store.add_middleware(Box::new(SessionMiddleware::new(
        runtime.handle().clone(),
        bootstrap,
        identity,
        active.clone(),
        login,
    )));
    store.add_middleware(Box::new(RepositoryMiddleware::new(
        runtime.handle().clone(),
        active,
    )));

    println!("repo-kit {} (log: {})", env!("CARGO_PKG_VERSION"), log_file.display());
    println!("Type `help` for commands.");

    let callback = cli.callback.as_ref().map(CallbackParams::from_url);
    store.dispatch(Action::Session(SessionAction::Bootstrap { callback }));

    run(&mut store, spawn_input_reader());

    log::info!("Exiting repo-kit");
    Ok(())
}

/// Read stdin lines on their own thread
fn spawn_input_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn run(store: &mut Store, input: Receiver<String>) {
    let mut last_status = String::new();

    while store.state().running {
        let status = views::render_status(store.state());
        if status != last_status {
            print!("{}", status);
            last_status = status;
        }

        match input.try_recv() {
            Ok(line) => {
                if handle_line(store, &line) {
                    // Force a reprint after explicit output
                    last_status.clear();
                }
            }
            Err(TryRecvError::Empty) => {
                store.wait_for_action(Duration::from_millis(50));
            }
            Err(TryRecvError::Disconnected) => {
                store.dispatch(Action::Global(GlobalAction::Quit));
            }
        }
    }
}

/// Run one command line; returns true if it printed the status
fn handle_line(store: &mut Store, line: &str) -> bool {
    let command = match commands::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return false,
        Err(message) => {
            println!("{}", message);
            return false;
        }
    };

    if let Some(action) = command.action(store.state()) {
        store.dispatch(action);
    }

    match command {
        Command::Collections => print!("{}", views::render_collections(store.state())),
        Command::List => print!("{}", views::render_records(store.state())),
        Command::Help => print!("{}", views::help_text()),
        Command::Status => return true,
        _ => {}
    }
    false
}
