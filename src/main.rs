use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dropoutfx::api::{ExpertSystem, ExpertSystemClient};
use dropoutfx::app::{App, Page};
use dropoutfx::config::Config;
use dropoutfx::flows::risk_detector::{selector_options, RiskDetector};
use dropoutfx::flows::{LoginPhase, RiskPhase};
use dropoutfx::logging::{self, obj, v_str, Domain};
use dropoutfx::nav::Route;
use dropoutfx::render::{self, SpinnerSize};
use dropoutfx::session::SessionContext;

/// Student Dropout Risk Detector - expert system client
#[derive(Parser)]
#[command(name = "dropoutfx", version)]
#[command(about = "Student Dropout Risk Detector - expert system client", long_about = None)]
struct Cli {
    /// Backend base URL (overrides $API_BASE_URL)
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the home page
    Home,

    /// List the facts the expert system knows about
    KnowledgeBase,

    /// Sign in against the backend
    Login {
        #[arg(long)]
        email: String,
        /// Falls back to $ES_PASSWORD, then to one line on stdin
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the navigation bar and session state
    Status,

    /// Evaluate a student's dropout risk
    Risk {
        /// Fact selection as name=value, repeatable
        #[arg(long = "fact", value_parser = parse_fact)]
        facts: Vec<(String, String)>,
    },
}

fn parse_fact(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(api) = cli.api {
        cfg = cfg.with_api_base_url(api);
    }
    cfg.validate()?;
    logging::info(
        Domain::System,
        "system.start",
        obj(&[("api_base_url", v_str(&cfg.api_base_url)), ("session_db", v_str(&cfg.session_db_path))]),
    );

    let session = SessionContext::open(&cfg.session_db_path)?;
    let api: Arc<dyn ExpertSystem> = Arc::new(ExpertSystemClient::new(&cfg)?);
    let mut app = App::new(cfg, api, session);

    let ok = match cli.command.unwrap_or(Commands::Home) {
        Commands::Home => show(&mut app, Route::Home).await?,
        Commands::KnowledgeBase => show(&mut app, Route::KnowledgeBase).await?,
        Commands::Login { email, password } => login(&mut app, &email, password).await?,
        Commands::Logout => {
            app.logout().await?;
            print_page(&app);
            true
        }
        Commands::Status => {
            app.sync_session()?;
            let session = app.session().read();
            println!("{}", render::nav_bar(app.nav()));
            match (session.is_logged_in(), session.display_name()) {
                (true, Some(name)) => println!("Signed in as {}", name),
                (true, None) => println!("Signed in"),
                (false, _) => println!("Signed out"),
            }
            true
        }
        Commands::Risk { facts } => risk(&mut app, facts).await?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn print_page(app: &App) {
    println!("{}", render::layout(app.nav(), &render::page(app.page())));
}

async fn show(app: &mut App, route: Route) -> Result<bool> {
    let loading = (route == Route::KnowledgeBase).then(|| render::spinner(SpinnerSize::Md, "Loading facts..."));
    app.navigate(route).await?;
    drop(loading);
    print_page(app);
    Ok(app.page().error().is_none())
}

/// Show a spinner for as long as `busy` holds for the published phase.
fn follow_phase<P>(mut rx: watch::Receiver<P>, busy: fn(&P) -> bool, message: &'static str) -> JoinHandle<()>
where
    P: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut bar = None;
        loop {
            let is_busy = busy(&rx.borrow_and_update());
            if is_busy && bar.is_none() {
                bar = Some(render::spinner(SpinnerSize::Sm, message));
            } else if !is_busy {
                bar = None;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}

async fn stop(handle: JoinHandle<()>) {
    handle.abort();
    let _ = handle.await;
}

fn read_secret(prompt: &str) -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("{}", prompt);
        io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn login(app: &mut App, email: &str, password: Option<String>) -> Result<bool> {
    app.navigate(Route::Login).await?;
    let flow = match app.page_mut() {
        Page::Login(flow) => flow,
        // Already signed in: the login page sent us on.
        _ => {
            print_page(app);
            return Ok(true);
        }
    };

    let password = match password.or_else(|| std::env::var("ES_PASSWORD").ok()) {
        Some(p) => p,
        None => read_secret("Password: ")?,
    };
    flow.set_credentials(email, &password);

    let spinner = follow_phase(flow.watch_phase(), |p| *p == LoginPhase::Submitting, "Signing in...");
    let outcome = flow.submit().await;
    stop(spinner).await;

    match outcome {
        Ok(next) => {
            app.navigate(next).await?;
            print_page(app);
            Ok(true)
        }
        Err(_) => {
            print_page(app);
            Ok(false)
        }
    }
}

fn prompt_facts(flow: &mut RiskDetector) -> Result<()> {
    let facts: Vec<_> = match flow.catalog() {
        Some(catalog) => catalog.iter().cloned().collect(),
        None => return Ok(()),
    };
    let stdin = io::stdin();
    for fact in facts {
        let options = selector_options(&fact);
        let listing = options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}) {}", i, o.label))
            .collect::<Vec<_>>()
            .join("  ");
        eprint!("{}  [{}]: ", fact.label, listing);
        io::stderr().flush()?;

        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        let answer = line.trim();
        let value = match answer.parse::<usize>() {
            Ok(i) => options.get(i).map(|o| o.value).ok_or_else(|| anyhow!("no option {}", i))?,
            Err(_) => answer,
        };
        flow.select(&fact.id, Some(value))?;
    }
    Ok(())
}

async fn risk(app: &mut App, facts: Vec<(String, String)>) -> Result<bool> {
    let loading = render::spinner(SpinnerSize::Lg, "Loading facts...");
    app.navigate(Route::RiskDetector).await?;
    drop(loading);
    let flow = match app.page_mut() {
        Page::RiskDetector(flow) if flow.catalog().is_some() => flow,
        // Redirected to login, or the catalog failed to load.
        _ => {
            print_page(app);
            return Ok(false);
        }
    };

    if facts.is_empty() && io::stdin().is_terminal() {
        prompt_facts(flow)?;
    }
    for (name, value) in &facts {
        if let Err(err) = flow.select(name, Some(value)) {
            eprintln!("{}", err);
            return Ok(false);
        }
    }

    let spinner = follow_phase(flow.watch_phase(), |p| *p == RiskPhase::Submitting, "Evaluating...");
    let ok = flow.submit().await.is_ok();
    stop(spinner).await;

    if let Some(after) = flow.reveal_after() {
        tokio::time::sleep(after).await;
    }
    print_page(app);
    Ok(ok)
}
