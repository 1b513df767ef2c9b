use std::env;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

use explorer_engine::config::Settings;
use explorer_engine::error::Result;
use explorer_engine::services::backend::{Backend, SearchKind, SearchOptions};
use explorer_engine::services::local::LocalBackend;
use explorer_engine::session::search::SearchStreamCoordinator;
use explorer_engine::session::SessionServices;
use explorer_engine::workspace::Workspace;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interval between polls while a listing or search is streaming
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn print_help() {
    println!("explorer {} - File browser session engine", VERSION);
    println!();
    println!("USAGE:");
    println!("    explorer [PATH]");
    println!("    explorer --search <QUERY> [PATH]");
    println!("    explorer --grep <QUERY> [PATH]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help              Print help information");
    println!("    -v, --version           Print version information");
    println!("    --search <QUERY>        Fuzzy-find files and folders by name");
    println!("    --grep <QUERY>          Search text files for QUERY");
    println!();
    println!("Set RUST_LOG (e.g. RUST_LOG=debug) to see engine traces.");
}

fn print_version() {
    println!("explorer {}", VERSION);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn list(settings: Settings, path: Option<&str>) -> Result<()> {
    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new(settings.listing.batch_size));
    let services = SessionServices::new(backend, settings);
    let mut workspace = Workspace::open(services, path).await?;

    while workspace.active_session().is_some_and(|s| s.is_loading()) {
        if workspace.poll() == 0 {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    let Some(session) = workspace.active_session() else {
        return Ok(());
    };
    println!("{}", session.current_path().unwrap_or_default());
    for entry in session.displayed_entries() {
        let size = if entry.is_dir() {
            "<DIR>".to_string()
        } else {
            entry.size.to_string()
        };
        println!(
            "{}  {:>12}  {}",
            entry.modified.format("%Y-%m-%d %H:%M"),
            size,
            entry.name
        );
    }
    Ok(())
}

async fn search(
    settings: Settings,
    kind: SearchKind,
    query: &str,
    root: Option<&str>,
) -> Result<()> {
    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new(settings.listing.batch_size));
    let root = root.map(str::to_string).unwrap_or_else(|| {
        env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| settings.start_path())
    });

    let mut coordinator = SearchStreamCoordinator::new(backend, kind, &settings.search);
    coordinator.set_root(&root);
    coordinator.set_options(SearchOptions::default());
    coordinator.set_query(query, Instant::now()).await;
    coordinator.flush().await;

    while coordinator.is_searching() {
        if coordinator.poll(Instant::now()).await == 0 {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    if let Some(error) = coordinator.error() {
        eprintln!("Error: {}", error);
        return Ok(());
    }

    for result in coordinator.results() {
        match kind {
            SearchKind::Filename => println!("{:>5}  {}", result.score, result.relative_path),
            SearchKind::Content => {
                for m in &result.matches {
                    println!(
                        "{}:{}:{}: {}",
                        result.relative_path, m.line_number, m.column, m.line_content
                    );
                }
            }
        }
    }
    eprintln!(
        "{} result(s), {} scanned",
        coordinator.results().len(),
        coordinator.scanned_count()
    );
    Ok(())
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    init_tracing();

    let settings = Settings::load();
    let runtime = tokio::runtime::Runtime::new()?;

    let result = match args.get(1).map(String::as_str) {
        Some("-h") | Some("--help") => {
            print_help();
            return Ok(());
        }
        Some("-v") | Some("--version") => {
            print_version();
            return Ok(());
        }
        Some(flag @ ("--search" | "--grep")) => {
            let Some(query) = args.get(2) else {
                eprintln!("Error: {} requires a query argument", flag);
                eprintln!("Usage: explorer {} <QUERY> [PATH]", flag);
                return Ok(());
            };
            let kind = if flag == "--search" {
                SearchKind::Filename
            } else {
                SearchKind::Content
            };
            runtime.block_on(search(settings, kind, query, args.get(3).map(String::as_str)))
        }
        Some(option) if option.starts_with('-') => {
            eprintln!("Unknown option: {}", option);
            eprintln!("Use --help for usage information");
            return Ok(());
        }
        path => runtime.block_on(list(settings, path)),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
    Ok(())
}
