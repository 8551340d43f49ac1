use clap::{Parser, Subcommand};
use copydesk_api::{Request, Service, ServiceConfig};
use copydesk_common::Role;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "copydesk", about = "Local driver for the copydesk service")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Override the data directory from the config
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Initialize the data directory with a first admin account
    Init {
        /// Username for the admin account
        #[arg(long, default_value = "admin")]
        admin_user: String,
        /// Password for the admin account
        #[arg(long)]
        admin_password: String,
    },
    /// Dispatch one request against the local service
    Call {
        /// Request method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// Request path, e.g. /pages/menu/revisions?limit=5
        path: String,
        /// Session token
        #[arg(short, long)]
        token: Option<String>,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Publish every page whose schedule has come due
    Sweep {
        /// Actor recorded in the audit journal
        #[arg(long, default_value = "scheduler")]
        actor: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Info => {
            println!("copydesk-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", copydesk_common::crate_info());
            println!("audit: {}", copydesk_audit::crate_info());
            println!("store: {}", copydesk_store::crate_info());
            println!("revisions: {}", copydesk_revisions::crate_info());
            println!("diff: {}", copydesk_diff::crate_info());
            println!("sessions: {}", copydesk_sessions::crate_info());
            println!("content: {}", copydesk_content::crate_info());
            println!("api: {}", copydesk_api::crate_info());
        }
        Commands::Init {
            admin_user,
            admin_password,
        } => {
            let mut service = Service::open(&config)?;
            service.bootstrap_user(&admin_user, &admin_password, Role::Admin)?;
            println!(
                "Initialized {} with admin account '{}'",
                config.data_dir.display(),
                admin_user
            );
        }
        Commands::Call {
            method,
            path,
            token,
            body,
        } => {
            let mut service = Service::open(&config)?;
            let mut request = Request::new(&method, &path);
            if let Some(token) = &token {
                request = request.with_token(token);
            }
            if let Some(body) = &body {
                request = request.with_body(serde_json::from_str(body)?);
            }
            let response = service.dispatch(&request);
            println!("{}", response.status);
            println!("{}", serde_json::to_string_pretty(&response.body)?);
            if response.status >= 400 {
                std::process::exit(1);
            }
        }
        Commands::Sweep { actor } => {
            let mut service = Service::open(&config)?;
            let published = service.run_sweep(&actor)?;
            if published.is_empty() {
                println!("Nothing due");
            } else {
                for page_id in &published {
                    println!("Published {page_id}");
                }
            }
        }
    }

    Ok(())
}
