use clap::{Parser, Subcommand};
use filmnotes::Config;

/// Film catalog with user comments
#[derive(Parser)]
#[command(name = "filmnotes")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Import films from the remote catalog and invalidate the cached list
    Sync {
        /// Catalog URL, overrides CATALOG_URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,filmnotes=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => filmnotes::serve(config).await,
        Command::Sync { url } => {
            if let Some(url) = url {
                config.catalog_url = url;
            }
            println!("Starting film sync...");
            let report = filmnotes::run_sync(config).await?;
            for film in &report.films {
                let verb = if film.created { "Created" } else { "Updated" };
                println!("  {verb}: {} ({})", film.title, film.external_id);
            }
            println!("Invalidated cache key: {}", filmnotes::cache::FILMS_LIST_KEY);
            println!(
                "\nSync complete! Total: {}, Created: {}, Updated: {}",
                report.total, report.created, report.updated
            );
            Ok(())
        },
    }
}
