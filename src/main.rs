use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod semantic;
#[cfg(test)]
mod tests;
mod web;
use config::Config;
use semantic::ProductSearchService;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout is reserved for search results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging();

    let mut config = Config::load()?;
    log::debug!("{config:?}");

    match args.command {
        cli::Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            web::start_daemon(config)
        }

        cli::Command::Search {
            query,
            limite,
            threshold,
        } => {
            let service = ProductSearchService::from_config(&config);
            let body = json!({
                "query": query,
                "limite": limite,
                "threshold": threshold,
            })
            .to_string();

            let response = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(service.handle(body.as_bytes()))?;

            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}
