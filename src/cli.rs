use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the product search endpoint
    Serve {
        /// Address to listen on (overrides config)
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Run a single search and print the JSON response
    Search {
        /// Free-text product query
        query: String,

        /// Maximum number of products
        #[clap(short, long)]
        limite: Option<u32>,

        /// Minimum similarity [0.0, 1.0]
        #[clap(short, long)]
        threshold: Option<f64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let args = Args::try_parse_from([
            "busca-produtos",
            "search",
            "arroz integral",
            "--limite",
            "3",
            "-t",
            "0.5",
        ])
        .unwrap();

        match args.command {
            Command::Search {
                query,
                limite,
                threshold,
            } => {
                assert_eq!(query, "arroz integral");
                assert_eq!(limite, Some(3));
                assert_eq!(threshold, Some(0.5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve() {
        let args = Args::try_parse_from(["busca-produtos", "serve"]).unwrap();
        assert!(matches!(args.command, Command::Serve { listen: None }));

        let args =
            Args::try_parse_from(["busca-produtos", "serve", "--listen", "127.0.0.1:3000"])
                .unwrap();
        match args.command {
            Command::Serve { listen } => assert_eq!(listen.as_deref(), Some("127.0.0.1:3000")),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
