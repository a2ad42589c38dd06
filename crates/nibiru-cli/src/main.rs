// src/main.rs
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use nibiru_core::{AppSpec, ServerConfig, Supervisor};
use std::process;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "nibiru")]
#[command(about = "Multi-process HTTP/1.1 front-end with an embedded application runtime")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run {
        /// Number of application worker processes
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        workers: Option<u64>,

        /// Directory static files are served from
        #[arg(long = "static", value_name = "DIR")]
        static_dir: Option<String>,

        /// URL prefix that routes a request to the static responder
        #[arg(long = "static-url", value_name = "URL")]
        static_url: Option<String>,

        /// Application specifier, module.path:callable (callable defaults to "app")
        app: String,

        /// Port to listen on
        port: Option<String>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Usage problems exit 1; --help and --version are not errors.
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            process::exit(code);
        }
    };

    nibiru_core::logging::init_logging();
    nibiru_core::runtime_paths::augment_search_paths();

    match cli.command {
        Commands::Run {
            workers,
            static_dir,
            static_url,
            app,
            port,
        } => {
            let spec = match AppSpec::parse(&app) {
                Ok(spec) => spec,
                Err(err) => {
                    eprintln!("nibiru: {err}");
                    process::exit(1);
                }
            };

            let mut config = ServerConfig::new(spec);
            if let Some(workers) = workers {
                config.workers = workers as usize;
            }
            if let Some(dir) = static_dir {
                config.static_dir = dir;
            }
            if let Some(url) = static_url {
                config.static_url = url;
            }
            if let Some(port) = port {
                config.port = port;
            }

            if let Err(err) = Supervisor::new(config).run() {
                eprintln!("nibiru: {err}");
                process::exit(1);
            }
        }
    }
}
