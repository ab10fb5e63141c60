use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod auth;
mod config;
mod convert;
mod error;
mod render;
mod serve;
mod session;

#[derive(Parser)]
#[command(name = "sitegate")]
#[command(about = "Serve a folder of static files behind a Google login gate")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a folder over HTTP behind the login gate
    ///
    /// Requires GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and REDIRECT_URI in
    /// the environment (a .env file in the working directory is honored).
    /// The allow list comes from the AUTH variable and/or a .auth file in
    /// the served folder, one email address per line.
    Serve {
        /// Folder to serve. Also where the optional .auth allow-list file
        /// is looked up.
        #[arg(short, long, default_value = ".", value_name = "FOLDER")]
        dir: PathBuf,
    },

    /// Rewrite a folder's index.html into an index.jinja2 template
    ///
    /// Replaces pinned bootstrap 5.x CDN URLs and the script.js reference
    /// with placeholders the server fills in at request time. Running it
    /// again, or on a folder with no index.html, is a no-op.
    Convert {
        /// Folder holding the index.html to convert.
        #[arg(default_value = ".", value_name = "FOLDER")]
        folder: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { dir } => {
            let config = config::AppConfig::from_env(&dir)?;
            serve::run(serve::AppState::new(config, dir)).await
        }
        Commands::Convert { folder } => {
            match convert::convert_folder(&folder)? {
                convert::ConvertOutcome::Converted => {
                    tracing::info!("converted {} into a template", folder.display());
                }
                convert::ConvertOutcome::NothingToDo => {
                    tracing::debug!("no index.html in {}, nothing to do", folder.display());
                }
            }
            Ok(())
        }
    }
}
