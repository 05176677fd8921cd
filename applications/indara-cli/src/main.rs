/// Indara CLI - drive the playback engine from a terminal
use clap::{Parser, Subcommand};
use indara_cli::{session::status_line, tracks, AppConfig, Session};
use indara_playback::PlayerSnapshot;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "indara-cli")]
#[command(about = "Headless harness for the Indara playback engine", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// User id passed to the play-count hook
    #[arg(short, long, global = true, env = "INDARA_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a queue from the start (or from --start)
    Play {
        /// Audio URLs; `broken:` URLs fail to load
        urls: Vec<String>,

        /// JSON file with an array of tracks, queued before the URLs
        #[arg(short, long)]
        queue: Option<PathBuf>,

        /// Queue index to start at
        #[arg(short, long, default_value_t = 0)]
        start: usize,
    },
    /// Continue the saved session
    Resume {
        /// Audio URLs; must contain the saved track
        urls: Vec<String>,

        /// JSON file with an array of tracks, queued before the URLs
        #[arg(short, long)]
        queue: Option<PathBuf>,
    },
    /// Print the saved session
    Session,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indara_cli=info,indara_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Play { urls, queue, start } => {
            let tracks = tracks::collect(&urls, queue.as_deref()).await?;
            let session = Session::new(&config);
            session.store().set_user(cli.user);

            let outcome = session.play(tracks, start).await?;
            tracing::info!(?outcome, "queue started");
            run(&session).await;
        }
        Commands::Resume { urls, queue } => {
            let tracks = tracks::collect(&urls, queue.as_deref()).await?;
            let session = Session::new(&config);
            session.store().set_user(cli.user);

            match session.resume(tracks).await? {
                Some(outcome) => {
                    tracing::info!(?outcome, "session resumed");
                    session.store().toggle().await;
                    run(&session).await;
                }
                None => {
                    println!("No saved session at {}", config.session.file.display());
                    session.shutdown().await;
                }
            }
        }
        Commands::Session => {
            let session = Session::new(&config);
            match session.saved().await {
                Some(saved) => println!(
                    "{} at {} (saved {})",
                    saved.track_id,
                    indara_playback::format::format_seconds(saved.position_secs),
                    saved.saved_at.to_rfc3339()
                ),
                None => println!("No saved session at {}", config.session.file.display()),
            }
            session.shutdown().await;
        }
    }

    Ok(())
}

/// Print status until the queue runs out or ctrl-c, then tear down
async fn run(session: &Session) {
    let mut view = session.store().ui_view();

    tokio::select! {
        () = session.wait_for_end_of_queue() => tracing::info!("end of queue"),
        () = print_status(&mut view) => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => tracing::info!("interrupted"),
            Err(e) => tracing::warn!(error = %e, "failed to listen for ctrl-c"),
        },
    }

    session.shutdown().await;
}

async fn print_status(view: &mut watch::Receiver<PlayerSnapshot>) {
    let mut last = String::new();
    while view.changed().await.is_ok() {
        let line = status_line(&view.borrow_and_update());
        if line != last {
            println!("{line}");
            last = line;
        }
    }
}
