mod auth_cmd;
mod camera_cmd;
mod config;
mod context;
mod output;
mod roi_cmd;
mod snapshot_cmd;
mod watch_cmd;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use infaq_core::SourceMode;

use context::AppContext;

#[derive(Parser)]
#[command(name = "infaq", version, about = "Donation-box camera monitor CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the account service and store the token
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Prefer INFAQ_PASSWORD or the prompt over this flag
        #[arg(long)]
        password: Option<String>,
    },

    /// Register a masjid with its admin account and first camera
    Register {
        /// Masjid name (3-150 characters)
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: Option<String>,
        /// Telegram chat that receives alerts
        #[arg(long)]
        tg_chat_id: Option<String>,
        #[arg(long)]
        camera_name: Option<String>,
        /// http://, https:// or rtsp:// URL of the camera
        #[arg(long)]
        camera_url: String,
        #[arg(short, long)]
        username: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Stop the camera (best effort) and forget the stored token
    Logout,

    /// Read or edit the region of interest
    Roi {
        #[command(subcommand)]
        action: RoiAction,
    },

    /// Control the capture session
    Camera {
        #[command(subcommand)]
        action: CameraAction,
    },

    /// Follow alerts and stream state until interrupted
    Watch {
        /// Status poll interval in milliseconds (overrides monitor.poll_interval_ms)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Keep the latest snapshot frame in this file while the stream is degraded
        #[arg(long)]
        frame_out: Option<PathBuf>,
    },

    /// Save a single frame from the snapshot endpoint
    Snapshot {
        #[arg(short, long, default_value = "snapshot.jpg")]
        out: PathBuf,
    },

    /// Show or set configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum RoiAction {
    /// Show the committed ROI
    Get {
        /// Also print pixel bounds for a frame of this size, e.g. 1280x720
        #[arg(long)]
        frame: Option<String>,
    },
    /// Save an ROI given in normalized coordinates
    Set { x: f64, y: f64, w: f64, h: f64 },
    /// Save the ROI produced by dragging over a rendered frame
    Draw {
        /// Rendered frame size, e.g. 960x540
        #[arg(long)]
        viewport: String,
        /// Top-left of the rendered frame in pointer coordinates, e.g. 10,20
        #[arg(long)]
        offset: Option<String>,
        /// Pointer-down position, e.g. 100,80
        #[arg(long)]
        from: String,
        /// Pointer-up position
        #[arg(long)]
        to: String,
        /// Print the rectangle without saving it
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove the ROI
    Clear,
}

#[derive(Subcommand)]
enum CameraAction {
    /// Start capture from a webcam, video file or IP camera
    Start {
        #[arg(long)]
        mode: Option<SourceMode>,
        /// Device index, file path or camera URL
        #[arg(long)]
        source: Option<String>,
        /// Play a video source once instead of looping
        #[arg(long)]
        no_loop: bool,
        /// Return without waiting for the server to report the camera running
        #[arg(long)]
        no_wait: bool,
    },
    /// Start from the source saved for this account
    StartDefault {
        #[arg(long)]
        no_wait: bool,
    },
    /// Stop capture
    Stop,
    /// Show the server's camera status
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set a value, e.g. `infaq config set server.edge_url http://edge:8000`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("infaq=info".parse().unwrap())
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        // Config commands need neither a client nor a token.
        Commands::Config { action } => run_config(action),
        command => {
            let ctx = AppContext::load()?;
            dispatch(&ctx, command).await
        }
    }
}

async fn dispatch(ctx: &AppContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Login { username, password } => auth_cmd::run_login(ctx, username, password).await,
        Commands::Register {
            name,
            address,
            tg_chat_id,
            camera_name,
            camera_url,
            username,
            password,
        } => {
            let args = auth_cmd::RegisterArgs {
                nama_masjid: name,
                alamat: address,
                tg_chat_id,
                camera_nama: camera_name,
                camera_url,
                username,
                password,
            };
            auth_cmd::run_register(ctx, args).await
        }
        Commands::Logout => auth_cmd::run_logout(ctx).await,
        Commands::Roi { action } => match action {
            RoiAction::Get { frame } => roi_cmd::run_get(ctx, frame.as_deref()).await,
            RoiAction::Set { x, y, w, h } => roi_cmd::run_set(ctx, x, y, w, h).await,
            RoiAction::Draw {
                viewport,
                offset,
                from,
                to,
                dry_run,
            } => roi_cmd::run_draw(ctx, &viewport, offset.as_deref(), &from, &to, dry_run).await,
            RoiAction::Clear => roi_cmd::run_clear(ctx).await,
        },
        Commands::Camera { action } => match action {
            CameraAction::Start {
                mode,
                source,
                no_loop,
                no_wait,
            } => {
                let args = camera_cmd::StartArgs {
                    mode,
                    source,
                    no_loop,
                    no_wait,
                };
                camera_cmd::run_start(ctx, args).await
            }
            CameraAction::StartDefault { no_wait } => camera_cmd::run_start_default(ctx, no_wait).await,
            CameraAction::Stop => camera_cmd::run_stop(ctx).await,
            CameraAction::Status { json } => camera_cmd::run_status(ctx, json).await,
        },
        Commands::Watch {
            interval_ms,
            frame_out,
        } => {
            let args = watch_cmd::WatchArgs {
                interval: interval_ms.map(Duration::from_millis),
                frame_out,
            };
            watch_cmd::run_watch(ctx, args).await
        }
        Commands::Snapshot { out } => snapshot_cmd::run_snapshot(ctx, &out).await,
        Commands::Config { action } => run_config(action),
    }
}

fn run_config(action: Option<ConfigAction>) -> anyhow::Result<()> {
    match action {
        None | Some(ConfigAction::Show) => config::show_config(),
        Some(ConfigAction::Set { key, value }) => config::set_config(&key, &value),
    }
}
