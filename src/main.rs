//! VIGIA Sentry CLI
//!
//! Motion-triggered interactive sentry.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vigia_sentry::{
    ai::AiCapability,
    camera::{CameraProvider, SequenceCamera},
    config::Config,
    sentry::{Collaborators, Sentry, SentryHandle, SentrySnapshot, Speaker},
    speech::{AlertTone, CommandVoice, LogVoice, Recognizer, StdinRecognizer, Synthesizer},
    PRIVACY_NOTICE, VERSION,
};

#[derive(Parser)]
#[command(name = "vigia")]
#[command(author = "PLOT CENTER")]
#[command(version = VERSION)]
#[command(about = "Motion-triggered interactive sentry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start watching
    Start {
        /// Directory of still images played back as the camera feed
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Playback rate for --frames
        #[arg(long, default_value = "15")]
        fps: u32,

        /// Open this camera device index instead of choosing by facing
        /// (requires camera feature)
        #[arg(long)]
        device: Option<i32>,

        /// Print spoken lines instead of running a speech command
        #[arg(long)]
        no_voice: bool,

        /// Enable voice chat, reading utterances from stdin (one per line)
        #[arg(long)]
        listen: bool,

        /// Run without the AI collaborator
        #[arg(long)]
        no_ai: bool,

        /// Serve the control API on this port (requires server feature)
        #[arg(long)]
        serve: Option<u16>,
    },

    /// Show configuration
    Config,

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display privacy notice
    Privacy,

    /// Render the alert tone to a WAV file
    Tone {
        /// Output path
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigia_sentry=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            frames,
            fps,
            device,
            no_voice,
            listen,
            no_ai,
            serve,
        } => {
            cmd_start(frames, fps, device, no_voice, listen, no_ai, serve);
        }
        Commands::Config => {
            cmd_config();
        }
        Commands::InitConfig { force } => {
            cmd_init_config(force);
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Tone { path } => {
            cmd_tone(&path);
        }
    }
}

fn cmd_start(
    frames: Option<PathBuf>,
    fps: u32,
    device: Option<i32>,
    no_voice: bool,
    listen: bool,
    no_ai: bool,
    serve: Option<u16>,
) {
    println!("VIGIA Sentry v{VERSION}");
    println!();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config ({e}); using defaults");
            Config::default()
        }
    };

    let camera: Box<dyn CameraProvider> = match &frames {
        Some(dir) => {
            println!("  Camera: frame sequence {dir:?} at {fps} fps");
            Box::new(SequenceCamera::new(dir.clone(), fps))
        }
        None => device_camera(device),
    };

    let voice: Arc<dyn Synthesizer> = if no_voice {
        println!("  Voice: console");
        Arc::new(LogVoice)
    } else {
        match CommandVoice::detect(&config.voice) {
            Some(voice) => {
                println!("  Voice: {}", voice.program().display());
                Arc::new(voice)
            }
            None => {
                println!("  Voice: console (no speech command found)");
                Arc::new(LogVoice)
            }
        }
    };

    let recognizer: Option<Box<dyn Recognizer>> = if listen {
        println!("  Voice chat: enabled (type a line to speak)");
        Some(Box::new(StdinRecognizer::stdin()))
    } else {
        println!("  Voice chat: disabled");
        None
    };

    let ai = if no_ai {
        AiCapability::Absent("disabled with --no-ai".to_string())
    } else {
        AiCapability::probe(&config.ai)
    };
    match &ai {
        AiCapability::Available(_) => println!("  AI collaborator: {}", config.ai.model),
        AiCapability::Absent(reason) => println!("  AI collaborator: absent ({reason})"),
        AiCapability::Failed(reason) => eprintln!("Warning: AI collaborator failed: {reason}"),
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };

    let collaborators = Collaborators {
        camera,
        voice,
        recognizer,
        ai,
    };

    let summary = runtime.block_on(async move {
        let (sentry, handle) = Sentry::new(collaborators, &config);
        ctrlc_handler(handle.clone());

        let _server = start_server(serve, handle.clone()).await;

        let sentry_task = tokio::spawn(sentry.run());
        let printer = tokio::spawn(print_changes(handle.clone()));

        match sentry_task.await {
            Ok(_) => {}
            Err(e) => eprintln!("Sentry task failed: {e}"),
        }
        printer.abort();
        handle.transparency_log().summary()
    });

    println!();
    println!("{summary}");
    // The stdin reader thread may still be blocked on input.
    std::process::exit(0);
}

#[cfg(feature = "camera")]
fn device_camera(device: Option<i32>) -> Box<dyn CameraProvider> {
    use vigia_sentry::camera::DeviceCamera;

    match device {
        Some(index) => {
            println!("  Camera: device {index}");
            Box::new(DeviceCamera::with_index(index))
        }
        None => {
            println!("  Camera: default device for the configured facing");
            Box::new(DeviceCamera::new())
        }
    }
}

#[cfg(not(feature = "camera"))]
fn device_camera(device: Option<i32>) -> Box<dyn CameraProvider> {
    use vigia_sentry::camera::NoCamera;

    if device.is_some() {
        eprintln!("Warning: --device flag ignored (camera feature not enabled at compile time)");
    }
    println!("  Camera: none (pass --frames <dir> to play a frame sequence)");
    Box::new(NoCamera::with_reason("no camera backend compiled in"))
}

#[cfg(feature = "server")]
async fn start_server(
    port: Option<u16>,
    handle: SentryHandle,
) -> Option<tokio::sync::oneshot::Sender<()>> {
    use vigia_sentry::server::{run, ServerConfig};

    let port = port?;
    match run(ServerConfig::new(port), handle).await {
        Ok((addr, shutdown_tx)) => {
            println!("Control API: http://{addr}");
            Some(shutdown_tx)
        }
        Err(e) => {
            eprintln!("Warning: Could not start control API: {e}");
            None
        }
    }
}

#[cfg(not(feature = "server"))]
async fn start_server(port: Option<u16>, _handle: SentryHandle) -> Option<()> {
    if port.is_some() {
        eprintln!("Warning: --serve flag ignored (server feature not enabled at compile time)");
    }
    None
}

/// Print status changes and new conversation lines as they happen.
async fn print_changes(handle: SentryHandle) {
    let mut rx = handle.subscribe();
    let mut last = SentrySnapshot::default();

    loop {
        let current = rx.borrow_and_update().clone();

        if current.status != last.status || current.cycle != last.cycle {
            println!("[{}] {}", current.status, current.label);
        }
        if current.last_error != last.last_error {
            if let Some(error) = &current.last_error {
                eprintln!("Error: {error}");
            }
        }
        if let Some(capture) = &current.capture {
            let described = last
                .capture
                .as_ref()
                .is_some_and(|c| c.id == capture.id && c.description.is_some());
            if let (Some(description), false) = (&capture.description, described) {
                println!("  Analysis: {description}");
            }
        }

        let seen = if current.cycle == last.cycle {
            last.conversation.len()
        } else {
            0
        };
        for entry in current.conversation.iter().skip(seen) {
            let who = match entry.speaker {
                Speaker::User => "You",
                Speaker::System => "VIGIA",
                Speaker::Error => "Error",
            };
            println!("  {who}: {}", entry.text);
        }

        last = current;
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_init_config(force: bool) {
    let path = Config::config_path();
    if path.exists() && !force {
        eprintln!("Config file already exists at {path:?} (use --force to overwrite)");
        std::process::exit(1);
    }
    if let Err(e) = Config::default().save_to(&path) {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Wrote default configuration to {path:?}");
}

fn cmd_privacy() {
    println!("{PRIVACY_NOTICE}");
}

fn cmd_tone(path: &std::path::Path) {
    let tone = AlertTone::default();
    match std::fs::write(path, tone.to_wav()) {
        Ok(()) => println!(
            "Wrote {:.1}s alert tone to {path:?}",
            tone.duration()
        ),
        Err(e) => {
            eprintln!("Error writing tone: {e}");
            std::process::exit(1);
        }
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(handle: SentryHandle) {
    if let Err(e) = ctrlc::set_handler(move || {
        handle.shutdown();
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
