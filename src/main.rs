use clap::Parser;
use fitcam_lib::core::config::Config;
use fitcam_lib::{init_logging, list_exercises, run, RunOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "FitCam - real-time exercise rep counter", long_about = None)]
struct Args {
    /// Exercise id, e.g. "squat" or "plank"
    #[arg(short, long, default_value = "hummer")]
    exercise: String,

    /// Client address charged against the session quota
    #[arg(long, default_value = "127.0.0.1")]
    client: String,

    /// How long to run before stopping the session
    #[arg(short, long, default_value_t = 30)]
    seconds: u64,

    /// Configuration file (defaults to ~/.fitcam/config/settings.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the synthetic feed and simulated subject instead of the camera
    #[arg(long)]
    simulate: bool,

    /// Write the annotated multipart MJPEG stream to this file
    #[arg(long)]
    mjpeg_out: Option<PathBuf>,

    /// List available exercises and exit
    #[arg(long)]
    list: bool,
}

fn load_config(path: Option<&PathBuf>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load configuration, using defaults: {}", e);
        Config::default()
    })
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = Args::parse();

    if args.list {
        for exercise in list_exercises() {
            println!("{:<18} {}", exercise.id, exercise.name);
        }
        return;
    }

    let mut config = load_config(args.config.as_ref());
    if args.simulate {
        config.simulate = true;
    }

    let options = RunOptions {
        exercise_id: args.exercise,
        client_addr: args.client,
        duration: Duration::from_secs(args.seconds),
        mjpeg_out: args.mjpeg_out,
    };

    match run(config, options).await {
        Ok(summary) => {
            let (left, right) = summary
                .final_status
                .as_ref()
                .map(|s| (s.left_count, s.right_count))
                .unwrap_or((0, 0));
            println!("Session {}", summary.session_id);
            println!("  frames received: {}", summary.frames_received);
            println!("  left count:      {}", left);
            println!("  right count:     {}", right);
            if let Some(reason) = summary.stop_reason {
                println!("  stopped:         {}", reason.to_string());
            }
            if summary.mjpeg_bytes > 0 {
                println!("  mjpeg bytes:     {}", summary.mjpeg_bytes);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
