// src/main.rs - Terminal control surface for stepped runs
use clap::{Args, Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use stepdrive_rs::config::{self, Config};
use stepdrive_rs::device::{DeviceAdapter, SimulatedDevice};
use stepdrive_rs::{estimate, MotionHost, RawInputs, RunEvent, RunParameters, TimeEstimate};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stepped single-axis runs for a micromanipulator.
#[derive(Parser, Debug)]
#[command(name = "stepdrive", about = "Drive a micromanipulator through a sequence of relative steps.")]
struct Cli {
    /// Path to a TOML config file (overrides defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the time estimate for a set of parameters
    Estimate(ParamArgs),
    /// Execute a run; type `s` + Enter to stop, `q` + Enter to quit
    Run {
        #[command(flatten)]
        params: ParamArgs,
        /// Skip the confirmation prompt for long runs
        #[arg(long)]
        yes: bool,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct ParamArgs {
    /// Number of steps (1-100)
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    loops: String,
    /// Step size in um (0.05-100)
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    step_size: String,
    /// Travel speed in um/s (0.05-100)
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    speed: String,
    /// Pause between steps in s (0.05-100)
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    delay: String,
}

impl ParamArgs {
    fn validate(&self) -> Result<RunParameters, BoxError> {
        let inputs = RawInputs::new(&self.loops, &self.step_size, &self.speed, &self.delay);
        RunParameters::from_inputs(&inputs).map_err(|e| {
            tracing::error!("Invalid parameter {}", e);
            Box::new(e) as BoxError
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    let config = match &cli.config {
        Some(path) => {
            let path = path.to_str().ok_or("config path is not valid UTF-8")?;
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(path)?
        }
        None => Config::default(),
    };

    match cli.command {
        Commands::Estimate(args) => {
            let params = args.validate()?;
            let time_estimate = estimate(&params);
            println!("{}", time_estimate);
            if time_estimate.needs_confirmation(&config.confirmation_policy()) {
                println!("This run exceeds the confirmation limits and will ask before starting.");
            }
            Ok(())
        }
        Commands::Run { params, yes, json } => run(&config, params.validate()?, yes, json).await,
    }
}

async fn run(config: &Config, params: RunParameters, yes: bool, json: bool) -> Result<(), BoxError> {
    let mut input = spawn_stdin_reader();

    let time_estimate = estimate(&params);
    println!("{}", time_estimate);
    if !yes
        && time_estimate.needs_confirmation(&config.confirmation_policy())
        && !confirm(&time_estimate, &mut input).await
    {
        println!("Macro canceled by user.");
        return Ok(());
    }

    let device: Arc<dyn DeviceAdapter> = Arc::new(SimulatedDevice::new(&config.simulator));
    let mut host = MotionHost::from_config(device, config);
    let mut handle = host.start(params)?;
    tracing::info!("Run {} started", handle.run_id);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut input_open = true;
    let mut quit = false;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => {
                    render(&event, json)?;
                    if event.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            line = input.recv(), if input_open => match line.as_deref().map(str::trim) {
                Some("s") | Some("stop") => {
                    println!("Macro stopping...");
                    host.request_stop();
                }
                Some("q") | Some("quit") => {
                    println!("Quitting...");
                    quit = true;
                    break;
                }
                Some(_) => {}
                None => input_open = false,
            },
            _ = &mut ctrl_c => {
                tracing::warn!("Interrupt received, quitting");
                quit = true;
                break;
            }
        }
    }

    let outcome = if quit { host.shutdown().await } else { host.wait().await };
    while let Some(event) = handle.next_event().await {
        render(&event, json)?;
    }
    if let Some(outcome) = outcome {
        tracing::info!(
            "Run {} ended {:?} after {} steps",
            outcome.run_id,
            outcome.state,
            outcome.steps_completed
        );
    }
    Ok(())
}

fn render(event: &RunEvent, json: bool) -> Result<(), BoxError> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!("{}", event.status_text());
    }
    Ok(())
}

async fn confirm(estimate: &TimeEstimate, input: &mut mpsc::UnboundedReceiver<String>) -> bool {
    println!(
        "Time per step is {:.2}s and total time is {:.2}min. Do you want to continue? [y/N]",
        estimate.per_step_secs,
        estimate.total_minutes()
    );
    matches!(
        input.recv().await.as_deref().map(str::trim),
        Some("y") | Some("Y") | Some("yes")
    )
}

/// Forward stdin lines from a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
