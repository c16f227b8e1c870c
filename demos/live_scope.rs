//! Live level meter example.
//!
//! Captures from an input device and redraws a terminal level meter at display
//! rate until Ctrl-C is pressed or the time limit runs out.
//!
//! # Usage
//!
//! ```bash
//! # List input devices
//! cargo run --example live_scope -- --list
//!
//! # Capture from device 0 at 44.1kHz, 1024-frame blocks
//! cargo run --example live_scope -- --device 0
//!
//! # No hardware: synthetic sine
//! cargo run --example live_scope -- --mock --seconds 5
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

use clap::Parser;
use scope_stream::{
    CpalSource, DeviceSelection, DeviceSource, LiveCapture, MockSource, OverflowPolicy,
    RenderDriver, RenderError, Renderer, SampleBlock, StopSignal, StreamEvent,
};
use tracing_subscriber::EnvFilter;

/// Width of the meter bar in characters.
const METER_WIDTH: usize = 50;

/// Lowest level shown on the meter.
const METER_FLOOR_DB: f32 = -60.0;

#[derive(Parser, Debug)]
#[command(name = "live_scope", about = "Live audio level meter")]
struct Args {
    /// List input devices and exit
    #[arg(long)]
    list: bool,

    /// Input device index (default: system default input)
    #[arg(short, long)]
    device: Option<usize>,

    /// Sample rate in Hz
    #[arg(short, long, default_value_t = 44100)]
    rate: u32,

    /// Number of channels
    #[arg(short, long, default_value_t = 1)]
    channels: u16,

    /// Frames per block
    #[arg(short, long, default_value_t = 1024)]
    block: usize,

    /// Queue up to N blocks instead of showing only the newest
    #[arg(long)]
    queue: Option<usize>,

    /// Redraw rate in frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Stop after this many seconds
    #[arg(long)]
    seconds: Option<u64>,

    /// Use a synthetic source instead of a real device
    #[arg(long)]
    mock: bool,
}

/// Draws one line per frame: sequence, RMS bar, peak, and clip count.
struct TerminalMeter {
    deadline: Option<Instant>,
    frames: u64,
}

impl TerminalMeter {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            deadline: limit.map(|d| Instant::now() + d),
            frames: 0,
        }
    }
}

impl Renderer for TerminalMeter {
    fn update(&mut self, block: SampleBlock) -> Result<(), RenderError> {
        let levels = block.levels();
        let fill = ((levels.rms_db - METER_FLOOR_DB) / -METER_FLOOR_DB).clamp(0.0, 1.0);
        let filled = (fill * METER_WIDTH as f32).round() as usize;

        let mut out = io::stdout().lock();
        write!(
            out,
            "\r#{:<6} [{}{}] {:>6.1} dBFS  peak {:.3}{}",
            block.sequence(),
            "#".repeat(filled),
            " ".repeat(METER_WIDTH - filled),
            levels.rms_db,
            levels.peak,
            if levels.clipped > 0 { "  CLIP" } else { "      " }
        )
        .and_then(|()| out.flush())
        .map_err(|e| RenderError::update_failed(e.to_string()))?;

        self.frames += 1;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

fn list_devices(source: &dyn DeviceSource) -> Result<(), Box<dyn std::error::Error>> {
    println!("Input devices ({}):", source.name());
    for device in source.list_devices()? {
        println!("  {device}");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let source: Box<dyn DeviceSource> = if args.mock {
        Box::new(MockSource::new())
    } else {
        Box::new(CpalSource::new())
    };

    if args.list {
        return list_devices(source.as_ref());
    }

    let device = args
        .device
        .map_or(DeviceSelection::Default, DeviceSelection::Index);
    let policy = args
        .queue
        .map_or(OverflowPolicy::LatestWins, OverflowPolicy::bounded);

    let session = LiveCapture::builder()
        .sample_rate(args.rate)
        .channels(args.channels)
        .block_len(args.block)
        .device(device)
        .policy(policy)
        .on_event(|event| match event {
            StreamEvent::Opened { device } => {
                eprintln!("Capturing from {device} (Ctrl-C to stop)");
            }
            StreamEvent::DeviceError { reason } => eprintln!("\nDevice error: {reason}"),
            other => tracing::debug!(?other, "stream event"),
        })
        .open(source.as_ref())?;

    let stop = StopSignal::new();
    let on_ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let interval = Duration::from_secs(1) / args.fps.max(1);
    let meter = TerminalMeter::new(args.seconds.map(Duration::from_secs));
    let mut driver = RenderDriver::new(meter).with_stop_signal(stop);
    let summary = driver.run(session, interval).await?;

    println!();
    println!(
        "Stopped ({}): {} frames drawn, {} blocks captured, {} dropped",
        summary.reason,
        driver.renderer().frames,
        summary.channel.published,
        summary.channel.dropped
    );
    Ok(())
}
