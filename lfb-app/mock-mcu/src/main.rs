mod fft;
mod sim;

use std::sync::atomic::{AtomicU32, Ordering};

use clap::{Parser, ValueEnum};
use embassy_executor::{Executor, Spawner};
use embassy_time::{Delay, Duration, Ticker, Timer};
use lfb_core::utils::{
    audio::ToneRemote,
    config::RobotConfig,
    control::{ControlLoop, ManeuverOutcome, SHARED},
    controllers::{sample_distance, ChannelSignal, LedModule, SharedMotors},
    vision::{pipeline::publish_frame, ImageProcessor, FRAME_SIGNAL},
};
use serde::Serialize;
use tracing::{error, info};

use crate::{
    fft::MicroFft,
    sim::{with_world, ConsoleLeds, SimMotors, SimTof, Speaker, World},
};

static MOTORS: SharedMotors<SimMotors> = SharedMotors::new(SimMotors);
static MANEUVERS: AtomicU32 = AtomicU32::new(0);

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Tone {
    Forward,
    Left,
    Right,
    Uturn,
}

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// JSON file overriding parts of the robot configuration
    #[clap(long)]
    config: Option<String>,
    /// simulated run time
    #[clap(long, default_value_t = 30)]
    seconds: u64,
    /// rotary selector position choosing the cruise speed
    #[clap(long, default_value_t = 4)]
    selector: u8,
    /// tone the operator plays at every stop
    #[clap(long, value_enum, default_value_t = Tone::Forward)]
    command: Tone,
    /// place an obstacle on the track at this distance (cm)
    #[clap(long)]
    obstacle_cm: Option<f32>,
}

#[derive(Serialize)]
struct Summary {
    world: World,
    maneuvers: u32,
    stopped: bool,
}

#[embassy_executor::task]
async fn physics_task() -> ! {
    let period = Duration::from_millis(5);
    let mut ticker = Ticker::every(period);
    loop {
        with_world(|w| w.step(period.as_micros() as f32 / 1e6));
        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn capture_task() -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(16));
    loop {
        let frame = with_world(|w| w.frame());
        publish_frame(&FRAME_SIGNAL, &frame);
        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn process_task(config: RobotConfig) -> ! {
    let mut processor = ImageProcessor::new(config.line);
    processor.run(&FRAME_SIGNAL, &SHARED).await
}

#[embassy_executor::task]
async fn distance_task(config: RobotConfig) -> ! {
    let mut tof = SimTof;
    sample_distance(&mut tof, config.sensor, Duration::from_millis(30), &SHARED).await
}

#[embassy_executor::task]
async fn control_task(
    config: RobotConfig,
    selector: u8,
) -> ! {
    let mut control = ControlLoop::new(config, &SHARED, selector);
    control.run(&MOTORS).await
}

#[embassy_executor::task]
async fn audio_task(
    config: RobotConfig,
    bin: usize,
) -> ! {
    let mut remote =
        ToneRemote::new(&config, MicroFft::new(), &SHARED.intersection, Delay, ChannelSignal);
    let mut speaker = Speaker::for_bin(bin);
    let mut ticker = Ticker::every(Duration::from_millis(10));
    loop {
        let block = speaker.block(SHARED.intersection.is_stopped());
        if let Some(outcome) = remote.on_block(&block, &MOTORS).await {
            if let ManeuverOutcome::Completed(command) = outcome {
                let n = MANEUVERS.fetch_add(1, Ordering::Relaxed) + 1;
                info!(?command, n, "maneuver finished");
            }
            // the maneuver blocked this task; skip the backlog of blocks
            ticker.reset();
        }
        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn led_task(config: RobotConfig) -> ! {
    let mut leds = LedModule::new(ConsoleLeds, config.maneuver);
    leds.run().await
}

#[embassy_executor::task]
async fn main_task(
    spawner: Spawner,
    opts: Opts,
    config: RobotConfig,
) {
    if let Some(at) = opts.obstacle_cm {
        with_world(|w| w.obstacle_cm = Some(at));
    }

    let d = &config.decoder;
    let bin = match opts.command {
        Tone::Forward => d.freq_forward,
        Tone::Left => d.freq_left,
        Tone::Right => d.freq_right,
        Tone::Uturn => d.freq_backward,
    };
    info!(command = ?opts.command, bin, "operator tone");

    spawner.spawn(physics_task()).unwrap();
    spawner.spawn(capture_task()).unwrap();
    spawner.spawn(process_task(config)).unwrap();
    spawner.spawn(distance_task(config)).unwrap();
    spawner.spawn(control_task(config, opts.selector)).unwrap();
    spawner.spawn(audio_task(config, bin)).unwrap();
    spawner.spawn(led_task(config)).unwrap();

    Timer::after_secs(opts.seconds).await;

    let summary = Summary {
        world: with_world(|w| *w),
        maneuvers: MANEUVERS.load(Ordering::Relaxed),
        stopped: SHARED.intersection.is_stopped(),
    };
    match serde_json::to_string(&summary) {
        Ok(json) => info!("run summary: {}", json),
        Err(e) => error!("failed to serialize summary: {:?}", e),
    }
    std::process::exit(0);
}

fn load_config(path: Option<&str>) -> Result<RobotConfig, String> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
            serde_json::from_str::<RobotConfig>(&text).map_err(|e| format!("{path}: {e}"))?
        }
        None => RobotConfig::default(),
    };
    config
        .validate()
        .map_err(|e| format!("invalid configuration: {e:?}"))?;
    Ok(config)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let config = match load_config(opts.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let executor = lfb_core::mk_static!(Executor, Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, opts, config)).unwrap();
    });
}
