use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use web_time::{Duration, Instant};

use qlib::{
    Frame, SimulationSettings,
    galaxy::Galaxy,
    settings::{DEFAULT_HALF_SIZE, DEFAULT_MAX_DEPTH},
    shared::{Bounds, Vector},
};

/// Seeds a galaxy, runs the Barnes-Hut loop on a background thread and
/// consumes its frames at a fixed rate, the way a renderer would.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of bodies in the galaxy
    #[arg(short = 'n', long, default_value_t = 100_000)]
    bodies: usize,
    /// Galaxy radius
    #[arg(long, default_value_t = 400.0)]
    radius: f64,
    /// Orbital speed at the galaxy rim
    #[arg(long, default_value_t = 12.0)]
    speed: f64,
    /// Mass of every body
    #[arg(long, default_value_t = 1.0)]
    mass: f64,
    #[arg(long, default_value_t = 0.5)]
    theta: f64,
    #[arg(short = 'g', long, default_value_t = 1.0)]
    gravity: f64,
    #[arg(long, default_value_t = 1.0)]
    timestep: f64,
    #[arg(long, default_value_t = 1.0)]
    softening: f64,
    /// Half side length of the square tree root, centered on the origin
    #[arg(long, default_value_t = DEFAULT_HALF_SIZE)]
    half_size: f64,
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    /// Stop after this many simulation steps
    #[arg(short, long, default_value_t = 100)]
    steps: u64,
    /// Consumer frames per second
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Interpolate between the last two steps instead of showing the older one
    #[arg(short, long)]
    interpolate: bool,
    #[arg(long)]
    seed: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn main() -> anyhow::Result<()> {
    init_logger();
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut points = Vec::with_capacity(args.bodies);
    Galaxy::new(args.bodies, args.radius, args.speed)
        .with_mass(args.mass)
        .populate(&mut rng, &mut points);

    let settings = SimulationSettings::default()
        .with_theta(args.theta)
        .with_gravity_constant(args.gravity)
        .with_timestep(args.timestep)
        .with_softening(args.softening)
        .with_bounds(Bounds::square(Vector::zeros(), args.half_size))
        .with_max_depth(args.max_depth);

    log::info!("{} bodies, {:?}", points.len(), settings);
    let handle = qlib::start(points, settings)?;
    handle.resume();

    let frame_budget = Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1)));
    let start = Instant::now();
    let mut shown: Option<Frame<f64>> = None;
    let mut positions = Vec::new();
    let mut fps_clock = Instant::now();
    let mut frames = 0u32;

    loop {
        let frame_start = Instant::now();

        if let Some(frame) = handle.try_take_latest()? {
            log::info!("step {} ({:?} since previous)", frame.step, frame.interval);
            shown = Some(frame);
        }

        if let Some(frame) = &shown {
            let alpha = if args.interpolate {
                frame.alpha(frame_start)
            } else {
                0.0
            };
            frame.interpolate_into(alpha, &mut positions);
            if frame.step >= args.steps {
                break;
            }
        }

        frames += 1;
        if fps_clock.elapsed() >= Duration::from_secs(1) {
            log::debug!("{:.2} fps", f64::from(frames) / fps_clock.elapsed().as_secs_f64());
            fps_clock = Instant::now();
            frames = 0;
        }

        if let Some(rest) = frame_budget.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    handle.pause();
    let status = handle.status();
    handle.stop()?;

    let center = positions
        .iter()
        .fold(Vector::zeros(), |acc, p| acc + p)
        / positions.len().max(1) as f64;
    println!(
        "{} steps in {:?}, mean position ({:.3}, {:.3})",
        status.steps_completed,
        start.elapsed(),
        center.x,
        center.y
    );
    Ok(())
}
