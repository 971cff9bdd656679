use std::{path::PathBuf, rc::Rc, time::Duration};

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Text};
use tracing::warn;
use weather_card_core::{
    Config, DayNightClassifier, ForecastKind, ForecastSource, GeoCoordinates, JsonFileSource,
    MomentumScroll, ScrollContainer, ScrollPhase, SunEventKind,
    scroll::{ManualFrameScheduler, MemoryContainer, PointerEvent, PointerInput},
    solar::day_length,
};

/// Upper bound on replayed frames, about half a minute at 60 Hz.
const MAX_REPLAY_FRAMES: usize = 2_000;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-card", version, about = "Weather card solar times and scrolling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the home location and time zone.
    Configure,

    /// Show sunrise, sunset and twilight times.
    Sun {
        /// Calendar day (YYYY-MM-DD); if absent, means "today".
        #[arg(long)]
        date: Option<String>,

        /// Latitude override in degrees.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude override in degrees.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Annotate an hourly forecast file with night flags and sun markers.
    Hourly {
        /// Forecast JSON as delivered by the host.
        file: PathBuf,
    },

    /// Replay a mouse drag on an in-memory forecast strip.
    Simulate {
        #[arg(long, default_value_t = 2000.0)]
        scroll_width: f64,

        #[arg(long, default_value_t = 500.0)]
        client_width: f64,

        #[arg(long, default_value_t = 100.0)]
        item_width: f64,

        /// Pointer x at the press.
        #[arg(long, default_value_t = 300.0, allow_negative_numbers = true)]
        from_x: f64,

        /// Pointer x at the release.
        #[arg(long, default_value_t = 200.0, allow_negative_numbers = true)]
        to_x: f64,

        #[arg(long, default_value_t = 100.0)]
        duration_ms: f64,

        /// Pace frames at 60 Hz instead of replaying instantly.
        #[arg(long)]
        realtime: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Sun { date, lat, lon } => show_sun(date.as_deref(), lat.zip(lon)),
            Command::Hourly { file } => show_hourly(file).await,
            Command::Simulate {
                scroll_width,
                client_width,
                item_width,
                from_x,
                to_x,
                duration_ms,
                realtime,
            } => {
                let strip = MemoryContainer::new(scroll_width, client_width, item_width);
                simulate(strip, from_x, to_x, duration_ms, realtime).await
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load()?;
    let current = cfg.location;

    let mut latitude = CustomType::<f64>::new("Latitude (degrees north):");
    if let Some(loc) = current {
        latitude = latitude.with_default(loc.latitude);
    }
    let latitude = latitude.prompt()?;

    let mut longitude = CustomType::<f64>::new("Longitude (degrees east):");
    if let Some(loc) = current {
        longitude = longitude.with_default(loc.longitude);
    }
    let longitude = longitude.prompt()?;

    let coords = GeoCoordinates::new(latitude, longitude).ok_or_else(|| {
        anyhow!("Invalid location {latitude}, {longitude}: latitude must be within ±90 and longitude within ±180.")
    })?;
    cfg.set_location(coords);

    let timezone = Text::new("Time zone (IANA name):")
        .with_default(cfg.timezone.as_deref().unwrap_or("UTC"))
        .prompt()?;
    cfg.timezone = Some(timezone);
    cfg.time_zone()?;

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn resolve_coordinates(cfg: &Config, explicit: Option<(f64, f64)>) -> anyhow::Result<GeoCoordinates> {
    match explicit {
        Some((lat, lon)) => GeoCoordinates::new(lat, lon)
            .ok_or_else(|| anyhow!("Invalid location {lat}, {lon}.")),
        None => cfg.coordinates().ok_or_else(|| {
            anyhow!(
                "No location configured.\n\
                 Hint: run `weather-card configure` or pass --lat and --lon."
            )
        }),
    }
}

fn show_sun(date: Option<&str>, explicit: Option<(f64, f64)>) -> anyhow::Result<()> {
    let cfg = Config::load()?;
    let tz = cfg.time_zone()?;
    let coords = resolve_coordinates(&cfg, explicit)?;

    let date = match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{s}', expected YYYY-MM-DD"))?,
        None => Utc::now().with_timezone(&tz).date_naive(),
    };

    let mut classifier = DayNightClassifier::new(tz, Some(coords));
    let times = classifier
        .solar_times_for_day(date)
        .ok_or_else(|| anyhow!("No solar times for {date}"))?;

    println!(
        "Solar times for {date} at {:.4}, {:.4} ({tz})",
        coords.latitude(),
        coords.longitude()
    );
    for (event, at) in times.iter() {
        println!("  {:<16} {}", event.as_str(), at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S"));
    }

    match day_length(times) {
        Some(length) => println!(
            "  {:<16} {}h {:02}m",
            "day_length",
            length.num_hours(),
            length.num_minutes() % 60
        ),
        None if times.sunrise().is_none() && times.sunset().is_none() => {
            println!("  the sun does not rise or set on this day")
        }
        None => {}
    }

    Ok(())
}

async fn show_hourly(file: PathBuf) -> anyhow::Result<()> {
    let cfg = Config::load()?;
    let tz = cfg.time_zone()?;

    let forecast = JsonFileSource::new(&file)
        .forecast()
        .await
        .with_context(|| format!("Failed to load forecast from {}", file.display()))?;
    if forecast.is_empty() {
        println!("The forecast has no samples.");
        return Ok(());
    }
    if forecast.kind() != ForecastKind::Hourly {
        warn!(kind = %forecast.kind(), "expected an hourly forecast");
    }

    let mut classifier = DayNightClassifier::new(tz, cfg.coordinates());
    if classifier.coordinates().is_none() {
        println!("No location configured; every hour is shown as daytime.");
    }

    for cell in classifier.annotate_hourly(&forecast) {
        let sample = cell.sample;
        let marker = match cell.sun_event {
            Some(event) => {
                let label = match event.kind {
                    SunEventKind::Sunrise => "sunrise",
                    SunEventKind::Sunset => "sunset",
                };
                format!("{label} {}", event.timestamp.with_timezone(&tz).format("%H:%M"))
            }
            None => String::new(),
        };
        let precipitation = sample
            .precipitation_probability
            .map(|p| format!("{p:>3}%"))
            .unwrap_or_else(|| "    ".to_string());

        println!(
            "{}  {:>6.1}°  {:<16}  {}  {:<5}  {}",
            cell.start.with_timezone(&tz).format("%a %H:%M"),
            sample.temperature,
            format!("{:?}", sample.condition.for_time_of_day(cell.is_night)),
            precipitation,
            if cell.is_night { "night" } else { "day" },
            marker
        );
    }

    Ok(())
}

async fn simulate(
    strip: MemoryContainer,
    from_x: f64,
    to_x: f64,
    duration_ms: f64,
    realtime: bool,
) -> anyhow::Result<()> {
    let cfg = Config::load()?;

    let scheduler = Rc::new(ManualFrameScheduler::new(0.0));
    let registry = MomentumScroll::new(scheduler.clone());
    let strip = Rc::new(strip);
    let id = strip.id();
    let cleanup = registry.attach(strip.clone(), cfg.momentum_options());

    registry.dispatch(id, PointerInput::Down(PointerEvent::mouse(1, from_x, scheduler.now())));
    scheduler.tick_by(duration_ms.max(0.0));
    registry.dispatch(id, PointerInput::Move(PointerEvent::mouse(1, to_x, scheduler.now())));
    println!("drag      scroll_left={:>8.2}", strip.scroll_left());
    registry.dispatch(id, PointerInput::Up(PointerEvent::mouse(1, to_x, scheduler.now())));

    let mut frame = 0;
    while let Some(phase) = registry.phase(id) {
        if phase == ScrollPhase::Idle || frame >= MAX_REPLAY_FRAMES {
            break;
        }
        scheduler.tick();
        frame += 1;
        println!(
            "frame {frame:>3} {:<9} scroll_left={:>8.2}",
            format!("{phase:?}"),
            strip.scroll_left()
        );
        if realtime {
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
    }

    println!(
        "settled at {:.2} of {:.2} after {frame} frames",
        strip.scroll_left(),
        strip.max_scroll_left()
    );
    cleanup.call();
    Ok(())
}
