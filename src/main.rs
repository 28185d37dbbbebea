use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use miqat::config::Settings;
use miqat::location::{LocationError, LocationQuery, LocationResolver, ResolvedLocation};
use miqat::method::{AsrMethod, CalculationMethod, HighLatitudeRule};
use miqat::notify::{self, NotificationScheduler, Reminder, TokioScheduler};
use miqat::schedule::PrayerTimeSet;
use miqat::solver::{local_hhmm, render_ascii_timeline, Solver};
use miqat::store::{self, JsonFileStore, KeyValueStore, StoreError};
use miqat::{hijri, holidays, server, MiqatError};

/// miqat: Islamic prayer times, Hijri dates and reminders.
///
/// Examples:
///   miqat times Mecca
///   miqat times --city "New York" --date 2026-03-20 --method isna
///   miqat times --lat 69.6492 --lon 18.9553 --tz Europe/Oslo --high-lat seventh
///   miqat next
///   miqat hijri --date 2024-03-11
///   miqat holidays --limit 5
///   miqat serve --port 3000
#[derive(Parser)]
#[command(name = "miqat", version, about, long_about = None)]
struct Cli {
    /// Store file (defaults to ~/.miqat/store.json).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prayer times for a day: JSON on stdout, timeline on stderr.
    Times {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        method: MethodArgs,
        /// Date (YYYY-MM-DD). Defaults to today at the location.
        #[arg(long, short = 'd')]
        date: Option<String>,
    },
    /// Current and next prayer.
    Next {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        method: MethodArgs,
    },
    /// Hijri date for a Gregorian date.
    Hijri {
        #[arg(long, short = 'd')]
        date: Option<String>,
    },
    /// Upcoming Islamic holidays.
    Holidays {
        #[arg(long, short = 'd')]
        date: Option<String>,
        #[arg(long, default_value_t = 3)]
        limit: usize,
    },
    /// List calculation methods.
    Methods,
    /// Plan today's reminders and wait for them to fire.
    Remind {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        method: MethodArgs,
    },
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, short = 'p', default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Args)]
struct LocationArgs {
    /// City name (positional). Example: miqat times Stockholm
    #[arg(index = 1)]
    city_positional: Option<String>,

    /// City name (named). Example: --city "New York"
    #[arg(long)]
    city: Option<String>,

    /// Latitude (-90 to 90).
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude (-180 to 180).
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// IANA timezone override (e.g. Europe/Oslo).
    #[arg(long)]
    tz: Option<String>,

    /// Offline mode: skip IP geolocation.
    #[arg(long)]
    offline: bool,
}

#[derive(Args)]
struct MethodArgs {
    /// Calculation method (e.g. MuslimWorldLeague, isna, egypt, makkah).
    #[arg(long, short = 'm')]
    method: Option<CalculationMethod>,

    /// Asr juristic method: standard or hanafi.
    #[arg(long)]
    asr: Option<AsrMethod>,

    /// High-latitude rule: middle, seventh, angle or none.
    #[arg(long)]
    high_lat: Option<HighLatitudeRule>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Engine(#[from] MiqatError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Usage(String),
}

type CliResult<T> = Result<T, CliError>;

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr so JSON on stdout stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("miqat=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> CliResult<()> {
    let store: Arc<dyn KeyValueStore> = Arc::new(match cli.store {
        Some(path) => JsonFileStore::load_from(path),
        None => JsonFileStore::load(),
    });

    match cli.command {
        Command::Times { location, method, date } => {
            let ctx = Context::new(store, &location, &method)?;
            let date = match date {
                Some(d) => parse_date(&d)?,
                None => ctx.today(),
            };
            let now = Utc::now();
            let times = ctx.prayer_times(date)?;
            let output = ctx.solver.describe(&times, now);

            eprintln!("  {}", ctx.location.display_line());
            eprint!("{}", render_ascii_timeline(&output));
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Next { location, method } => {
            let ctx = Context::new(store, &location, &method)?;
            let now = Utc::now();
            let times = ctx.prayer_times(ctx.today())?;
            let output = ctx.solver.describe(&times, now);

            let day = if output.next.is_next_day { " (tomorrow)" } else { "" };
            eprintln!(
                "  Next: {} at {}{} (in {})",
                output.next.prayer, output.next.time, day, output.remaining
            );
            let body = json!({
                "location": output.location,
                "current": output.current,
                "next": output.next,
                "remaining": output.remaining,
                "remaining_text": output.remaining.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Hijri { date } => {
            let date = date.as_deref().map(parse_date).transpose()?.unwrap_or_else(|| Utc::now().date_naive());
            let h = hijri::to_hijri(date)?;
            eprintln!("  {} = {}", date, h);
            let body = json!({
                "date": date,
                "hijri": h,
                "formatted": h.to_string(),
                "is_ramadan": hijri::is_ramadan(date),
                "days_until_ramadan": hijri::days_until_ramadan(date)?,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Holidays { date, limit } => {
            let date = date.as_deref().map(parse_date).transpose()?.unwrap_or_else(|| Utc::now().date_naive());
            let list = holidays::upcoming_holidays(date, limit)?;
            for h in &list {
                eprintln!("  {:<20} {}  ({} days, {} AH)", h.holiday.name, h.date, h.days_until, h.hijri_year);
            }
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        Command::Methods => {
            let list: Vec<_> = CalculationMethod::ALL.iter().map(|m| m.parameters()).collect();
            for p in &list {
                eprintln!("  {:<22} fajr {:>4.1}\u{00B0}  isha {:?}", p.method.name(), p.fajr_angle, p.isha);
            }
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        Command::Remind { location, method } => {
            let ctx = Context::new(store, &location, &method)?;
            let times = ctx.prayer_times(ctx.today())?;
            remind(&ctx, &times)?;
        }
        Command::Serve { host, port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::start(&host, port))?;
        }
    }
    Ok(())
}

/// Everything a location-bound command needs.
struct Context {
    store: Arc<dyn KeyValueStore>,
    location: ResolvedLocation,
    settings: Settings,
    solver: Solver,
}

impl Context {
    fn new(store: Arc<dyn KeyValueStore>, args: &LocationArgs, method: &MethodArgs) -> CliResult<Self> {
        let mut settings = Settings::from_env(store.as_ref());
        if let Some(m) = method.method {
            settings.method = m;
            if let Err(e) = store::set_as(store.as_ref(), store::PRAYER_METHOD, &m.name()) {
                warn!(error = %e, "could not save method");
            }
        }
        if let Some(asr) = method.asr {
            settings.asr_method = asr;
        }
        if let Some(rule) = method.high_lat {
            settings.high_latitude_rule = Some(rule);
        }

        let query = LocationQuery {
            coordinates: args.lat.zip(args.lon),
            tz: args.tz.clone(),
            city: args.city.clone().or_else(|| args.city_positional.clone()),
        };
        let resolver = LocationResolver::new(store.clone(), args.offline);
        let mut location = resolver.resolve(&query)?;
        if let Some(tz) = &args.tz {
            tz.parse::<Tz>()
                .map_err(|_| CliError::Usage(format!("Unknown timezone '{}'. Use IANA format (e.g. Europe/Oslo).", tz)))?;
            location.tz = tz.clone();
        }

        let solver = Solver::from_resolved(&location, settings.parameters())?;
        Ok(Self { store, location, settings, solver })
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.solver.tz).date_naive()
    }

    /// Reuse the stored set when it matches, otherwise compute and store.
    fn prayer_times(&self, date: NaiveDate) -> CliResult<PrayerTimeSet> {
        if let Some(cached) = store::load_last_prayer_times(self.store.as_ref(), date) {
            if cached.coordinate == self.solver.coordinate && cached.params == self.solver.params {
                return Ok(cached);
            }
        }
        let times = self.solver.prayer_times(date)?;
        if let Err(e) = store::save_last_prayer_times(self.store.as_ref(), &times) {
            warn!(error = %e, "could not save prayer times");
        }
        Ok(times)
    }
}

fn remind(ctx: &Context, times: &PrayerTimeSet) -> CliResult<()> {
    let now = Utc::now();
    let plan = notify::plan_reminders(times, &ctx.location.display_name(), &ctx.settings.notifications, now);
    if plan.is_empty() {
        eprintln!("  No reminders left today.");
        return Ok(());
    }

    let tz = ctx.solver.tz;
    for r in &plan {
        eprintln!("  {}  {}", local_hhmm(r.at, tz), r.title);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let scheduler = TokioScheduler::new(Arc::new(move |r: &Reminder| {
            println!("[{}] {}: {}", local_hhmm(r.at, tz), r.title, r.body);
        }));
        scheduler.schedule(plan);
        tokio::select! {
            _ = scheduler.wait() => {}
            _ = tokio::signal::ctrl_c() => scheduler.cancel_all(),
        }
    });
    Ok(())
}

fn parse_date(s: &str) -> CliResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| CliError::Engine(MiqatError::InvalidDate(format!("'{}': {}", s, e))))
}
