use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::MiqatError;
use crate::geo::GeoCoordinate;
use crate::hijri::{self, HijriDate};
use crate::holidays::{self, UpcomingHoliday};
use crate::method::{self, CalculationMethod, CalculationParameters};
use crate::navigator::TimeRemaining;
use crate::schedule::PrayerTimeSet;
use crate::solver::{PrayerStatus, Solver, SolverOutput};

use super::state::{AppState, ComputeCache};

const DEFAULT_HOLIDAY_LIMIT: usize = 3;
const MAX_HOLIDAY_LIMIT: usize = 18;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub struct ApiError(pub StatusCode, pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, msg.into())
}

impl From<MiqatError> for ApiError {
    fn from(e: MiqatError) -> Self {
        let status = match e {
            MiqatError::NoSolarSolution { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError(status, e.to_string())
    }
}

// ─── Query parsing ───────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TimesQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub date: Option<String>,
    pub method: Option<String>,
    pub tz: Option<String>,
    pub asr: Option<String>,
    pub high_lat: Option<String>,
}

impl TimesQuery {
    fn solver(&self) -> Result<Solver, ApiError> {
        let (Some(lat), Some(lon)) = (self.lat, self.lon) else {
            return Err(bad_request("Provide 'lat' and 'lon' parameters"));
        };
        let coordinate = GeoCoordinate::new(lat, lon)?;
        let tz = match self.tz.as_deref() {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| bad_request(format!("Unknown timezone '{}'", name)))?,
            None => chrono_tz::UTC,
        };
        Ok(Solver::new(coordinate, tz, self.parameters()?))
    }

    fn parameters(&self) -> Result<CalculationParameters, ApiError> {
        let mut params = match self.method.as_deref() {
            Some(name) => method::resolve_method(name),
            None => CalculationParameters::default(),
        };
        if let Some(asr) = self.asr.as_deref() {
            params = params.with_asr_method(asr.parse().map_err(bad_request)?);
        }
        if let Some(rule) = self.high_lat.as_deref() {
            params = params.with_high_latitude_rule(rule.parse().map_err(bad_request)?);
        }
        Ok(params)
    }
}

/// Parse `YYYY-MM-DD`, defaulting to today in `tz`.
fn parse_date(date: Option<&str>, tz: Tz) -> Result<NaiveDate, ApiError> {
    match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|e| bad_request(format!("Invalid date '{}': {}", d, e))),
        None => Ok(Utc::now().with_timezone(&tz).date_naive()),
    }
}

fn times_for(state: &AppState, solver: &Solver, date: NaiveDate) -> Result<(PrayerTimeSet, bool), ApiError> {
    let key = ComputeCache::key(solver.coordinate, date, &solver.params);
    if let Some(cached) = state.cache.lock().unwrap_or_else(|e| e.into_inner()).get(&key) {
        return Ok((cached, true));
    }
    let times = solver.prayer_times(date)?;
    state
        .cache
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .put(key, times.clone());
    Ok((times, false))
}

// ─── GET /api/times ──────────────────────────────────────────────

pub async fn prayer_times(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimesQuery>,
) -> Result<Json<SolverOutput>, ApiError> {
    let start = Instant::now();
    let solver = params.solver()?;
    let date = parse_date(params.date.as_deref(), solver.tz)?;

    let (times, cached) = times_for(&state, &solver, date)?;
    let output = solver.describe(&times, Utc::now());

    info!(
        path = "/api/times",
        lat = solver.coordinate.latitude,
        lon = solver.coordinate.longitude,
        %date,
        cached,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "request served"
    );
    Ok(Json(output))
}

// ─── GET /api/next ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct NextResponse {
    pub current: Option<PrayerStatus>,
    pub next: PrayerStatus,
    pub remaining: TimeRemaining,
    pub remaining_text: String,
    pub timezone: String,
}

pub async fn next_prayer(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimesQuery>,
) -> Result<Json<NextResponse>, ApiError> {
    let start = Instant::now();
    let solver = params.solver()?;
    let now = Utc::now();
    let today = now.with_timezone(&solver.tz).date_naive();

    let (times, cached) = times_for(&state, &solver, today)?;
    let output = solver.describe(&times, now);

    info!(
        path = "/api/next",
        next = %output.next.prayer,
        cached,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "request served"
    );
    Ok(Json(NextResponse {
        current: output.current,
        remaining_text: output.remaining.to_string(),
        remaining: output.remaining,
        next: output.next,
        timezone: output.location.timezone,
    }))
}

// ─── GET /api/hijri ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HijriResponse {
    pub date: NaiveDate,
    pub hijri: HijriDate,
    pub formatted: String,
    pub month_name: &'static str,
    pub is_ramadan: bool,
    pub days_until_ramadan: u32,
}

pub async fn hijri_date(Query(params): Query<DateQuery>) -> Result<Json<HijriResponse>, ApiError> {
    let date = parse_date(params.date.as_deref(), Tz::UTC)?;
    let hijri = hijri::to_hijri(date)?;
    Ok(Json(HijriResponse {
        date,
        hijri,
        formatted: hijri.to_string(),
        month_name: hijri.month_name(),
        is_ramadan: hijri::is_ramadan(date),
        days_until_ramadan: hijri::days_until_ramadan(date)?,
    }))
}

// ─── GET /api/holidays ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct HolidaysQuery {
    pub date: Option<String>,
    pub limit: Option<usize>,
}

pub async fn upcoming_holidays(Query(params): Query<HolidaysQuery>) -> Result<Json<Vec<UpcomingHoliday>>, ApiError> {
    let date = parse_date(params.date.as_deref(), Tz::UTC)?;
    let limit = params.limit.unwrap_or(DEFAULT_HOLIDAY_LIMIT).min(MAX_HOLIDAY_LIMIT);
    Ok(Json(holidays::upcoming_holidays(date, limit)?))
}

// ─── GET /api/methods ────────────────────────────────────────────

pub async fn methods() -> Json<Vec<CalculationParameters>> {
    Json(CalculationMethod::ALL.iter().map(|m| m.parameters()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::Prayer;
    use crate::schedule::TimeSource;

    fn mecca_query() -> TimesQuery {
        TimesQuery {
            lat: Some(21.4225),
            lon: Some(39.8262),
            date: Some("2024-03-15".into()),
            tz: Some("Asia/Riyadh".into()),
            ..Default::default()
        }
    }

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new())
    }

    #[tokio::test]
    async fn test_times_and_cache() {
        let state = state();
        let Json(first) = prayer_times(State(state.clone()), Query(mecca_query())).await.unwrap();
        println!("{}", serde_json::to_string_pretty(&first).unwrap());
        assert_eq!(first.location.timezone, "Asia/Riyadh");
        assert_eq!(first.method, "MuslimWorldLeague");
        assert!(first.event("dhuhr").unwrap().time.starts_with("12:"));

        let _ = prayer_times(State(state.clone()), Query(mecca_query())).await.unwrap();
        let cache = state.cache.lock().unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!((cache.hits, cache.misses), (1, 1));
    }

    #[tokio::test]
    async fn test_times_parameters() {
        let query = TimesQuery { method: Some("Egypt".into()), asr: Some("hanafi".into()), ..mecca_query() };
        let Json(out) = prayer_times(State(state()), Query(query)).await.unwrap();
        assert_eq!(out.method, "Egyptian");

        // Unknown method names fall back instead of failing
        let query = TimesQuery { method: Some("Atlantis".into()), ..mecca_query() };
        let Json(out) = prayer_times(State(state()), Query(query)).await.unwrap();
        assert_eq!(out.method, "MuslimWorldLeague");
    }

    #[tokio::test]
    async fn test_times_bad_requests() {
        let cases = [
            TimesQuery { lat: Some(95.0), ..mecca_query() },
            TimesQuery { lon: None, ..mecca_query() },
            TimesQuery { date: Some("2024-13-40".into()), ..mecca_query() },
            TimesQuery { tz: Some("Mars/Base".into()), ..mecca_query() },
            TimesQuery { asr: Some("maliki".into()), ..mecca_query() },
        ];
        for query in cases {
            let err = prayer_times(State(state()), Query(query)).await.unwrap_err();
            println!("{:?}", err);
            assert_eq!(err.0, StatusCode::BAD_REQUEST);
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_polar_day_without_rule() {
        let query = TimesQuery {
            lat: Some(78.2232),
            lon: Some(15.6267),
            date: Some("2025-06-21".into()),
            high_lat: Some("none".into()),
            ..Default::default()
        };
        let err = prayer_times(State(state()), Query(query)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);

        let query = TimesQuery {
            lat: Some(78.2232),
            lon: Some(15.6267),
            date: Some("2025-06-21".into()),
            ..Default::default()
        };
        let Json(out) = prayer_times(State(state()), Query(query)).await.unwrap();
        assert_eq!(out.event("sunrise").unwrap().source, TimeSource::Projected);
    }

    #[tokio::test]
    async fn test_times_default_to_local_date() {
        // UTC+14: the local date is ahead of UTC for most of the day
        let tz = chrono_tz::Pacific::Kiritimati;
        let query = TimesQuery {
            lat: Some(1.87),
            lon: Some(-157.4),
            tz: Some("Pacific/Kiritimati".into()),
            ..Default::default()
        };
        let Json(out) = prayer_times(State(state()), Query(query)).await.unwrap();
        println!("local date {} (UTC date {})", out.date, Utc::now().date_naive());
        assert_eq!(out.date, Utc::now().with_timezone(&tz).date_naive());
    }

    #[tokio::test]
    async fn test_next() {
        let Json(resp) = next_prayer(State(state()), Query(mecca_query())).await.unwrap();
        println!("next {} at {} ({})", resp.next.prayer, resp.next.time, resp.remaining_text);
        assert!(resp.next.at > Utc::now());
        assert!(resp.remaining.total_minutes() < 24 * 60);
        if resp.next.prayer != Prayer::Fajr {
            assert!(resp.current.is_some());
        }
    }

    #[tokio::test]
    async fn test_hijri() {
        let Json(resp) = hijri_date(Query(DateQuery { date: Some("2024-03-11".into()) })).await.unwrap();
        assert_eq!(resp.hijri, HijriDate { year: 1445, month: 9, day: 1 });
        assert!(resp.is_ramadan);
        assert_eq!(resp.days_until_ramadan, 0);
        assert_eq!(resp.month_name, "Ramadan");

        let err = hijri_date(Query(DateQuery { date: Some("0500-01-01".into()) })).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_holidays() {
        let query = HolidaysQuery { date: Some("2024-03-01".into()), limit: None };
        let Json(list) = upcoming_holidays(Query(query)).await.unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].holiday.name, "Start of Ramadan");

        let query = HolidaysQuery { date: Some("2024-03-01".into()), limit: Some(500) };
        let Json(list) = upcoming_holidays(Query(query)).await.unwrap();
        assert!(list.len() <= MAX_HOLIDAY_LIMIT);
    }

    #[tokio::test]
    async fn test_methods() {
        let Json(list) = methods().await;
        assert_eq!(list.len(), CalculationMethod::ALL.len());
        let json = serde_json::to_value(&list).unwrap();
        assert!(json.to_string().contains("UmmAlQura"));
    }
}
