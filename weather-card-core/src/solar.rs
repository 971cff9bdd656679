//! Low-precision solar position model for sunrise, sunset and twilight times.
//!
//! Accurate to roughly a minute at mid latitudes, which is plenty for
//! choosing icons and placing sunrise/sunset markers on an hourly strip.

use std::{collections::BTreeMap, f64::consts::PI, fmt};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::model::GeoCoordinates;

const RAD: f64 = PI / 180.0;
const DAY_MS: f64 = 1000.0 * 60.0 * 60.0 * 24.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
/// Obliquity of the ecliptic.
const OBLIQUITY: f64 = RAD * 23.4397;
const J0: f64 = 0.0009;

/// A named solar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolarEvent {
    NightEnd,
    NauticalDawn,
    Dawn,
    Sunrise,
    SunriseEnd,
    GoldenHourEnd,
    SolarNoon,
    GoldenHour,
    SunsetStart,
    Sunset,
    Dusk,
    NauticalDusk,
    Night,
    Nadir,
}

impl SolarEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolarEvent::NightEnd => "night_end",
            SolarEvent::NauticalDawn => "nautical_dawn",
            SolarEvent::Dawn => "dawn",
            SolarEvent::Sunrise => "sunrise",
            SolarEvent::SunriseEnd => "sunrise_end",
            SolarEvent::GoldenHourEnd => "golden_hour_end",
            SolarEvent::SolarNoon => "solar_noon",
            SolarEvent::GoldenHour => "golden_hour",
            SolarEvent::SunsetStart => "sunset_start",
            SolarEvent::Sunset => "sunset",
            SolarEvent::Dusk => "dusk",
            SolarEvent::NauticalDusk => "nautical_dusk",
            SolarEvent::Night => "night",
            SolarEvent::Nadir => "nadir",
        }
    }
}

impl fmt::Display for SolarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elevation angle (degrees) and the morning/evening events crossing it.
const ELEVATION_EVENTS: [(f64, SolarEvent, SolarEvent); 6] = [
    (-0.833, SolarEvent::Sunrise, SolarEvent::Sunset),
    (-0.3, SolarEvent::SunriseEnd, SolarEvent::SunsetStart),
    (-6.0, SolarEvent::Dawn, SolarEvent::Dusk),
    (-12.0, SolarEvent::NauticalDawn, SolarEvent::NauticalDusk),
    (-18.0, SolarEvent::NightEnd, SolarEvent::Night),
    (6.0, SolarEvent::GoldenHourEnd, SolarEvent::GoldenHour),
];

/// Solar event instants for one solar day. Events that do not occur
/// (polar day or night) are simply missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SolarTimes {
    events: BTreeMap<SolarEvent, DateTime<Utc>>,
}

impl SolarTimes {
    pub fn get(&self, event: SolarEvent) -> Option<DateTime<Utc>> {
        self.events.get(&event).copied()
    }

    pub fn sunrise(&self) -> Option<DateTime<Utc>> {
        self.get(SolarEvent::Sunrise)
    }

    pub fn sunset(&self) -> Option<DateTime<Utc>> {
        self.get(SolarEvent::Sunset)
    }

    pub fn solar_noon(&self) -> Option<DateTime<Utc>> {
        self.get(SolarEvent::SolarNoon)
    }

    /// Events in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (SolarEvent, DateTime<Utc>)> + '_ {
        let mut events: Vec<_> = self.events.iter().map(|(e, t)| (*e, *t)).collect();
        events.sort_by_key(|(_, t)| *t);
        events.into_iter()
    }

    fn insert(&mut self, event: SolarEvent, at: Option<DateTime<Utc>>) {
        if let Some(at) = at {
            self.events.insert(event, at);
        }
    }
}

impl FromIterator<(SolarEvent, DateTime<Utc>)> for SolarTimes {
    fn from_iter<I: IntoIterator<Item = (SolarEvent, DateTime<Utc>)>>(iter: I) -> Self {
        Self { events: iter.into_iter().collect() }
    }
}

fn to_julian(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_millis() as f64 / DAY_MS - 0.5 + J1970
}

fn from_julian(julian: f64) -> Option<DateTime<Utc>> {
    if !julian.is_finite() {
        return None;
    }
    let millis = ((julian + 0.5 - J1970) * DAY_MS).round();
    DateTime::from_timestamp_millis(millis as i64)
}

fn to_days(instant: DateTime<Utc>) -> f64 {
    to_julian(instant) - J2000
}

fn declination(ecliptic_longitude: f64) -> f64 {
    (ecliptic_longitude.sin() * OBLIQUITY.sin()).asin()
}

fn solar_mean_anomaly(days: f64) -> f64 {
    RAD * (357.5291 + 0.985_600_28 * days)
}

fn ecliptic_longitude(mean_anomaly: f64) -> f64 {
    let m = mean_anomaly;
    let center = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    let perihelion = RAD * 102.9372;

    m + center + perihelion + PI
}

fn julian_cycle(days: f64, lw: f64) -> f64 {
    (days - J0 - lw / (2.0 * PI)).round()
}

fn approx_transit(hour_angle: f64, lw: f64, cycle: f64) -> f64 {
    J0 + (hour_angle + lw) / (2.0 * PI) + cycle
}

fn solar_transit_julian(approx: f64, mean_anomaly: f64, ecliptic_longitude: f64) -> f64 {
    J2000 + approx + 0.0053 * mean_anomaly.sin() - 0.0069 * (2.0 * ecliptic_longitude).sin()
}

/// Hour angle at which the sun reaches `elevation`, or `None` when it never does.
fn hour_angle(elevation: f64, latitude: f64, declination: f64) -> Option<f64> {
    let cos_h = (elevation.sin() - latitude.sin() * declination.sin())
        / (latitude.cos() * declination.cos());

    (-1.0..=1.0).contains(&cos_h).then(|| cos_h.acos())
}

/// Compute solar event times for the solar day nearest `base` at `coords`.
pub fn compute_solar_times(base: DateTime<Utc>, coords: GeoCoordinates) -> SolarTimes {
    let lw = RAD * -coords.longitude();
    let phi = RAD * coords.latitude();

    let days = to_days(base);
    let cycle = julian_cycle(days, lw);
    let transit_days = approx_transit(0.0, lw, cycle);

    let m = solar_mean_anomaly(transit_days);
    let l = ecliptic_longitude(m);
    let dec = declination(l);

    let noon = solar_transit_julian(transit_days, m, l);

    let mut times = SolarTimes::default();
    times.insert(SolarEvent::SolarNoon, from_julian(noon));
    times.insert(SolarEvent::Nadir, from_julian(noon - 0.5));

    for (elevation, morning, evening) in ELEVATION_EVENTS {
        let Some(w) = hour_angle(elevation * RAD, phi, dec) else {
            continue;
        };
        let set = solar_transit_julian(approx_transit(w, lw, cycle), m, l);
        let rise = noon - (set - noon);

        times.insert(morning, from_julian(rise));
        times.insert(evening, from_julian(set));
    }

    times
}

/// Solar times for a calendar day in `tz`, anchored on that day's local noon.
pub fn compute_solar_times_for_day<Tz: TimeZone>(
    date: NaiveDate,
    tz: &Tz,
    coords: GeoCoordinates,
) -> SolarTimes {
    compute_solar_times(local_noon(date, tz), coords)
}

pub(crate) fn local_noon<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
    tz.from_local_datetime(&noon)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // Noon never falls in a DST gap in practice; fall back to UTC noon.
        .unwrap_or_else(|| Utc.from_utc_datetime(&noon))
}

/// Length of daylight between sunrise and sunset, if both occur.
pub fn day_length(times: &SolarTimes) -> Option<Duration> {
    Some(times.sunset()? - times.sunrise()?)
}
