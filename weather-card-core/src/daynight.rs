//! Day/night classification and sunrise/sunset markers for forecast slots.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    clock::Clock,
    model::{Forecast, ForecastSample, GeoCoordinates},
    solar::{SolarEvent, SolarTimes, compute_solar_times, local_noon},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SunEventKind {
    Sunrise,
    Sunset,
}

/// A sunrise or sunset that falls inside a forecast slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SunEvent {
    #[serde(rename = "type")]
    pub kind: SunEventKind,
    pub timestamp: DateTime<Utc>,
}

/// Cached days further than this from a newly computed day are dropped.
const CACHE_WINDOW_DAYS: i64 = 14;

/// Header background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sky {
    Day,
    Night,
}

impl Sky {
    fn from_night(night: bool) -> Self {
        if night { Sky::Night } else { Sky::Day }
    }
}

/// Whether `instant` is at night, or `None` when sunrise or sunset is missing.
pub fn is_night(instant: DateTime<Utc>, times: &SolarTimes) -> Option<bool> {
    let sunrise = times.sunrise()?;
    let sunset = times.sunset()?;

    if sunrise <= sunset {
        Some(instant < sunrise || instant >= sunset)
    } else {
        // Events straddle the lookup day; night is the span between them.
        Some(instant >= sunset && instant < sunrise)
    }
}

/// Like [`is_night`], but defaults to daytime when there is nothing to go on.
pub fn classify_night(instant: DateTime<Utc>, times: Option<&SolarTimes>) -> bool {
    times.and_then(|times| is_night(instant, times)).unwrap_or(false)
}

/// The sun event within `[start, end)`. Sunrise wins when both fall in the slot.
pub fn find_sun_event_in_interval(
    times: &SolarTimes,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<SunEvent> {
    [
        (SunEventKind::Sunrise, times.sunrise()),
        (SunEventKind::Sunset, times.sunset()),
    ]
    .into_iter()
    .find_map(|(kind, at)| {
        at.filter(|at| (start..end).contains(at))
            .map(|timestamp| SunEvent { kind, timestamp })
    })
}

/// One hourly slot, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyCell<'a> {
    pub sample: &'a ForecastSample,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_night: bool,
    pub sun_event: Option<SunEvent>,
}

/// Day/night lookups for one location, cached per local calendar day.
#[derive(Debug, Clone)]
pub struct DayNightClassifier<Tz: TimeZone> {
    tz: Tz,
    coordinates: Option<GeoCoordinates>,
    cache: HashMap<(NaiveDate, (u64, u64)), SolarTimes>,
}

impl<Tz: TimeZone> DayNightClassifier<Tz> {
    /// `tz` decides which calendar day an instant belongs to.
    pub fn new(tz: Tz, coordinates: Option<GeoCoordinates>) -> Self {
        Self {
            tz,
            coordinates,
            cache: HashMap::new(),
        }
    }

    pub fn coordinates(&self) -> Option<GeoCoordinates> {
        self.coordinates
    }

    /// Replace the location. Cached days for the previous location are dropped.
    pub fn set_coordinates(&mut self, coordinates: Option<GeoCoordinates>) {
        if self.coordinates != coordinates {
            self.cache.clear();
            self.coordinates = coordinates;
        }
    }

    /// Solar times whose sunrise/sunset fall on `date` in the viewer's zone.
    pub fn solar_times_for_day(&mut self, date: NaiveDate) -> Option<&SolarTimes> {
        let coords = self.coordinates?;
        let key = (date, coords.cache_key());

        if !self.cache.contains_key(&key) {
            debug!(%date, "computing solar times");
            self.cache
                .retain(|(day, _), _| (*day - date).num_days().abs() <= CACHE_WINDOW_DAYS);
            let times = self.day_aligned_times(date, coords);
            self.cache.insert(key, times);
        }

        self.cache.get(&key)
    }

    /// Solar times for the local calendar day containing `instant`.
    pub fn solar_times_at(&mut self, instant: DateTime<Utc>) -> Option<&SolarTimes> {
        let date = self.local_date(instant);
        self.solar_times_for_day(date)
    }

    /// Night flag for `instant`. An explicit `is_daytime` from the data source wins.
    pub fn is_night_at(&mut self, instant: DateTime<Utc>, is_daytime: Option<bool>) -> bool {
        if let Some(daytime) = is_daytime {
            return !daytime;
        }
        classify_night(instant, self.solar_times_at(instant))
    }

    /// Header background for the current instant.
    pub fn sky_now(&mut self, clock: &dyn Clock, is_daytime: Option<bool>) -> Sky {
        Sky::from_night(self.is_night_at(clock.now(), is_daytime))
    }

    /// Slot boundaries, night flags and sun markers for an hourly forecast.
    pub fn annotate_hourly<'f>(&mut self, forecast: &'f Forecast) -> Vec<HourlyCell<'f>> {
        let samples = forecast.samples();

        samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                let start = sample.datetime;
                let end = samples
                    .get(index + 1)
                    .map(|next| next.datetime)
                    .unwrap_or_else(|| start + Duration::hours(1));

                let times = self.solar_times_at(start);
                let sun_event = times.and_then(|t| find_sun_event_in_interval(t, start, end));
                let is_night = match sample.is_daytime {
                    Some(daytime) => !daytime,
                    None => classify_night(start, times),
                };

                HourlyCell {
                    sample,
                    start,
                    end,
                    is_night,
                    sun_event,
                }
            })
            .collect()
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    fn event_date(&self, times: &SolarTimes, event: SolarEvent) -> Option<NaiveDate> {
        times.get(event).map(|at| self.local_date(at))
    }

    /// A location far from the viewer's meridian can put the computed solar
    /// day on the neighbouring calendar day. Shift the base by a day until
    /// sunrise (or failing that, sunset) lands back on `date`.
    fn day_aligned_times(&self, date: NaiveDate, coords: GeoCoordinates) -> SolarTimes {
        let base = local_noon(date, &self.tz);
        let times = compute_solar_times(base, coords);

        let anchors = [SolarEvent::Sunrise, SolarEvent::Sunset];
        if anchors
            .iter()
            .all(|event| self.event_date(&times, *event).is_none_or(|d| d == date))
        {
            return times;
        }

        for event in anchors {
            let Some(day) = self.event_date(&times, event) else {
                continue;
            };
            if day == date {
                continue;
            }

            let shift = if day < date { 1 } else { -1 };
            let shifted = compute_solar_times(base + Duration::days(shift), coords);
            if self.event_date(&shifted, event) == Some(date) {
                debug!(%date, %event, shift, "realigned solar day");
                return shifted;
            }
        }

        times
    }
}
