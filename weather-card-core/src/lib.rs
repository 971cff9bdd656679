//! Core library for the weather card.
//!
//! This crate defines:
//! - Solar event times for a location (`solar`)
//! - Day/night classification and sunrise/sunset markers for forecast slots (`daynight`)
//! - Momentum drag-scrolling for forecast strips (`scroll`)
//! - Forecast data model, loading and configuration
//!
//! Rendering, data subscriptions and config editors belong to the host.

pub mod clock;
pub mod config;
pub mod daynight;
pub mod error;
pub mod model;
pub mod scroll;
pub mod solar;
pub mod source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, LocationConfig};
pub use daynight::{
    DayNightClassifier, HourlyCell, Sky, SunEvent, SunEventKind, classify_night,
    find_sun_event_in_interval, is_night,
};
pub use error::{CaptureError, ForecastError};
pub use model::{Condition, Forecast, ForecastKind, ForecastSample, GeoCoordinates};
pub use scroll::{Cleanup, MomentumOptions, MomentumScroll, ScrollContainer, ScrollPhase};
pub use solar::{SolarEvent, SolarTimes, compute_solar_times, compute_solar_times_for_day};
pub use source::{ForecastSource, JsonFileSource, parse_forecast};
