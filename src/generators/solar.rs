//! Solar generation from per-date sunrise and sunset times.

use std::collections::HashMap;
use std::f64::consts::PI;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};

/// Julian date of the J2000.0 epoch (2000-01-01 12:00 UTC).
const J2000: f64 = 2_451_545.0;
/// Julian date of the Unix epoch (1970-01-01 00:00 UTC).
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
/// Sun altitude at apparent sunrise/sunset, accounting for refraction and disc size.
const HORIZON_DEG: f64 = -0.833;
/// Obliquity of the ecliptic in degrees.
const OBLIQUITY_DEG: f64 = 23.4397;

/// Sunrise and sunset for one calendar date, in local (naive) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: NaiveDateTime,
    pub sunset: NaiveDateTime,
}

impl SunTimes {
    /// Length of daylight.
    pub fn daylight(&self) -> TimeDelta {
        self.sunset - self.sunrise
    }
}

/// Computes UTC sunrise and sunset for a date with the sunrise equation.
///
/// # Arguments
///
/// * `date` - Calendar date
/// * `latitude` - Degrees, north positive
/// * `longitude` - Degrees, east positive
///
/// # Returns
///
/// `None` when the sun never crosses the horizon that day (polar day or night).
pub fn sun_times_utc(date: NaiveDate, latitude: f64, longitude: f64) -> Option<SunTimes> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let julian_day = (date - epoch).num_days() as f64 + UNIX_EPOCH_JD;

    let day_number = (julian_day - J2000 + 0.0008).ceil();
    let mean_solar_noon = day_number - longitude / 360.0;

    let anomaly_deg = (357.5291 + 0.985_600_28 * mean_solar_noon).rem_euclid(360.0);
    let anomaly = anomaly_deg.to_radians();
    let center = 1.9148 * anomaly.sin() + 0.0200 * (2.0 * anomaly).sin() + 0.0003 * (3.0 * anomaly).sin();
    let ecliptic_longitude = (anomaly_deg + center + 180.0 + 102.9372)
        .rem_euclid(360.0)
        .to_radians();

    let transit =
        J2000 + mean_solar_noon + 0.0053 * anomaly.sin() - 0.0069 * (2.0 * ecliptic_longitude).sin();

    let sin_declination = ecliptic_longitude.sin() * OBLIQUITY_DEG.to_radians().sin();
    let cos_declination = sin_declination.asin().cos();
    let lat = latitude.to_radians();

    let cos_hour_angle = (HORIZON_DEG.to_radians().sin() - lat.sin() * sin_declination)
        / (lat.cos() * cos_declination);
    if !(-1.0..=1.0).contains(&cos_hour_angle) {
        return None;
    }
    let hour_angle = cos_hour_angle.acos().to_degrees();

    Some(SunTimes {
        sunrise: julian_to_datetime(transit - hour_angle / 360.0)?,
        sunset: julian_to_datetime(transit + hour_angle / 360.0)?,
    })
}

fn julian_to_datetime(julian: f64) -> Option<NaiveDateTime> {
    let seconds = ((julian - UNIX_EPOCH_JD) * 86_400.0).round();
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds as i64, 0).map(|dt| dt.naive_utc())
}

/// Rooftop PV generation following the astronomical daylight window.
///
/// Output is zero outside daylight and a half-sine peaking at solar noon
/// inside it, scaled by the installed capacity. Sun times are computed once
/// per calendar date and cached.
#[derive(Debug, Clone)]
pub struct SolarProfile {
    /// Site latitude in degrees.
    pub latitude: f64,
    /// Site longitude in degrees.
    pub longitude: f64,
    /// Installed capacity in kW (peak output at solar noon).
    pub capacity_kw: f64,
    /// Offset of local simulation time from UTC.
    utc_offset: TimeDelta,
    cache: HashMap<NaiveDate, Option<SunTimes>>,
}

impl SolarProfile {
    /// Creates a profile for a site.
    ///
    /// # Arguments
    ///
    /// * `latitude` - Degrees, north positive
    /// * `longitude` - Degrees, east positive
    /// * `utc_offset_hours` - Local time minus UTC, in hours
    /// * `capacity_kw` - Installed capacity, clamped to be non-negative
    pub fn new(latitude: f64, longitude: f64, utc_offset_hours: i32, capacity_kw: f64) -> Self {
        Self {
            latitude,
            longitude,
            capacity_kw: capacity_kw.max(0.0),
            utc_offset: TimeDelta::hours(i64::from(utc_offset_hours)),
            cache: HashMap::new(),
        }
    }

    /// Local sunrise and sunset for a date, or `None` during polar day/night.
    pub fn sun_times(&mut self, date: NaiveDate) -> Option<SunTimes> {
        let (latitude, longitude, offset) = (self.latitude, self.longitude, self.utc_offset);
        *self.cache.entry(date).or_insert_with(|| {
            sun_times_utc(date, latitude, longitude).map(|utc| SunTimes {
                sunrise: utc.sunrise + offset,
                sunset: utc.sunset + offset,
            })
        })
    }

    /// Relative irradiance in `[0, 1]` at a local timestamp.
    pub fn irradiance(&mut self, at: NaiveDateTime) -> f64 {
        let Some(sun) = self.sun_times(at.date()) else {
            return 0.0;
        };
        if at <= sun.sunrise || at >= sun.sunset {
            return 0.0;
        }

        let daylight = sun.daylight().num_seconds() as f64;
        let elapsed = (at - sun.sunrise).num_seconds() as f64;
        (PI * elapsed / daylight).sin().max(0.0)
    }

    /// Generation in kW at a local timestamp, before noise.
    pub fn generation_kw(&mut self, at: NaiveDateTime) -> f64 {
        self.capacity_kw * self.irradiance(at)
    }
}
