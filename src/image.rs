//! In-memory astronomical image
//!
//! An [`AstroImage`] is what the caller works on: pixel data plus the header
//! keywords that travel with it. Identity (the embedded `UUID` keyword and
//! the archive image id) and save state live here too.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::db::models::Site;
use crate::geodesic::GeoPosition;

/// Header keywords the archive reads or writes.
pub mod keywords {
    pub const UUID: &str = "UUID";
    pub const OBJECT: &str = "OBJECT";
    pub const DATE_OBS: &str = "DATE-OBS";
    pub const RA: &str = "RA";
    pub const DEC: &str = "DEC";
    pub const OBJCTRA: &str = "OBJCTRA";
    pub const OBJCTDEC: &str = "OBJCTDEC";
    pub const TELESCOPE: &str = "TELESCOP";
    pub const FILTER: &str = "FILTER";
    pub const OBSERVATORY: &str = "OBSERVAT";
    pub const SITE_LAT: &str = "SITELAT";
    pub const SITE_LONG: &str = "SITELONG";
    pub const SITE_ELEV: &str = "SITEELEV";
    pub const FOCAL_LENGTH: &str = "FOCALLEN";
    pub const APERTURE: &str = "APTDIA";
}

/// How an image was last persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveMethod {
    File,
    Database,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeaderValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Logical(bool),
}

impl HeaderValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric value; text is parsed as a decimal number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Integer(i) => Some(*i as f64),
            HeaderValue::Real(r) => Some(*r),
            HeaderValue::Text(s) => s.trim().parse().ok(),
            HeaderValue::Logical(_) => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        HeaderValue::Real(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Integer(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Logical(value)
    }
}

/// Row-major single-plane pixel data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelData {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl PixelData {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.width * self.height == self.data.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AstroImage {
    /// Display name, also the fallback identity for images without a UUID
    pub name: String,
    pub file_path: Option<PathBuf>,
    pub pixels: PixelData,
    header: BTreeMap<String, HeaderValue>,
    /// Archive id once registered
    pub image_id: Option<i32>,
    pub last_save_method: Option<SaveMethod>,
    /// Site matched from the header coordinates, for display only
    pub site: Option<Site>,
    /// Set whenever header or pixels change after the last save
    pub dirty: bool,
}

impl AstroImage {
    pub fn new(name: impl Into<String>, pixels: PixelData) -> Self {
        Self {
            name: name.into(),
            pixels,
            ..Self::default()
        }
    }

    pub fn header(&self) -> &BTreeMap<String, HeaderValue> {
        &self.header
    }

    pub fn keyword(&self, key: &str) -> Option<&HeaderValue> {
        self.header.get(key)
    }

    pub fn set_keyword(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        self.header.insert(key.into().to_uppercase(), value.into());
        self.dirty = true;
    }

    pub fn remove_keyword(&mut self, key: &str) -> Option<HeaderValue> {
        let removed = self.header.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Replace the whole header, as a codec does after reading a file.
    pub(crate) fn replace_header(&mut self, header: BTreeMap<String, HeaderValue>) {
        self.header = header;
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.keyword(key)
            .and_then(HeaderValue::as_text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Embedded identity. A malformed value counts as absent.
    pub fn uuid(&self) -> Option<Uuid> {
        let raw = self.text(keywords::UUID)?;
        match Uuid::parse_str(raw) {
            Ok(uuid) => Some(uuid),
            Err(e) => {
                log::warn!("Ignoring malformed UUID {:?} in '{}': {}", raw, self.name, e);
                None
            }
        }
    }

    pub fn set_uuid(&mut self, uuid: Uuid) {
        self.set_keyword(keywords::UUID, uuid.hyphenated().to_string());
    }

    pub fn target(&self) -> Option<&str> {
        self.text(keywords::OBJECT)
    }

    pub fn telescope_name(&self) -> Option<&str> {
        self.text(keywords::TELESCOPE)
    }

    pub fn filter_name(&self) -> Option<&str> {
        self.text(keywords::FILTER)
    }

    pub fn observatory_name(&self) -> Option<&str> {
        self.text(keywords::OBSERVATORY)
    }

    /// Observation time from `DATE-OBS`
    pub fn observation_date(&self) -> Option<NaiveDateTime> {
        let raw = self.text(keywords::DATE_OBS)?;
        parse_date_obs(raw)
    }

    /// Target right ascension in degrees: `RA` (degrees) or `OBJCTRA` (hours, sexagesimal).
    pub fn ra_deg(&self) -> Option<f64> {
        self.keyword(keywords::RA)
            .and_then(HeaderValue::as_f64)
            .or_else(|| self.text(keywords::OBJCTRA).and_then(parse_sexagesimal).map(|h| h * 15.0))
    }

    /// Target declination in degrees: `DEC` or `OBJCTDEC`.
    pub fn dec_deg(&self) -> Option<f64> {
        self.keyword(keywords::DEC)
            .and_then(HeaderValue::as_f64)
            .or_else(|| self.text(keywords::OBJCTDEC).and_then(parse_sexagesimal))
    }

    /// Observing site from `SITELAT`/`SITELONG`/`SITEELEV`. Values may be
    /// decimal degrees or sexagesimal strings. Out-of-range coordinates are
    /// treated as absent.
    pub fn site_position(&self) -> Option<GeoPosition> {
        let coordinate = |key: &str| match self.keyword(key)? {
            HeaderValue::Text(s) => parse_sexagesimal(s),
            other => other.as_f64(),
        };
        let position = GeoPosition {
            latitude: coordinate(keywords::SITE_LAT)?,
            longitude: coordinate(keywords::SITE_LONG)?,
            altitude: self
                .keyword(keywords::SITE_ELEV)
                .and_then(HeaderValue::as_f64)
                .unwrap_or(0.0),
        };
        position.is_valid().then_some(position)
    }

    pub fn set_site_position(&mut self, position: &GeoPosition) {
        self.set_keyword(keywords::SITE_LAT, position.latitude);
        self.set_keyword(keywords::SITE_LONG, position.longitude);
        self.set_keyword(keywords::SITE_ELEV, position.altitude);
    }
}

/// Parse `DATE-OBS` in the ISO forms found in practice.
fn parse_date_obs(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
            Some(date.and_time(NaiveTime::from_hms_opt(0, 0, 0)?))
        })
}

/// Parse `"dd mm ss.s"`, `"dd:mm:ss.s"` or a plain decimal number.
fn parse_sexagesimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<f64>() {
        return Some(value);
    }

    let negative = raw.starts_with('-');
    let parts: Vec<f64> = raw
        .trim_start_matches(['+', '-'])
        .split([' ', ':'])
        .filter(|p| !p.is_empty())
        .map(str::parse::<f64>)
        .collect::<std::result::Result<_, _>>()
        .ok()?;

    let (degrees, minutes, seconds) = match parts.as_slice() {
        [d, m] => (*d, *m, 0.0),
        [d, m, s] => (*d, *m, *s),
        _ => return None,
    };
    if minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }

    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    Some(if negative { -value } else { value })
}
