//! Database models for the image archive
//!
//! These structs map to the database tables defined in schema.rs

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::schema::*;

// ============================================================================
// Site (observatory)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = tbl_sites)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Site {
    pub site_id: i32,
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Offset from UTC in hours
    pub timezone: f64,
    #[diesel(column_name = daylightsaving)]
    pub daylight_saving: bool,
    #[diesel(column_name = iaucode)]
    pub iau_code: Option<String>,
    #[diesel(column_name = dontdisplay)]
    pub dont_display: bool,
    pub retired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = tbl_sites)]
pub struct NewSite {
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timezone: f64,
    #[diesel(column_name = daylightsaving)]
    pub daylight_saving: bool,
    #[diesel(column_name = iaucode)]
    pub iau_code: Option<String>,
}

#[derive(Debug, Clone, Default, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = tbl_sites)]
pub struct UpdateSite {
    #[diesel(column_name = shorttext)]
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub timezone: Option<f64>,
    #[diesel(column_name = daylightsaving)]
    pub daylight_saving: Option<bool>,
    #[diesel(column_name = iaucode)]
    pub iau_code: Option<String>,
    #[diesel(column_name = dontdisplay)]
    pub dont_display: Option<bool>,
}

impl UpdateSite {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.altitude.is_none()
            && self.timezone.is_none()
            && self.daylight_saving.is_none()
            && self.iau_code.is_none()
            && self.dont_display.is_none()
    }
}

// ============================================================================
// Telescope
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = tbl_telescopes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Telescope {
    pub telescope_id: i32,
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    /// Aperture in millimetres
    pub aperture: Option<f64>,
    /// Focal length in millimetres
    #[diesel(column_name = focallength)]
    pub focal_length: Option<f64>,
    /// Central obstruction as a fraction of the aperture
    pub obstruction: Option<f64>,
    pub retired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = tbl_telescopes)]
pub struct NewTelescope {
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub aperture: Option<f64>,
    #[diesel(column_name = focallength)]
    pub focal_length: Option<f64>,
    pub obstruction: Option<f64>,
}

#[derive(Debug, Clone, Default, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = tbl_telescopes)]
pub struct UpdateTelescope {
    #[diesel(column_name = shorttext)]
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub aperture: Option<f64>,
    #[diesel(column_name = focallength)]
    pub focal_length: Option<f64>,
    pub obstruction: Option<f64>,
}

impl UpdateTelescope {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.manufacturer.is_none()
            && self.model.is_none()
            && self.aperture.is_none()
            && self.focal_length.is_none()
            && self.obstruction.is_none()
    }
}

// ============================================================================
// Filter / Instrument
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = tbl_filters)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Filter {
    pub filter_id: i32,
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = tbl_filters)]
pub struct NewFilter {
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = tbl_instruments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Instrument {
    pub instrument_id: i32,
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub nx: Option<i32>,
    pub ny: Option<i32>,
    /// Pixel size in microns
    pub pixelx: Option<f64>,
    pub pixely: Option<f64>,
}

#[derive(Debug, Clone, Default, Insertable, Serialize, Deserialize)]
#[diesel(table_name = tbl_instruments)]
pub struct NewInstrument {
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub nx: Option<i32>,
    pub ny: Option<i32>,
    pub pixelx: Option<f64>,
    pub pixely: Option<f64>,
}

// ============================================================================
// Image record
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = tbl_images)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ImageRecord {
    pub image_id: i32,
    #[diesel(column_name = image_uuid)]
    pub uuid: String,
    #[diesel(column_name = imagename)]
    pub name: String,
    #[diesel(column_name = filepath)]
    pub file_path: Option<String>,
    #[diesel(column_name = imagedate)]
    pub image_date: Option<NaiveDateTime>,
    pub site_id: Option<i32>,
    pub telescope_id: Option<i32>,
    pub target: Option<String>,
    pub ra: Option<f64>,
    pub declination: Option<f64>,
    pub filter_id: Option<i32>,
    pub quality: i32,
    pub comments: Option<String>,
    pub astrometric: bool,
    pub photometric: bool,
    pub synthetic: bool,
    #[diesel(column_name = haswcs)]
    pub has_wcs: bool,
    pub nw_ra: Option<f64>,
    pub nw_dec: Option<f64>,
    pub ne_ra: Option<f64>,
    pub ne_dec: Option<f64>,
    pub sw_ra: Option<f64>,
    pub sw_dec: Option<f64>,
    pub se_ra: Option<f64>,
    pub se_dec: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = tbl_images)]
pub struct NewImageRecord {
    #[diesel(column_name = image_uuid)]
    pub uuid: String,
    #[diesel(column_name = imagename)]
    pub name: String,
    #[diesel(column_name = filepath)]
    pub file_path: Option<String>,
    #[diesel(column_name = imagedate)]
    pub image_date: Option<NaiveDateTime>,
    pub site_id: Option<i32>,
    pub telescope_id: Option<i32>,
    pub target: Option<String>,
    pub ra: Option<f64>,
    pub declination: Option<f64>,
    pub filter_id: Option<i32>,
    pub synthetic: bool,
}

/// Analysis flags. `None` leaves the column untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = tbl_images)]
pub struct ImageFlags {
    pub astrometric: Option<bool>,
    pub photometric: Option<bool>,
    pub synthetic: Option<bool>,
}

impl ImageFlags {
    pub fn is_empty(&self) -> bool {
        self.astrometric.is_none() && self.photometric.is_none() && self.synthetic.is_none()
    }
}

/// World coordinate corners of an image, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WcsCorners {
    pub nw: (f64, f64),
    pub ne: (f64, f64),
    pub sw: (f64, f64),
    pub se: (f64, f64),
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tbl_images)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct WcsChangeset {
    #[diesel(column_name = haswcs)]
    pub has_wcs: bool,
    pub nw_ra: Option<f64>,
    pub nw_dec: Option<f64>,
    pub ne_ra: Option<f64>,
    pub ne_dec: Option<f64>,
    pub sw_ra: Option<f64>,
    pub sw_dec: Option<f64>,
    pub se_ra: Option<f64>,
    pub se_dec: Option<f64>,
}

impl From<Option<WcsCorners>> for WcsChangeset {
    fn from(corners: Option<WcsCorners>) -> Self {
        let c = corners;
        Self {
            has_wcs: c.is_some(),
            nw_ra: c.map(|c| c.nw.0),
            nw_dec: c.map(|c| c.nw.1),
            ne_ra: c.map(|c| c.ne.0),
            ne_dec: c.map(|c| c.ne.1),
            sw_ra: c.map(|c| c.sw.0),
            sw_dec: c.map(|c| c.sw.1),
            se_ra: c.map(|c| c.se.0),
            se_dec: c.map(|c| c.se.1),
        }
    }
}

impl ImageRecord {
    pub fn wcs(&self) -> Option<WcsCorners> {
        if !self.has_wcs {
            return None;
        }
        Some(WcsCorners {
            nw: (self.nw_ra?, self.nw_dec?),
            ne: (self.ne_ra?, self.ne_dec?),
            sw: (self.sw_ra?, self.sw_dec?),
            se: (self.se_ra?, self.se_dec?),
        })
    }
}

// ============================================================================
// Image storage (versions)
// ============================================================================

/// Version metadata without the payload.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = tbl_imagestorage)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ImageVersionInfo {
    pub image_id: i32,
    #[diesel(column_name = image_version)]
    pub version: i32,
    pub checksum: String,
    #[diesel(column_name = datetime)]
    pub uploaded_at: NaiveDateTime,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tbl_imagestorage)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StoredPayload {
    #[diesel(column_name = image_data)]
    pub data: Vec<u8>,
    pub checksum: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tbl_imagestorage)]
pub struct NewImageVersion<'a> {
    pub image_id: i32,
    #[diesel(column_name = image_version)]
    pub version: i32,
    #[diesel(column_name = image_data)]
    pub data: &'a [u8],
    pub checksum: String,
    #[diesel(column_name = datetime)]
    pub uploaded_at: NaiveDateTime,
    pub comment: Option<&'a str>,
}

// ============================================================================
// Observation plans
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = tbl_plans)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Plan {
    pub plan_id: i32,
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = tbl_plans)]
pub struct NewPlan {
    #[diesel(column_name = shorttext)]
    pub name: String,
    pub description: Option<String>,
}

/// A raw row of `tbl_targets`. Which of the optional columns is populated
/// depends on `target_type`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = tbl_targets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TargetRow {
    pub id: i32,
    pub plan_id: i32,
    pub rank: i32,
    #[diesel(column_name = targettype_id)]
    pub target_type: i32,
    pub target_id: Option<i32>,
    pub name_id: Option<i64>,
    pub target_name: Option<String>,
}

#[derive(Debug, Clone, Default, Insertable)]
#[diesel(table_name = tbl_targets)]
pub struct NewTargetRow {
    pub plan_id: i32,
    pub rank: i32,
    #[diesel(column_name = targettype_id)]
    pub target_type: i32,
    pub target_id: Option<i32>,
    pub name_id: Option<i64>,
    pub target_name: Option<String>,
}
