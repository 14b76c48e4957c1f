//! Repository functions for database CRUD operations

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::models::*;
use super::schema::*;

// ============================================================================
// Site Repository
// ============================================================================

/// Sites that are not soft-deleted, in id order
pub fn get_active_sites(conn: &mut SqliteConnection) -> QueryResult<Vec<Site>> {
    tbl_sites::table
        .filter(tbl_sites::dontdisplay.eq(false))
        .order(tbl_sites::site_id.asc())
        .select(Site::as_select())
        .load(conn)
}

pub fn get_site_by_id(conn: &mut SqliteConnection, site_id: i32) -> QueryResult<Option<Site>> {
    tbl_sites::table
        .filter(tbl_sites::site_id.eq(site_id))
        .select(Site::as_select())
        .first(conn)
        .optional()
}

pub fn create_site(conn: &mut SqliteConnection, new_site: &NewSite) -> QueryResult<i32> {
    diesel::insert_into(tbl_sites::table)
        .values(new_site)
        .returning(tbl_sites::site_id)
        .get_result(conn)
}

pub fn update_site(
    conn: &mut SqliteConnection,
    site_id: i32,
    update: &UpdateSite,
) -> QueryResult<usize> {
    diesel::update(tbl_sites::table.filter(tbl_sites::site_id.eq(site_id)))
        .set(update)
        .execute(conn)
}

// ============================================================================
// Telescope Repository
// ============================================================================

pub fn get_active_telescopes(conn: &mut SqliteConnection) -> QueryResult<Vec<Telescope>> {
    tbl_telescopes::table
        .filter(tbl_telescopes::retired.eq(false))
        .order(tbl_telescopes::shorttext.asc())
        .select(Telescope::as_select())
        .load(conn)
}

pub fn get_telescope_by_id(
    conn: &mut SqliteConnection,
    telescope_id: i32,
) -> QueryResult<Option<Telescope>> {
    tbl_telescopes::table
        .filter(tbl_telescopes::telescope_id.eq(telescope_id))
        .select(Telescope::as_select())
        .first(conn)
        .optional()
}

pub fn get_telescope_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> QueryResult<Option<Telescope>> {
    tbl_telescopes::table
        .filter(tbl_telescopes::shorttext.eq(name))
        .select(Telescope::as_select())
        .first(conn)
        .optional()
}

pub fn create_telescope(
    conn: &mut SqliteConnection,
    new_telescope: &NewTelescope,
) -> QueryResult<i32> {
    diesel::insert_into(tbl_telescopes::table)
        .values(new_telescope)
        .returning(tbl_telescopes::telescope_id)
        .get_result(conn)
}

pub fn update_telescope(
    conn: &mut SqliteConnection,
    telescope_id: i32,
    update: &UpdateTelescope,
) -> QueryResult<usize> {
    diesel::update(tbl_telescopes::table.filter(tbl_telescopes::telescope_id.eq(telescope_id)))
        .set(update)
        .execute(conn)
}

pub fn retire_telescope(conn: &mut SqliteConnection, telescope_id: i32) -> QueryResult<usize> {
    diesel::update(tbl_telescopes::table.filter(tbl_telescopes::telescope_id.eq(telescope_id)))
        .set(tbl_telescopes::retired.eq(true))
        .execute(conn)
}

// ============================================================================
// Filter / Instrument Repository
// ============================================================================

pub fn get_filters(conn: &mut SqliteConnection) -> QueryResult<Vec<Filter>> {
    tbl_filters::table
        .order(tbl_filters::shorttext.asc())
        .select(Filter::as_select())
        .load(conn)
}

pub fn get_filter_by_name(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<Filter>> {
    tbl_filters::table
        .filter(tbl_filters::shorttext.eq(name))
        .select(Filter::as_select())
        .first(conn)
        .optional()
}

pub fn create_filter(conn: &mut SqliteConnection, new_filter: &NewFilter) -> QueryResult<i32> {
    diesel::insert_into(tbl_filters::table)
        .values(new_filter)
        .returning(tbl_filters::filter_id)
        .get_result(conn)
}

pub fn get_instruments(conn: &mut SqliteConnection) -> QueryResult<Vec<Instrument>> {
    tbl_instruments::table
        .order(tbl_instruments::shorttext.asc())
        .select(Instrument::as_select())
        .load(conn)
}

pub fn create_instrument(
    conn: &mut SqliteConnection,
    new_instrument: &NewInstrument,
) -> QueryResult<i32> {
    diesel::insert_into(tbl_instruments::table)
        .values(new_instrument)
        .returning(tbl_instruments::instrument_id)
        .get_result(conn)
}

// ============================================================================
// Image Repository
// ============================================================================

pub fn get_image_by_id(
    conn: &mut SqliteConnection,
    image_id: i32,
) -> QueryResult<Option<ImageRecord>> {
    tbl_images::table
        .filter(tbl_images::image_id.eq(image_id))
        .select(ImageRecord::as_select())
        .first(conn)
        .optional()
}

/// Lowest image id registered under `name`. Names are not unique, the
/// earliest registration wins.
pub fn get_image_id_by_name(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<i32>> {
    tbl_images::table
        .filter(tbl_images::imagename.eq(name))
        .order(tbl_images::image_id.asc())
        .select(tbl_images::image_id)
        .first(conn)
        .optional()
}

pub fn get_image_id_by_uuid(conn: &mut SqliteConnection, uuid: &str) -> QueryResult<Option<i32>> {
    tbl_images::table
        .filter(tbl_images::image_uuid.eq(uuid))
        .select(tbl_images::image_id)
        .first(conn)
        .optional()
}

pub fn create_image(conn: &mut SqliteConnection, new_image: &NewImageRecord) -> QueryResult<i32> {
    diesel::insert_into(tbl_images::table)
        .values(new_image)
        .returning(tbl_images::image_id)
        .get_result(conn)
}

pub fn update_image_quality(
    conn: &mut SqliteConnection,
    image_id: i32,
    quality: i32,
) -> QueryResult<usize> {
    diesel::update(tbl_images::table.filter(tbl_images::image_id.eq(image_id)))
        .set(tbl_images::quality.eq(quality))
        .execute(conn)
}

pub fn update_image_comment(
    conn: &mut SqliteConnection,
    image_id: i32,
    comment: Option<&str>,
) -> QueryResult<usize> {
    diesel::update(tbl_images::table.filter(tbl_images::image_id.eq(image_id)))
        .set(tbl_images::comments.eq(comment))
        .execute(conn)
}

pub fn update_image_flags(
    conn: &mut SqliteConnection,
    image_id: i32,
    flags: &ImageFlags,
) -> QueryResult<usize> {
    diesel::update(tbl_images::table.filter(tbl_images::image_id.eq(image_id)))
        .set(flags)
        .execute(conn)
}

pub(crate) fn update_image_wcs(
    conn: &mut SqliteConnection,
    image_id: i32,
    wcs: &WcsChangeset,
) -> QueryResult<usize> {
    diesel::update(tbl_images::table.filter(tbl_images::image_id.eq(image_id)))
        .set(wcs)
        .execute(conn)
}

/// Delete an image record together with all stored versions
pub fn delete_image(conn: &mut SqliteConnection, image_id: i32) -> QueryResult<usize> {
    conn.transaction(|conn| {
        delete_image_versions(conn, image_id)?;
        diesel::delete(tbl_images::table.filter(tbl_images::image_id.eq(image_id))).execute(conn)
    })
}

// ============================================================================
// Image Storage Repository
// ============================================================================

pub fn get_latest_version(conn: &mut SqliteConnection, image_id: i32) -> QueryResult<Option<i32>> {
    tbl_imagestorage::table
        .filter(tbl_imagestorage::image_id.eq(image_id))
        .select(diesel::dsl::max(tbl_imagestorage::image_version))
        .first(conn)
}

pub fn count_versions(conn: &mut SqliteConnection, image_id: i32) -> QueryResult<i64> {
    tbl_imagestorage::table
        .filter(tbl_imagestorage::image_id.eq(image_id))
        .count()
        .get_result(conn)
}

pub fn get_versions(
    conn: &mut SqliteConnection,
    image_id: i32,
) -> QueryResult<Vec<ImageVersionInfo>> {
    tbl_imagestorage::table
        .filter(tbl_imagestorage::image_id.eq(image_id))
        .order(tbl_imagestorage::image_version.asc())
        .select(ImageVersionInfo::as_select())
        .load(conn)
}

pub fn get_version_payload(
    conn: &mut SqliteConnection,
    image_id: i32,
    version: i32,
) -> QueryResult<Option<StoredPayload>> {
    tbl_imagestorage::table
        .filter(tbl_imagestorage::image_id.eq(image_id))
        .filter(tbl_imagestorage::image_version.eq(version))
        .select(StoredPayload::as_select())
        .first(conn)
        .optional()
}

/// Plain insert. The unique index on (image_id, image_version) rejects a
/// version that already exists.
pub fn insert_version(conn: &mut SqliteConnection, new_version: &NewImageVersion) -> QueryResult<usize> {
    diesel::insert_into(tbl_imagestorage::table)
        .values(new_version)
        .execute(conn)
}

pub fn delete_image_versions(conn: &mut SqliteConnection, image_id: i32) -> QueryResult<usize> {
    diesel::delete(tbl_imagestorage::table.filter(tbl_imagestorage::image_id.eq(image_id)))
        .execute(conn)
}

pub fn delete_image_version(
    conn: &mut SqliteConnection,
    image_id: i32,
    version: i32,
) -> QueryResult<usize> {
    diesel::delete(
        tbl_imagestorage::table
            .filter(tbl_imagestorage::image_id.eq(image_id))
            .filter(tbl_imagestorage::image_version.eq(version)),
    )
    .execute(conn)
}

// ============================================================================
// Plan Repository
// ============================================================================

pub fn get_plan_by_id(conn: &mut SqliteConnection, plan_id: i32) -> QueryResult<Option<Plan>> {
    tbl_plans::table
        .filter(tbl_plans::plan_id.eq(plan_id))
        .select(Plan::as_select())
        .first(conn)
        .optional()
}

pub fn create_plan(conn: &mut SqliteConnection, new_plan: &NewPlan) -> QueryResult<i32> {
    diesel::insert_into(tbl_plans::table)
        .values(new_plan)
        .returning(tbl_plans::plan_id)
        .get_result(conn)
}

/// Target rows of a plan in insertion order. Rank is left to the caller.
pub fn get_plan_targets(conn: &mut SqliteConnection, plan_id: i32) -> QueryResult<Vec<TargetRow>> {
    tbl_targets::table
        .filter(tbl_targets::plan_id.eq(plan_id))
        .order(tbl_targets::id.asc())
        .select(TargetRow::as_select())
        .load(conn)
}

pub fn create_target(conn: &mut SqliteConnection, new_target: &NewTargetRow) -> QueryResult<i32> {
    diesel::insert_into(tbl_targets::table)
        .values(new_target)
        .returning(tbl_targets::id)
        .get_result(conn)
}

pub fn delete_target(conn: &mut SqliteConnection, target_row_id: i32) -> QueryResult<usize> {
    diesel::delete(tbl_targets::table.filter(tbl_targets::id.eq(target_row_id))).execute(conn)
}
