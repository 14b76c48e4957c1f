//! Site and telescope registry
//!
//! Storage sits behind [`SiteRepository`] and [`TelescopeRepository`];
//! [`ArchiveDb`] implements both. [`SiteRegistry`] and [`TelescopeRegistry`]
//! add the find / register / find-or-register logic on top.

use crate::db::models::{
    Filter, Instrument, NewFilter, NewInstrument, NewSite, NewTelescope, Site, Telescope,
    UpdateSite, UpdateTelescope,
};
use crate::db::repository;
use crate::error::{ArchiveError, QueryResultExt, Result};
use crate::geodesic::{find_nearest_site, DistanceMetric, GeoPosition, SiteMatch};
use crate::interaction::{Confirmation, Interaction};
use crate::state::ArchiveDb;

/// Outcome of a find-or-register call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// An existing record matched
    Found(i32),
    /// No match; the user confirmed and a new record was inserted
    Registered(i32),
    /// No match and the user declined registration
    Cancelled,
}

impl Resolution {
    pub fn id(&self) -> Option<i32> {
        match self {
            Resolution::Found(id) | Resolution::Registered(id) => Some(*id),
            Resolution::Cancelled => None,
        }
    }
}

pub trait SiteRepository {
    /// Sites that are not soft-deleted, ordered by id
    fn active_sites(&self) -> Result<Vec<Site>>;
    fn site(&self, site_id: i32) -> Result<Option<Site>>;
    fn insert_site(&self, new_site: &NewSite) -> Result<i32>;
    /// Returns false when no site has that id
    fn update_site(&self, site_id: i32, update: &UpdateSite) -> Result<bool>;
}

pub trait TelescopeRepository {
    fn active_telescopes(&self) -> Result<Vec<Telescope>>;
    fn telescope(&self, telescope_id: i32) -> Result<Option<Telescope>>;
    fn telescope_by_name(&self, name: &str) -> Result<Option<Telescope>>;
    fn insert_telescope(&self, new_telescope: &NewTelescope) -> Result<i32>;
    fn update_telescope(&self, telescope_id: i32, update: &UpdateTelescope) -> Result<bool>;
    fn retire_telescope(&self, telescope_id: i32) -> Result<bool>;
}

impl SiteRepository for ArchiveDb {
    fn active_sites(&self) -> Result<Vec<Site>> {
        let mut conn = self.conn()?;
        repository::get_active_sites(&mut conn).during("load sites")
    }

    fn site(&self, site_id: i32) -> Result<Option<Site>> {
        let mut conn = self.conn()?;
        repository::get_site_by_id(&mut conn, site_id).during("load site")
    }

    fn insert_site(&self, new_site: &NewSite) -> Result<i32> {
        let mut conn = self.conn()?;
        repository::create_site(&mut conn, new_site).during("register site")
    }

    fn update_site(&self, site_id: i32, update: &UpdateSite) -> Result<bool> {
        let mut conn = self.conn()?;
        repository::update_site(&mut conn, site_id, update)
            .map(|count| count > 0)
            .during("update site")
    }
}

impl TelescopeRepository for ArchiveDb {
    fn active_telescopes(&self) -> Result<Vec<Telescope>> {
        let mut conn = self.conn()?;
        repository::get_active_telescopes(&mut conn).during("load telescopes")
    }

    fn telescope(&self, telescope_id: i32) -> Result<Option<Telescope>> {
        let mut conn = self.conn()?;
        repository::get_telescope_by_id(&mut conn, telescope_id).during("load telescope")
    }

    fn telescope_by_name(&self, name: &str) -> Result<Option<Telescope>> {
        let mut conn = self.conn()?;
        repository::get_telescope_by_name(&mut conn, name).during("find telescope")
    }

    fn insert_telescope(&self, new_telescope: &NewTelescope) -> Result<i32> {
        let mut conn = self.conn()?;
        repository::create_telescope(&mut conn, new_telescope).during("register telescope")
    }

    fn update_telescope(&self, telescope_id: i32, update: &UpdateTelescope) -> Result<bool> {
        let mut conn = self.conn()?;
        repository::update_telescope(&mut conn, telescope_id, update)
            .map(|count| count > 0)
            .during("update telescope")
    }

    fn retire_telescope(&self, telescope_id: i32) -> Result<bool> {
        let mut conn = self.conn()?;
        repository::retire_telescope(&mut conn, telescope_id)
            .map(|count| count > 0)
            .during("retire telescope")
    }
}

// ============================================================================
// Sites
// ============================================================================

pub struct SiteRegistry<'a, R: SiteRepository + ?Sized> {
    repo: &'a R,
    metric: &'a dyn DistanceMetric,
    threshold_m: f64,
}

impl<'a, R: SiteRepository + ?Sized> SiteRegistry<'a, R> {
    /// Creates a new instance of [`SiteRegistry`]
    pub fn new(repo: &'a R, metric: &'a dyn DistanceMetric, threshold_m: f64) -> Self {
        Self {
            repo,
            metric,
            threshold_m,
        }
    }

    /// Nearest active site within the threshold. `hint` is the id of the
    /// site matched last time, if the caller has one.
    pub fn find(&self, position: &GeoPosition, hint: Option<i32>) -> Result<Option<SiteMatch>> {
        let sites = self.repo.active_sites()?;
        let found = find_nearest_site(position, &sites, self.metric, self.threshold_m, hint);
        match &found {
            Some(m) => log::debug!(
                "Matched ({:.5}, {:.5}) to site {} '{}' at {:.1} m",
                position.latitude,
                position.longitude,
                m.site.site_id,
                m.site.name,
                m.distance_m
            ),
            None => log::debug!(
                "No site within {} m of ({:.5}, {:.5})",
                self.threshold_m,
                position.latitude,
                position.longitude
            ),
        }
        Ok(found)
    }

    pub fn register(&self, new_site: &NewSite) -> Result<i32> {
        validate_site(new_site)?;
        let site_id = self.repo.insert_site(new_site)?;
        log::info!("Registered site {} '{}'", site_id, new_site.name);
        Ok(site_id)
    }

    /// Match `candidate` against the registered sites, asking the user before
    /// registering it as a new one.
    pub fn find_or_register(
        &self,
        mut candidate: NewSite,
        hint: Option<i32>,
        interaction: &dyn Interaction,
    ) -> Result<Resolution> {
        let position = GeoPosition {
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            altitude: candidate.altitude,
        };
        if let Some(found) = self.find(&position, hint)? {
            return Ok(Resolution::Found(found.site.site_id));
        }

        match interaction.confirm_new_site(&mut candidate) {
            Confirmation::Accepted => self.register(&candidate).map(Resolution::Registered),
            Confirmation::Rejected => {
                log::info!("Registration of site '{}' declined", candidate.name);
                Ok(Resolution::Cancelled)
            }
        }
    }

    pub fn get(&self, site_id: i32) -> Result<Option<Site>> {
        self.repo.site(site_id)
    }

    pub fn list(&self) -> Result<Vec<Site>> {
        self.repo.active_sites()
    }

    pub fn update(&self, site_id: i32, update: &UpdateSite) -> Result<()> {
        if update.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat))
            || update.longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon))
        {
            return Err(ArchiveError::InvalidInput(format!(
                "site coordinates out of range: ({:?}, {:?})",
                update.latitude, update.longitude
            )));
        }
        if update.is_empty() {
            return match self.repo.site(site_id)? {
                Some(_) => Ok(()),
                None => Err(ArchiveError::not_found("site", site_id)),
            };
        }
        if !self.repo.update_site(site_id, update)? {
            return Err(ArchiveError::not_found("site", site_id));
        }
        Ok(())
    }

    /// Soft delete: hide the site from matching and listings.
    pub fn retire(&self, site_id: i32) -> Result<()> {
        let update = UpdateSite {
            dont_display: Some(true),
            ..UpdateSite::default()
        };
        if !self.repo.update_site(site_id, &update)? {
            return Err(ArchiveError::not_found("site", site_id));
        }
        log::info!("Site {} hidden", site_id);
        Ok(())
    }
}

fn validate_site(site: &NewSite) -> Result<()> {
    if site.name.trim().is_empty() {
        return Err(ArchiveError::InvalidInput("site name is empty".into()));
    }
    if !GeoPosition::new(site.latitude, site.longitude).is_valid() {
        return Err(ArchiveError::InvalidInput(format!(
            "site coordinates out of range: ({}, {})",
            site.latitude, site.longitude
        )));
    }
    Ok(())
}

// ============================================================================
// Telescopes
// ============================================================================

pub struct TelescopeRegistry<'a, R: TelescopeRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: TelescopeRepository + ?Sized> TelescopeRegistry<'a, R> {
    /// Creates a new instance of [`TelescopeRegistry`]
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Exact name match, retired telescopes included.
    pub fn find(&self, name: &str) -> Result<Option<Telescope>> {
        self.repo.telescope_by_name(name.trim())
    }

    pub fn register(&self, new_telescope: &NewTelescope) -> Result<i32> {
        let name = new_telescope.name.trim();
        if name.is_empty() {
            return Err(ArchiveError::InvalidInput("telescope name is empty".into()));
        }
        if self.repo.telescope_by_name(name)?.is_some() {
            return Err(ArchiveError::already_exists("telescope", name));
        }

        let trimmed = NewTelescope {
            name: name.to_string(),
            ..new_telescope.clone()
        };
        let telescope_id = self.repo.insert_telescope(&trimmed).map_err(|e| {
            if e.is_unique_violation() {
                ArchiveError::already_exists("telescope", name)
            } else {
                e
            }
        })?;
        log::info!("Registered telescope {} '{}'", telescope_id, name);
        Ok(telescope_id)
    }

    pub fn find_or_register(
        &self,
        mut candidate: NewTelescope,
        interaction: &dyn Interaction,
    ) -> Result<Resolution> {
        if let Some(found) = self.find(&candidate.name)? {
            return Ok(Resolution::Found(found.telescope_id));
        }

        match interaction.confirm_new_telescope(&mut candidate) {
            Confirmation::Accepted => self.register(&candidate).map(Resolution::Registered),
            Confirmation::Rejected => {
                log::info!("Registration of telescope '{}' declined", candidate.name);
                Ok(Resolution::Cancelled)
            }
        }
    }

    pub fn get(&self, telescope_id: i32) -> Result<Option<Telescope>> {
        self.repo.telescope(telescope_id)
    }

    pub fn list(&self) -> Result<Vec<Telescope>> {
        self.repo.active_telescopes()
    }

    pub fn update(&self, telescope_id: i32, update: &UpdateTelescope) -> Result<()> {
        let update = UpdateTelescope {
            name: update.name.as_deref().map(|n| n.trim().to_string()),
            ..update.clone()
        };
        if let Some(name) = &update.name {
            if name.is_empty() {
                return Err(ArchiveError::InvalidInput("telescope name is empty".into()));
            }
            if let Some(existing) = self.repo.telescope_by_name(name)? {
                if existing.telescope_id != telescope_id {
                    return Err(ArchiveError::already_exists("telescope", name));
                }
            }
        }
        if update.is_empty() {
            return match self.repo.telescope(telescope_id)? {
                Some(_) => Ok(()),
                None => Err(ArchiveError::not_found("telescope", telescope_id)),
            };
        }
        if !self.repo.update_telescope(telescope_id, &update)? {
            return Err(ArchiveError::not_found("telescope", telescope_id));
        }
        Ok(())
    }

    pub fn retire(&self, telescope_id: i32) -> Result<()> {
        if !self.repo.retire_telescope(telescope_id)? {
            return Err(ArchiveError::not_found("telescope", telescope_id));
        }
        log::info!("Telescope {} retired", telescope_id);
        Ok(())
    }
}

// ============================================================================
// Filters and instruments
// ============================================================================

impl ArchiveDb {
    pub fn filters(&self) -> Result<Vec<Filter>> {
        let mut conn = self.conn()?;
        repository::get_filters(&mut conn).during("load filters")
    }

    pub fn filter_by_name(&self, name: &str) -> Result<Option<Filter>> {
        let mut conn = self.conn()?;
        repository::get_filter_by_name(&mut conn, name.trim()).during("find filter")
    }

    pub fn add_filter(&self, new_filter: &NewFilter) -> Result<i32> {
        let mut conn = self.conn()?;
        repository::create_filter(&mut conn, new_filter)
            .during("register filter")
            .map_err(|e| {
                if e.is_unique_violation() {
                    ArchiveError::already_exists("filter", &new_filter.name)
                } else {
                    e
                }
            })
    }

    pub fn instruments(&self) -> Result<Vec<Instrument>> {
        let mut conn = self.conn()?;
        repository::get_instruments(&mut conn).during("load instruments")
    }

    pub fn add_instrument(&self, new_instrument: &NewInstrument) -> Result<i32> {
        let mut conn = self.conn()?;
        repository::create_instrument(&mut conn, new_instrument).during("register instrument")
    }
}
