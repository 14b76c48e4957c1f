//! Image registration and save pipeline
//!
//! Ties an in-memory [`AstroImage`] to its archive record: registering it on
//! first contact, resolving site/telescope/filter references, and appending a
//! new stored version on every database save.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::codec::PixelCodec;
use crate::db::models::{NewImageRecord, NewSite, NewTelescope, Site};
use crate::error::{ArchiveError, Result};
use crate::geodesic::DistanceMetric;
use crate::image::{keywords, AstroImage, HeaderValue, SaveMethod};
use crate::interaction::Interaction;
use crate::registry::{Resolution, SiteRegistry, TelescopeRegistry};
use crate::state::ArchiveDb;
use crate::store::ImageStore;

/// Comment attached to the version stored when an image is first imported
pub const ORIGINAL_VERSION_COMMENT: &str = "Original image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(SaveMethod),
    /// The user backed out of a prompt; nothing was written
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub image_id: i32,
    /// True when this call created the archive record
    pub newly_registered: bool,
}

/// States of a single `save` call. A failure leaves the machine through `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveState {
    Unsaved,
    AwaitingDestinationChoice,
    SavingToFile,
    SavingToDatabase,
    Saved(SaveMethod),
    Cancelled,
}

pub struct ArchivePipeline<'a> {
    db: &'a ArchiveDb,
    codec: &'a dyn PixelCodec,
    interaction: &'a dyn Interaction,
    metric: &'a dyn DistanceMetric,
    new_uuid: Box<dyn Fn() -> Uuid + 'a>,
}

impl<'a> ArchivePipeline<'a> {
    /// Creates a new instance of [`ArchivePipeline`]
    pub fn new(
        db: &'a ArchiveDb,
        codec: &'a dyn PixelCodec,
        interaction: &'a dyn Interaction,
        metric: &'a dyn DistanceMetric,
    ) -> Self {
        Self {
            db,
            codec,
            interaction,
            metric,
            new_uuid: Box::new(Uuid::new_v4),
        }
    }

    /// Replace the UUID source used when minting image identities.
    pub fn with_uuid_generator(mut self, generator: impl Fn() -> Uuid + 'a) -> Self {
        self.new_uuid = Box::new(generator);
        self
    }

    fn store(&self) -> ImageStore<'a> {
        ImageStore::new(self.db)
    }

    fn site_registry(&self) -> SiteRegistry<'a, ArchiveDb> {
        SiteRegistry::new(self.db, self.metric, self.db.settings().site_match_threshold_m)
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Save `image` to wherever it was last saved, asking for a destination
    /// the first time.
    pub fn save(&self, image: &mut AstroImage) -> Result<SaveOutcome> {
        let mut state = SaveState::Unsaved;
        loop {
            let next = match state {
                SaveState::Unsaved => match image.last_save_method {
                    Some(SaveMethod::File) => SaveState::SavingToFile,
                    Some(SaveMethod::Database) => SaveState::SavingToDatabase,
                    None => SaveState::AwaitingDestinationChoice,
                },
                SaveState::AwaitingDestinationChoice => {
                    match self.interaction.choose_save_destination(image) {
                        Some(SaveMethod::File) => SaveState::SavingToFile,
                        Some(SaveMethod::Database) => SaveState::SavingToDatabase,
                        None => SaveState::Cancelled,
                    }
                }
                SaveState::SavingToFile => match self.save_to_file(image) {
                    Ok(SaveOutcome::Saved(method)) => SaveState::Saved(method),
                    Ok(SaveOutcome::Cancelled) => SaveState::Cancelled,
                    Err(e) => return Err(failed(image, state, e)),
                },
                SaveState::SavingToDatabase => match self.save_to_database(image) {
                    Ok(_) => SaveState::Saved(SaveMethod::Database),
                    Err(e) => return Err(failed(image, state, e)),
                },
                SaveState::Saved(method) => return Ok(SaveOutcome::Saved(method)),
                SaveState::Cancelled => return Ok(SaveOutcome::Cancelled),
            };
            log::debug!("Saving '{}': {:?} -> {:?}", image.name, state, next);
            state = next;
        }
    }

    /// Append the current image as a new stored version, registering it
    /// first if needed. Returns the version number written.
    ///
    /// Version 0 is reserved for the original stored by [`Self::process_file`];
    /// saves write `latest + 1`, starting at 1. The number is read before the
    /// comment prompt and the encode. A concurrent save of the same image can
    /// take it first, in which case this fails with a unique-violation storage
    /// error and the caller may retry.
    pub fn save_to_database(&self, image: &mut AstroImage) -> Result<i32> {
        let image_id = self.ensure_registered(image)?;
        let store = self.store();
        let version = store.latest_version(image_id)?.map_or(1, |v| v + 1);

        let comment = self.interaction.prompt_version_comment(image);
        let payload = self.codec.encode(image)?;
        store.upload_version(image_id, version, &payload, &comment)?;

        image.last_save_method = Some(SaveMethod::Database);
        image.dirty = false;
        log::info!("Saved '{}' as version {} of image {}", image.name, version, image_id);
        Ok(version)
    }

    pub fn save_to_file(&self, image: &mut AstroImage) -> Result<SaveOutcome> {
        let path = match image.file_path.clone() {
            Some(path) => path,
            None => match self.interaction.choose_save_path(image) {
                Some(path) => path,
                None => return Ok(SaveOutcome::Cancelled),
            },
        };

        self.codec.write_to_file(&path, image)?;

        log::info!("Saved '{}' to {}", image.name, path.display());
        image.file_path = Some(path);
        image.last_save_method = Some(SaveMethod::File);
        image.dirty = false;
        Ok(SaveOutcome::Saved(SaveMethod::File))
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Archive id of `image`, registering it under a fresh UUID when neither
    /// its id nor its embedded UUID is known to the archive.
    pub fn ensure_registered(&self, image: &mut AstroImage) -> Result<i32> {
        if let Some(image_id) = image.image_id {
            return Ok(image_id);
        }
        if let Some(uuid) = image.uuid() {
            if let Some(image_id) = self.store().image_id_by_uuid(&uuid)? {
                image.image_id = Some(image_id);
                return Ok(image_id);
            }
            log::debug!("UUID {} of '{}' is not registered", uuid, image.name);
        }
        self.register_image(image)
    }

    /// First contact with an opened image: attach it to its archive record,
    /// creating one (and storing the original as version 0) if none exists,
    /// then look up its observing site for display.
    pub fn process_file(&self, image: &mut AstroImage) -> Result<ProcessOutcome> {
        let store = self.store();

        let existing = match image.uuid() {
            Some(uuid) => store.image_id_by_uuid(&uuid)?,
            None => None,
        };
        let existing = match existing {
            Some(image_id) => Some(image_id),
            None => self.adopt_by_name(image)?,
        };

        let outcome = match existing {
            Some(image_id) => {
                image.image_id = Some(image_id);
                ProcessOutcome {
                    image_id,
                    newly_registered: false,
                }
            }
            None => {
                let image_id = self.register_image(image)?;
                if self.db.settings().store_original_on_import {
                    let payload = self.codec.encode(image)?;
                    store.upload_version(image_id, 0, &payload, ORIGINAL_VERSION_COMMENT)?;
                    log::debug!("Stored original of '{}' as version 0", image.name);
                }
                ProcessOutcome {
                    image_id,
                    newly_registered: true,
                }
            }
        };

        image.site = self.match_site(image)?;
        Ok(outcome)
    }

    /// Fetch a stored version and rebuild the image from it.
    pub fn load_version(&self, image_id: i32, version: i32) -> Result<AstroImage> {
        let store = self.store();
        let record = store
            .image(image_id)?
            .ok_or_else(|| ArchiveError::not_found("image", image_id))?;
        let payload = store.download_version(image_id, version)?;

        let mut image = self.codec.decode(&payload)?;
        image.name = record.name;
        image.image_id = Some(image_id);
        image.last_save_method = Some(SaveMethod::Database);
        image.dirty = false;
        Ok(image)
    }

    /// Name fallback for images without a usable UUID. On a hit the record's
    /// UUID is written into the image.
    fn adopt_by_name(&self, image: &mut AstroImage) -> Result<Option<i32>> {
        let store = self.store();
        let Some(image_id) = store.image_id_by_name(&image.name)? else {
            return Ok(None);
        };
        let record = store
            .image(image_id)?
            .ok_or_else(|| ArchiveError::internal(format!("image {} vanished during lookup", image_id)))?;
        let uuid = Uuid::parse_str(&record.uuid).map_err(|e| {
            ArchiveError::internal(format!(
                "image {} has malformed uuid {:?}: {}",
                image_id, record.uuid, e
            ))
        })?;

        log::info!("Matched '{}' to image {} by name", image.name, image_id);
        image.set_uuid(uuid);
        image.image_id = Some(image_id);
        Ok(Some(image_id))
    }

    fn register_image(&self, image: &mut AstroImage) -> Result<i32> {
        let uuid = self.allocate_uuid()?;
        image.set_uuid(uuid);

        let record = NewImageRecord {
            uuid: uuid.hyphenated().to_string(),
            name: image.name.clone(),
            file_path: image
                .file_path
                .as_deref()
                .map(|p| p.to_string_lossy().into_owned()),
            image_date: image.observation_date(),
            site_id: self.resolve_site(image)?,
            telescope_id: self.resolve_telescope(image)?,
            target: image.target().map(str::to_string),
            ra: image.ra_deg(),
            declination: image.dec_deg(),
            filter_id: self.resolve_filter(image)?,
            synthetic: false,
        };

        let image_id = self.store().register(&record)?;
        image.image_id = Some(image_id);
        Ok(image_id)
    }

    /// Mint a UUID not yet present in the archive.
    fn allocate_uuid(&self) -> Result<Uuid> {
        let store = self.store();
        let attempts = self.db.settings().max_uuid_attempts;
        for _ in 0..attempts {
            let candidate = (self.new_uuid)();
            if store.image_id_by_uuid(&candidate)?.is_none() {
                return Ok(candidate);
            }
            log::warn!("Generated UUID {} is already registered, retrying", candidate);
        }
        Err(ArchiveError::Storage {
            operation: "allocate image uuid",
            source: DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                Box::new(format!("no unused UUID after {} attempts", attempts)),
            ),
        })
    }

    fn resolve_site(&self, image: &AstroImage) -> Result<Option<i32>> {
        let Some(position) = image.site_position() else {
            return Ok(None);
        };
        let candidate = NewSite {
            name: image
                .observatory_name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:.4} {:.4}", position.latitude, position.longitude)),
            latitude: position.latitude,
            longitude: position.longitude,
            altitude: position.altitude,
            ..NewSite::default()
        };

        let hint = image.site.as_ref().map(|s| s.site_id);
        let resolution = self
            .site_registry()
            .find_or_register(candidate, hint, self.interaction)?;
        if resolution == Resolution::Cancelled {
            log::info!("Registering '{}' without a site", image.name);
        }
        Ok(resolution.id())
    }

    fn resolve_telescope(&self, image: &AstroImage) -> Result<Option<i32>> {
        let Some(name) = image.telescope_name() else {
            return Ok(None);
        };
        let candidate = NewTelescope {
            name: name.to_string(),
            focal_length: image.keyword(keywords::FOCAL_LENGTH).and_then(HeaderValue::as_f64),
            aperture: image.keyword(keywords::APERTURE).and_then(HeaderValue::as_f64),
            ..NewTelescope::default()
        };

        let resolution = TelescopeRegistry::new(self.db).find_or_register(candidate, self.interaction)?;
        if resolution == Resolution::Cancelled {
            log::info!("Registering '{}' without a telescope", image.name);
        }
        Ok(resolution.id())
    }

    /// Filters are never registered from here; an unknown name leaves the
    /// reference empty.
    fn resolve_filter(&self, image: &AstroImage) -> Result<Option<i32>> {
        let Some(name) = image.filter_name() else {
            return Ok(None);
        };
        let filter = self.db.filter_by_name(name)?;
        if filter.is_none() {
            log::debug!("Filter '{}' of '{}' is not registered", name, image.name);
        }
        Ok(filter.map(|f| f.filter_id))
    }

    /// Nearest registered site to the image's coordinates, without prompting.
    fn match_site(&self, image: &AstroImage) -> Result<Option<Site>> {
        let Some(position) = image.site_position() else {
            return Ok(None);
        };
        let hint = image.site.as_ref().map(|s| s.site_id);
        Ok(self.site_registry().find(&position, hint)?.map(|m| m.site))
    }
}

fn failed(image: &AstroImage, state: SaveState, error: ArchiveError) -> ArchiveError {
    log::debug!("Saving '{}': {:?} -> Failed ({})", image.name, state, error);
    error
}
