//! Fixtures shared by the unit tests

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::catalog::{StellarCatalog, StellarObject};
use crate::codec::PixelCodec;
use crate::config::Settings;
use crate::db::models::{NewSite, NewTelescope};
use crate::error::{ArchiveError, Result};
use crate::image::{AstroImage, HeaderValue, PixelData, SaveMethod};
use crate::interaction::{Confirmation, Interaction};
use crate::state::ArchiveDb;

/// A freshly migrated archive in a temporary directory. The directory lives
/// as long as the fixture.
pub struct TestArchive {
    pub db: ArchiveDb,
    dir: TempDir,
}

impl TestArchive {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_settings(|_| {})
    }

    pub fn with_settings(configure: impl FnOnce(&mut Settings)) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut settings = Settings::with_database(dir.path().join("arid.db"));
        configure(&mut settings);
        let db = ArchiveDb::open(settings)?;
        Ok(Self { db, dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Answers every prompt from a fixed script and counts how often it was asked.
pub struct ScriptedInteraction {
    pub site_answer: Confirmation,
    pub telescope_answer: Confirmation,
    pub destination: Option<SaveMethod>,
    pub save_path: Option<PathBuf>,
    pub comment: String,
    pub site_prompts: Cell<usize>,
    pub telescope_prompts: Cell<usize>,
    pub destination_prompts: Cell<usize>,
    pub comment_prompts: Cell<usize>,
}

impl Default for ScriptedInteraction {
    fn default() -> Self {
        Self {
            site_answer: Confirmation::Accepted,
            telescope_answer: Confirmation::Accepted,
            destination: Some(SaveMethod::Database),
            save_path: None,
            comment: String::new(),
            site_prompts: Cell::new(0),
            telescope_prompts: Cell::new(0),
            destination_prompts: Cell::new(0),
            comment_prompts: Cell::new(0),
        }
    }
}

impl ScriptedInteraction {
    pub fn rejecting() -> Self {
        Self {
            site_answer: Confirmation::Rejected,
            telescope_answer: Confirmation::Rejected,
            ..Self::default()
        }
    }
}

impl Interaction for ScriptedInteraction {
    fn confirm_new_site(&self, _candidate: &mut NewSite) -> Confirmation {
        self.site_prompts.set(self.site_prompts.get() + 1);
        self.site_answer
    }

    fn confirm_new_telescope(&self, _candidate: &mut NewTelescope) -> Confirmation {
        self.telescope_prompts.set(self.telescope_prompts.get() + 1);
        self.telescope_answer
    }

    fn choose_save_destination(&self, _image: &AstroImage) -> Option<SaveMethod> {
        self.destination_prompts.set(self.destination_prompts.get() + 1);
        self.destination
    }

    fn choose_save_path(&self, _image: &AstroImage) -> Option<PathBuf> {
        self.save_path.clone()
    }

    fn prompt_version_comment(&self, _image: &AstroImage) -> String {
        self.comment_prompts.set(self.comment_prompts.get() + 1);
        self.comment.clone()
    }
}

#[derive(Serialize, Deserialize)]
struct MemoryPayload {
    header: Vec<(String, HeaderValue)>,
    pixels: PixelData,
}

/// JSON stand-in for the FITS codec. Can be told to fail on encode.
#[derive(Default)]
pub struct MemoryCodec {
    pub fail_encode: bool,
    pub files_written: RefCell<Vec<PathBuf>>,
}

impl MemoryCodec {
    pub fn failing() -> Self {
        Self {
            fail_encode: true,
            ..Self::default()
        }
    }
}

impl PixelCodec for MemoryCodec {
    fn encode(&self, image: &AstroImage) -> Result<Vec<u8>> {
        if self.fail_encode {
            return Err(ArchiveError::Codec("encoder exploded".into()));
        }
        let payload = MemoryPayload {
            header: image
                .header()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            pixels: image.pixels.clone(),
        };
        serde_json::to_vec(&payload).map_err(|e| ArchiveError::Codec(e.to_string()))
    }

    fn decode(&self, payload: &[u8]) -> Result<AstroImage> {
        let payload: MemoryPayload =
            serde_json::from_slice(payload).map_err(|e| ArchiveError::Codec(e.to_string()))?;
        let mut image = AstroImage::new(String::new(), payload.pixels);
        image.replace_header(payload.header.into_iter().collect());
        Ok(image)
    }

    fn read_from_file(&self, path: &Path) -> Result<AstroImage> {
        let bytes = std::fs::read(path)?;
        let mut image = self.decode(&bytes)?;
        image.file_path = Some(path.to_path_buf());
        image.last_save_method = Some(SaveMethod::File);
        Ok(image)
    }

    fn write_to_file(&self, path: &Path, image: &AstroImage) -> Result<()> {
        let bytes = self.encode(image)?;
        std::fs::write(path, bytes)?;
        self.files_written.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}

/// Catalog backed by a map, counting lookups.
#[derive(Default)]
pub struct CountingCatalog {
    pub objects: HashMap<i64, StellarObject>,
    pub lookups: Cell<usize>,
}

impl CountingCatalog {
    pub fn with_object(name_id: i64, name: &str) -> Self {
        let mut catalog = Self::default();
        catalog.objects.insert(
            name_id,
            StellarObject {
                name_id,
                name: name.to_string(),
                object_type: "Star".to_string(),
                ra_deg: 101.287,
                dec_deg: -16.716,
                magnitude: Some(-1.46),
                spectral_type: Some("A1V".to_string()),
                alternative_names: None,
            },
        );
        catalog
    }
}

impl StellarCatalog for CountingCatalog {
    fn query_stellar_by_name_id(&self, name_id: i64) -> Result<StellarObject> {
        self.lookups.set(self.lookups.get() + 1);
        self.objects
            .get(&name_id)
            .cloned()
            .ok_or_else(|| ArchiveError::not_found("stellar object", name_id))
    }
}

pub fn sample_image(name: &str) -> AstroImage {
    AstroImage::new(name, PixelData::new(2, 2, vec![10.0, 20.0, 30.0, 40.0]))
}

pub fn sample_site(name: &str, latitude: f64, longitude: f64) -> NewSite {
    NewSite {
        name: name.to_string(),
        latitude,
        longitude,
        altitude: 120.0,
        timezone: 2.0,
        daylight_saving: false,
        iau_code: None,
    }
}

pub fn sample_telescope(name: &str) -> NewTelescope {
    NewTelescope {
        name: name.to_string(),
        manufacturer: Some("Celestron".to_string()),
        aperture: Some(356.0),
        focal_length: Some(3910.0),
        ..NewTelescope::default()
    }
}
