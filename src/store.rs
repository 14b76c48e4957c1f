//! Image identity and version storage
//!
//! Records live in `tbl_images`, payloads in `tbl_imagestorage` keyed by
//! `(image_id, image_version)`. Version numbers are assigned by the caller;
//! the store only enforces the composite key.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::models::{
    ImageFlags, ImageRecord, ImageVersionInfo, NewImageRecord, NewImageVersion, WcsChangeset,
    WcsCorners,
};
use crate::db::repository;
use crate::error::{ArchiveError, QueryResultExt, Result};
use crate::state::ArchiveDb;

/// Hex SHA-256 of a payload, as stored alongside it.
pub fn payload_checksum(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

pub struct ImageStore<'a> {
    db: &'a ArchiveDb,
}

impl<'a> ImageStore<'a> {
    /// Creates a new instance of [`ImageStore`]
    pub fn new(db: &'a ArchiveDb) -> Self {
        Self { db }
    }

    pub fn image_id_by_name(&self, name: &str) -> Result<Option<i32>> {
        let mut conn = self.db.conn()?;
        repository::get_image_id_by_name(&mut conn, name).during("find image by name")
    }

    pub fn image_id_by_uuid(&self, uuid: &Uuid) -> Result<Option<i32>> {
        let mut conn = self.db.conn()?;
        repository::get_image_id_by_uuid(&mut conn, &uuid.hyphenated().to_string())
            .during("find image by uuid")
    }

    pub fn image(&self, image_id: i32) -> Result<Option<ImageRecord>> {
        let mut conn = self.db.conn()?;
        repository::get_image_by_id(&mut conn, image_id).during("load image")
    }

    /// Insert a new image record and return its id.
    pub fn register(&self, new_image: &NewImageRecord) -> Result<i32> {
        let uuid = Uuid::parse_str(&new_image.uuid).map_err(|e| {
            ArchiveError::InvalidInput(format!("invalid image uuid {:?}: {}", new_image.uuid, e))
        })?;
        let uuid = uuid.hyphenated().to_string();

        let mut conn = self.db.conn()?;
        if repository::get_image_id_by_uuid(&mut conn, &uuid)
            .during("find image by uuid")?
            .is_some()
        {
            return Err(ArchiveError::already_exists("image", &uuid));
        }

        let record = NewImageRecord {
            uuid: uuid.clone(),
            ..new_image.clone()
        };
        let image_id = repository::create_image(&mut conn, &record)
            .during("register image")
            .map_err(|e| {
                if e.is_unique_violation() {
                    ArchiveError::already_exists("image", &uuid)
                } else {
                    e
                }
            })?;

        log::info!("Registered image {} '{}' as {}", image_id, record.name, uuid);
        Ok(image_id)
    }

    // ========================================================================
    // Versions
    // ========================================================================

    /// Highest stored version, `None` when nothing has been stored yet.
    pub fn latest_version(&self, image_id: i32) -> Result<Option<i32>> {
        let mut conn = self.db.conn()?;
        repository::get_latest_version(&mut conn, image_id).during("find latest version")
    }

    pub fn version_count(&self, image_id: i32) -> Result<i64> {
        let mut conn = self.db.conn()?;
        repository::count_versions(&mut conn, image_id).during("count versions")
    }

    /// Version metadata in ascending version order, payloads excluded.
    pub fn list_versions(&self, image_id: i32) -> Result<Vec<ImageVersionInfo>> {
        let mut conn = self.db.conn()?;
        repository::get_versions(&mut conn, image_id).during("list versions")
    }

    /// Store `payload` as `version` of `image_id`. An existing version with
    /// the same number makes this fail with a unique-violation storage error.
    pub fn upload_version(
        &self,
        image_id: i32,
        version: i32,
        payload: &[u8],
        comment: &str,
    ) -> Result<()> {
        if version < 0 {
            return Err(ArchiveError::InvalidInput(format!(
                "version must not be negative, got {}",
                version
            )));
        }

        let comment = comment.trim();
        let new_version = NewImageVersion {
            image_id,
            version,
            data: payload,
            checksum: payload_checksum(payload),
            uploaded_at: Utc::now().naive_utc(),
            comment: (!comment.is_empty()).then_some(comment),
        };

        let mut conn = self.db.conn()?;
        repository::insert_version(&mut conn, &new_version).during("upload image version")?;
        log::debug!(
            "Stored version {} of image {} ({} bytes)",
            version,
            image_id,
            payload.len()
        );
        Ok(())
    }

    pub fn download_version(&self, image_id: i32, version: i32) -> Result<Vec<u8>> {
        let mut conn = self.db.conn()?;
        let stored = repository::get_version_payload(&mut conn, image_id, version)
            .during("download image version")?
            .ok_or_else(|| {
                ArchiveError::not_found("image version", format!("{}/{}", image_id, version))
            })?;

        let actual = payload_checksum(&stored.data);
        if actual != stored.checksum {
            return Err(ArchiveError::internal(format!(
                "checksum mismatch for version {} of image {}: stored {}, computed {}",
                version, image_id, stored.checksum, actual
            )));
        }
        Ok(stored.data)
    }

    /// Remove every stored version. The image record is kept.
    pub fn delete_all_versions(&self, image_id: i32) -> Result<usize> {
        let mut conn = self.db.conn()?;
        let deleted =
            repository::delete_image_versions(&mut conn, image_id).during("delete versions")?;
        log::info!("Deleted {} version(s) of image {}", deleted, image_id);
        Ok(deleted)
    }

    /// Returns false when there was no such version.
    pub fn delete_version(&self, image_id: i32, version: i32) -> Result<bool> {
        let mut conn = self.db.conn()?;
        let deleted = repository::delete_image_version(&mut conn, image_id, version)
            .during("delete version")?;
        Ok(deleted > 0)
    }

    // ========================================================================
    // Record maintenance
    // ========================================================================

    pub fn update_quality(&self, image_id: i32, quality: i32) -> Result<()> {
        let mut conn = self.db.conn()?;
        let updated = repository::update_image_quality(&mut conn, image_id, quality)
            .during("update image quality")?;
        ensure_updated(updated, image_id)
    }

    /// An empty comment clears it.
    pub fn update_comment(&self, image_id: i32, comment: &str) -> Result<()> {
        let comment = comment.trim();
        let mut conn = self.db.conn()?;
        let updated = repository::update_image_comment(
            &mut conn,
            image_id,
            (!comment.is_empty()).then_some(comment),
        )
        .during("update image comment")?;
        ensure_updated(updated, image_id)
    }

    pub fn update_flags(&self, image_id: i32, flags: &ImageFlags) -> Result<()> {
        if flags.is_empty() {
            return match self.image(image_id)? {
                Some(_) => Ok(()),
                None => Err(ArchiveError::not_found("image", image_id)),
            };
        }
        let mut conn = self.db.conn()?;
        let updated = repository::update_image_flags(&mut conn, image_id, flags)
            .during("update image flags")?;
        ensure_updated(updated, image_id)
    }

    /// Set or clear (`None`) the plate-solution corners.
    pub fn update_wcs(&self, image_id: i32, corners: Option<WcsCorners>) -> Result<()> {
        let mut conn = self.db.conn()?;
        let updated = repository::update_image_wcs(&mut conn, image_id, &WcsChangeset::from(corners))
            .during("update image wcs")?;
        ensure_updated(updated, image_id)
    }

    /// Remove the record and all of its versions in one transaction.
    pub fn delete_image(&self, image_id: i32) -> Result<()> {
        let mut conn = self.db.conn()?;
        let deleted = repository::delete_image(&mut conn, image_id).during("delete image")?;
        ensure_updated(deleted, image_id)?;
        log::info!("Deleted image {}", image_id);
        Ok(())
    }
}

fn ensure_updated(rows: usize, image_id: i32) -> Result<()> {
    if rows == 0 {
        return Err(ArchiveError::not_found("image", image_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;

    use super::*;

    fn new_image(name: &str) -> NewImageRecord {
        NewImageRecord {
            uuid: Uuid::new_v4().to_string(),
            name: name.to_string(),
            ..NewImageRecord::default()
        }
    }

    mod identity {
        use super::*;

        /// Expect a registered image to be found by name and by uuid
        #[test]
        fn lookup_after_register() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let record = new_image("m31.fits");
            let uuid = Uuid::parse_str(&record.uuid)?;

            let image_id = store.register(&record)?;

            assert_eq!(store.image_id_by_name("m31.fits")?, Some(image_id));
            assert_eq!(store.image_id_by_uuid(&uuid)?, Some(image_id));
            assert_eq!(store.image_id_by_uuid(&Uuid::new_v4())?, None);
            assert_eq!(store.image_id_by_name("m33.fits")?, None);
            Ok(())
        }

        /// Expect AlreadyExists when the uuid is taken
        #[test]
        fn duplicate_uuid() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let record = new_image("m31.fits");
            store.register(&record)?;

            let result = store.register(&NewImageRecord {
                name: "copy.fits".into(),
                ..record
            });

            assert!(matches!(result, Err(ArchiveError::AlreadyExists { .. })));
            assert_eq!(store.image_id_by_name("copy.fits")?, None);
            Ok(())
        }

        /// Expect the lowest id to win when two images share a name
        #[test]
        fn duplicate_name_resolves_to_first() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let first = store.register(&new_image("light.fits"))?;
            store.register(&new_image("light.fits"))?;

            assert_eq!(store.image_id_by_name("light.fits")?, Some(first));
            Ok(())
        }
    }

    mod versions {
        use super::*;

        /// Expect the latest version and count to track uploads
        #[test]
        fn latest_and_count() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;

            assert_eq!(store.latest_version(image_id)?, None);
            assert_eq!(store.version_count(image_id)?, 0);

            store.upload_version(image_id, 0, b"original", "Original image")?;
            store.upload_version(image_id, 1, b"stretched", "")?;

            assert_eq!(store.latest_version(image_id)?, Some(1));
            assert_eq!(store.version_count(image_id)?, 2);
            Ok(())
        }

        /// Expect a second upload of the same version to fail and leave the first intact
        #[test]
        fn duplicate_version_is_a_storage_error() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;
            store.upload_version(image_id, 3, b"first", "")?;

            let result = store.upload_version(image_id, 3, b"second", "");

            let err = result.expect_err("duplicate version");
            assert!(err.is_unique_violation(), "unexpected error {:?}", err);
            assert_eq!(store.download_version(image_id, 3)?, b"first");
            assert_eq!(store.version_count(image_id)?, 1);
            Ok(())
        }

        /// Expect the original at version 0 to be immutable once stored
        #[test]
        fn original_cannot_be_replaced() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;
            store.upload_version(image_id, 0, b"original", "Original image")?;

            let err = store
                .upload_version(image_id, 0, b"overwrite", "")
                .expect_err("version 0 already stored");

            assert!(err.is_unique_violation(), "unexpected error {:?}", err);
            assert_eq!(store.download_version(image_id, 0)?, b"original");
            let versions = store.list_versions(image_id)?;
            assert_eq!(versions.len(), 1);
            assert_eq!(versions[0].comment.as_deref(), Some("Original image"));
            Ok(())
        }

        /// Expect the exact payload back
        #[test]
        fn download_returns_payload() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;
            let payload: Vec<u8> = (0..=255).collect();
            store.upload_version(image_id, 0, &payload, "")?;

            assert_eq!(store.download_version(image_id, 0)?, payload);
            Ok(())
        }

        /// Expect NotFound for a version that was never stored
        #[test]
        fn download_missing_version() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;

            let result = store.download_version(image_id, 7);

            assert!(matches!(result, Err(ArchiveError::NotFound { .. })));
            Ok(())
        }

        /// Expect negative version numbers to be refused
        #[test]
        fn negative_version() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;

            let result = store.upload_version(image_id, -1, b"x", "");

            assert!(matches!(result, Err(ArchiveError::InvalidInput(_))));
            Ok(())
        }

        /// Expect metadata in ascending order with empty comments stored as null
        #[test]
        fn list_versions_metadata() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;
            store.upload_version(image_id, 1, b"b", "  ")?;
            store.upload_version(image_id, 0, b"a", "Original image")?;

            let versions = store.list_versions(image_id)?;

            assert_eq!(versions.iter().map(|v| v.version).collect::<Vec<_>>(), vec![0, 1]);
            assert_eq!(versions[0].comment.as_deref(), Some("Original image"));
            assert_eq!(versions[1].comment, None);
            assert_eq!(versions[0].checksum, payload_checksum(b"a"));
            Ok(())
        }

        /// Expect a tampered payload to surface as an internal inconsistency
        #[test]
        fn checksum_mismatch() -> anyhow::Result<()> {
            use crate::db::schema::tbl_imagestorage;
            use diesel::prelude::*;

            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;
            store.upload_version(image_id, 0, b"pristine", "")?;

            let mut conn = test.db.conn()?;
            diesel::update(tbl_imagestorage::table)
                .set(tbl_imagestorage::image_data.eq(b"tampered".to_vec()))
                .execute(&mut conn)?;

            let result = store.download_version(image_id, 0);

            assert!(matches!(result, Err(ArchiveError::InternalInconsistency(_))));
            Ok(())
        }
    }

    mod deletion {
        use super::*;

        /// Expect version deletion to leave the record and its identity alone
        #[test]
        fn delete_all_versions_keeps_record() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let record = new_image("m42.fits");
            let uuid = Uuid::parse_str(&record.uuid)?;
            let image_id = store.register(&record)?;
            store.upload_version(image_id, 0, b"a", "")?;
            store.upload_version(image_id, 1, b"b", "")?;

            assert_eq!(store.delete_all_versions(image_id)?, 2);

            assert_eq!(store.version_count(image_id)?, 0);
            assert_eq!(store.image_id_by_uuid(&uuid)?, Some(image_id));
            Ok(())
        }

        /// Expect a single version to be removed and a repeat to report false
        #[test]
        fn delete_one_version() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;
            store.upload_version(image_id, 0, b"a", "")?;
            store.upload_version(image_id, 1, b"b", "")?;

            assert!(store.delete_version(image_id, 1)?);
            assert!(!store.delete_version(image_id, 1)?);
            assert_eq!(store.latest_version(image_id)?, Some(0));
            Ok(())
        }

        /// Expect the record and all versions to be gone
        #[test]
        fn delete_image_removes_everything() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;
            store.upload_version(image_id, 0, b"a", "")?;

            store.delete_image(image_id)?;

            assert!(store.image(image_id)?.is_none());
            assert_eq!(store.version_count(image_id)?, 0);
            assert!(matches!(
                store.delete_image(image_id),
                Err(ArchiveError::NotFound { .. })
            ));
            Ok(())
        }

        /// Expect image ids never to be reused after a delete
        #[test]
        fn ids_are_not_reused() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let first = store.register(&new_image("a.fits"))?;
            store.delete_image(first)?;

            let second = store.register(&new_image("b.fits"))?;

            assert!(second > first);
            Ok(())
        }
    }

    mod maintenance {
        use super::*;

        /// Expect quality, comment and flags to be written
        #[test]
        fn updates_are_persisted() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;

            store.update_quality(image_id, 4)?;
            store.update_comment(image_id, "thin cloud")?;
            store.update_flags(
                image_id,
                &ImageFlags {
                    astrometric: Some(true),
                    ..ImageFlags::default()
                },
            )?;

            let record = store.image(image_id)?.expect("record");
            assert_eq!(record.quality, 4);
            assert_eq!(record.comments.as_deref(), Some("thin cloud"));
            assert!(record.astrometric);
            assert!(!record.photometric);

            store.update_comment(image_id, "")?;
            assert_eq!(store.image(image_id)?.and_then(|r| r.comments), None);
            Ok(())
        }

        /// Expect wcs corners to be stored and cleared
        #[test]
        fn wcs_round_trip() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);
            let image_id = store.register(&new_image("m42.fits"))?;
            let corners = WcsCorners {
                nw: (84.0, -5.0),
                ne: (83.0, -5.0),
                sw: (84.0, -6.0),
                se: (83.0, -6.0),
            };

            store.update_wcs(image_id, Some(corners))?;
            assert_eq!(store.image(image_id)?.and_then(|r| r.wcs()), Some(corners));

            store.update_wcs(image_id, None)?;
            let record = store.image(image_id)?.expect("record");
            assert!(!record.has_wcs);
            assert_eq!(record.nw_ra, None);
            Ok(())
        }

        /// Expect updates to a missing image to report NotFound
        #[test]
        fn missing_image() -> anyhow::Result<()> {
            let test = TestArchive::new()?;
            let store = ImageStore::new(&test.db);

            assert!(matches!(store.update_quality(42, 1), Err(ArchiveError::NotFound { .. })));
            assert!(matches!(
                store.update_flags(42, &ImageFlags::default()),
                Err(ArchiveError::NotFound { .. })
            ));
            Ok(())
        }
    }
}
