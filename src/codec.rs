//! Pixel codec
//!
//! The archive stores images in FITS form. [`PixelCodec`] is the seam; the
//! shipped [`FitsCodec`] uses `fitrs` for both file and database payloads.

use fitrs::{Fits, FitsData, Hdu};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ArchiveError, Result};
use crate::image::{AstroImage, HeaderValue, PixelData, SaveMethod};

pub trait PixelCodec {
    /// Serialise an image into the exchange format stored as a version payload.
    fn encode(&self, image: &AstroImage) -> Result<Vec<u8>>;

    /// Rebuild an image from a stored payload. Identity fields other than the
    /// header are left unset.
    fn decode(&self, payload: &[u8]) -> Result<AstroImage>;

    fn read_from_file(&self, path: &Path) -> Result<AstroImage>;

    fn write_to_file(&self, path: &Path, image: &AstroImage) -> Result<()>;
}

/// Keywords that describe the data layout and are regenerated on write
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3", "EXTEND", "BZERO", "BSCALE", "END",
];

/// fitrs truncates longer keys on write, so they are refused up front.
fn is_fits_keyword(key: &str) -> bool {
    (1..=8).contains(&key.len())
        && key
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FitsCodec;

impl FitsCodec {
    fn to_hdu(image: &AstroImage) -> Result<Hdu> {
        if !image.pixels.is_consistent() {
            return Err(ArchiveError::Codec(format!(
                "'{}' has {} pixels for a {}x{} image",
                image.name,
                image.pixels.data.len(),
                image.pixels.width,
                image.pixels.height
            )));
        }

        let mut hdu = Hdu::new(
            &[image.pixels.width, image.pixels.height],
            image.pixels.data.clone(),
        );

        for (key, value) in image.header() {
            if STRUCTURAL_KEYWORDS.contains(&key.as_str()) {
                continue;
            }
            if !is_fits_keyword(key) {
                return Err(ArchiveError::Codec(format!(
                    "'{}' has header keyword {:?}, FITS keywords are 1-8 characters of A-Z, 0-9, '-' and '_'",
                    image.name, key
                )));
            }
            let value = match value {
                HeaderValue::Text(s) => fitrs::HeaderValue::CharacterString(s.clone()),
                HeaderValue::Logical(b) => fitrs::HeaderValue::Logical(*b),
                HeaderValue::Real(r) => fitrs::HeaderValue::RealFloatingNumber(*r),
                HeaderValue::Integer(i) => match i32::try_from(*i) {
                    Ok(i) => fitrs::HeaderValue::IntegerNumber(i),
                    Err(_) => fitrs::HeaderValue::RealFloatingNumber(*i as f64),
                },
            };
            hdu.insert(key.clone(), value);
        }

        Ok(hdu)
    }

    fn from_hdu(name: String, hdu: &Hdu) -> Result<AstroImage> {
        let (shape, data): (Vec<usize>, Vec<f32>) = match hdu.read_data() {
            FitsData::FloatingPoint32(array) => (array.shape.clone(), array.data.iter().copied().collect()),
            FitsData::FloatingPoint64(array) => (
                array.shape.clone(),
                array.data.iter().map(|v| *v as f32).collect(),
            ),
            _ => {
                return Err(ArchiveError::Codec(format!(
                    "'{}' holds integer or character data, only floating point images are supported",
                    name
                )))
            }
        };

        let (width, height) = match shape.as_slice() {
            [w] => (*w, 1),
            [w, h] => (*w, *h),
            other => {
                return Err(ArchiveError::Codec(format!(
                    "'{}' has unsupported dimensions {:?}",
                    name, other
                )))
            }
        };

        let mut header = BTreeMap::new();
        for (key, value) in hdu.iter() {
            let key = key.to_string();
            if STRUCTURAL_KEYWORDS.contains(&key.as_str()) {
                continue;
            }
            let value = match value {
                Some(fitrs::HeaderValue::CharacterString(s)) => HeaderValue::Text(s.trim().to_string()),
                Some(fitrs::HeaderValue::Logical(b)) => HeaderValue::Logical(*b),
                Some(fitrs::HeaderValue::IntegerNumber(i)) => HeaderValue::Integer(i64::from(*i)),
                Some(fitrs::HeaderValue::RealFloatingNumber(r)) => HeaderValue::Real(*r),
                _ => continue,
            };
            header.insert(key, value);
        }

        let mut image = AstroImage::new(name, PixelData::new(width, height, data));
        image.replace_header(header);
        Ok(image)
    }

    fn open_primary(path: &Path) -> Result<Hdu> {
        let fits = Fits::open(path)
            .map_err(|e| ArchiveError::Codec(format!("Failed to parse FITS file {}: {}", path.display(), e)))?;
        fits.get(0)
            .ok_or_else(|| ArchiveError::Codec(format!("{} has no primary HDU", path.display())))
    }
}

impl PixelCodec for FitsCodec {
    fn encode(&self, image: &AstroImage) -> Result<Vec<u8>> {
        let scratch = tempfile::Builder::new()
            .prefix("astromanager-")
            .suffix(".fits")
            .tempfile()?;
        self.write_to_file(scratch.path(), image)?;
        Ok(std::fs::read(scratch.path())?)
    }

    fn decode(&self, payload: &[u8]) -> Result<AstroImage> {
        let mut scratch = tempfile::Builder::new()
            .prefix("astromanager-")
            .suffix(".fits")
            .tempfile()?;
        std::io::Write::write_all(&mut scratch, payload)?;
        let hdu = Self::open_primary(scratch.path())?;
        Self::from_hdu(String::new(), &hdu)
    }

    fn read_from_file(&self, path: &Path) -> Result<AstroImage> {
        let hdu = Self::open_primary(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut image = Self::from_hdu(name, &hdu)?;
        image.file_path = Some(path.to_path_buf());
        image.last_save_method = Some(SaveMethod::File);
        image.dirty = false;
        Ok(image)
    }

    fn write_to_file(&self, path: &Path, image: &AstroImage) -> Result<()> {
        let hdu = Self::to_hdu(image)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Fits::create(path, hdu)
            .map_err(|e| ArchiveError::Codec(format!("Failed to write {}: {}", path.display(), e)))?;
        log::debug!("Wrote '{}' to {}", image.name, path.display());
        Ok(())
    }
}
