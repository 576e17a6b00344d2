//! Copies file facts and resolved metadata onto an image record.

use sb_core::metadata::Metadata;
use sb_core::Result;
use sb_db::models::ImageRecord;

use crate::item::FileFacts;

/// Filesystem facts: size, mtime and both hashes.
pub fn apply_file_facts(rec: &mut ImageRecord, file: &FileFacts) {
    rec.ext = file.ext.clone();
    rec.file_size = file.size;
    rec.mtime = file.mtime;
    rec.file_hash = file.file_hash.clone();
    rec.meta_hash = file.meta_hash.clone();
}

/// Semantic fields plus the raw metadata JSON.
///
/// Every mapped column is overwritten, so a field that vanished from the
/// file is cleared on the record too.
pub fn apply_metadata(rec: &mut ImageRecord, md: &Metadata) -> Result<()> {
    rec.title = md.title().map(String::from);
    rec.subject = md.subject().map(String::from);
    rec.camera = md.maker_camera();
    rec.lens = md.lens().map(String::from);
    rec.focal_length = md.focal_length();
    rec.aperture = md.aperture();
    rec.exposure = md.exposure();
    rec.iso = md.iso();
    rec.latitude = md.latitude();
    rec.longitude = md.longitude();
    rec.rotation = md.rotation().unwrap_or(0);
    rec.rating = md.rating();
    rec.width = md.width().unwrap_or(0);
    rec.height = md.height().unwrap_or(0);
    rec.taken_at = md.taken_at();
    rec.exif_json = md.to_json()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::test_support::file;
    use sb_core::metadata::{
        MetaValue, MetadataType, MetadataValue, CAMERA, EXPOSURE_TIME, LATITUDE, MAKER, ROTATION,
        TITLE,
    };

    fn text(alias: &str, v: &str) -> MetadataValue {
        MetadataValue {
            alias: alias.into(),
            source: format!("test:{alias}"),
            kind: MetadataType::String,
            value: MetaValue::Text(v.into()),
            unit: None,
        }
    }

    #[test]
    fn maps_semantic_fields() {
        let mut md = Metadata::new();
        md.insert(text(MAKER, "FUJIFILM"));
        md.insert(text(CAMERA, "X-T5"));
        md.insert(text(TITLE, "Skógafoss"));
        md.insert(text(ROTATION, "Rotate 90 CW"));
        md.insert(text(EXPOSURE_TIME, "1/250"));
        md.insert(text(LATITUDE, "63 deg 31' 55.20\" N"));

        let mut rec = ImageRecord::new("photos", "", "a.jpg", "jpg");
        rec.lens = Some("stale".into());
        apply_metadata(&mut rec, &md).unwrap();

        assert_eq!(rec.camera.as_deref(), md.maker_camera().as_deref());
        assert_eq!(rec.title.as_deref(), Some("Skógafoss"));
        assert_eq!(rec.rotation, 90);
        assert_eq!(rec.exposure, Some(0.004));
        assert!((rec.latitude.unwrap() - 63.532).abs() < 1e-3);
        assert_eq!(rec.lens, None);
        assert!(rec.exif_json.contains("\"ref\":\"test:title\""));
    }

    #[test]
    fn copies_file_facts() {
        let mut facts = file("", "a.JPG");
        facts.meta_hash = "sidecar".into();
        let mut rec = ImageRecord::new("photos", "", "a.JPG", "");
        apply_file_facts(&mut rec, &facts);
        assert_eq!(rec.ext, "jpg");
        assert_eq!(rec.file_size, 1024);
        assert_eq!(rec.mtime, 1_700_000_000);
        assert_eq!(rec.file_hash, "content");
        assert_eq!(rec.meta_hash, "sidecar");
    }
}
