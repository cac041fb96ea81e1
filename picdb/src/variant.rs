//! Lazy derivation of the `thumb`/`small` variants, and the image
//! processing trait those derivations go through.

use crate::error::{Error, Result};
use crate::file::FileHandle;
use crate::layout::{self, ResizeConfig, Variant};
use crate::table::MetadataTable;

/// An opaque image-processing provider.
///
/// Modeled as a trait so the core crate never hard-codes a JPEG codec at
/// the call site — only [`DefaultImageProvider`] actually links one in.
pub trait ImageProvider {
    /// Decodes just enough of `bytes` to return its pixel dimensions
    /// `(width, height)`.
    fn decode_dimensions(&self, bytes: &[u8]) -> Result<(u16, u16)>;

    /// Resizes `bytes` to fit within a `(max_width, max_height)` bounding
    /// box, preserving aspect ratio, and returns a new encoded buffer.
    fn resize_to_fit(&self, bytes: &[u8], max_width: u16, max_height: u16) -> Result<Vec<u8>>;
}

/// JPEG codec backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultImageProvider;

impl ImageProvider for DefaultImageProvider {
    fn decode_dimensions(&self, bytes: &[u8]) -> Result<(u16, u16)> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
            .map_err(|e| Error::ImageDecode(e.to_string()))?;
        let (w, h) = (img.width(), img.height());
        Ok((clamp_u16(w), clamp_u16(h)))
    }

    fn resize_to_fit(&self, bytes: &[u8], max_width: u16, max_height: u16) -> Result<Vec<u8>> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
            .map_err(|e| Error::ImageDecode(e.to_string()))?;
        let resized = img.resize(
            u32::from(max_width),
            u32::from(max_height),
            image::imageops::FilterType::Lanczos3,
        );
        let mut out = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Jpeg)
            .map_err(|e| Error::ImageDecode(e.to_string()))?;
        Ok(out)
    }
}

fn clamp_u16(v: u32) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

/// Ensures `row[index]`'s variant `v` is materialized, back-propagating
/// to every row in its duplicate group.
///
/// `Orig` is trivially satisfied (the blob is always present for occupied
/// rows); `Thumb`/`Small` are decoded from the original on first request
/// and shared across content duplicates.
pub fn ensure_materialized(
    table: &mut MetadataTable,
    file: &mut FileHandle,
    provider: &dyn ImageProvider,
    resize: ResizeConfig,
    index: usize,
    v: Variant,
) -> Result<()> {
    if matches!(v, Variant::Orig) {
        return Ok(());
    }

    let group = table.find_duplicates_by_sha(index);

    // Back-propagate an already-materialized variant from a sibling: a
    // duplicate inserted after this row's content was first resized may
    // not yet "see" that resize in its own row.
    if let Some(&sibling) = group.get(1) {
        let sib_size = table.get(sibling).size[v.index()];
        let sib_offset = table.get(sibling).offset[v.index()];
        let row = table.get_mut(index);
        if row.size[v.index()] != sib_size {
            row.size[v.index()] = sib_size;
            row.offset[v.index()] = sib_offset;
        }
    }

    if table.get(index).size[v.index()] != 0 {
        return Ok(());
    }

    let orig = table.get(index);
    let orig_bytes = file.read_at(
        orig.offset[Variant::Orig.index()],
        orig.size[Variant::Orig.index()] as usize,
    )?;

    let (target_w, target_h) = resize.target(v);
    let resized = provider.resize_to_fit(&orig_bytes, target_w, target_h)?;
    let new_size = u32::try_from(resized.len())
        .map_err(|_| Error::ImageDecode("resized buffer exceeds u32::MAX".to_owned()))?;
    let new_offset = file.append(&resized)?;

    for &j in &group {
        let row = table.get_mut(j);
        row.size[v.index()] = new_size;
        row.offset[v.index()] = new_offset;
        let bytes = row.to_bytes();
        file.write_at(layout::row_offset(j), &bytes)?;
    }

    tracing::debug!(variant = ?v, new_offset, new_size, group_len = group.len(), "materialized variant");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_provider {
    //! A deterministic, real-codec-free stand-in for [`super::ImageProvider`],
    //! used by every test in this crate that needs to exercise the lazy
    //! variant builder without decoding actual JPEG bytes.

    use super::{ImageProvider, Result};

    /// Encodes "images" as `{width}x{height}:{payload byte}` ASCII, so
    /// dimensions and resize math can be asserted on directly.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct FakeImageProvider;

    impl FakeImageProvider {
        /// Builds a fake encoded image of the given pixel size.
        #[must_use]
        pub fn encode(width: u16, height: u16) -> Vec<u8> {
            format!("{width}x{height}:orig").into_bytes()
        }

        fn parse(bytes: &[u8]) -> (u16, u16) {
            let s = std::str::from_utf8(bytes).unwrap_or("0x0:");
            let dims = s.split(':').next().unwrap_or("0x0");
            let mut parts = dims.split('x');
            let w = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
            let h = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
            (w, h)
        }
    }

    impl ImageProvider for FakeImageProvider {
        fn decode_dimensions(&self, bytes: &[u8]) -> Result<(u16, u16)> {
            Ok(Self::parse(bytes))
        }

        fn resize_to_fit(&self, bytes: &[u8], max_width: u16, max_height: u16) -> Result<Vec<u8>> {
            let (w, h) = Self::parse(bytes);
            let ratio = f64::from(max_width) / f64::from(w.max(1));
            let ratio = ratio.min(f64::from(max_height) / f64::from(h.max(1)));
            let nw = ((f64::from(w) * ratio).round() as u32).max(1);
            let nh = ((f64::from(h) * ratio).round() as u32).max(1);
            Ok(format!("{nw}x{nh}:resized").into_bytes())
        }
    }

    #[test]
    fn fake_provider_scales_down_preserving_aspect() {
        let provider = FakeImageProvider;
        let src = FakeImageProvider::encode(640, 480);
        let out = provider.resize_to_fit(&src, 64, 64).expect("resize");
        let s = String::from_utf8(out).expect("utf8");
        assert!(s.starts_with("64x48:"));
    }
}
