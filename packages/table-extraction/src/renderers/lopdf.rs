//! PDF page loading with lopdf.
//!
//! Each page yields its largest embedded raster image (the scan, for
//! scanned documents) re-encoded as PNG, plus the page's text layer.
//! Pages that only hold vector content come through with text alone.

use std::collections::BTreeMap;
use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId, Stream};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ExtractionError, Result};
use crate::traits::renderer::PageRenderer;
use crate::types::document::Page;

/// Longest image side sent upstream; larger scans are downscaled.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Guard against walking a malformed /Parent cycle forever.
const MAX_PARENT_DEPTH: usize = 32;

#[derive(Debug, Error)]
enum PageImageError {
    #[error("PDF structure: {0}")]
    Structure(String),

    #[error("image decode: {0}")]
    Image(#[from] image::ImageError),

    #[error("raw pixels: {0}")]
    Pixels(String),
}

/// Loads pages from PDF bytes using lopdf.
#[derive(Debug, Clone)]
pub struct LopdfRenderer {
    max_dimension: u32,
    extract_text: bool,
}

impl Default for LopdfRenderer {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            extract_text: true,
        }
    }
}

impl LopdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Downscale images whose longest side exceeds `pixels`.
    pub fn with_max_dimension(mut self, pixels: u32) -> Self {
        self.max_dimension = pixels.max(1);
        self
    }

    /// Skip the text layer and send images only.
    pub fn without_text(mut self) -> Self {
        self.extract_text = false;
        self
    }

    fn render_page(&self, doc: &PdfDocument, index: usize, number: u32, page_id: ObjectId) -> Page {
        let mut page = Page::new(index);

        match largest_page_image(doc, page_id) {
            Ok(Some(raw)) => match self.to_png(&raw) {
                Ok(png) => page = page.with_image(png),
                Err(e) => warn!(page = number, error = %e, "Failed to re-encode page image"),
            },
            Ok(None) => debug!(page = number, "No raster image on page"),
            Err(e) => warn!(page = number, error = %e, "Failed to read page image"),
        }

        if self.extract_text {
            match doc.extract_text(&[number]) {
                Ok(text) => page = page.with_text(text),
                Err(e) => debug!(page = number, error = %e, "No text layer"),
            }
        }

        page
    }

    fn to_png(&self, raw: &DecodedImage) -> std::result::Result<Vec<u8>, PageImageError> {
        let img = match raw {
            DecodedImage::Encoded(bytes) => image::load_from_memory(bytes)?,
            DecodedImage::Pixels(img) => img.clone(),
        };

        let img = if img.width().max(img.height()) > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, FilterType::Triangle)
        } else {
            img
        };

        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, ImageFormat::Png)?;
        Ok(png.into_inner())
    }
}

impl PageRenderer for LopdfRenderer {
    fn render_pages(&self, bytes: &[u8], limit: Option<usize>) -> Result<Vec<Page>> {
        let doc = PdfDocument::load_mem(bytes)
            .map_err(|e| ExtractionError::invalid_document(format!("failed to parse PDF: {}", e)))?;

        let page_ids: BTreeMap<u32, ObjectId> = doc.get_pages();
        let pages: Vec<Page> = page_ids
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(index, (&number, &page_id))| self.render_page(&doc, index, number, page_id))
            .collect();

        debug!(
            pages = pages.len(),
            total_pages = page_ids.len(),
            with_images = pages.iter().filter(|p| p.image.is_some()).count(),
            with_text = pages.iter().filter(|p| p.text.is_some()).count(),
            "Rendered PDF pages"
        );
        Ok(pages)
    }
}

/// Image data pulled out of an XObject stream.
enum DecodedImage {
    /// A complete image file (JPEG, PNG, TIFF)
    Encoded(Vec<u8>),
    /// Raw samples rebuilt from the stream dictionary
    Pixels(DynamicImage),
}

impl DecodedImage {
    fn pixel_area(&self, dict: &Dictionary) -> i64 {
        match self {
            DecodedImage::Pixels(img) => img.width() as i64 * img.height() as i64,
            DecodedImage::Encoded(_) => declared_area(dict),
        }
    }
}

/// Area from the /Width and /Height entries, which the file controls.
fn declared_area(dict: &Dictionary) -> i64 {
    let width = get_int(dict, b"Width").unwrap_or(0);
    let height = get_int(dict, b"Height").unwrap_or(0);
    width.saturating_mul(height)
}

/// Find the image XObject with the most pixels on a page.
fn largest_page_image(
    doc: &PdfDocument,
    page_id: ObjectId,
) -> std::result::Result<Option<DecodedImage>, PageImageError> {
    let Some(resources) = page_resources(doc, page_id)? else {
        return Ok(None);
    };
    let Some(xobjects) = dict_entry(doc, resources, b"XObject") else {
        return Ok(None);
    };

    let mut largest: Option<(i64, DecodedImage)> = None;
    for (_name, obj) in xobjects.iter() {
        let Object::Stream(stream) = resolve(doc, obj) else {
            continue;
        };
        if !is_image(&stream.dict) {
            continue;
        }

        let decoded = match decode_image_stream(doc, stream) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, "Skipping undecodable image XObject");
                continue;
            }
        };

        let area = decoded.pixel_area(&stream.dict);
        if largest.as_ref().map_or(true, |(best, _)| area > *best) {
            largest = Some((area, decoded));
        }
    }

    Ok(largest.map(|(_, image)| image))
}

/// Page /Resources, inherited from ancestors when the page has none.
fn page_resources(
    doc: &PdfDocument,
    page_id: ObjectId,
) -> std::result::Result<Option<&Dictionary>, PageImageError> {
    let mut node = doc
        .get_dictionary(page_id)
        .map_err(|e| PageImageError::Structure(format!("page object: {}", e)))?;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(resources) = dict_entry(doc, node, b"Resources") {
            return Ok(Some(resources));
        }
        match node.get(b"Parent").ok().map(|parent| resolve(doc, parent)) {
            Some(Object::Dictionary(parent)) => node = parent,
            _ => return Ok(None),
        }
    }
    Ok(None)
}

fn decode_image_stream(
    doc: &PdfDocument,
    stream: &Stream,
) -> std::result::Result<DecodedImage, PageImageError> {
    if has_filter(&stream.dict, b"DCTDecode") {
        // The stream body is a JPEG file
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        return Ok(DecodedImage::Encoded(content));
    }

    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    if image::guess_format(&content).is_ok() {
        return Ok(DecodedImage::Encoded(content));
    }

    rebuild_raw_image(doc, &stream.dict, &content).map(DecodedImage::Pixels)
}

/// Rebuild an image from raw samples using /Width, /Height,
/// /BitsPerComponent and /ColorSpace.
fn rebuild_raw_image(
    doc: &PdfDocument,
    dict: &Dictionary,
    samples: &[u8],
) -> std::result::Result<DynamicImage, PageImageError> {
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    let bits = get_int(dict, b"BitsPerComponent").unwrap_or(8);
    let channels = color_channels(doc, dict);

    match (channels, bits) {
        (1, 1) => {
            let gray = unpack_bilevel(samples, width, height, is_inverted_decode(dict))?;
            image::GrayImage::from_raw(width, height, gray)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| PageImageError::Pixels("bilevel buffer size mismatch".into()))
        }
        (1, 8) => image::GrayImage::from_raw(width, height, exact(samples, width, height, 1)?)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| PageImageError::Pixels("grayscale buffer size mismatch".into())),
        (3, 8) => image::RgbImage::from_raw(width, height, exact(samples, width, height, 3)?)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| PageImageError::Pixels("RGB buffer size mismatch".into())),
        (4, 8) => {
            let rgb = cmyk_to_rgb(&exact(samples, width, height, 4)?);
            image::RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| PageImageError::Pixels("CMYK buffer size mismatch".into()))
        }
        (channels, bits) => Err(PageImageError::Pixels(format!(
            "unsupported layout: {} channels at {} bits",
            channels, bits
        ))),
    }
}

fn exact(
    samples: &[u8],
    width: u32,
    height: u32,
    channels: usize,
) -> std::result::Result<Vec<u8>, PageImageError> {
    let expected = width as usize * height as usize * channels;
    if samples.len() < expected {
        return Err(PageImageError::Pixels(format!(
            "buffer too small: {} bytes, expected {}",
            samples.len(),
            expected
        )));
    }
    Ok(samples[..expected].to_vec())
}

/// Expand 1-bit rows (each padded to a byte boundary) to 8-bit gray.
fn unpack_bilevel(
    samples: &[u8],
    width: u32,
    height: u32,
    inverted: bool,
) -> std::result::Result<Vec<u8>, PageImageError> {
    let (width, height) = (width as usize, height as usize);
    let stride = width.div_ceil(8);
    if samples.len() < stride * height {
        return Err(PageImageError::Pixels("bilevel buffer too small".into()));
    }

    let mut gray = Vec::with_capacity(width * height);
    for row in samples.chunks(stride).take(height) {
        for x in 0..width {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            // In DeviceGray a set bit is white
            let white = (bit == 1) != inverted;
            gray.push(if white { 255 } else { 0 });
        }
    }
    Ok(gray)
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    cmyk.chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u16;
            let channel = |c: u8| ((255 - c as u16) * k / 255) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

fn color_channels(doc: &PdfDocument, dict: &Dictionary) -> u32 {
    let Ok(space) = dict.get(b"ColorSpace") else {
        // Image masks and most scans without a color space are gray
        return 1;
    };

    match resolve(doc, space) {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => 1,
            b"DeviceCMYK" => 4,
            _ => 3,
        },
        Object::Array(items) => match items.first() {
            Some(Object::Name(name)) if name == b"ICCBased" => items
                .get(1)
                .map(|stream| resolve(doc, stream))
                .and_then(|stream| match stream {
                    Object::Stream(s) => get_int(&s.dict, b"N").ok(),
                    _ => None,
                })
                .map(|n| n as u32)
                .unwrap_or(3),
            Some(Object::Name(name)) if name == b"Indexed" => 1,
            _ => 3,
        },
        _ => 3,
    }
}

fn is_inverted_decode(dict: &Dictionary) -> bool {
    match dict.get(b"Decode") {
        Ok(Object::Array(values)) => values
            .first()
            .and_then(|v| v.as_i64().ok())
            .is_some_and(|first| first == 1),
        _ => false,
    }
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
}

fn has_filter(dict: &Dictionary, filter: &[u8]) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => name == filter,
        Ok(Object::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Object::Name(name) if name == filter)),
        _ => false,
    }
}

fn resolve<'a>(doc: &'a PdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn dict_entry<'a>(doc: &'a PdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
}

fn get_int(dict: &Dictionary, key: &[u8]) -> std::result::Result<i64, PageImageError> {
    dict.get(key)
        .and_then(Object::as_i64)
        .map_err(|_| PageImageError::Structure(format!("missing /{}", String::from_utf8_lossy(key))))
}

fn dimension(dict: &Dictionary, key: &[u8]) -> std::result::Result<u32, PageImageError> {
    let value = get_int(dict, key)?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| PageImageError::Structure(format!("invalid /{} {}", String::from_utf8_lossy(key), value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;
    use lopdf::dictionary;

    #[test]
    fn renderer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LopdfRenderer>();
    }

    fn make_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([128u8, 128, 128]));
        let mut jpeg = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();
        jpeg.into_inner()
    }

    fn image_stream(width: i64, height: i64, filter: Option<&str>, color: &str, bits: i64, body: Vec<u8>) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => Object::Name(color.as_bytes().to_vec()),
            "BitsPerComponent" => bits,
        };
        if let Some(filter) = filter {
            dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
        }
        let mut stream = Stream::new(dict, body);
        stream.allows_compression = false;
        stream
    }

    /// Build a PDF whose pages each hold the given images and text.
    fn make_pdf(pages: Vec<(Vec<Stream>, Option<&str>)>) -> Vec<u8> {
        let mut doc = PdfDocument::with_version("1.4");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids = Vec::new();
        for (images, text) in pages {
            let mut xobjects = Dictionary::new();
            let mut ops = String::new();
            for (i, stream) in images.into_iter().enumerate() {
                let name = format!("Im{}", i);
                let id = doc.add_object(Object::Stream(stream));
                xobjects.set(name.as_bytes().to_vec(), Object::Reference(id));
                ops.push_str(&format!("q 612 0 0 792 0 0 cm /{} Do Q ", name));
            }
            if let Some(text) = text {
                ops.push_str(&format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text));
            }

            let content_id = doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn decode(png: &[u8]) -> DynamicImage {
        assert_eq!(&png[0..4], b"\x89PNG");
        image::load_from_memory(png).unwrap()
    }

    #[test]
    fn test_scanned_page_yields_png() {
        let jpeg = make_jpeg(200, 300);
        let pdf = make_pdf(vec![(
            vec![image_stream(200, 300, Some("DCTDecode"), "DeviceRGB", 8, jpeg)],
            None,
        )]);

        let pages = LopdfRenderer::new().render_pages(&pdf, None).unwrap();
        assert_eq!(pages.len(), 1);
        let img = decode(pages[0].image.as_deref().unwrap());
        assert_eq!(img.dimensions(), (200, 300));
    }

    #[test]
    fn test_largest_image_wins() {
        let pdf = make_pdf(vec![(
            vec![
                image_stream(10, 10, Some("DCTDecode"), "DeviceRGB", 8, make_jpeg(10, 10)),
                image_stream(200, 300, Some("DCTDecode"), "DeviceRGB", 8, make_jpeg(200, 300)),
            ],
            None,
        )]);

        let pages = LopdfRenderer::new().render_pages(&pdf, None).unwrap();
        let img = decode(pages[0].image.as_deref().unwrap());
        assert_eq!(img.dimensions(), (200, 300));
    }

    #[test]
    fn test_oversized_declared_dimensions() {
        let huge = image_stream(i64::MAX, i64::MAX, Some("DCTDecode"), "DeviceRGB", 8, make_jpeg(20, 20));
        assert_eq!(declared_area(&huge.dict), i64::MAX);

        let pdf = make_pdf(vec![(
            vec![
                image_stream(10, 10, Some("DCTDecode"), "DeviceRGB", 8, make_jpeg(10, 10)),
                huge,
            ],
            None,
        )]);
        let pages = LopdfRenderer::new().render_pages(&pdf, None).unwrap();
        let img = decode(pages[0].image.as_deref().unwrap());
        assert_eq!(img.dimensions(), (20, 20));
    }

    #[test]
    fn test_page_limit_stops_rendering() {
        let pdf = make_pdf(vec![
            (vec![], Some("first")),
            (vec![], Some("second")),
            (vec![], Some("third")),
        ]);

        let pages = LopdfRenderer::new().render_pages(&pdf, Some(2)).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[1].text.as_deref().unwrap_or_default().contains("second"));
        assert_eq!(LopdfRenderer::new().render_pages(&pdf, None).unwrap().len(), 3);
    }

    #[test]
    fn test_large_scan_is_downscaled() {
        let pdf = make_pdf(vec![(
            vec![image_stream(400, 200, Some("DCTDecode"), "DeviceRGB", 8, make_jpeg(400, 200))],
            None,
        )]);

        let pages = LopdfRenderer::new().with_max_dimension(100).render_pages(&pdf, None).unwrap();
        let img = decode(pages[0].image.as_deref().unwrap());
        assert_eq!(img.dimensions(), (100, 50));
    }

    #[test]
    fn test_raw_gray_pixels() {
        let pdf = make_pdf(vec![(
            vec![image_stream(4, 2, None, "DeviceGray", 8, vec![0, 64, 128, 255, 255, 128, 64, 0])],
            None,
        )]);

        let pages = LopdfRenderer::new().render_pages(&pdf, None).unwrap();
        let img = decode(pages[0].image.as_deref().unwrap()).to_luma8();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(3, 0).0, [255]);
    }

    #[test]
    fn test_bilevel_pixels() {
        // 10 px wide: two bytes per row
        let rows = vec![0b1111_1111, 0b1100_0000, 0b0000_0000, 0b0000_0000];
        let gray = unpack_bilevel(&rows, 10, 2, false).unwrap();
        assert_eq!(gray.len(), 20);
        assert!(gray[..10].iter().all(|&v| v == 255));
        assert!(gray[10..].iter().all(|&v| v == 0));

        let inverted = unpack_bilevel(&rows, 10, 2, true).unwrap();
        assert_eq!(inverted[0], 0);
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), vec![255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), vec![0, 0, 0]);
        assert_eq!(cmyk_to_rgb(&[255, 0, 0, 0]), vec![0, 255, 255]);
    }

    #[test]
    fn test_text_page_has_no_image() {
        let pdf = make_pdf(vec![(vec![], Some("Rana pipiens"))]);

        let pages = LopdfRenderer::new().render_pages(&pdf, None).unwrap();
        assert!(pages[0].image.is_none());
        assert!(pages[0].text.as_deref().unwrap_or_default().contains("Rana pipiens"));

        let pages = LopdfRenderer::new().without_text().render_pages(&pdf, None).unwrap();
        assert!(pages[0].text.is_none());
    }

    #[test]
    fn test_bad_image_keeps_page() {
        let pdf = make_pdf(vec![
            (
                vec![image_stream(5, 5, None, "DeviceRGB", 8, vec![1, 2, 3])],
                None,
            ),
            (
                vec![image_stream(20, 20, Some("DCTDecode"), "DeviceRGB", 8, make_jpeg(20, 20))],
                None,
            ),
        ]);

        let pages = LopdfRenderer::new().render_pages(&pdf, None).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].image.is_none());
        assert!(pages[1].image.is_some());
        assert_eq!(pages[1].index, 1);
    }

    #[test]
    fn test_unparseable_bytes() {
        let err = LopdfRenderer::new().render_pages(b"not a pdf", None).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidDocument { .. }));
    }
}
