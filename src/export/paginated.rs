//! Paginated document export: one captured image tiled over A4 pages.

use crate::error::ExportError;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// JPEG quality of the embedded capture.
pub const JPEG_QUALITY: u8 = 80;

const POINTS_PER_MM: f64 = 72.0 / 25.4;
const IMAGE_NAME: &str = "Im0";

/// Page size in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_mm: f64,
    pub height_mm: f64,
}

pub const A4_PORTRAIT: PageGeometry = PageGeometry {
    width_mm: 210.0,
    height_mm: 297.0,
};

impl PageGeometry {
    /// Height of an image scaled to the full page width, in millimeters.
    pub fn image_height_mm(&self, px_width: u32, px_height: u32) -> f64 {
        if px_width == 0 {
            return 0.0;
        }
        f64::from(px_height) * self.width_mm / f64::from(px_width)
    }

    /// Pages needed for an image of `image_height_mm`; never less than one.
    pub fn page_count(&self, image_height_mm: f64) -> usize {
        ((image_height_mm / self.height_mm).ceil() as usize).max(1)
    }

    /// Vertical offset of the image on each page, in millimeters from the
    /// page top. Page `k` shows the slice starting `k` page heights down.
    pub fn page_offsets(&self, image_height_mm: f64) -> Vec<f64> {
        (0..self.page_count(image_height_mm))
            .map(|k| -(k as f64 * self.height_mm))
            .collect()
    }
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(img)?;
    Ok(out)
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn mm(v: f64) -> f64 {
    v * POINTS_PER_MM
}

/// Build a PDF that tiles one JPEG across as many pages as it needs.
pub fn render_pdf(
    jpeg: &[u8],
    px_width: u32,
    px_height: u32,
    page: PageGeometry,
) -> Result<Vec<u8>, ExportError> {
    if px_width == 0 || px_height == 0 {
        return Err(ExportError::EmptyCapture);
    }
    let image_h = page.image_height_mm(px_width, px_height);
    let (page_w_pt, page_h_pt) = (mm(page.width_mm), mm(page.height_mm));
    let image_h_pt = mm(image_h);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    // The image is stored once; every page references the same object.
    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(px_width),
            "Height" => i64::from(px_height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    )
    .with_compression(false);
    let image_id = doc.add_object(image);

    let mut kids = Vec::new();
    for offset_mm in page.page_offsets(image_h) {
        // PDF space grows upwards from the bottom-left corner.
        let y = page_h_pt - (mm(offset_mm) + image_h_pt);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(page_w_pt),
                        real(0.0),
                        real(0.0),
                        real(image_h_pt),
                        real(0.0),
                        real(y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![real(0.0), real(0.0), real(page_w_pt), real(page_h_pt)],
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
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

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}
