//! Embedding raster images as PDF image XObjects.

use crate::error::{Result, TaskError};
use image::{DynamicImage, GenericImageView};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::debug;

/// Decode an image file, reporting the path on failure.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(TaskError::SourceNotFound(path.to_path_buf()));
    }
    image::open(path)
        .map_err(|e| TaskError::library(format!("Failed to decode image {}", path.display()), e))
}

/// Add `img` to `doc` as an RGB image XObject, returning its id.
///
/// Transparency and `opacity` below 1 become a soft mask; fully opaque images
/// get none.
pub fn embed_image(doc: &mut Document, img: &DynamicImage, opacity: f32) -> Result<ObjectId> {
    let (width, height) = img.dimensions();
    let opacity = opacity.clamp(0.0, 1.0);

    let smask = if img.color().has_alpha() || opacity < 1.0 {
        let alpha: Vec<u8> = img
            .to_rgba8()
            .pixels()
            .map(|p| (f32::from(p[3]) * opacity).round() as u8)
            .collect();
        let mut mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        );
        mask.compress()?;
        Some(doc.add_object(mask))
    } else {
        None
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if let Some(mask_id) = smask {
        dict.set("SMask", Object::Reference(mask_id));
    }

    let mut stream = Stream::new(dict, img.to_rgb8().into_raw());
    stream.compress()?;
    let id = doc.add_object(stream);
    debug!(width, height, masked = smask.is_some(), "Embedded image");
    Ok(id)
}

/// Scale factor that fits `width` x `height` inside `max_width` x `max_height`
/// without enlarging.
pub fn fit_scale(width: f32, height: f32, max_width: f32, max_height: f32) -> f32 {
    if width <= 0.0 || height <= 0.0 {
        return 1.0;
    }
    (max_width / width).min(max_height / height).min(1.0)
}
