// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, DynamicImage, GenericImageView, ImageFormat};

use crate::{item::PlatformImage, Result};

const JPEG_QUALITY: u8 = 100;

pub(crate) struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Re-encodes a platform image: PNG when it has an alpha channel, maximum
/// quality JPEG otherwise. The orientation is baked into the pixels so the
/// encoded file displays the same way without relying on EXIF.
pub(crate) fn encode(image: PlatformImage) -> Result<EncodedImage> {
    let has_alpha = image.has_alpha();
    let oriented = image.into_oriented();
    let (width, height) = oriented.dimensions();
    let mut cursor = Cursor::new(Vec::new());

    let mime = if has_alpha {
        let png_ready = match oriented {
            DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgba8(oriented.to_rgba8()),
            other => other,
        };
        png_ready.write_to(&mut cursor, ImageFormat::Png)?;
        "image/png"
    } else {
        let rgb = DynamicImage::ImageRgb8(oriented.to_rgb8());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY))?;
        "image/jpeg"
    };

    Ok(EncodedImage {
        bytes: cursor.into_inner(),
        mime,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Orientation;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn alpha_images_become_png() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 128])));
        let encoded = encode(PlatformImage::new(image)).unwrap();
        assert_eq!(encoded.mime, "image/png");
        assert_eq!(
            image::guess_format(&encoded.bytes).unwrap(),
            ImageFormat::Png
        );
        assert_eq!((encoded.width, encoded.height), (3, 2));
    }

    #[test]
    fn opaque_images_become_jpeg_with_orientation_applied() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([200, 10, 10])));
        let encoded =
            encode(PlatformImage::new(image).with_orientation(Orientation::Right)).unwrap();
        assert_eq!(encoded.mime, "image/jpeg");
        assert_eq!((encoded.width, encoded.height), (4, 8));

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (4, 8));
    }
}
