use crate::error::BlendError;
use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// A decoded RGB8 image.
///
/// Every input is converted to RGB on decode; `grayscale` remembers whether the
/// source carried color so histograms can report a single luma channel.
#[derive(Clone, Debug)]
pub struct Raster {
    image: RgbImage,
    grayscale: bool,
}

impl Raster {
    /// Decodes PNG, JPEG, GIF or BMP bytes. The format is guessed from the content.
    pub fn decode(name: &'static str, bytes: &[u8]) -> Result<Self, BlendError> {
        if bytes.is_empty() {
            return Err(BlendError::MissingImage(name));
        }

        let decoded =
            image::load_from_memory(bytes).map_err(|source| BlendError::Decode { name, source })?;

        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(BlendError::EmptyImage(name));
        }

        log::debug!(
            "Decoded {name}: {}x{} {:?}",
            decoded.width(),
            decoded.height(),
            decoded.color()
        );

        Ok(Self {
            grayscale: !decoded.color().has_color(),
            image: decoded.to_rgb8(),
        })
    }

    /// Width in pixels, never zero.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels, never zero.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// True when the source had no color channels.
    pub fn is_grayscale(&self) -> bool {
        self.grayscale
    }

    /// The decoded pixels, converted to RGB8.
    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }

    /// Consumes the raster and returns its pixels.
    pub fn into_rgb(self) -> RgbImage {
        self.image
    }
}

/// Encodes an RGB8 image as a PNG byte stream.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, BlendError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(BlendError::Encode)?;
    Ok(buf)
}

/// Encodes an RGB8 image as PNG and returns it base64 encoded.
pub fn png_base64(image: &RgbImage) -> Result<String, BlendError> {
    Ok(STANDARD.encode(encode_png(image)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn decodes_common_formats() {
        let rgb = RgbImage::from_pixel(8, 4, Rgb([200, 10, 30]));
        for format in [ImageFormat::Png, ImageFormat::Bmp, ImageFormat::Gif] {
            let bytes = encode(DynamicImage::ImageRgb8(rgb.clone()), format);
            let raster = Raster::decode("image1", &bytes).unwrap();
            assert_eq!((raster.width(), raster.height()), (8, 4), "{format:?}");
            assert!(!raster.is_grayscale());
        }

        let jpeg = encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Jpeg);
        let raster = Raster::decode("image1", &jpeg).unwrap();
        assert_eq!((raster.width(), raster.height()), (8, 4));
    }

    #[test]
    fn grayscale_source_is_flagged() {
        let gray = GrayImage::from_pixel(3, 3, Luma([90]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);
        let raster = Raster::decode("image2", &bytes).unwrap();
        assert!(raster.is_grayscale());
        assert_eq!(raster.as_rgb().get_pixel(1, 1), &Rgb([90, 90, 90]));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(
            Raster::decode("image1", &[]),
            Err(BlendError::MissingImage("image1"))
        ));
        assert!(matches!(
            Raster::decode("image2", b"definitely not an image"),
            Err(BlendError::Decode { name: "image2", .. })
        ));
    }

    #[test]
    fn png_base64_decodes_back() {
        let rgb = RgbImage::from_pixel(5, 7, Rgb([1, 2, 3]));
        let b64 = png_base64(&rgb).unwrap();
        let bytes = STANDARD.decode(b64).unwrap();
        let raster = Raster::decode("blended", &bytes).unwrap();
        assert_eq!(raster.into_rgb(), rgb);
    }
}
