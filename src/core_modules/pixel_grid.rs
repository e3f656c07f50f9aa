// THEORY:
// The tally never touches a codec. It only needs two things from a decoded image:
// the rectangle it covers and the color at each coordinate inside it. `PixelGrid`
// is that seam. Channel values come back at the grid's native depth together with
// that depth, and `ColorKey::from_wide` does the narrowing.
//
// `DecodedImage` is the concrete grid produced by the fetch-decode adapter. The
// `image` crate hands us a `DynamicImage` in whatever layout the codec chose; we
// normalize it once into either an 8-bit or a 16-bit RGBA buffer so the scan loop
// reads a single layout.

use crate::core_modules::pixel::pixel::ColorKey;
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};

pub type Rgba16Image = ImageBuffer<Rgba<u16>, Vec<u16>>;

/// Half-open pixel rectangle: `min_x <= x < max_x`, `min_y <= y < max_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Bounds {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            max_x: width,
            max_y: height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }
}

/// Read-only access to a rectangle of RGB pixels.
pub trait PixelGrid {
    fn bounds(&self) -> Bounds;

    /// Bits per channel of the values returned by [`PixelGrid::channels`].
    fn bits_per_channel(&self) -> u32;

    /// `[red, green, blue]` at `(x, y)`, which must lie inside `bounds()`.
    fn channels(&self, x: u32, y: u32) -> [u32; 3];

    fn color_key(&self, x: u32, y: u32) -> ColorKey {
        let [red, green, blue] = self.channels(x, y);
        ColorKey::from_wide(red, green, blue, self.bits_per_channel())
    }
}

impl PixelGrid for RgbaImage {
    fn bounds(&self) -> Bounds {
        Bounds::from_dimensions(self.width(), self.height())
    }

    fn bits_per_channel(&self) -> u32 {
        8
    }

    fn channels(&self, x: u32, y: u32) -> [u32; 3] {
        let [red, green, blue, _] = self.get_pixel(x, y).0;
        [red as u32, green as u32, blue as u32]
    }
}

impl PixelGrid for Rgba16Image {
    fn bounds(&self) -> Bounds {
        Bounds::from_dimensions(self.width(), self.height())
    }

    fn bits_per_channel(&self) -> u32 {
        16
    }

    fn channels(&self, x: u32, y: u32) -> [u32; 3] {
        let [red, green, blue, _] = self.get_pixel(x, y).0;
        [red as u32, green as u32, blue as u32]
    }
}

/// A fully materialized image, normalized to one of two RGBA layouts.
#[derive(Debug, Clone)]
pub enum DecodedImage {
    Rgba8(RgbaImage),
    Rgba16(Rgba16Image),
}

impl From<DynamicImage> for DecodedImage {
    fn from(image: DynamicImage) -> Self {
        let color = image.color();
        let bytes_per_channel = color.bytes_per_pixel() / color.channel_count().max(1);
        match image {
            DynamicImage::ImageRgba8(buffer) => DecodedImage::Rgba8(buffer),
            DynamicImage::ImageRgba16(buffer) => DecodedImage::Rgba16(buffer),
            other if bytes_per_channel <= 1 => DecodedImage::Rgba8(other.to_rgba8()),
            // 16-bit and floating point layouts both land on 16 bits.
            other => DecodedImage::Rgba16(other.to_rgba16()),
        }
    }
}

impl PixelGrid for DecodedImage {
    fn bounds(&self) -> Bounds {
        match self {
            DecodedImage::Rgba8(buffer) => PixelGrid::bounds(buffer),
            DecodedImage::Rgba16(buffer) => PixelGrid::bounds(buffer),
        }
    }

    fn bits_per_channel(&self) -> u32 {
        match self {
            DecodedImage::Rgba8(buffer) => buffer.bits_per_channel(),
            DecodedImage::Rgba16(buffer) => buffer.bits_per_channel(),
        }
    }

    fn channels(&self, x: u32, y: u32) -> [u32; 3] {
        match self {
            DecodedImage::Rgba8(buffer) => PixelGrid::channels(buffer, x, y),
            DecodedImage::Rgba16(buffer) => PixelGrid::channels(buffer, x, y),
        }
    }
}
