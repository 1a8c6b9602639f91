//! Minimal raster drawing on an RGBA buffer.

use image::{Rgba, RgbaImage};

pub(crate) struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Canvas {
            image: RgbaImage::from_pixel(width, height, background),
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Source-over blend of one pixel; out-of-bounds pixels are ignored.
    pub fn blend(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        let (width, height) = self.image.dimensions();
        if x < 0 || y < 0 || x >= i64::from(width) || y >= i64::from(height) {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        let alpha = u32::from(color.0[3]);
        if alpha == 255 {
            *dst = color;
            return;
        }
        for c in 0..3 {
            let mixed = u32::from(color.0[c]) * alpha + u32::from(dst.0[c]) * (255 - alpha);
            dst.0[c] = (mixed / 255) as u8;
        }
        dst.0[3] = dst.0[3].max(color.0[3]);
    }

    /// Fill the axis-aligned rectangle spanned by two corners, at least one
    /// pixel wide and tall.
    pub fn fill_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
        let (left, right) = (x0.min(x1).floor() as i64, x0.max(x1).ceil() as i64);
        let (top, bottom) = (y0.min(y1).floor() as i64, y0.max(y1).ceil() as i64);
        for y in top..bottom.max(top + 1) {
            for x in left..right.max(left + 1) {
                self.blend(x, y, color);
            }
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
        let r2 = radius * radius;
        let (x_lo, x_hi) = ((cx - radius).floor() as i64, (cx + radius).ceil() as i64);
        let (y_lo, y_hi) = ((cy - radius).floor() as i64, (cy + radius).ceil() as i64);
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                if dx * dx + dy * dy <= r2 {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// A thick segment, drawn by stamping discs along it. Use opaque colours.
    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgba<u8>) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = (dx.abs().max(dy.abs()).ceil() as usize).max(1);
        let radius = (width / 2.0).max(0.5);
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.fill_circle(from.0 + dx * t, from.1 + dy * t, radius, color);
        }
    }
}
