use std::collections::{BTreeMap, BTreeSet};

use image::Rgba;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::Scalar;

/// Colour of a plot with a single series.
pub const SERIES_BLUE: Rgba<u8> = Rgba([70, 130, 180, 255]);
/// Colour of values missing from a [`ColorMap`].
pub const GRAY: Rgba<u8> = Rgba([160, 160, 160, 255]);

/// `n` colours with evenly spaced hues at a fixed saturation and lightness.
pub fn distinct_colors(n: usize) -> Vec<Rgba<u8>> {
    let step = 360.0 / n.max(1) as f32;
    (0..n)
        .map(|i| {
            let rgb: Srgb = Hsl::new(i as f32 * step, 0.75, 0.55).into_color();
            let (r, g, b) = rgb.into_format::<u8>().into_components();
            Rgba([r, g, b, 255])
        })
        .collect()
}

pub fn with_alpha(color: Rgba<u8>, alpha: u8) -> Rgba<u8> {
    let [r, g, b, _] = color.0;
    Rgba([r, g, b, alpha])
}

/// Colour per distinct non-null value, assigned in value order. Nulls and
/// values the map was not built from are [`GRAY`].
#[derive(Debug, Clone)]
pub struct ColorMap {
    colors: BTreeMap<Scalar, Rgba<u8>>,
}

impl ColorMap {
    pub fn new<'a>(values: impl IntoIterator<Item = &'a Scalar>) -> Self {
        let keys: BTreeSet<&Scalar> = values.into_iter().filter(|v| !v.is_null()).collect();
        let colors = keys
            .iter()
            .zip(distinct_colors(keys.len()))
            .map(|(&v, c)| (v.clone(), c))
            .collect();
        ColorMap { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color_for(&self, value: &Scalar) -> Rgba<u8> {
        self.colors.get(value).copied().unwrap_or(GRAY)
    }
}
