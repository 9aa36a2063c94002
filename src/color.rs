use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};
use plotters::style::RGBColor;

use crate::data::model::Cell;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            to_rgb(rgb)
        })
        .collect()
}

fn to_rgb(rgb: Srgb) -> RGBColor {
    RGBColor(
        (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

fn linear(r: u8, g: u8, b: u8) -> LinSrgb {
    Srgb::new(r, g, b).into_format::<f32>().into_color()
}

// ---------------------------------------------------------------------------
// Diverging scale for correlation cells
// ---------------------------------------------------------------------------

/// Blue → light grey → red over `[-1, 1]`, mixed in linear RGB.
pub fn diverging(value: f64) -> RGBColor {
    let cold = linear(59, 76, 192);
    let mid = linear(221, 221, 221);
    let warm = linear(180, 4, 38);

    let t = value.clamp(-1.0, 1.0) as f32;
    let mixed = if t < 0.0 {
        mid.mix(cold, -t)
    } else {
        mid.mix(warm, t)
    };
    to_rgb(mixed.into_color())
}

// ---------------------------------------------------------------------------
// Color mapping: category value → RGBColor
// ---------------------------------------------------------------------------

/// Maps the categories of one column (e.g. body styles) to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<Cell, RGBColor>,
    default_color: RGBColor,
}

impl ColorMap {
    /// Build a colour map from the column's categories, in their given order.
    pub fn new<'a>(categories: impl ExactSizeIterator<Item = &'a Cell>) -> Self {
        let palette = generate_palette(categories.len());
        let mapping = categories
            .zip(palette)
            .map(|(v, c)| (v.clone(), c))
            .collect();
        ColorMap {
            mapping,
            default_color: RGBColor(128, 128, 128),
        }
    }

    /// Look up the colour for a given category.
    pub fn color_for(&self, value: &Cell) -> RGBColor {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }
}
