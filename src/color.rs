use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Class label → Color32
// ---------------------------------------------------------------------------

/// Maps importance labels to distinct colours for the scatter plot.
#[derive(Debug, Clone)]
pub struct ClassPalette {
    mapping: BTreeMap<i64, Color32>,
    default_color: Color32,
}

impl ClassPalette {
    /// Build a palette from the labels present in the data.
    pub fn new(labels: impl IntoIterator<Item = i64>) -> Self {
        let mut labels: Vec<i64> = labels.into_iter().collect();
        labels.sort_unstable();
        labels.dedup();

        let palette = generate_palette(labels.len());
        ClassPalette {
            mapping: labels.into_iter().zip(palette).collect(),
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a label.
    pub fn color_for(&self, label: i64) -> Color32 {
        self.mapping
            .get(&label)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Legend entries (label text → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(label, c)| (format!("class {label}"), *c))
            .collect()
    }
}
