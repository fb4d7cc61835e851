use eframe::egui::{self, ColorImage, Context, TextureHandle, TextureOptions, Ui};
use egui_extras::{Column, TableBuilder};

use crate::importance::ImageMaps;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Textures for the four rasters of one image
// ---------------------------------------------------------------------------

pub struct MapTextures {
    pub image: String,
    pub source: TextureHandle,
    pub mask: TextureHandle,
    pub truth: TextureHandle,
    pub predicted: TextureHandle,
}

impl MapTextures {
    pub fn upload(ctx: &Context, maps: &ImageMaps) -> Self {
        let rgb = |img: &image::RgbImage| {
            ColorImage::from_rgb([img.width() as usize, img.height() as usize], img.as_raw())
        };
        let gray = |img: &image::GrayImage| {
            ColorImage::from_gray([img.width() as usize, img.height() as usize], img.as_raw())
        };
        let options = TextureOptions::NEAREST;
        let name = |kind: &str| format!("{}_{kind}", maps.image);

        Self {
            image: maps.image.clone(),
            source: ctx.load_texture(name("src"), rgb(&maps.source), options),
            mask: ctx.load_texture(name("msk"), rgb(&maps.mask), options),
            truth: ctx.load_texture(name("gt"), gray(&maps.truth), options),
            predicted: ctx.load_texture(name("pred"), gray(&maps.predicted), options),
        }
    }
}

// ---------------------------------------------------------------------------
// Maps view (central panel)
// ---------------------------------------------------------------------------

/// Source, mask, ground-truth and predicted maps in a 2×2 grid.
pub fn maps_view(ui: &mut Ui, state: &mut AppState) {
    let Some(maps) = &state.maps else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading(placeholder(state));
        });
        return;
    };

    let stale = state
        .textures
        .as_ref()
        .map_or(true, |t| t.image != maps.image);
    if stale {
        state.textures = Some(MapTextures::upload(ui.ctx(), maps));
    }
    let Some(textures) = &state.textures else {
        return;
    };

    let cell_width = (ui.available_width() / 2.0 - 16.0).max(64.0);
    egui::ScrollArea::vertical().show(ui, |ui: &mut Ui| {
        egui::Grid::new("maps_grid")
            .num_columns(2)
            .spacing([12.0, 12.0])
            .show(ui, |ui: &mut Ui| {
                captioned(ui, "Original image", &textures.source, cell_width);
                captioned(ui, "Mask image", &textures.mask, cell_width);
                ui.end_row();
                captioned(ui, "Ground-truth importance map", &textures.truth, cell_width);
                captioned(ui, "Predicted importance map", &textures.predicted, cell_width);
                ui.end_row();
            });
    });
}

fn captioned(ui: &mut Ui, caption: &str, texture: &TextureHandle, width: f32) {
    ui.vertical(|ui: &mut Ui| {
        ui.strong(caption);
        ui.add(egui::Image::from_texture(texture).max_width(width));
    });
}

fn placeholder(state: &AppState) -> &'static str {
    if state.session.is_none() {
        "Open an object table to begin  (File → Open…)"
    } else {
        "Select an image from the list"
    }
}

// ---------------------------------------------------------------------------
// Object table
// ---------------------------------------------------------------------------

/// Per-object features, labels and predictions of the selected image.
pub fn objects_view(ui: &mut Ui, state: &AppState) {
    let (Some(session), Some(image)) = (&state.session, &state.selected_image) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading(placeholder(state));
        });
        return;
    };

    let rows = session.dataset.rows_for_image(image);
    ui.heading(format!("{image}: {} objects", rows.len()));
    ui.separator();

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(60.0))
        .columns(Column::auto().at_least(70.0), 7)
        .header(20.0, |mut header| {
            for title in [
                "row",
                "object",
                "mask (R,G,B)",
                "size",
                "loc",
                "class",
                "predicted",
                "confidence",
            ] {
                header.col(|ui: &mut Ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for row_idx in rows {
                let obj = &session.dataset.objects[row_idx];
                let predicted = session.predictions[row_idx];
                let confidence = session.probabilities[row_idx]
                    .iter()
                    .copied()
                    .fold(0.0, f64::max);
                body.row(18.0, |mut row| {
                    row.col(|ui: &mut Ui| {
                        ui.label(row_idx.to_string());
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(&obj.name);
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(obj.color.to_string());
                    });
                    let (size, loc) = obj
                        .features
                        .map(|f| (format!("{}", f.size), format!("{:.3}", f.location)))
                        .unwrap_or_default();
                    row.col(|ui: &mut Ui| {
                        ui.label(size);
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(loc);
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(obj.class.to_string());
                    });
                    row.col(|ui: &mut Ui| {
                        let text = egui::RichText::new(predicted.to_string());
                        if predicted == obj.class {
                            ui.label(text);
                        } else {
                            ui.label(text.color(egui::Color32::RED));
                        }
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(format!("{confidence:.3}"));
                    });
                });
            }
        });
}
