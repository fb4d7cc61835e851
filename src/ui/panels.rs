use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::metrics::ClassificationReport;
use crate::state::{AppState, View};

// ---------------------------------------------------------------------------
// Left side panel – image list and metrics
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Images");
    ui.separator();

    let Some(session) = &state.session else {
        ui.label("No table loaded.");
        return;
    };

    let train_acc = session.train_report.accuracy;
    let test_acc = session.test_report.as_ref().map(|r| r.accuracy);
    let train_report = session.train_report.clone();
    let test_report = session.test_report.clone();

    ui.label(format!("Training accuracy: {train_acc:.3}"));
    match test_acc {
        Some(acc) => ui.label(format!("Testing accuracy: {acc:.3}")),
        None => ui.label("Testing accuracy: n/a"),
    };
    if let Some(palette) = &state.palette {
        ui.horizontal(|ui: &mut Ui| {
            for (text, color) in palette.legend_entries() {
                ui.label(RichText::new(text).color(color));
            }
        });
    }
    ui.checkbox(&mut state.test_images_only, "Testing images only");
    ui.separator();

    let images = state.listed_images();
    let mut clicked: Option<String> = None;

    ScrollArea::vertical()
        .id_salt("image_list")
        .max_height(ui.available_height() * 0.55)
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for image in &images {
                let selected = state.selected_image.as_deref() == Some(image.as_str());
                if ui.selectable_label(selected, image).clicked() && !selected {
                    clicked = Some(image.clone());
                }
            }
        });

    // Select after the loop so the list is not borrowed while state changes.
    if let Some(image) = clicked {
        state.select_image(&image);
    }

    ui.separator();
    ScrollArea::vertical()
        .id_salt("metrics")
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            report_section(ui, "Training summary", &train_report);
            if let Some(report) = &test_report {
                report_section(ui, "Testing summary", report);
            }
        });
}

fn report_section(ui: &mut Ui, title: &str, report: &ClassificationReport) {
    egui::CollapsingHeader::new(RichText::new(title).strong())
        .id_salt(title)
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new((title, "scores"))
                .striped(true)
                .show(ui, |ui: &mut Ui| {
                    for header in ["class", "precision", "recall", "f1", "support"] {
                        ui.strong(header);
                    }
                    ui.end_row();
                    for c in &report.classes {
                        ui.label(c.label.to_string());
                        ui.label(format!("{:.2}", c.precision));
                        ui.label(format!("{:.2}", c.recall));
                        ui.label(format!("{:.2}", c.f1));
                        ui.label(c.support.to_string());
                        ui.end_row();
                    }
                });

            ui.add_space(6.0);
            ui.label("Confusion matrix (rows: truth, columns: prediction)");
            let cm = &report.confusion;
            egui::Grid::new((title, "confusion"))
                .striped(true)
                .show(ui, |ui: &mut Ui| {
                    ui.label("");
                    for label in &cm.labels {
                        ui.strong(label.to_string());
                    }
                    ui.end_row();
                    for (label, row) in cm.labels.iter().zip(&cm.counts) {
                        ui.strong(label.to_string());
                        for count in row {
                            ui.label(count.to_string());
                        }
                        ui.end_row();
                    }
                });
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let can_export = state.session.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export features…"))
                .clicked()
            {
                save_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        for (view, label) in [
            (View::Maps, "Importance maps"),
            (View::Features, "Features"),
            (View::Objects, "Objects"),
        ] {
            if ui.selectable_label(state.view == view, label).clicked() {
                state.view = view;
            }
        }

        ui.separator();

        if let Some(session) = &state.session {
            ui.label(format!(
                "{} objects in {} images",
                session.dataset.len(),
                session.dataset.image_names.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                ui.visuals().text_color()
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open object table")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq", "xlsx", "xls"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("Excel", &["xlsx", "xls"])
        .pick_file();

    if let Some(path) = file {
        state.open_table(&path);
    }
}

pub fn save_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export feature table")
        .add_filter("CSV", &["csv"])
        .set_file_name("features.csv")
        .save_file();

    if let Some(path) = file {
        state.export_features(&path);
    }
}
