use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, MarkerShape, Plot, PlotPoints, Points};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Feature scatter plot (central panel)
// ---------------------------------------------------------------------------

/// Size against location for every object, coloured by ground-truth class.
/// Misclassified objects are overlaid with a cross; training rows are drawn
/// hollow so the two partitions can be told apart.
pub fn feature_plot(ui: &mut Ui, state: &AppState) {
    let (Some(session), Some(palette)) = (&state.session, &state.palette) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open an object table to view features  (File → Open…)");
        });
        return;
    };

    let mut labels: Vec<i64> = session.dataset.objects.iter().map(|o| o.class).collect();
    labels.sort_unstable();
    labels.dedup();

    Plot::new("feature_plot")
        .legend(Legend::default())
        .x_axis_label("size (pixels)")
        .y_axis_label("loc")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for &label in &labels {
                let color = palette.color_for(label);
                for (partition, filled) in [("train", false), ("test", true)] {
                    let points: PlotPoints = session
                        .dataset
                        .objects
                        .iter()
                        .enumerate()
                        .filter(|(row, o)| {
                            o.class == label && session.split.is_test_row(*row) == filled
                        })
                        .filter_map(|(_, o)| o.features.map(|f| [f.size, f.location]))
                        .collect();

                    plot_ui.points(
                        Points::new(points)
                            .name(format!("class {label} ({partition})"))
                            .color(color)
                            .filled(filled)
                            .shape(MarkerShape::Circle)
                            .radius(3.0),
                    );
                }
            }

            let wrong: PlotPoints = session
                .dataset
                .objects
                .iter()
                .zip(&session.predictions)
                .filter(|(o, p)| o.class != **p)
                .filter_map(|(o, _)| o.features.map(|f| [f.size, f.location]))
                .collect();
            plot_ui.points(
                Points::new(wrong)
                    .name("misclassified")
                    .color(Color32::RED)
                    .shape(MarkerShape::Cross)
                    .radius(5.0),
            );
        });
}
