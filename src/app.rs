use eframe::egui;

use crate::state::{AppState, View};
use crate::ui::{maps, panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct ImportanceApp {
    pub state: AppState,
}

impl ImportanceApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for ImportanceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: images and metrics ----
        egui::SidePanel::left("image_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: selected view ----
        egui::CentralPanel::default().show(ctx, |ui| match self.state.view {
            View::Maps => maps::maps_view(ui, &mut self.state),
            View::Features => plot::feature_plot(ui, &self.state),
            View::Objects => maps::objects_view(ui, &self.state),
        });
    }
}
