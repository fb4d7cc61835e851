use std::path::Path;

use crate::color::ClassPalette;
use crate::importance::ImageMaps;
use crate::pipeline::{self, Session};
use crate::settings::Settings;
use crate::ui::maps::MapTextures;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which view fills the central panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Maps,
    Features,
    Objects,
}

/// The full UI state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    /// Settings applied to every table opened from the UI.
    pub settings: Settings,

    /// Finished run (None until user loads a table).
    pub session: Option<Session>,

    /// Colours for the class labels of the current session.
    pub palette: Option<ClassPalette>,

    /// Image whose maps are shown.
    pub selected_image: Option<String>,

    /// Rasters of the selected image.
    pub maps: Option<ImageMaps>,

    /// GPU copies of `maps`, uploaded lazily by the maps view.
    pub textures: Option<MapTextures>,

    /// Restrict the image list to the testing partition.
    pub test_images_only: bool,

    pub view: View,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            test_images_only: true,
            ..Default::default()
        }
    }

    /// Run the pipeline on `path` and show the result, or report the error.
    pub fn open_table(&mut self, path: &Path) {
        match pipeline::run(path, &self.settings) {
            Ok(session) => self.set_session(session),
            Err(e) => {
                log::error!("Failed to process {}: {e:#}", path.display());
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Ingest a finished run and select its last testing image.
    pub fn set_session(&mut self, session: Session) {
        self.palette = Some(ClassPalette::new(
            session.dataset.objects.iter().map(|o| o.class),
        ));
        let default_image = session
            .test_images()
            .last()
            .map(|s| s.to_string())
            .or_else(|| session.dataset.image_names.last().cloned());

        self.session = Some(session);
        self.status_message = None;

        if let Some(image) = default_image {
            self.select_image(&image);
        }
    }

    /// Images offered in the side panel.
    pub fn listed_images(&self) -> Vec<String> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        if self.test_images_only {
            session.test_images().into_iter().map(String::from).collect()
        } else {
            session.dataset.image_names.clone()
        }
    }

    /// Switch the maps view to `image`.
    pub fn select_image(&mut self, image: &str) {
        let Some(session) = &self.session else {
            return;
        };
        self.selected_image = Some(image.to_string());
        self.textures = None;
        match session.image_maps(image) {
            Ok(maps) => {
                self.maps = Some(maps);
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to render {image}: {e:#}");
                self.maps = None;
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Write the feature table of the current session.
    pub fn export_features(&mut self, path: &Path) {
        let Some(session) = &self.session else {
            return;
        };
        match crate::data::export::export_features(&session.dataset, path) {
            Ok(()) => self.status_message = Some(format!("Exported {}", path.display())),
            Err(e) => {
                log::error!("Export failed: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
