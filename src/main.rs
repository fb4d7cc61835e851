mod app;
mod classifier;
mod color;
mod data;
mod features;
mod importance;
mod metrics;
mod pipeline;
mod settings;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use app::ImportanceApp;
use clap::Parser;
use data::split::SplitRule;
use eframe::egui;
use settings::Settings;
use state::AppState;

#[derive(Parser)]
#[command(name = "importance-map")]
#[command(about = "Predict object importance from segmentation masks and view importance maps")]
struct Cli {
    /// Object table (.csv, .json, .parquet or .xlsx)
    #[arg(value_name = "TABLE")]
    table: Option<PathBuf>,

    /// JSON settings file; flags below override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the report instead of opening the viewer
    #[arg(long)]
    headless: bool,

    /// Directory holding imgN.bmp (default: <table dir>/imgs)
    #[arg(long, value_name = "DIR")]
    image_dir: Option<PathBuf>,

    /// Directory holding imgN_msk.bmp (default: <image dir>/msk)
    #[arg(long, value_name = "DIR")]
    mask_dir: Option<PathBuf>,

    /// Number of leading rows used for training
    #[arg(long, value_name = "N", conflicts_with = "split_image")]
    split_row: Option<usize>,

    /// Train on the first K images instead of a fixed row count
    #[arg(long, value_name = "K")]
    split_image: Option<usize>,

    /// Write the table with size/loc columns to this CSV file
    #[arg(long, value_name = "FILE")]
    export_features: Option<PathBuf>,

    /// Write ground-truth and predicted maps of --image as PNG into DIR
    #[arg(long, value_name = "DIR")]
    export_maps: Option<PathBuf>,

    /// Image to export (default: last testing image)
    #[arg(long, value_name = "NAME", requires = "export_maps")]
    image: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(dir) = &self.image_dir {
            settings.image_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.mask_dir {
            settings.mask_dir = Some(dir.clone());
        }
        if let Some(n) = self.split_row {
            settings.split = SplitRule::AtRow(n);
        }
        if let Some(k) = self.split_image {
            settings.split = SplitRule::AtImage(k);
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let settings = cli.settings()?;

    if cli.headless {
        let Some(table) = &cli.table else {
            bail!("--headless needs a TABLE argument");
        };
        return report(&cli, table, &settings);
    }

    let mut state = AppState::new(settings);
    if let Some(table) = &cli.table {
        state.open_table(table);
    }
    run_viewer(state)
}

fn report(cli: &Cli, table: &std::path::Path, settings: &Settings) -> Result<()> {
    let session = pipeline::run(table, settings)?;

    for class in session.model.classes() {
        println!(
            "class {}: prior {:.3}, mean size {:.1}, mean loc {:.3}",
            class.label, class.prior, class.mean[0], class.mean[1]
        );
    }
    println!("Training accuracy: {:.4}", session.train_report.accuracy);
    match &session.test_report {
        Some(report) => {
            println!("Testing accuracy:  {:.4}", report.accuracy);
            println!("\n=== Testing summary ===\n{report}");
            println!("=== Confusion matrix (rows: truth) ===\n{}", report.confusion);
        }
        None => println!("Testing accuracy:  n/a (no testing rows)"),
    }

    if let Some(path) = &cli.export_features {
        data::export::export_features(&session.dataset, path)?;
        println!("Features written to {}", path.display());
    }

    if let Some(dir) = &cli.export_maps {
        let image = match &cli.image {
            Some(name) => name.clone(),
            None => session
                .test_images()
                .last()
                .map(|s| s.to_string())
                .context("no testing image to export; pass --image")?,
        };
        let maps = session.image_maps(&image)?;
        let (truth, predicted) = maps.save_png(dir)?;
        println!(
            "Importance maps for {image}: {} and {}",
            truth.display(),
            predicted.display()
        );
    }

    Ok(())
}

fn run_viewer(state: AppState) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Importance Map – Object Importance Viewer",
        options,
        Box::new(move |_cc| Ok(Box::new(ImportanceApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
}
