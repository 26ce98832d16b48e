use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deep_zoom::{EngineSettings, FractalRenderer, RenderError};

/// Renders the raw per-pixel fields of a deep zoom into a run directory.
#[derive(Parser, Debug)]
#[clap(name = "deep_zoom", version, about)]
struct Options {
    /// TOML settings file, DEEPZOOM_* environment variables are applied on top
    settings: Option<PathBuf>,

    /// Image width in pixels
    #[clap(long)]
    width: Option<usize>,

    /// Image height in pixels
    #[clap(long)]
    height: Option<usize>,

    /// Iteration cap
    #[clap(long)]
    iterations: Option<usize>,

    /// Directory the run directory is created in
    #[clap(long)]
    output: Option<PathBuf>,

    /// Name of the run directory
    #[clap(long)]
    name: Option<String>,

    #[clap(long)]
    threads: Option<usize>,

    /// Optional fields to store, e.g. dzndc,dzndz
    #[clap(long, use_value_delimiter = true)]
    fields: Vec<String>,
}

impl Options {
    fn apply(self, settings: &mut EngineSettings) {
        if let Some(width) = self.width {
            settings.image_width = width;
        }

        if let Some(height) = self.height {
            settings.image_height = height;
        }

        if let Some(iterations) = self.iterations {
            settings.maximum_iteration = iterations;
        }

        if let Some(output) = self.output {
            settings.output_directory = output;
        }

        if let Some(name) = self.name {
            settings.run_name = name;
        }

        if self.threads.is_some() {
            settings.threads = self.threads;
        }

        if !self.fields.is_empty() {
            settings.fields = self.fields;
        }
    }
}

fn run(options: Options) -> Result<(), RenderError> {
    let mut settings = EngineSettings::load(options.settings.as_deref())?;
    options.apply(&mut settings);

    let renderer = FractalRenderer::new(settings)?;
    let summary = renderer.render()?;

    info!("run written to {:?}", summary.run_directory);

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(err) => error!("could not format summary: {}", err)
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run(Options::parse()) {
        error!("{}", err);
        process::exit(1);
    }
}
