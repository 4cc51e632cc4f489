mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use likeness_core::quality::{self, QualityBreakdown};
use likeness_core::{
    Embedding, FaceBox, FacialAttributes, Gender, OutputFormat, ReferenceBundle,
    ReferenceSelector, SelectionError,
};
use likeness_onnx::{spawn_observer, ModelPaths, ObserverHandle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "likeness", about = "Pick the best reference face from a set of photos")]
struct Cli {
    /// TOML file with selection settings; LIKENESS_* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the best face and write the reference bundle
    Select {
        /// Input photos
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
        /// Encoding for the written images
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Print every usable face with its score breakdown, best first
    Rank {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpeg,
    Png,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Png => OutputFormat::Png,
        }
    }
}

/// Contents of `bundle.json`.
#[derive(Serialize)]
struct BundleManifest<'a> {
    source_file: &'a Path,
    source_index: usize,
    quality_score: f32,
    detection_confidence: f32,
    face_box: FaceBox,
    attributes: &'a FacialAttributes,
    prompt_description: String,
    embedding: Option<&'a Embedding>,
    files: Vec<String>,
}

/// One line of `rank` output.
#[derive(Serialize)]
struct RankLine<'a> {
    file: &'a Path,
    image_index: usize,
    face_box: FaceBox,
    score: f32,
    breakdown: QualityBreakdown,
    estimated_age: Option<u32>,
    gender: Option<Gender>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Select {
            images,
            out,
            format,
        } => {
            if let Some(format) = format {
                config.selection.output_format = format.into();
            }
            run_select(&config, &images, &out)
        }
        Commands::Rank { images } => {
            run_rank(&config, &images)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_select(config: &Config, paths: &[PathBuf], out: &Path) -> Result<ExitCode> {
    let images = read_images(config, paths)?;
    let selector = ReferenceSelector::new(start_observer(config)?, config.selection.clone());

    let bundle = match selector.select(&images) {
        Ok(bundle) => bundle,
        Err(SelectionError::NoFaceDetected) => {
            eprintln!("no usable face found");
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };

    std::fs::create_dir_all(out)
        .with_context(|| format!("creating output directory {}", out.display()))?;
    let files = write_assets(&bundle, out)?;

    let manifest = BundleManifest {
        source_file: &paths[bundle.source_index],
        source_index: bundle.source_index,
        quality_score: bundle.quality_score,
        detection_confidence: bundle.detection_confidence,
        face_box: bundle.face_box,
        attributes: &bundle.attributes,
        prompt_description: bundle.attributes.prompt_description(),
        embedding: bundle.embedding.as_ref(),
        files,
    };
    let manifest_path = out.join("bundle.json");
    std::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    tracing::info!(
        source = %paths[bundle.source_index].display(),
        score = bundle.quality_score,
        out = %out.display(),
        "reference bundle written"
    );
    println!("{}", manifest_path.display());
    Ok(ExitCode::SUCCESS)
}

fn write_assets(bundle: &ReferenceBundle, out: &Path) -> Result<Vec<String>> {
    let ext = bundle.format.extension();
    let mut assets = vec![("face", Some(&bundle.face_crop))];
    assets.push(("upper_body", bundle.upper_body_crop.as_ref()));
    assets.push(("full", Some(&bundle.full_image)));

    let mut written = Vec::new();
    for (stem, bytes) in assets {
        let Some(bytes) = bytes else { continue };
        let name = format!("{stem}.{ext}");
        let path = out.join(&name);
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        written.push(name);
    }
    Ok(written)
}

fn run_rank(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let images = read_images(config, paths)?;
    let selector = ReferenceSelector::new(start_observer(config)?, config.selection.clone());

    for candidate in selector.rank(&images) {
        let line = RankLine {
            file: &paths[candidate.image_index],
            image_index: candidate.image_index,
            face_box: candidate.observation.bbox,
            score: candidate.quality_score,
            breakdown: quality::breakdown(&candidate.observation, &candidate.image),
            estimated_age: candidate.observation.estimated_age,
            gender: candidate.observation.gender,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn read_images(config: &Config, paths: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    config.check_image_count(paths.len())?;
    paths
        .iter()
        .map(|p| std::fs::read(p).with_context(|| format!("reading {}", p.display())))
        .collect()
}

fn start_observer(config: &Config) -> Result<ObserverHandle> {
    let paths = ModelPaths::in_dir(&config.model_dir);
    spawn_observer(&paths, config.intra_threads).with_context(|| {
        format!("loading face models from {}", config.model_dir.display())
    })
}
