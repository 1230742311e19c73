//! aruco-overlay CLI: encode labels, generate markers and overlay images
//! onto detected markers.

use anyhow::Context;
use aruco_overlay::features::{
    encode_label, gen_marker, ArucoDetector, ArucoDictionary, MarkerId, OverlayPlacer,
    OverlayRequest, OverlayStyle,
};
use aruco_overlay::imgproc::Interpolation;
use aruco_overlay::videoio::backends::PngSequenceWriter;
use aruco_overlay::videoio::open_sequence;
use aruco_overlay::OverlaySession;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aruco-overlay")]
#[command(about = "Overlay images onto ArUco markers and generate markers")]
#[command(version)]
struct Cli {
    /// Worker threads for detection and resizing (overrides RUSTCV_CPU_THREADS).
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the marker id a label encodes to.
    Encode {
        label: String,
    },

    /// Rasterize a marker and save it as marker_<id>_<name>.png.
    Generate {
        /// Human label; also the id source unless --id is given.
        #[arg(long)]
        name: String,

        /// Explicit id or label to encode instead of --name.
        #[arg(long)]
        id: Option<String>,

        /// Side length in pixels.
        #[arg(long, default_value_t = 100)]
        size: u32,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        #[arg(long, value_enum, default_value_t = CliDictionary::Dict4x4_250)]
        dictionary: CliDictionary,
    },

    /// Overlay an image onto the marker in a single frame.
    Overlay {
        /// Input frame.
        #[arg(long)]
        frame: PathBuf,

        /// Output PNG.
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        overlay: OverlayArgs,
    },

    /// Overlay an image onto the marker in every frame of a directory.
    OverlaySequence {
        /// Directory of input frames (png/jpg), processed in name order.
        #[arg(long)]
        input: PathBuf,

        /// Directory for output frames.
        #[arg(long)]
        output: PathBuf,

        #[arg(long, default_value = "frame")]
        prefix: String,

        #[command(flatten)]
        overlay: OverlayArgs,
    },
}

#[derive(Debug, Clone, Args)]
struct OverlayArgs {
    /// Marker to react to: a number, or a label that is encoded.
    #[arg(long)]
    marker_id: String,

    /// Image that replaces the marker.
    #[arg(long)]
    image: PathBuf,

    /// Skip corner dots, outline and id label.
    #[arg(long)]
    plain: bool,

    #[arg(long, value_enum, default_value_t = CliInterpolation::Linear)]
    interpolation: CliInterpolation,

    #[arg(long, value_enum, default_value_t = CliDictionary::Dict4x4_250)]
    dictionary: CliDictionary,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDictionary {
    #[value(name = "4x4_50")]
    Dict4x4_50,
    #[value(name = "4x4_250")]
    Dict4x4_250,
}

impl From<CliDictionary> for ArucoDictionary {
    fn from(d: CliDictionary) -> Self {
        match d {
            CliDictionary::Dict4x4_50 => ArucoDictionary::Dict4x4_50,
            CliDictionary::Dict4x4_250 => ArucoDictionary::Dict4x4_250,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliInterpolation {
    Nearest,
    Linear,
}

impl From<CliInterpolation> for Interpolation {
    fn from(i: CliInterpolation) -> Self {
        match i {
            CliInterpolation::Nearest => Interpolation::Nearest,
            CliInterpolation::Linear => Interpolation::Linear,
        }
    }
}

impl OverlayArgs {
    fn request(&self) -> anyhow::Result<OverlayRequest> {
        let id = encode_label(&self.marker_id)
            .with_context(|| format!("invalid --marker-id '{}'", self.marker_id))?;
        Ok(OverlayRequest::new(id, self.image.clone()))
    }

    fn placer(&self) -> OverlayPlacer {
        let detector = ArucoDetector {
            dictionary: self.dictionary.into(),
            ..ArucoDetector::default()
        };
        let base = if self.plain {
            OverlayStyle::plain()
        } else {
            OverlayStyle::default()
        };
        OverlayPlacer::new(detector).with_style(OverlayStyle {
            interpolation: self.interpolation.into(),
            ..base
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = aruco_overlay::init_thread_pool(cli.threads) {
        tracing::warn!("thread pool not configured: {e}");
    }

    match cli.command {
        Commands::Encode { label } => run_encode(&label),
        Commands::Generate {
            name,
            id,
            size,
            out_dir,
            dictionary,
        } => run_generate(&name, id.as_deref(), size, &out_dir, dictionary.into()),
        Commands::Overlay {
            frame,
            out,
            overlay,
        } => run_overlay(&frame, &out, &overlay),
        Commands::OverlaySequence {
            input,
            output,
            prefix,
            overlay,
        } => run_overlay_sequence(&input, &output, &prefix, &overlay),
    }
}

fn run_encode(label: &str) -> anyhow::Result<()> {
    let id = encode_label(label).with_context(|| format!("cannot encode '{label}'"))?;
    tracing::info!("'{}' encodes to marker id {}", label, id);
    println!("{id}");
    Ok(())
}

fn run_generate(
    name: &str,
    id: Option<&str>,
    size: u32,
    out_dir: &std::path::Path,
    dictionary: ArucoDictionary,
) -> anyhow::Result<()> {
    let source = id.unwrap_or(name);
    let id: MarkerId = encode_label(source).with_context(|| format!("cannot encode '{source}'"))?;
    if !dictionary.contains(id) {
        anyhow::bail!(
            "marker id {} is outside the {}-symbol dictionary",
            id,
            dictionary.size()
        );
    }
    let generated = gen_marker(dictionary, name, id, size, out_dir)?;
    tracing::info!("Marker {} written to {}", generated.id, generated.path.display());
    Ok(())
}

fn run_overlay(
    frame_path: &std::path::Path,
    out: &std::path::Path,
    args: &OverlayArgs,
) -> anyhow::Result<()> {
    let request = args.request()?;
    let placer = args.placer();

    tracing::info!("Loading frame: {}", frame_path.display());
    let mut frame = image::open(frame_path)
        .with_context(|| format!("cannot read frame {}", frame_path.display()))?
        .to_rgb8();

    let placement = placer.place_request(&mut frame, &request)?;
    tracing::info!("Placement: {:?}", placement);

    frame
        .save(out)
        .with_context(|| format!("cannot write {}", out.display()))?;
    tracing::info!("Result written to {}", out.display());
    Ok(())
}

fn run_overlay_sequence(
    input: &std::path::Path,
    output: &std::path::Path,
    prefix: &str,
    args: &OverlayArgs,
) -> anyhow::Result<()> {
    let session = OverlaySession::new(args.placer(), args.request()?);
    let mut capture = open_sequence(input)
        .with_context(|| format!("cannot open frames in {}", input.display()))?;
    let mut writer = PngSequenceWriter::new(output, prefix)?;

    let stats = session.run(capture.as_mut(), &mut writer)?;
    tracing::info!(
        "{} frames: {} overlaid, {} skipped, {} failed",
        stats.frames,
        stats.applied,
        stats.skipped,
        stats.failed
    );
    Ok(())
}
