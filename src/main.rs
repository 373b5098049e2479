use anyhow::{Context, Result};
use clap::Parser;
use cutout::config::{GraphOptimization, ResizeFilter};
use cutout::input::{FileImage, ImageSource};
use cutout::output::{OutputSink, PngFile};
use cutout::segmentation::{self, SegmentationModel};
use cutout::{EngineConfig, FallbackPolicy, RemoverConfig};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to cut out
    input: PathBuf,

    /// Where to write the cutout (PNG)
    #[arg(short, long, default_value = "cutout.png")]
    output: PathBuf,

    /// Path to segmentation model (ONNX file)
    #[arg(short, long, default_value = "models/briaai/RMBG-1.4/onnx/model.onnx")]
    model: PathBuf,

    /// Also write the alpha mask as a grayscale PNG
    #[arg(long)]
    mask_output: Option<PathBuf>,

    /// Order in which backends are tried
    #[arg(long, value_enum, default_value_t = FallbackPolicy::AcceleratedFirst)]
    policy: FallbackPolicy,

    /// Never probe for a GPU, run on the CPU backend
    #[arg(long)]
    no_accel: bool,

    /// GPU ordinal for the accelerated backend
    #[arg(long, default_value_t = 0)]
    device_id: i32,

    /// Intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Graph optimization level
    #[arg(long, value_enum, default_value_t = GraphOptimization::All)]
    optimization: GraphOptimization,

    /// Filter used to scale the image into the model frame
    #[arg(long, value_enum, default_value_t = ResizeFilter::Lanczos3)]
    filter: ResizeFilter,

    /// Name of the model input
    #[arg(long, default_value = "input")]
    input_name: String,

    /// Name of the model output holding the mask
    #[arg(long, default_value = "output")]
    output_name: String,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            optimization: self.optimization,
            intra_threads: self.threads,
            device_id: self.device_id,
            ..EngineConfig::default()
        }
    }

    fn remover_config(&self) -> RemoverConfig {
        RemoverConfig {
            input_name: self.input_name.clone(),
            output_name: self.output_name.clone(),
            policy: self.policy,
            filter: self.filter,
            enable_acceleration: !self.no_accel,
            ..RemoverConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Cutout starting");
    tracing::info!("Model: {}", args.model.display());
    tracing::info!("Backend policy: {:?}", args.policy);

    let remover =
        segmentation::create_default_remover(&args.model, args.engine_config(), &args.remover_config())
            .context("Failed to load segmentation model")?;

    tracing::info!("Using {} backend", remover.backend());

    let mut source = FileImage::new(&args.input);
    let mut sink = PngFile::new(&args.output);
    let mut mask_sink = args.mask_output.as_ref().map(PngFile::new);

    run(&remover, &mut source, &mut sink, mask_sink.as_mut())
}

fn run<M, S, O>(model: &M, source: &mut S, sink: &mut O, mask_sink: Option<&mut O>) -> Result<()>
where
    M: SegmentationModel,
    S: ImageSource,
    O: OutputSink,
{
    let image = source
        .load()
        .with_context(|| format!("Failed to load {}", source.describe()))?;

    let start = Instant::now();
    let mask = model
        .segment(&image)
        .context("Failed to segment image")?;
    let cutout = segmentation::composite(&image, &mask).context("Failed to apply mask")?;
    tracing::info!(
        "Background removed in {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    sink.write_image(&cutout)
        .with_context(|| format!("Failed to write {}", sink.describe()))?;

    if let Some(mask_sink) = mask_sink {
        mask_sink
            .write_mask(&segmentation::mask_luma(&mask))
            .with_context(|| format!("Failed to write {}", mask_sink.describe()))?;
    }

    tracing::info!("Processing complete");

    Ok(())
}
