use clap::{Parser, Subcommand};
use resize_suite::batch::{self, BatchJob, BatchOptions};
use resize_suite::config::{self, EditorConfig};
use resize_suite::imaging::{
    Adjustments, CompressParams, ConvertParams, CropArea, ImageProcessor, Operation,
    OutputFormat, ProcessedImage, Quality, ResizeSpec, RotateParams, RustBackend,
    WatermarkParams, WatermarkPosition, parse_hex_color,
};
use resize_suite::output;
use resize_suite::presets::{self, PRESETS};
use resize_suite::types::{ImageMetadata, ProcessingResult};
use resize_suite::validation::{FileValidator, Tier};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a single-image tool writes its result.
#[derive(clap::Args, Clone)]
struct OutputArgs {
    /// Output file. The extension picks the format for canvas tools.
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Parser)]
#[command(name = "resize-suite")]
#[command(about = "Resize, crop, rotate, compress and convert images")]
#[command(long_about = "\
Resize, crop, rotate, compress and convert images

Canvas tools (resize, crop, rotate, adjust, watermark, preset) write the
edited image in the format given by the output file extension. Encode
tools (compress, convert) choose the format explicitly.

Uploads are checked against tier limits before processing:

  tier   max size   max files   max edge
  free   10 MB      5           8000 px
  pro    50 MB      100         20000 px

Run 'resize-suite gen-config' to generate a documented resize-suite.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing resize-suite.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Account tier for upload limits (free, pro)
    #[arg(long, default_value = "free", global = true)]
    tier: Tier,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show format, dimensions and size of an image
    Info { input: PathBuf },
    /// Check files against the tier's upload limits
    Validate {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Resize by exact size, percentage, or one aspect-locked edge
    Resize {
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Scale both edges by this percentage
        #[arg(long, conflicts_with_all = ["width", "height"])]
        percent: Option<f64>,
        /// Treat width and height as a bounding box, keeping aspect ratio
        #[arg(long, requires_all = ["width", "height"])]
        fit: bool,
    },
    /// Keep a rectangle of the image
    Crop {
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        #[arg(long, default_value_t = 0)]
        x: u32,
        #[arg(long, default_value_t = 0)]
        y: u32,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Rotate clockwise by any angle, then flip
    Rotate {
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        degrees: f64,
        #[arg(long)]
        flip_horizontal: bool,
        #[arg(long)]
        flip_vertical: bool,
    },
    /// Brightness, contrast, grayscale, invert, hue and blur
    Adjust {
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        /// -100 to 100
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        brightness: i32,
        /// -100 to 100 percent
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        contrast: f32,
        #[arg(long)]
        grayscale: bool,
        #[arg(long)]
        invert: bool,
        /// Hue rotation in degrees
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        hue: i32,
        /// Gaussian blur sigma
        #[arg(long, default_value_t = 0.0)]
        blur: f32,
    },
    /// Re-encode with a lower quality, optionally under a size budget
    Compress {
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        #[arg(long, default_value = "jpeg")]
        format: OutputFormat,
        #[arg(long, default_value_t = 80)]
        quality: u32,
        /// Largest acceptable output, in kilobytes
        #[arg(long)]
        max_kb: Option<u64>,
    },
    /// Encode into another format
    Convert {
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        #[arg(long)]
        to: OutputFormat,
        /// Defaults to encoding.quality from the config
        #[arg(long)]
        quality: Option<u32>,
        /// Drop transparency even when the target format supports it
        #[arg(long)]
        flatten: bool,
        /// Flatten colour (defaults to encoding.background)
        #[arg(long)]
        background: Option<String>,
    },
    /// Fit an image to a social media size, or list the presets
    Preset {
        #[arg(required_unless_present = "list")]
        input: Option<PathBuf>,
        /// Preset slug, e.g. instagram-square
        #[arg(long, required_unless_present = "list")]
        name: Option<String>,
        #[arg(short, long, required_unless_present = "list")]
        output: Option<PathBuf>,
        /// List available presets
        #[arg(long)]
        list: bool,
    },
    /// Print the colour of one pixel
    Pick { input: PathBuf, x: u32, y: u32 },
    /// Overlay another image as a watermark
    Watermark {
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        /// Image to overlay
        #[arg(long)]
        mark: PathBuf,
        #[arg(long, default_value = "bottom-right")]
        position: WatermarkPosition,
        #[arg(long, default_value_t = 0.5)]
        opacity: f32,
        #[arg(long, default_value_t = 16)]
        margin: u32,
    },
    /// Process every image in a directory
    Batch {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "jpeg")]
        to: OutputFormat,
        /// Defaults to encoding.quality from the config
        #[arg(long)]
        quality: Option<u32>,
        /// Resize to this width (aspect kept unless --height is also given,
        /// then both bound a box)
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Largest acceptable output per file, in kilobytes (lossy formats)
        #[arg(long)]
        max_kb: Option<u64>,
        /// Include subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print a stock resize-suite.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config_dir)?;
    let validator = FileValidator::new(&config.limits, cli.tier);

    match &cli.command {
        Command::Info { input } => {
            let (_, metadata) = open(&validator, input)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            } else {
                output::print_lines(&output::format_metadata(input, &metadata));
            }
        }
        Command::Validate { inputs } => {
            let files = inputs
                .iter()
                .map(|path| {
                    let name = path.display().to_string();
                    std::fs::read(path).map(|bytes| (name, bytes))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let result = validator.validate_batch(&files);
            if cli.json {
                let rejected: Vec<_> = result
                    .rejected
                    .iter()
                    .map(|(name, e)| serde_json::json!({"name": name, "error": e.to_string()}))
                    .collect();
                let report = serde_json::json!({"accepted": result.accepted, "rejected": rejected});
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_lines(&output::format_validation(&result));
            }
            if !result.all_valid() {
                std::process::exit(1);
            }
        }
        Command::Resize {
            input,
            out,
            width,
            height,
            percent,
            fit,
        } => {
            let spec = match (percent, width, height, fit) {
                (Some(p), _, _, _) => ResizeSpec::Percentage(*p),
                (None, Some(w), Some(h), true) => ResizeSpec::Fit {
                    max_width: *w,
                    max_height: *h,
                },
                (None, Some(w), Some(h), false) => ResizeSpec::Exact {
                    width: *w,
                    height: *h,
                },
                (None, Some(w), None, _) => ResizeSpec::Width(*w),
                (None, None, Some(h), _) => ResizeSpec::Height(*h),
                (None, None, None, _) => {
                    return Err("resize needs --width, --height or --percent".into());
                }
            };
            edit(&cli, &config, &validator, input, &out.output, Operation::Resize(spec))?;
        }
        Command::Crop {
            input,
            out,
            x,
            y,
            width,
            height,
        } => {
            let area = CropArea {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            };
            edit(&cli, &config, &validator, input, &out.output, Operation::Crop(area))?;
        }
        Command::Rotate {
            input,
            out,
            degrees,
            flip_horizontal,
            flip_vertical,
        } => {
            let params = RotateParams {
                degrees: *degrees,
                flip_horizontal: *flip_horizontal,
                flip_vertical: *flip_vertical,
            };
            edit(&cli, &config, &validator, input, &out.output, Operation::Rotate(params))?;
        }
        Command::Adjust {
            input,
            out,
            brightness,
            contrast,
            grayscale,
            invert,
            hue,
            blur,
        } => {
            let adjustments = Adjustments {
                brightness: *brightness,
                contrast: *contrast,
                grayscale: *grayscale,
                invert: *invert,
                hue_rotate: *hue,
                blur: *blur,
            };
            edit(&cli, &config, &validator, input, &out.output, Operation::Adjust(adjustments))?;
        }
        Command::Compress {
            input,
            out,
            format,
            quality,
            max_kb,
        } => {
            let params = CompressParams {
                format: *format,
                quality: Quality::new(*quality),
                max_bytes: max_kb.map(|kb| kb * 1024),
            };
            edit(&cli, &config, &validator, input, &out.output, Operation::Compress(params))?;
        }
        Command::Convert {
            input,
            out,
            to,
            quality,
            flatten,
            background,
        } => {
            let background = match background {
                Some(hex) => parse_hex_color(hex)?,
                None => config.encoding.background_color()?,
            };
            let params = ConvertParams {
                format: *to,
                quality: quality.map(Quality::new).unwrap_or(config.encoding.quality()),
                preserve_transparency: !flatten,
                background,
            };
            edit(&cli, &config, &validator, input, &out.output, Operation::Convert(params))?;
        }
        Command::Preset {
            input,
            name,
            output: destination,
            list,
        } => {
            if *list {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(PRESETS)?);
                } else {
                    output::print_lines(&output::format_presets(PRESETS));
                }
                return Ok(());
            }
            let (Some(input), Some(name), Some(destination)) = (input, name, destination) else {
                return Err("preset needs an input, --name and --output".into());
            };
            let preset = presets::find_preset(name)
                .ok_or_else(|| format!("unknown preset '{name}'. Run with --list to see presets"))?;
            edit(&cli, &config, &validator, input, destination, preset.operation())?;
        }
        Command::Pick { input, x, y } => {
            let (processor, _) = open(&validator, input)?;
            let color = processor.pick_color(*x, *y)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&color)?);
            } else {
                output::print_lines(&output::format_picked_color(&color));
            }
        }
        Command::Watermark {
            input,
            out,
            mark,
            position,
            opacity,
            margin,
        } => {
            let (mark_processor, _) = open(&validator, mark)?;
            let mark_image = mark_processor
                .canvas()
                .cloned()
                .ok_or("watermark image could not be loaded")?;
            let params = WatermarkParams {
                mark: Arc::new(mark_image),
                position: *position,
                opacity: *opacity,
                margin: *margin,
            };
            edit(&cli, &config, &validator, input, &out.output, Operation::Watermark(params))?;
        }
        Command::Batch {
            input,
            output: out_dir,
            to,
            quality,
            width,
            height,
            max_kb,
            recursive,
        } => {
            init_thread_pool(&config.processing);
            let quality = quality.map(Quality::new).unwrap_or(config.encoding.quality());
            let final_step = match max_kb {
                Some(kb) => Operation::Compress(CompressParams {
                    format: *to,
                    quality,
                    max_bytes: Some(kb * 1024),
                }),
                None => Operation::Convert(ConvertParams {
                    format: *to,
                    quality,
                    preserve_transparency: true,
                    background: config.encoding.background_color()?,
                }),
            };
            let resize = match (width, height) {
                (Some(w), Some(h)) => Some(ResizeSpec::Fit {
                    max_width: *w,
                    max_height: *h,
                }),
                (Some(w), None) => Some(ResizeSpec::Width(*w)),
                (None, Some(h)) => Some(ResizeSpec::Height(*h)),
                (None, None) => None,
            };
            let mut job = BatchJob::new(final_step);
            if let Some(spec) = resize {
                job = job.then(Operation::Resize(spec));
            }

            let (tx, rx) = std::sync::mpsc::channel();
            let quiet = cli.json;
            let printer = std::thread::spawn(move || {
                for (index, event) in rx.into_iter().enumerate() {
                    if !quiet {
                        // Index 0 is the Started event
                        output::print_lines(&output::format_batch_event(index, &event));
                    }
                }
            });
            let summary = batch::run_batch(
                &RustBackend::new(),
                &validator,
                &job,
                input,
                out_dir,
                BatchOptions {
                    recursive: *recursive,
                },
                Some(tx),
            );
            let _ = printer.join();
            let summary = summary?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                output::print_batch_summary(&summary);
            }
        }
        Command::GenConfig => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Validate and load one input file.
fn open(
    validator: &FileValidator,
    path: &Path,
) -> Result<(ImageProcessor, ImageMetadata), Box<dyn std::error::Error>> {
    validator.validate_path(path)?;
    let mut processor = ImageProcessor::new();
    let metadata = processor.load_path(path)?;
    Ok((processor, metadata))
}

/// Run one tool and write the result to `destination`.
///
/// Canvas tools are re-encoded to the format implied by the destination
/// extension.
fn edit(
    cli: &Cli,
    config: &EditorConfig,
    validator: &FileValidator,
    input: &Path,
    destination: &Path,
    operation: Operation,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut processor, _) = open(validator, input)?;
    let mut processed = processor.apply(&operation)?;

    if operation.mutates_canvas() {
        let wanted = destination
            .extension()
            .and_then(|ext| ext.to_str()?.parse::<OutputFormat>().ok())
            .unwrap_or_default();
        if wanted != processed.encoded.format {
            processed = ProcessedImage {
                operation: processed.operation,
                encoded: processor
                    .convert(ConvertParams {
                        quality: config.encoding.quality(),
                        background: config.encoding.background_color()?,
                        ..ConvertParams::to(wanted)
                    })?
                    .encoded,
            };
        }
    }

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    processed.encoded.write_to(destination)?;

    if cli.json {
        let report = ProcessingResult::from(&processed).with_output(destination.display().to_string());
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_processed(&processed, destination);
    }
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
