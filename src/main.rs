use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use bmp_panorama_rs::image_pipeline::{
    Execution, FilterPipeline, Operation, PipelineTimings, ProcessingContext, StitchConfig, StitchPipeline,
};
use bmp_panorama_rs::logger;

/// BMP filters and two-image panorama stitching.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Run the single-threaded variant
    #[arg(long, global = true)]
    sequential: bool,

    /// Worker threads for parallel variants (0 = one per CPU)
    #[arg(long, global = true, default_value_t = 0)]
    workers: usize,

    /// Report processing time without file reads and writes
    #[arg(long, global = true)]
    exclude_io: bool,

    /// Print the per-step timing table
    #[arg(long, global = true)]
    timings: bool,

    /// Run the parallel and the sequential variant and report the speedup.
    /// The sequential result goes next to OUTPUT with a `_sequential` suffix
    #[arg(long, global = true)]
    compare: bool,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Average the three channels into an 8-bit palette image
    Grayscale { input: PathBuf, output: PathBuf },
    /// Black or white by gray level
    Binarize {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 128)]
        threshold: i32,
    },
    /// Add a constant to every channel, saturating
    Brightness {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        delta: i32,
    },
    /// Gaussian blur with edge clamping
    Blur {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 5)]
        kernel_size: i32,
        #[arg(long, default_value_t = 1.0)]
        sigma: f32,
    },
    /// Custom 3×3 integer kernel, row-major
    Convolve {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_delimiter = ',', num_args = 9, allow_hyphen_values = true)]
        kernel: Vec<i32>,
        #[arg(long, default_value_t = 1.0)]
        divisor: f32,
    },
    /// Sobel gradient magnitude
    Sobel { input: PathBuf, output: PathBuf },
    /// Warp FIRST into SECOND's frame and blend the overlap
    Stitch {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
        /// Seed for the descriptor pattern and RANSAC
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn filter_operation(command: &Command) -> Result<Option<(Operation, &PathBuf, &PathBuf)>> {
    let found = match command {
        Command::Grayscale { input, output } => (Operation::Grayscale, input, output),
        Command::Binarize { input, output, threshold } => (Operation::Binarize { threshold: *threshold }, input, output),
        Command::Brightness { input, output, delta } => (Operation::Brightness { delta: *delta }, input, output),
        Command::Blur {
            input,
            output,
            kernel_size,
            sigma,
        } => (
            Operation::GaussianBlur {
                kernel_size: *kernel_size,
                sigma: *sigma,
            },
            input,
            output,
        ),
        Command::Convolve {
            input,
            output,
            kernel,
            divisor,
        } => {
            if kernel.len() != 9 {
                bail!("--kernel takes 9 comma-separated integers, got {}", kernel.len());
            }
            let mut taps = [[0i32; 3]; 3];
            for (i, value) in kernel.iter().enumerate() {
                taps[i / 3][i % 3] = *value;
            }
            (
                Operation::Convolve {
                    kernel: taps,
                    divisor: *divisor,
                },
                input,
                output,
            )
        }
        Command::Sobel { input, output } => (Operation::Sobel, input, output),
        Command::Stitch { .. } => return Ok(None),
    };
    Ok(Some(found))
}

/// Rejects flag combinations the chosen subcommand cannot honour.
fn check_flags(args: &Args) -> Result<()> {
    if args.compare && args.sequential {
        bail!("--compare already runs the sequential variant");
    }
    if let Command::Stitch { .. } = args.command {
        if args.sequential {
            bail!("stitch has no sequential variant");
        }
        if args.compare {
            bail!("--compare only applies to filters");
        }
    }
    Ok(())
}

/// `out.bmp` → `out_sequential.bmp`, in the same directory.
fn sequential_path(output: &Path) -> PathBuf {
    let stem = output.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}_sequential.{}", stem, ext.to_string_lossy()),
        None => format!("{}_sequential", stem),
    };
    output.with_file_name(name)
}

fn report(args: &Args, timings: &PipelineTimings) {
    let duration = if args.exclude_io {
        timings.processing_duration()
    } else {
        timings.total_duration()
    };
    info!("Finished in {:.6} s", duration.as_secs_f64());
    if args.timings {
        timings.print_summary();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose);
    check_flags(&args)?;

    let ctx = ProcessingContext::builder()
        .workers(args.workers)
        .build()
        .context("cannot start worker pool")?;
    let execution = if args.sequential {
        Execution::Sequential
    } else {
        Execution::Parallel
    };
    info!(
        "Running with {} workers (requested {}, {})",
        ctx.workers(),
        ctx.requested_workers(),
        execution.label()
    );

    if let Command::Stitch {
        first,
        second,
        output,
        seed,
    } = &args.command
    {
        let mut config = StitchConfig::default();
        if let Some(seed) = seed {
            config.seed = *seed;
        }
        let timings = StitchPipeline::new(config, ctx)
            .stitch_files_with_timings(first, second, output)
            .with_context(|| format!("stitching {} and {} failed", first.display(), second.display()))?;
        report(&args, &timings);
        return Ok(());
    }

    if let Some((operation, input, output)) = filter_operation(&args.command)? {
        if args.compare {
            let sequential_output = sequential_path(output);
            let comparison = FilterPipeline::new(ctx)
                .compare_files(&operation, input, output, &sequential_output)
                .with_context(|| format!("comparing {} on {} failed", operation, input.display()))?;
            info!(
                "parallel {:.6} s, sequential {:.6} s, speedup {:.2}x",
                comparison.parallel_seconds(),
                comparison.sequential_seconds(),
                comparison.speedup()
            );
            if args.timings {
                comparison.parallel.print_summary();
                comparison.sequential.print_summary();
            }
            return Ok(());
        }

        let timings = FilterPipeline::new(ctx)
            .convert_file_with_timings(&operation, execution, input, output)
            .with_context(|| format!("{} on {} failed", operation, input.display()))?;
        report(&args, &timings);
    }

    Ok(())
}
