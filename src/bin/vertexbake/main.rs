//! Vertexbake CLI - bake vertex colors into a texture atlas.
//!
//! Usage: vertexbake <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `vertexbake --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use vertexbake::algo::progress::{Progress, Stage};
use vertexbake::io;
use vertexbake::mesh::{ColorChannels, FaceAdjacency, UvOrigin};
use vertexbake::prelude::{bake_with_progress, BakeOptions, Connectivity};

#[derive(Parser)]
#[command(name = "vertexbake")]
#[command(author, version, about = "Vertex color to texture baking CLI", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh information
    Info {
        /// Input mesh file (.obj or .ply)
        input: PathBuf,
    },

    /// Bake vertex colors into a UV-mapped OBJ or GLB with a PNG texture
    Bake {
        /// Input mesh file (.obj or .ply)
        input: PathBuf,

        /// Output .obj (the .mtl and .png are written beside it) or .glb
        output: PathBuf,

        /// Normal deviation allowed within one chart (0.0 to 0.95)
        #[arg(short = 'd', long, default_value = "0.25")]
        max_distortion: f64,

        /// Smallest atlas resolution to try
        #[arg(long, default_value = "64")]
        min_resolution: u32,

        /// Largest atlas resolution to try
        #[arg(short = 'r', long, default_value = "4096")]
        max_resolution: u32,

        /// Texels of padding around each chart
        #[arg(short, long, default_value = "4")]
        padding: u32,

        /// Fixed texel density in texels per world unit
        #[arg(long)]
        texel_density: Option<f64>,

        /// Dilation passes (default: the padding)
        #[arg(short, long)]
        margin: Option<u32>,

        /// Dilation neighborhood
        #[arg(long, value_enum, default_value = "eight")]
        connectivity: ConnectivityArg,

        /// Bake at this multiple of the resolution and downsample
        #[arg(short, long, default_value = "1")]
        supersample: u32,

        /// Always write an alpha channel
        #[arg(long)]
        alpha: bool,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ConnectivityArg {
    /// Orthogonal neighbors only
    Four,
    /// Orthogonal and diagonal neighbors
    Eight,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input } => {
            cmd_info(&input)?;
        }

        Commands::Bake {
            input,
            output,
            max_distortion,
            min_resolution,
            max_resolution,
            padding,
            texel_density,
            margin,
            connectivity,
            supersample,
            alpha,
            sequential,
        } => {
            let mut options = BakeOptions::default()
                .with_max_distortion(max_distortion)
                .with_resolution_range(min_resolution, max_resolution)
                .with_padding(padding)
                .with_connectivity(connectivity.into())
                .with_supersample(supersample)
                .with_uv_origin(UvOrigin::BottomLeft)
                .with_parallel(!sequential);
            if let Some(density) = texel_density {
                options = options.with_texel_density(density);
            }
            if let Some(margin) = margin {
                options = options.with_dilation_margin(margin);
            }
            if alpha {
                options = options.with_output_channels(ColorChannels::Rgba);
            }
            cmd_bake(&input, &output, &options)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that draws one bar per stage on the terminal.
fn create_progress() -> Progress {
    // Current stage and the highest percent drawn for it.
    let state: Mutex<(Option<Stage>, usize)> = Mutex::new((None, 0));

    Progress::new(move |stage, current, total| {
        if total == 0 {
            return;
        }
        let Ok(mut state) = state.lock() else {
            return;
        };

        if state.0 != Some(stage) {
            if state.0.is_some() && state.1 < 100 {
                eprintln!();
            }
            *state = (Some(stage), 0);
        } else if state.1 == 100 {
            return;
        }

        let percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };
        // Monotonic within a stage
        if percent <= state.1 && !(percent == 0 && state.1 == 0) {
            return;
        }
        state.1 = percent;

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);
        eprint!("\r[{}{}] {:3}% {}", bar, space, percent, stage);
        let _ = std::io::stderr().flush();

        if percent == 100 {
            eprintln!();
        }
    })
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Triangles: {}", mesh.num_triangles());
    println!("Color channels: {}", mesh.channels().count());

    let mut min_area = f64::MAX;
    let mut max_area = 0.0_f64;
    for t in mesh.triangle_ids() {
        let area = mesh.triangle_area(t);
        min_area = min_area.min(area);
        max_area = max_area.max(area);
    }
    println!("Surface area: {:.6}", mesh.surface_area());
    println!("Triangle area range: [{:.6}, {:.6}]", min_area, max_area);

    if let Some((min, max)) = mesh.bounding_box() {
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
        let diag = max - min;
        println!("Dimensions: {:.3} x {:.3} x {:.3}", diag.x, diag.y, diag.z);
    }

    let (adjacency, diagnostics) = FaceAdjacency::build(&mesh);
    println!("Connected components: {}", adjacency.components().len());
    if diagnostics.is_empty() {
        println!("Topology: Manifold");
    } else {
        println!("Topology: {} non-manifold edges", diagnostics.len());
    }

    Ok(())
}

fn cmd_bake(input: &Path, output: &Path, options: &BakeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    let mode = if options.parallel { "parallel" } else { "sequential" };
    info!("baking {} ({})", input.display(), mode);
    let progress = create_progress();

    let start = Instant::now();
    let result = bake_with_progress(&mesh, options, &progress)?;
    let elapsed = start.elapsed();

    for diagnostic in &result.diagnostics {
        warn!("{}", diagnostic);
    }

    println!(
        "Result: {} charts, {} vertices, {}x{} texture ({:.1}% occupied)",
        result.charts.len(),
        result.mesh.num_vertices(),
        result.layout.resolution,
        result.layout.resolution,
        result.layout.occupancy() * 100.0
    );
    io::export(output, &result)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}
