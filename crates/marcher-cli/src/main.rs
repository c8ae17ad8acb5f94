//! Marcher CLI - Command-line interface for SDF raymarching

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marcher_core::sdf::Sdf;
use marcher_core::{CpuBackend, PrimitiveBuffer, RenderBackend, SceneFile};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "marcher")]
#[command(about = "Screen-space raymarching of SDF primitives", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a scene to an image file (headless)
    Render {
        /// Scene file to render (optional, uses demo if not provided)
        #[arg(short, long)]
        scene: Option<PathBuf>,

        /// Output image file (.png)
        #[arg(short, long, default_value = "render.png")]
        output: PathBuf,

        /// Image width, ignored with --source
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Image height, ignored with --source
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Render on the CPU instead of the GPU
        #[arg(long)]
        cpu: bool,

        /// Image shown wherever rays miss (defaults to the background color)
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Open a real-time preview window
    Preview {
        /// Scene file to preview (optional)
        #[arg(short, long)]
        scene: Option<PathBuf>,

        /// Reload the scene when the file changes
        #[arg(short, long)]
        watch: bool,

        /// Window width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Window height
        #[arg(long, default_value = "720")]
        height: u32,

        /// Window title
        #[arg(long, default_value = "Marcher Preview")]
        title: String,
    },

    /// Print or write the WGSL shader for a scene's feature flags
    Shader {
        /// Output file or directory (stdout if not provided)
        output: Option<PathBuf>,

        /// Scene whose settings select the shader features
        #[arg(short, long)]
        scene: Option<PathBuf>,
    },

    /// Print the primitives of a scene
    Inspect {
        /// Scene file to inspect (optional, uses demo if not provided)
        #[arg(short, long)]
        scene: Option<PathBuf>,
    },

    /// Write the demo scene to a file
    Demo {
        /// Output file
        #[arg(short, long, default_value = "scene.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            scene,
            output,
            width,
            height,
            cpu,
            source,
        } => {
            run_render(scene.as_deref(), &output, width, height, cpu, source.as_deref())?;
        }
        Commands::Preview {
            scene,
            watch,
            width,
            height,
            title,
        } => {
            run_preview(scene, watch, width, height, title)?;
        }
        Commands::Shader { output, scene } => {
            run_shader(output.as_deref(), scene.as_deref())?;
        }
        Commands::Inspect { scene } => {
            run_inspect(scene.as_deref())?;
        }
        Commands::Demo { output } => {
            generate_demo(&output)?;
        }
    }

    Ok(())
}

fn load_scene(scene: Option<&Path>) -> Result<SceneFile> {
    match scene {
        Some(path) => SceneFile::load(path)
            .with_context(|| format!("Failed to load scene {}", path.display())),
        None => Ok(SceneFile::demo()),
    }
}

fn select_backend(scene: &SceneFile, cpu: bool, width: u32, height: u32) -> Box<dyn RenderBackend> {
    if cpu {
        return Box::new(CpuBackend);
    }
    match marcher_render::GpuBackend::headless(&scene.settings) {
        Ok(backend) if backend.supports_size(width, height) => Box::new(backend),
        Ok(backend) => {
            warn!(
                "{width}x{height} exceeds the GPU texture limit of {}, falling back to CPU",
                backend.raymarcher().max_texture_dimension()
            );
            Box::new(CpuBackend)
        }
        Err(e) => {
            warn!("GPU unavailable ({e}), falling back to CPU");
            Box::new(CpuBackend)
        }
    }
}

fn run_render(
    scene: Option<&Path>,
    output: &Path,
    width: u32,
    height: u32,
    cpu: bool,
    source: Option<&Path>,
) -> Result<()> {
    let scene = load_scene(scene)?;

    let source = source
        .map(|path| {
            image::open(path)
                .map(|img| img.to_rgba8())
                .with_context(|| format!("Failed to open source image {}", path.display()))
        })
        .transpose()?;
    let (width, height) = source.as_ref().map_or((width, height), |img| img.dimensions());
    let backend = select_backend(&scene, cpu, width, height);
    info!(backend = backend.name(), "Rendering");

    println!(
        "Rendering to {} ({}x{})...",
        output.display(),
        width,
        height
    );

    let camera = scene.camera(width as f32 / height.max(1) as f32);
    let mut host = scene.into_raymarcher()?;
    host.set_backend(Some(backend));

    let img = match &source {
        Some(source) => host.render_image(&camera, source)?,
        None => host.render(&camera, width, height)?,
    };

    img.save(output)?;
    println!("Saved to: {}", output.display());

    Ok(())
}

fn run_preview(
    scene: Option<PathBuf>,
    watch: bool,
    width: u32,
    height: u32,
    title: String,
) -> Result<()> {
    use marcher_render::{WindowConfig, run_preview};

    if watch && scene.is_none() {
        anyhow::bail!("--watch needs a scene file");
    }

    println!("Opening preview window...");
    println!("{}", marcher_render::controls_help());

    let config = WindowConfig {
        title,
        width,
        height,
        scene_path: scene,
        watch,
    };
    run_preview(config)
}

/// Resolve the shader output path, directories get `raymarcher.wgsl`
fn shader_path(output: &Path) -> PathBuf {
    if output.is_dir() {
        output.join("raymarcher.wgsl")
    } else {
        output.to_path_buf()
    }
}

fn run_shader(output: Option<&Path>, scene: Option<&Path>) -> Result<()> {
    let settings = match scene {
        Some(_) => load_scene(scene)?.settings,
        None => marcher_sdf::RenderSettings::default(),
    };
    let shader = marcher_sdf::build_shader(&settings.features());

    match output {
        Some(output) => {
            let path = shader_path(output);
            std::fs::write(&path, shader)?;
            println!("Wrote shader to: {}", path.display());
        }
        None => print!("{shader}"),
    }

    Ok(())
}

fn run_inspect(scene: Option<&Path>) -> Result<()> {
    let scene = load_scene(scene)?;
    let registry = scene.registry()?;
    let mut buffer = PrimitiveBuffer::new();
    buffer.sync(&registry);

    println!(
        "{}: {} primitives, {} bytes on the GPU",
        scene.source_name().unwrap_or_else(|| "demo".to_string()),
        buffer.len(),
        buffer.size_bytes()
    );
    println!(
        "normals {:?}, shadows {:?}, steps {}",
        scene.settings.normals, scene.settings.shadows, scene.settings.steps
    );
    println!();

    for (i, primitive) in buffer.primitives().iter().enumerate() {
        let parameters: Vec<String> = primitive
            .kind
            .parameter_names()
            .iter()
            .zip(primitive.parameters)
            .map(|(name, value)| format!("{name}={value:.3}"))
            .collect();
        let center = primitive.bounds().center();
        let color = primitive.material.color;

        println!(
            "{:>3}  {:<16} {:<36} scale={:.3} center=({:.2}, {:.2}, {:.2}) color=({:.2}, {:.2}, {:.2})",
            i,
            primitive.kind.name(),
            parameters.join(" "),
            primitive.scale,
            center.x,
            center.y,
            center.z,
            color[0],
            color[1],
            color[2],
        );
    }

    Ok(())
}

fn generate_demo(output: &Path) -> Result<()> {
    let scene = SceneFile::demo();
    scene.save(output)?;
    println!(
        "Wrote demo scene with {} primitives to: {}",
        scene.primitives.len(),
        output.display()
    );
    Ok(())
}
