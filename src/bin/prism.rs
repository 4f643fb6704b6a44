use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use prism::MacroMap;

/// Prism renderer command line.
#[derive(Parser)]
#[command(name = "prism", version, about = "A spectral path tracer")]
struct Cli {
    /// Path to the scene description file.
    scene: PathBuf,

    /// Compute backend name.
    #[arg(short, long, default_value = "cpu")]
    backend: String,

    /// Compute device index.
    #[arg(short, long, default_value_t = -1)]
    device: i32,

    /// Macro definitions overriding scene description parameters.
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
    defines: Vec<String>,
}

fn run(cli: &Cli) -> prism::Result<()> {
    if !cli.backend.eq_ignore_ascii_case("cpu") {
        log::warn!(
            "Unknown backend '{}'; falling back to the CPU backend.",
            cli.backend
        );
    }
    if cli.device >= 0 {
        log::info!("Device index {} requested; the CPU backend has one device.", cli.device);
    }

    let mut macros = MacroMap::default();
    for define in &cli.defines {
        match define.split_once('=') {
            Some((key, value)) => {
                macros.insert(key.trim().to_string(), value.to_string());
            }
            None => log::warn!("Ignoring malformed definition '{define}' (expected key=value)."),
        }
    }

    let mut pipeline = prism::load_pipeline(&cli.scene, &macros)?;
    pipeline.render()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
