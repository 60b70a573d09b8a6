//! Build automation tasks for toon-carousel
//!
//! Usage:
//!   cargo xtask build-web         # Build WASM and assemble dist/web
//!   cargo xtask package-native    # Release binary plus assets in dist/native

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::Command;

const BIN_NAME: &str = "toon-carousel";
const MQ_JS_BUNDLE_URL: &str = "https://raw.githubusercontent.com/not-fl3/macroquad/v0.4.14/js/mq_js_bundle.js";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for toon-carousel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build WASM and assemble a static site in dist/web
    BuildWeb {
        /// Debug WASM build, tagged in the page title
        #[arg(long)]
        dev: bool,
    },
    /// Build a native release next to a copy of the assets
    PackageNative,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::BuildWeb { dev } => build_web(dev),
        Commands::PackageNative => package_native(),
    }
}

/// Get the project root directory
fn project_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask manifest has no parent directory")
}

/// Run a command and check for success
fn run_cmd(cmd: &mut Command) -> Result<()> {
    let status = cmd.status().context("Failed to execute command")?;
    if !status.success() {
        anyhow::bail!("Command failed with status: {}", status);
    }
    Ok(())
}

/// Download a file from URL to destination
fn download_file(url: &str, dest: &Path) -> Result<()> {
    println!("Downloading {}...", url);
    run_cmd(Command::new("curl").args(["-L", "-f", "-o"]).arg(dest).arg(url))
}

/// Copy directory recursively
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src).with_context(|| format!("reading {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Start from an empty output directory
fn fresh_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Build WASM for web deployment
fn build_web(dev: bool) -> Result<()> {
    let root = project_root()?;
    let dist = root.join("dist/web");
    let profile = if dev { "debug" } else { "release" };

    println!("Building WASM ({})...", profile);
    let mut cargo = Command::new("cargo");
    cargo.current_dir(&root).args(["build", "--target", "wasm32-unknown-unknown"]);
    if !dev {
        cargo.arg("--release");
    }
    run_cmd(&mut cargo)?;

    fresh_dir(&dist)?;

    println!("Copying files to dist/web...");
    let wasm = format!("{}.wasm", BIN_NAME);
    std::fs::copy(
        root.join("target/wasm32-unknown-unknown").join(profile).join(&wasm),
        dist.join(&wasm),
    )
    .context("WASM binary missing after build")?;

    // Page and the soundtrack/console plugin
    for file in ["index.html", "soundtrack.js"] {
        std::fs::copy(root.join("web").join(file), dist.join(file))
            .with_context(|| format!("copying web/{}", file))?;
    }

    download_file(MQ_JS_BUNDLE_URL, &dist.join("mq_js_bundle.js"))?;

    copy_dir_recursive(&root.join("assets"), &dist.join("assets"))?;

    if dev {
        let index_path = dist.join("index.html");
        let index = std::fs::read_to_string(&index_path)?;
        std::fs::write(&index_path, index.replace("<title>", "<title>[DEV] "))?;
    }

    println!("Web build complete: dist/web/");
    Ok(())
}

/// Release build for the host platform
fn package_native() -> Result<()> {
    let root = project_root()?;
    let dist = root.join("dist/native");

    println!("Building native release...");
    run_cmd(Command::new("cargo").current_dir(&root).args(["build", "--release"]))?;

    fresh_dir(&dist)?;

    let binary_name = if cfg!(target_os = "windows") {
        format!("{}.exe", BIN_NAME)
    } else {
        BIN_NAME.to_string()
    };
    std::fs::copy(root.join("target/release").join(&binary_name), dist.join(&binary_name))?;

    // Models and soundtrack are loaded relative to the working directory
    copy_dir_recursive(&root.join("assets"), &dist.join("assets"))?;

    println!("Native build complete: dist/native/");
    Ok(())
}
