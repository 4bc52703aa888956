use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::detector::DETECTOR_PACKAGE;
use crate::logger;

/// CLI tools the pipeline shells out to, expected to be globally installed.
/// `deobfuscator` is the npm package providing the `synchrony` binary.
pub const PIPELINE_TOOLS: [&str; 6] = [
    "@wakaru/cli",
    "js-deobfuscator",
    "js-beautify",
    "restringer",
    "webcrack",
    "deobfuscator",
];

/// Provision everything the run needs before any file is touched.
///
/// A failed installation aborts the run; no file has been modified at
/// that point.
pub fn preflight(verbose: bool) -> Result<()> {
    logger::status("Checking tool dependencies...");
    ensure_package(DETECTOR_PACKAGE, verbose)?;
    for tool in PIPELINE_TOOLS {
        ensure_global_tool(tool, verbose)?;
    }
    logger::status("All tool dependencies are ready.");
    Ok(())
}

fn is_installed_locally(name: &str) -> bool {
    Command::new("npm")
        .args(["ls", name, "--parseable"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Resolve a package in the local project, installing it when absent.
pub fn ensure_package(name: &str, verbose: bool) -> Result<()> {
    if is_installed_locally(name) {
        logger::status_detail(verbose, &format!("{} is already installed.", name));
        return Ok(());
    }

    logger::status(&format!("{} is not installed. Installing...", name));
    let status = Command::new("npm")
        .args(["install", name])
        .status()
        .with_context(|| format!("failed to run npm install {}", name))?;
    if !status.success() {
        bail!("npm install {} failed with {}", name, status);
    }
    Ok(())
}

fn is_installed_globally(name: &str) -> bool {
    Command::new("npm")
        .args(["list", "-g", name])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Check a CLI tool's global installation, installing it when absent.
pub fn ensure_global_tool(name: &str, verbose: bool) -> Result<()> {
    if is_installed_globally(name) {
        logger::status_detail(verbose, &format!("{} is already installed globally.", name));
        return Ok(());
    }

    logger::status(&format!("{} is not installed. Installing...", name));
    debug!("running npm install -g {}", name);
    let status = Command::new("npm")
        .args(["install", "-g", name])
        .status()
        .with_context(|| format!("failed to run npm install -g {}", name))?;
    if !status.success() {
        bail!("npm install -g {} failed with {}", name, status);
    }
    Ok(())
}
