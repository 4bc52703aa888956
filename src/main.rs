use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

mod cleanup;
mod deps;
mod detector;
mod logger;
mod pipeline;
mod scanner;

use detector::Detector;
use pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "decryptex")]
#[command(about = "Just crazy tool that trying to deobfuscate anything around it!", long_about = None)]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Specify the file to decrypt
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Specify the directory to process
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Output the current version
    #[allow(dead_code)]
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if verbose {
        println!("Verbose mode enabled");
    }
    println!("{}", logger::BANNER);

    let targets = match resolve_targets(cli.dir.as_deref(), cli.file.as_deref()) {
        Ok(targets) => targets,
        Err(message) => {
            logger::status(&message);
            std::process::exit(1);
        }
    };

    deps::preflight(verbose)?;

    // An interrupt mid-pipeline leaves the current file as the last
    // completed step wrote it; only staging directories are swept.
    let roots = targets.clone();
    ctrlc::set_handler(move || {
        logger::status("Cleaning up temporary data...");
        for root in &roots {
            cleanup::remove_output_dirs(root);
        }
        std::process::exit(130);
    })?;

    for target in &targets {
        if !target.exists() {
            logger::status(&format!("Directory {} does not exist.", target.display()));
            continue;
        }
        process_directory(target, verbose)?;
    }

    Ok(())
}

/// Turn the CLI options into the ordered list of directories to process.
/// An `Err` message here is fatal (exit 1).
fn resolve_targets(dir: Option<&Path>, file: Option<&Path>) -> Result<Vec<PathBuf>, String> {
    if let Some(dir) = dir {
        if dir.is_dir() {
            Ok(vec![dir.to_path_buf()])
        } else {
            Err("The specified path is not a directory.".to_string())
        }
    } else if let Some(file) = file {
        if !file.is_file() {
            Err("The specified path is not a file.".to_string())
        } else if !scanner::is_script_file(file) {
            Err("The path provided is not a directory or a supported file type.".to_string())
        } else {
            logger::status(&format!("Processing file: {}", file.display()));
            Ok(vec![file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf()])
        }
    } else {
        let origin = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .ok_or_else(|| "Could not locate the tool's own directory.".to_string())?;

        logger::status("Scanning sibling directories...");
        let siblings = scanner::sibling_directories(&origin)
            .map_err(|err| format!("Failed to scan sibling directories: {}", err))?;
        logger::status("Scanning completed.");

        if siblings.is_empty() {
            return Err("No directories to process.".to_string());
        }
        Ok(siblings)
    }
}

fn process_directory(directory: &Path, verbose: bool) -> Result<()> {
    logger::status(&format!("Processing directory: {}", directory.display()));

    let total = scanner::count_script_files(directory);
    debug!("{} candidate files under {}", total, directory.display());

    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} Files Processed")
            .unwrap()
            .progress_chars("=>-"),
    );

    let detector = Detector::new(verbose);
    let pipeline = Pipeline::new(verbose);

    for file in scanner::script_files(directory) {
        logger::status(&format!("Processing {}...", file.display()));
        if let Err(err) = process_file(&file, &detector, &pipeline) {
            logger::status(&format!(
                "Failed to deobfuscate {}: {}",
                file_name(&file),
                err
            ));
        }
        bar.inc(1);
    }

    bar.finish_and_clear();
    logger::status("All files processed.");
    Ok(())
}

fn process_file(file: &Path, detector: &Detector, pipeline: &Pipeline) -> Result<()> {
    // Unreadable or non-UTF-8 files fail here, before any tool runs.
    let _content = fs::read_to_string(file)?;

    if detector.is_obfuscated(file)? {
        logger::status(&format!("Deobfuscating {}...", file_name(file)));
        let outcomes = pipeline.deobfuscate(file)?;

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 {
            debug!(
                "{} of {} steps failed for {}",
                failed,
                outcomes.len(),
                file.display()
            );
        }
        logger::status(&format!(
            "{} has been deobfuscated and beautified.",
            file_name(file)
        ));
    } else {
        logger::status(&format!("{} is not obfuscated. Skipping...", file.display()));
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_dir_target_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let targets = resolve_targets(Some(dir.path()), None).unwrap();
        assert_eq!(targets, vec![dir.path().to_path_buf()]);

        let file = dir.path().join("a.js");
        fs::write(&file, "").unwrap();
        assert!(resolve_targets(Some(&file), None).is_err());
    }

    #[test]
    fn test_file_target_selects_containing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("c.js");
        fs::write(&file, "").unwrap();

        let targets = resolve_targets(None, Some(&file)).unwrap();
        assert_eq!(targets, vec![nested]);
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_file_is_left_untouched() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clean.js");
        fs::write(&file, "const x = 1;\n").unwrap();

        // Shadow npx with a stub that always classifies as clean.
        let bin = dir.path().join("bin");
        fs::create_dir(&bin).unwrap();
        let stub = bin.join("npx");
        fs::write(&stub, "#!/bin/sh\necho null\n").unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        let old_path = env::var("PATH").unwrap_or_default();
        env::set_var("PATH", format!("{}:{}", bin.display(), old_path));

        let result = process_file(&file, &Detector::new(false), &Pipeline::new(false));

        env::set_var("PATH", old_path);

        result.unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "const x = 1;\n");
        assert!(!dir.path().join(cleanup::OUTPUT_DIR_NAME).exists());
    }

    #[test]
    fn test_file_target_rejects_unsupported_types() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        fs::write(&file, "").unwrap();

        assert!(resolve_targets(None, Some(&file)).is_err());
        assert!(resolve_targets(None, Some(&dir.path().join("missing.js"))).is_err());
    }
}
