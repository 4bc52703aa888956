use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cleanup::{self, OUTPUT_DIR_NAME};
use crate::logger;

#[derive(Error, Debug)]
pub enum StepError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: io::Error,
    },
    #[error("{tool} exited with {status}")]
    Failed {
        tool: &'static str,
        status: ExitStatus,
    },
}

/// How a tool hands its result back to the original file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// The tool rewrote the source file directly.
    InPlace,
    /// The tool staged `entry.js` inside the shared output directory,
    /// which is left in place for the next directory-producing step.
    OutputDir,
    /// The tool wrote a `.temp` sibling: either a plain file, or a
    /// directory holding `deobfuscated.js` (webcrack does both).
    TempSibling,
    /// The tool wrote a `.deobfuscated.js` sibling.
    DeobSibling,
}

/// One external tool invocation bound to the current file.
pub struct Step {
    pub name: &'static str,
    pub program: &'static str,
    pub args: Vec<String>,
    pub reconcile: Reconcile,
}

impl Step {
    fn new(
        name: &'static str,
        program: &'static str,
        args: &[&str],
        reconcile: Reconcile,
    ) -> Self {
        Self {
            name,
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
            reconcile,
        }
    }
}

/// Typed result of one attempted step.
pub struct StepOutcome {
    pub name: &'static str,
    pub result: Result<(), StepError>,
}

/// Owns the shared staging directory for one file's pipeline run.
/// Dropping it sweeps every staging directory under the file's own
/// directory, on the normal return path and on unwind alike.
pub struct OutputDirGuard {
    scope: PathBuf,
    dir: PathBuf,
}

impl OutputDirGuard {
    pub fn create(scope: &Path) -> Result<Self> {
        let dir = scope.join(OUTPUT_DIR_NAME);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self {
            scope: scope.to_path_buf(),
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for OutputDirGuard {
    fn drop(&mut self) {
        logger::status("Cleaning up temporary data...");
        cleanup::remove_output_dirs(&self.scope);
        logger::status("Temporary data cleaned up successfully.");
    }
}

/// The fixed ordered tool chain run against every obfuscated file.
pub struct Pipeline {
    verbose: bool,
}

impl Pipeline {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run every configured step against `file`, best effort: a failing
    /// step is logged and skipped, and the file keeps the output of the
    /// last step that produced one.
    pub fn deobfuscate(&self, file: &Path) -> Result<Vec<StepOutcome>> {
        logger::status(&format!("Deobfuscating file: {}", file.display()));

        let scope = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let guard = OutputDirGuard::create(&scope)?;

        let steps = fixed_steps(file, guard.path());
        let outcomes = self.run_steps(file, guard.path(), &steps);

        drop(guard);
        logger::status("Deobfuscation and cleanup completed successfully.");
        Ok(outcomes)
    }

    fn run_steps(&self, file: &Path, output_dir: &Path, steps: &[Step]) -> Vec<StepOutcome> {
        let total = steps.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, step) in steps.iter().enumerate() {
            logger::status(&format!(
                "Step {}/{}: deobfuscate using {} started.",
                index + 1,
                total,
                step.name
            ));

            let result = self.run_step(step);
            match &result {
                Ok(()) => logger::status(&format!(
                    "Step {}/{}: deobfuscate using {} completed.",
                    index + 1,
                    total,
                    step.name
                )),
                Err(err) => {
                    logger::status(&format!(
                        "Step {}/{}: Error during deobfuscate using {}!",
                        index + 1,
                        total,
                        step.name
                    ));
                    debug!("step {} failed: {}", step.name, err);
                }
            }

            // A failed step usually left no artifact, making this a no-op
            // that preserves the previous step's output.
            if let Err(err) = reconcile(step.reconcile, file, output_dir) {
                warn!("failed to promote output of {}: {}", step.name, err);
            }

            outcomes.push(StepOutcome {
                name: step.name,
                result,
            });
        }

        outcomes
    }

    fn run_step(&self, step: &Step) -> Result<(), StepError> {
        let mut command = Command::new(step.program);
        command.args(&step.args);
        if self.verbose {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = command.status().map_err(|source| StepError::Spawn {
            tool: step.name,
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(StepError::Failed {
                tool: step.name,
                status,
            })
        }
    }
}

fn fixed_steps(file: &Path, output_dir: &Path) -> Vec<Step> {
    let file = file.display().to_string();
    let out = output_dir.display().to_string();
    let temp = format!("{}.temp", file);
    let deob = format!("{}.deobfuscated.js", file);

    vec![
        Step::new(
            "js-beautify",
            "js-beautify",
            &["-f", &file, "-j", "-x", "--good-stuff", "-a", "-r"],
            Reconcile::InPlace,
        ),
        Step::new(
            "@wakaru/cli unpacker",
            "npx",
            &["@wakaru/cli", "unpacker", &file, "--output", &out, "--force"],
            Reconcile::OutputDir,
        ),
        Step::new(
            "@wakaru/cli unminify",
            "npx",
            &["@wakaru/cli", "unminify", &file, "--output", &out, "--force"],
            Reconcile::OutputDir,
        ),
        Step::new(
            "js-deobfuscator",
            "js-deobfuscator",
            &["-i", &file, "-o", &file],
            Reconcile::InPlace,
        ),
        Step::new(
            "restringer",
            "restringer",
            &[&file, "-o", &file],
            Reconcile::InPlace,
        ),
        Step::new(
            "webcrack",
            "npx",
            &["webcrack", &file, "-o", &temp, "-f"],
            Reconcile::TempSibling,
        ),
        Step::new(
            "synchrony deobfuscate",
            "synchrony",
            &["deobfuscate", &file, "-o", &deob],
            Reconcile::DeobSibling,
        ),
        Step::new(
            "js-beautify",
            "js-beautify",
            &["-f", &file, "-j", "-x", "--good-stuff", "-a", "-r"],
            Reconcile::InPlace,
        ),
    ]
}

/// Promote an artifact over the original: remove, then rename.
fn promote(artifact: &Path, file: &Path) -> io::Result<()> {
    fs::remove_file(file)?;
    fs::rename(artifact, file)
}

fn sibling(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Normalize a step's output convention back into the original path.
/// A missing artifact makes this a no-op.
fn reconcile(kind: Reconcile, file: &Path, output_dir: &Path) -> io::Result<()> {
    match kind {
        Reconcile::InPlace => Ok(()),
        Reconcile::DeobSibling => {
            let artifact = sibling(file, ".deobfuscated.js");
            if artifact.exists() {
                promote(&artifact, file)
            } else {
                Ok(())
            }
        }
        Reconcile::TempSibling => {
            let temp = sibling(file, ".temp");
            if temp.is_dir() {
                let staged = temp.join("deobfuscated.js");
                if staged.exists() {
                    promote(&staged, file)?;
                    fs::remove_dir_all(&temp)?;
                }
                Ok(())
            } else if temp.exists() {
                promote(&temp, file)
            } else {
                Ok(())
            }
        }
        Reconcile::OutputDir => {
            let staged = output_dir.join("entry.js");
            if staged.exists() {
                promote(&staged, file)
            } else {
                Ok(())
            }
        }
    }
}
