use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::logger;

/// npm package that classifies source text as obfuscated or not.
pub const DETECTOR_PACKAGE: &str = "obfuscation-detector";

/// Interpret the detector's stdout: any classification other than
/// `null` means the file is obfuscated.
fn classify(stdout: &str) -> bool {
    let classification = stdout.trim();
    !classification.is_empty() && classification != "null"
}

/// Gate deciding whether a file goes through the pipeline. The actual
/// classification is delegated to the external detector; this type only
/// owns the subprocess contract.
pub struct Detector {
    verbose: bool,
}

impl Detector {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Invoke the detector on `file` and interpret its classification.
    pub fn is_obfuscated(&self, file: &Path) -> Result<bool> {
        let output = Command::new("npx")
            .args(["--no-install", DETECTOR_PACKAGE])
            .arg(file)
            .output()
            .with_context(|| format!("failed to invoke {}", DETECTOR_PACKAGE))?;

        if !output.status.success() {
            bail!(
                "{} exited with {} for {}",
                DETECTOR_PACKAGE,
                output.status,
                file.display()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(
            "detector classified {} as {:?}",
            file.display(),
            stdout.trim()
        );

        let obfuscated = classify(&stdout);
        if obfuscated {
            logger::status_detail(
                self.verbose,
                &format!("Most likely obfuscation type: {}", stdout.trim()),
            );
        }
        Ok(obfuscated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_classification_is_clean() {
        assert!(!classify("null"));
        assert!(!classify("null\n"));
    }

    #[test]
    fn test_empty_output_is_clean() {
        assert!(!classify(""));
        assert!(!classify("   \n\t"));
    }

    #[test]
    fn test_named_classification_is_obfuscated() {
        assert!(classify("obfuscator.io"));
        assert!(classify("array-function-replacements\n"));
    }
}
