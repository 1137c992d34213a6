/// External per-sample transforms run as child processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use anyhow::{anyhow, Result};
use log::debug;
use tokio::process::Command;
use crate::utils::file::remove_stale_output_async;

/// An executable invoked as `<program> <sample_id> <input_a> <input_b>` with
/// the output directory as its working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTransform {
    pub program: String,
}

impl ExternalTransform {
    pub fn new(program: &str) -> Self {
        ExternalTransform { program: program.to_string() }
    }

    /// Like `new`, but anchors relative paths such as `./bin/stats.py` at `cwd`,
    /// since the child runs inside the output directory. Bare names are left
    /// for PATH lookup.
    pub fn resolved(program: &str, cwd: &Path) -> Self {
        let path = Path::new(program);
        if path.is_relative() && path.components().count() > 1 {
            ExternalTransform::new(&cwd.join(path).to_string_lossy())
        } else {
            ExternalTransform::new(program)
        }
    }

    pub fn arg_generator(sample_id: &str, input_a: &Path, input_b: &Path) -> Vec<String> {
        vec![
            sample_id.to_string(),
            input_a.to_string_lossy().to_string(),
            input_b.to_string_lossy().to_string(),
        ]
    }

    /// Runs the program for one sample and checks that it produced `expected_output`.
    ///
    /// # Arguments
    ///
    /// * `sample_id` - First argument to the program.
    /// * `input_a` / `input_b` - Paired input artifacts.
    /// * `out_dir` - Working directory of the child.
    /// * `expected_output` - File the program must create.
    ///
    /// # Returns
    /// The expected output path on success.
    pub async fn run(
        &self,
        sample_id: &str,
        input_a: &Path,
        input_b: &Path,
        out_dir: &Path,
        expected_output: &Path,
    ) -> Result<PathBuf> {
        remove_stale_output_async(expected_output)
            .await
            .map_err(|e| anyhow!("Cannot remove stale {}: {}", expected_output.display(), e))?;

        let args = Self::arg_generator(sample_id, input_a, input_b);
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(out_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| anyhow!("Failed to spawn {}: {}. Is it installed and executable?", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }

        if !tokio::fs::try_exists(expected_output).await.unwrap_or(false) {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(anyhow!(
                "{} did not produce {} ({})",
                self.program,
                expected_output.display(),
                stdout.trim()
            ));
        }
        Ok(expected_output.to_path_buf())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_arg_generator() {
        let args = ExternalTransform::arg_generator("S1", Path::new("/in/a.txt"), Path::new("/in/b.tsv"));
        assert_eq!(args, vec!["S1", "/in/a.txt", "/in/b.tsv"]);
    }

    #[test]
    fn test_resolved_program() {
        let cwd = Path::new("/work");
        assert_eq!(ExternalTransform::resolved("bin/stats.py", cwd).program, "/work/bin/stats.py");
        assert_eq!(ExternalTransform::resolved("stats.py", cwd).program, "stats.py");
        assert_eq!(ExternalTransform::resolved("/opt/stats.py", cwd).program, "/opt/stats.py");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_missing_program() -> Result<()> {
        let dir = tempdir()?;
        let transform = ExternalTransform::new("definitely-not-a-real-program-xyz");
        let result = transform
            .run("S1", Path::new("a"), Path::new("b"), dir.path(), &dir.path().join("S1.csv"))
            .await;
        assert!(result.is_err());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_requires_output() -> Result<()> {
        let dir = tempdir()?;
        // `true` succeeds without writing anything
        let transform = ExternalTransform::new("true");
        let result = transform
            .run("S1", Path::new("a"), Path::new("b"), dir.path(), &dir.path().join("S1.csv"))
            .await;
        assert!(result.unwrap_err().to_string().contains("did not produce"));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_ignores_previous_output() -> Result<()> {
        let dir = tempdir()?;
        let expected = dir.path().join("S1.csv");
        std::fs::write(&expected, "sample_id,v\nS1,old\n")?;
        let transform = ExternalTransform::new("true");
        let result = transform
            .run("S1", Path::new("a"), Path::new("b"), dir.path(), &expected)
            .await;
        assert!(result.is_err());
        assert!(!expected.exists());
        Ok(())
    }
}
