//! # Image fetching
//!
//! Images are acquired by running the commands of an externally provided
//! download script, one command per image (typically `curl` lines from the
//! archive's bulk download scripts). A task index is an index into the lines
//! of that script.
//!
//! ## Components
//!
//! * [`FetchScript`]: the lines of a script file, read once and shared read-only.
//! * [`output_name`]: the file name a command produces, derived from its trailing
//!   token (`.../tess2018338165938-s0005-1-4-0125-s_ffic.fits` →
//!   `tess2018338165938-s0005-1-4-0125-s_ffic.fits`).
//! * [`ImageFetcher`]: the asynchronous fetch seam used by the workers.
//! * [`ShellFetcher`]: the production fetcher, running each line through `sh -c`.
//!
//! A failed fetch is an expected outcome: it leaves no file behind and the
//! worker reports the task as unsuccessful.
use std::{
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
    process::Stdio,
};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::ffiphot_errors::FfiphotError;

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), FfiphotError>> + Send + 'a>>;

static TRAILING_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^/=:\s]+)\s*$").expect("valid output name pattern"));

/// File name produced by a fetch command.
///
/// Return
/// ----------
/// * The basename of the last whitespace-separated token, cut after its last
///   `/`, `=` or `:`; `None` for blank lines.
pub fn output_name(command: &str) -> Option<&str> {
    TRAILING_NAME
        .captures(command)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Whether a script line is a command to execute (not blank, not a comment).
pub fn is_command(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

/// Lines of a download script.
///
/// Every line is kept, so task indices match script line numbers (0-based),
/// shebang and comments included.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchScript {
    path: PathBuf,
    lines: Vec<String>,
}

impl FetchScript {
    /// Read a script file.
    ///
    /// Return
    /// ----------
    /// * The script, [`FfiphotError::EmptyScript`] when the file has no line, or
    ///   [`FfiphotError::IoError`] when it cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, FfiphotError> {
        let content = std::fs::read_to_string(path)?;
        let lines: Vec<String> = content.lines().map(|l| l.trim().to_string()).collect();
        if lines.is_empty() {
            return Err(FfiphotError::EmptyScript(path.display().to_string()));
        }
        Ok(FetchScript {
            path: path.to_path_buf(),
            lines,
        })
    }

    /// Build a script from in-memory lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FetchScript {
            path: PathBuf::new(),
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line `index`, or `None` past the end of the script.
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Asynchronous image acquisition.
///
/// `fetch` runs one script line and must leave the fetched image (if any)
/// inside `dest`. Implementations are shared by all workers of a run.
pub trait ImageFetcher: Send + Sync + 'static {
    fn fetch<'a>(&'a self, command: &'a str, dest: &'a Path) -> FetchFuture<'a>;
}

/// [`ImageFetcher`] executing each command through the system shell.
///
/// The command runs as `sh -c "<command> -o <dest>/<name>"` with `dest` as
/// working directory and its output discarded. The child is killed if the
/// fetch future is dropped (e.g. when the run is cancelled).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellFetcher;

const SHELL: &str = "sh";

impl ShellFetcher {
    pub fn new() -> Self {
        ShellFetcher
    }

    async fn run(&self, command: &str, dest: &Path) -> Result<(), FfiphotError> {
        if !is_command(command) {
            debug!(line = command, "not a fetch command, skipped");
            return Ok(());
        }
        let Some(name) = output_name(command) else {
            return Ok(());
        };
        let output = dest.join(name);
        let full = format!("{command} -o '{}'", output.display());

        let status = Command::new(SHELL)
            .arg("-c")
            .arg(&full)
            .current_dir(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        if !status.success() {
            warn!(line = command, %status, "fetch command failed");
            if output.exists() {
                tokio::fs::remove_file(&output).await?;
            }
        }
        Ok(())
    }
}

impl ImageFetcher for ShellFetcher {
    fn fetch<'a>(&'a self, command: &'a str, dest: &'a Path) -> FetchFuture<'a> {
        Box::pin(self.run(command, dest))
    }
}

/// Fetch `count` consecutive script lines starting at `start` into `dir`,
/// one after the other.
///
/// Return
/// ----------
/// * The number of lines attempted (fewer than `count` at the end of the script).
///   Failed commands are logged by the fetcher and do not stop the loop.
pub async fn fetch_range<F>(
    script: &FetchScript,
    fetcher: &F,
    start: usize,
    count: usize,
    dir: &Path,
) -> Result<usize, FfiphotError>
where
    F: ImageFetcher + ?Sized,
{
    tokio::fs::create_dir_all(dir).await?;
    let mut attempted = 0;
    for line in script.lines().iter().skip(start).take(count) {
        if let Err(e) = fetcher.fetch(line, dir).await {
            warn!(line = %line, error = %e, "fetch failed");
        }
        attempted += 1;
    }
    Ok(attempted)
}

#[cfg(test)]
mod fetch_test {
    use super::*;

    #[test]
    fn test_output_name() {
        let line = "curl -C - -L -o tess2018338165938-s0005-1-4-0125-s_ffic.fits \
                    https://mast.stsci.edu/api/v0.1/Download/file/?uri=mast:TESS/product/tess2018338165938-s0005-1-4-0125-s_ffic.fits";
        assert_eq!(
            output_name(line),
            Some("tess2018338165938-s0005-1-4-0125-s_ffic.fits")
        );
        assert_eq!(output_name("cp /data/frame_01.fits  "), Some("frame_01.fits"));
        assert_eq!(output_name("   "), None);
    }

    #[test]
    fn test_is_command() {
        assert!(!is_command("#!/bin/sh"));
        assert!(!is_command("  "));
        assert!(is_command("curl -o a.fits http://x/a.fits"));
    }

    #[test]
    fn test_script_keeps_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        std::fs::write(&path, "#!/bin/sh\ncurl a.fits\n\ncurl b.fits\n").unwrap();

        let script = FetchScript::from_file(&path).unwrap();
        assert_eq!(script.len(), 4);
        assert_eq!(script.line(1), Some("curl a.fits"));
        assert_eq!(script.line(3), Some("curl b.fits"));
        assert_eq!(script.line(4), None);
    }

    #[test]
    fn test_empty_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        std::fs::write(&path, "").unwrap();

        assert_eq!(
            FetchScript::from_file(&path).unwrap_err(),
            FfiphotError::EmptyScript(path.display().to_string())
        );
        assert!(matches!(
            FetchScript::from_file(&dir.path().join("missing.sh")),
            Err(FfiphotError::IoError(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_fetcher_success_and_failure() {
        let src = tempfile::tempdir().unwrap();
        let image = src.path().join("frame.fits");
        std::fs::write(&image, b"SIMPLE").unwrap();
        let dest = tempfile::tempdir().unwrap();

        // `cp <src> -o <dest>` is not valid, so wrap the copy in a tiny function
        let ok = format!(
            "f() {{ cp \"$1\" \"$3\"; }}; f {}",
            image.display()
        );
        ShellFetcher::new().fetch(&ok, dest.path()).await.unwrap();
        assert!(dest.path().join("frame.fits").exists());

        let failing = "f() { echo partial > \"$3\"; exit 3; }; f partial.fits";
        ShellFetcher::new().fetch(failing, dest.path()).await.unwrap();
        assert!(!dest.path().join("partial.fits").exists());
    }
}
