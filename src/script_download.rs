use std::path::{Path, PathBuf};

use tokio::{fs::File, io::AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::info;

use crate::ffiphot_errors::FfiphotError;

/// Archive directory holding the per-sector bulk download scripts.
pub const SECTOR_SCRIPT_BASE_URL: &str =
    "https://archive.stsci.edu/missions/tess/download_scripts/sector";

/// File name of the full-frame image download script of `sector`.
pub fn sector_script_name(sector: u32) -> String {
    format!("tesscurl_sector_{sector}_ffic.sh")
}

/// Download a file in chunks into `path`.
///
/// The body is streamed into `<path>.part`, which is renamed once complete,
/// so an interrupted download never leaves a truncated `path` behind.
async fn download_to_file(url: &str, path: &Path) -> Result<(), FfiphotError> {
    let partial = path.with_extension("part");
    let mut file = File::create(&partial).await?;

    let mut stream = reqwest::get(url).await?.error_for_status()?.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&partial, path).await?;
    Ok(())
}

/// Get the full-frame image download script of a sector.
///
/// Arguments
/// ---------
/// * `sector`: the observing sector number
/// * `dir`: directory where the script is stored
///
/// Return
/// ------
/// * The path of the script, downloaded only if `dir` does not hold it yet
pub async fn download_sector_script(sector: u32, dir: &Path) -> Result<PathBuf, FfiphotError> {
    let name = sector_script_name(sector);
    let path = dir.join(&name);
    if path.exists() {
        info!(path = %path.display(), "sector script already present");
        return Ok(path);
    }

    tokio::fs::create_dir_all(dir).await?;
    let url = format!("{SECTOR_SCRIPT_BASE_URL}/{name}");
    info!(%url, "downloading sector script");
    download_to_file(&url, &path).await?;
    info!(path = %path.display(), "sector script downloaded");
    Ok(path)
}

#[cfg(test)]
mod script_download_test {
    use super::*;

    #[test]
    fn test_sector_script_name() {
        assert_eq!(sector_script_name(5), "tesscurl_sector_5_ffic.sh");
    }

    #[tokio::test]
    async fn test_existing_script_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join(sector_script_name(12));
        std::fs::write(&existing, "#!/bin/sh\n").unwrap();

        let path = download_sector_script(12, dir.path()).await.unwrap();
        assert_eq!(path, existing);
    }
}
