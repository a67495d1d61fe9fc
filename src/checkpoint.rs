//! Resume checkpoints.
//!
//! A checkpoint is a text file holding a single script index: the line a
//! later run should start from.
use std::path::Path;

use crate::ffiphot_errors::FfiphotError;

/// Store `index` in the checkpoint file at `path` (replacing its content).
pub fn save_checkpoint(path: &Path, index: usize) -> Result<(), FfiphotError> {
    std::fs::write(path, format!("{index}\n"))?;
    Ok(())
}

/// Read the checkpoint file at `path`.
///
/// Return
/// ----------
/// * `Ok(None)` when the file does not exist, the stored index otherwise, or
///   [`FfiphotError::Checkpoint`] when the content is not an index.
pub fn load_checkpoint(path: &Path) -> Result<Option<usize>, FfiphotError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    content
        .trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|e| FfiphotError::Checkpoint(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod checkpoint_test {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.txt");

        assert_eq!(load_checkpoint(&path).unwrap(), None);
        save_checkpoint(&path, 42).unwrap();
        assert_eq!(load_checkpoint(&path).unwrap(), Some(42));
        save_checkpoint(&path, 7).unwrap();
        assert_eq!(load_checkpoint(&path).unwrap(), Some(7));
    }

    #[test]
    fn test_invalid_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.txt");
        std::fs::write(&path, "forty-two").unwrap();
        assert!(matches!(
            load_checkpoint(&path),
            Err(FfiphotError::Checkpoint(_))
        ));
    }
}
