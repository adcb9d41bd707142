use std::fs;
use std::io::Write;

use camino::Utf8Path;

use crate::error::ReadprepError;

/// True when `path` is a regular file with at least one byte.
pub fn is_non_empty_file(path: &Utf8Path) -> bool {
    fs::metadata(path.as_std_path())
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), ReadprepError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| ReadprepError::Filesystem(format!("create {path}: {err}")))
}

/// Writes `content` to a temporary file next to `path` and renames it into
/// place, replacing any previous file.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), ReadprepError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    ensure_dir(parent)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".readprep")
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| ReadprepError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| ReadprepError::Filesystem(format!("write {path}: {err}")))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| ReadprepError::Filesystem(format!("sync {path}: {err}")))?;
    temp.persist(path.as_std_path())
        .map_err(|err| ReadprepError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

/// Removes a file if present.
pub fn remove_if_exists(path: &Utf8Path) -> Result<(), ReadprepError> {
    match fs::remove_file(path.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ReadprepError::Filesystem(format!("remove {path}: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn atomic_write_replaces_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("nested").join("table.tsv");

        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"second");
        let leftovers = fs::read_dir(root.join("nested").as_std_path())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn empty_file_is_not_verified() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("empty.fastq.gz");
        fs::write(path.as_std_path(), b"").unwrap();
        assert!(!is_non_empty_file(&path));
        assert!(!is_non_empty_file(&root));
    }
}
