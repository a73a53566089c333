use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};

use super::{BlobStore, StoredBlob};
use crate::error::StorageError;

/// Stores uploads under `<upload_dir>/<YYYY-MM-DD>/<name>`.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    upload_directory: PathBuf,
}

impl FileBlobStore {
    pub fn new<P: AsRef<Path>>(upload_directory: P) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
        }
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Writes `content` under `filename`, appending `_2`, `_3`, ... when the
    /// name is taken. Creation uses `create_new`, so two concurrent uploads
    /// with the same name never overwrite each other.
    fn write_unique(
        &self,
        dir_path: &Path,
        filename: &str,
        content: &[u8],
    ) -> Result<(String, PathBuf), StorageError> {
        let (base, ext) = match filename.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
            _ => (filename, None),
        };

        for counter in 1..=1000 {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };
            let try_path = dir_path.join(&try_filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok((try_filename, try_path));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::NameExhausted(filename.to_string()))
    }
}

impl BlobStore for FileBlobStore {
    fn put(&self, original_name: &str, content: &[u8]) -> Result<StoredBlob, StorageError> {
        let now = Utc::now();
        let day = format!("{:04}-{:02}-{:02}", now.year(), now.month(), now.day());
        let dir_path = self.upload_directory.join(&day);
        self.ensure_directory(&dir_path)?;

        let filename = sanitize_filename(original_name);
        let (stored_name, path) = self.write_unique(&dir_path, &filename, content)?;

        log::debug!("Stored upload '{}' at {}", original_name, path.display());

        Ok(StoredBlob {
            original_name: original_name.to_string(),
            saved_as: format!("{}/{}", day, stored_name),
            storage_ref: path.to_string_lossy().into_owned(),
        })
    }

    fn remove(&self, blob: &StoredBlob) -> Result<(), StorageError> {
        let path = Path::new(&blob.storage_ref);
        match std::fs::remove_file(path) {
            Ok(()) => {
                log::debug!("Removed upload {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::RemoveFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

/// Keeps only the final path component and replaces characters that are
/// awkward on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| match c {
            c if c.is_control() => '_',
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
