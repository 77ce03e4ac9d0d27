use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::FeedError;

/// Where uploaded post images live, and the URL they are served back from.
#[derive(Clone, Debug)]
pub struct Uploads {
    dir: PathBuf,
    public_url: String,
}

impl Uploads {
    pub fn new<P: Into<PathBuf>>(dir: P, public_url: &str) -> Uploads {
        Uploads {
            dir: dir.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies the uploaded file at `source` into the upload directory as
    /// `<unix-millis>-<filename>` and returns the URL the post should carry.
    pub fn save(&self, source: &Path, filename: Option<&str>) -> Result<String, FeedError> {
        fs::create_dir_all(&self.dir).map_err(|e| FeedError::storage(&self.dir, e))?;

        let name = format!("{}-{}", Utc::now().timestamp_millis(), clean_filename(filename));
        let target = self.dir.join(&name);
        fs::copy(source, &target).map_err(|e| FeedError::storage(&target, e))?;

        info!("Stored upload {}", target.display());
        Ok(format!("{}/uploads/{}", self.public_url, name))
    }

    /// Deletes an upload previously returned by `save`, for a post that was
    /// never stored.
    pub fn discard(&self, url: &str) {
        let name = match url.rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => return,
        };
        let target = self.dir.join(name);
        match fs::remove_file(&target) {
            Ok(()) => info!("Discarded upload {}", target.display()),
            Err(e) => warn!("Failed to discard upload {}: {}", target.display(), e),
        }
    }
}

// Keeps only the final path component, restricted to URL-safe characters.
fn clean_filename(filename: Option<&str>) -> String {
    let base = filename
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("");
    let cleaned: String = base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn filenames_are_flattened() {
        assert_eq!(clean_filename(Some("cat.png")), "cat.png");
        assert_eq!(clean_filename(Some("../../etc/passwd")), "passwd");
        assert_eq!(clean_filename(Some("my photo.jpg")), "my_photo.jpg");
        assert_eq!(clean_filename(Some("..")), "upload");
        assert_eq!(clean_filename(None), "upload");
    }

    #[test]
    fn save_copies_and_resolves_url() {
        let scratch = TempDir::new().unwrap();
        let source = scratch.path().join("incoming");
        fs::write(&source, b"png bytes").unwrap();

        let uploads = Uploads::new(scratch.path().join("public").join("uploads"),
                                   "http://localhost:5000/");
        let url = uploads.save(&source, Some("cat.png")).unwrap();

        assert!(url.starts_with("http://localhost:5000/uploads/"));
        assert!(url.ends_with("-cat.png"));

        let name = url.rsplit('/').next().unwrap();
        let stored = fs::read(uploads.dir().join(name)).unwrap();
        assert_eq!(stored, b"png bytes");
    }

    #[test]
    fn discard_removes_saved_file() {
        let scratch = TempDir::new().unwrap();
        let source = scratch.path().join("incoming");
        fs::write(&source, b"png bytes").unwrap();

        let uploads = Uploads::new(scratch.path().join("uploads"), "http://localhost:5000");
        let url = uploads.save(&source, Some("cat.png")).unwrap();
        uploads.discard(&url);

        assert_eq!(fs::read_dir(uploads.dir()).unwrap().count(), 0);
    }

    #[test]
    fn missing_source_is_storage_error() {
        let scratch = TempDir::new().unwrap();
        let uploads = Uploads::new(scratch.path().join("uploads"), "http://localhost:5000");
        match uploads.save(&scratch.path().join("nope"), Some("cat.png")) {
            Err(FeedError::Storage { .. }) => {}
            other => panic!("expected storage error, got {:?}", other),
        }
    }
}
