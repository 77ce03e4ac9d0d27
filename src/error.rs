use std::io;
use std::path::{Path, PathBuf};

use iron::status::{self, Status};
use iron::Response;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to access {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON data in feed file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FeedError {
    pub fn storage(path: &Path, source: io::Error) -> FeedError {
        FeedError::Storage { path: path.to_path_buf(), source: source }
    }

    pub fn status(&self) -> Status {
        match *self {
            FeedError::Validation(_) => status::BadRequest,
            FeedError::NotFound(_) => status::NotFound,
            FeedError::Storage { .. } | FeedError::Corrupt { .. } => status::InternalServerError,
        }
    }

    /// What the client is told. Storage failures keep file paths and
    /// parser details in the log only.
    pub fn client_message(&self) -> String {
        match *self {
            FeedError::Validation(ref message) | FeedError::NotFound(ref message) => message.clone(),
            FeedError::Storage { .. } => "Failed to access news feed".to_string(),
            FeedError::Corrupt { .. } => "Invalid JSON data".to_string(),
        }
    }

    /// The `{"error": ...}` response sent back for this error.
    pub fn to_response(&self) -> Response {
        match *self {
            FeedError::Validation(_) | FeedError::NotFound(_) => warn!("Rejected request: {}", self),
            _ => error!("{}", self),
        }
        let payload = json!({ "error": self.client_message() }).to_string();
        Response::with((self.status(), payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_http_status() {
        assert_eq!(FeedError::Validation("missing".into()).status(), status::BadRequest);
        assert_eq!(FeedError::NotFound("Post not found".into()).status(), status::NotFound);

        let storage = FeedError::storage(Path::new("news.json"),
                                         io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(storage.status(), status::InternalServerError);
        assert!(storage.to_string().contains("news.json"));
    }

    #[test]
    fn response_carries_status() {
        let response = FeedError::NotFound("Post not found".into()).to_response();
        assert_eq!(response.status, Some(status::NotFound));
    }

    #[test]
    fn storage_details_stay_out_of_client_message() {
        let storage = FeedError::storage(Path::new("/var/lib/feed/news.json"),
                                         io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(storage.client_message(), "Failed to access news feed");
        assert!(storage.to_string().contains("/var/lib/feed/news.json"));

        let source = serde_json::from_str::<serde_json::Value>("[{").unwrap_err();
        let corrupt = FeedError::Corrupt {
            path: PathBuf::from("/var/lib/feed/news.json"),
            source: source,
        };
        assert_eq!(corrupt.client_message(), "Invalid JSON data");

        assert_eq!(FeedError::NotFound("Post not found".into()).client_message(), "Post not found");
    }
}
