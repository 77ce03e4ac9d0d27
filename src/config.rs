use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub address: String,
    pub data_file: PathBuf,
    pub upload_dir: PathBuf,
    pub public_url: String,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Self {
            address: try_load(&lookup, "NEWSFEED_ADDRESS", "localhost:5000"),
            data_file: try_load(&lookup, "NEWSFEED_DATA_FILE", "database/news.json").into(),
            upload_dir: try_load(&lookup, "NEWSFEED_UPLOAD_DIR", "public/uploads").into(),
            public_url: try_load(&lookup, "NEWSFEED_PUBLIC_URL", "http://localhost:5000"),
        }
    }
}

fn try_load<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: &str) -> String {
    match lookup(key) {
        Some(ref value) if !value.trim().is_empty() => value.trim().to_string(),
        Some(_) => {
            warn!("{} is empty, using default: {}", key, default);
            default.to_string()
        }
        None => {
            info!("{} not set, using default: {}", key, default);
            default.to_string()
        }
    }
}
