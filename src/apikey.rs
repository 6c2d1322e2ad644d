use parking_lot::RwLock;
use std::{collections::HashMap, fs, path::PathBuf, time::SystemTime};

/// Bearer-token registry backed by a JSON file of `{ "token": "client name" }`.
///
/// The file is operator-edited while the service runs, so a small in-memory
/// map is kept and reloaded whenever the file mtime changes. A missing or
/// broken file means "no valid tokens", never a crash.
#[derive(Default)]
pub struct ApiKeys {
    path: PathBuf,
    mtime: RwLock<Option<SystemTime>>,
    inner: RwLock<HashMap<String, String>>, // token -> client name
}

impl ApiKeys {
    pub fn load(path: Option<&str>) -> std::io::Result<Self> {
        let path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/api_keys.json"));

        let this = Self {
            path,
            mtime: RwLock::new(None),
            inner: RwLock::new(HashMap::new()),
        };
        // best-effort preload
        this.refresh();
        Ok(this)
    }

    fn refresh(&self) {
        let meta = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(_) => {
                *self.inner.write() = HashMap::new();
                *self.mtime.write() = None;
                return;
            }
        };

        let mtime = meta.modified().ok();
        let prev = *self.mtime.read();
        if mtime.is_some() && mtime == prev {
            return;
        }

        if let Ok(text) = fs::read_to_string(&self.path) {
            if let Ok(map) = serde_json::from_str::<HashMap<String, String>>(&text) {
                *self.inner.write() = map;
                *self.mtime.write() = mtime;
                return;
            }
        }

        // broken JSON is treated as an empty registry
        *self.inner.write() = HashMap::new();
        *self.mtime.write() = mtime;
    }

    pub fn validate(&self, token: &str) -> bool {
        self.refresh();
        self.inner.read().contains_key(token)
    }

    pub fn name(&self, token: &str) -> Option<String> {
        self.refresh();
        self.inner.read().get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn missing_file_means_no_valid_tokens() {
        let keys = ApiKeys::load(Some("/nonexistent/api_keys.json")).unwrap();
        assert!(!keys.validate("anything"));
        assert!(keys.name("anything").is_none());
    }

    #[test]
    fn tokens_load_and_resolve_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.json");
        fs::write(&path, r#"{"tok_abc":"Studio A"}"#).unwrap();

        let keys = ApiKeys::load(path.to_str()).unwrap();
        assert!(keys.validate("tok_abc"));
        assert_eq!(keys.name("tok_abc").as_deref(), Some("Studio A"));
        assert!(!keys.validate("tok_xyz"));
    }

    #[test]
    fn broken_json_is_an_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.json");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(b"{nope").unwrap();

        let keys = ApiKeys::load(path.to_str()).unwrap();
        assert!(!keys.validate("tok_abc"));
    }
}
