//! Disk cache for AI layout responses.
//!
//! Layout requests are comparatively expensive and strictly deterministic in
//! their inputs, so responses are keyed by a SHA-256 over the image bytes and
//! the canonical form encoding:
//!   {LAYOUT_CACHE_DIR}/{key}_layout.json
//! Everything here is best-effort; callers fall through to the live path on
//! any error.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::layout::{FlyerForm, LayoutData};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cache miss: {0}")]
    Miss(String),
}

#[derive(Clone, Debug)]
pub struct LayoutCache {
    key: String,
    path: PathBuf,
}

impl LayoutCache {
    pub fn new(image_b64: &str, form: &FlyerForm) -> Self {
        Self::in_dir(&cache_dir(), image_b64, form)
    }

    pub fn in_dir(dir: &Path, image_b64: &str, form: &FlyerForm) -> Self {
        let key = cache_key(image_b64, form);
        let path = dir.join(format!("{key}_layout.json"));
        Self { key, path }
    }

    /// Caching is on unless LAYOUT_CACHE=0.
    pub fn enabled() -> bool {
        let v = std::env::var("LAYOUT_CACHE").unwrap_or_else(|_| "1".to_string());
        !(v == "0" || v.eq_ignore_ascii_case("false"))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<LayoutData, CacheError> {
        if !self.exists() {
            return Err(CacheError::Miss(self.key.clone()));
        }
        let text = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, data: &LayoutData) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pretty = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, pretty)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn cache_key(image_b64: &str, form: &FlyerForm) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_b64.as_bytes());
    hasher.update([0u8]);
    // field order is fixed by the struct, so this encoding is canonical
    hasher.update(serde_json::to_vec(form).unwrap_or_default());
    hex::encode(hasher.finalize())
}

pub fn cache_dir() -> PathBuf {
    if let Ok(p) = std::env::var("LAYOUT_CACHE_DIR") {
        return PathBuf::from(p);
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join("layout_cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback;

    fn sample_form() -> FlyerForm {
        FlyerForm {
            titulo: "Promoção".into(),
            whatsapp: "11999999999".into(),
            ..FlyerForm::default()
        }
    }

    #[test]
    fn key_is_stable_and_input_sensitive() {
        let form = sample_form();
        assert_eq!(cache_key("abc", &form), cache_key("abc", &form));
        assert_ne!(cache_key("abc", &form), cache_key("abd", &form));

        let mut other = form.clone();
        other.titulo.push('!');
        assert_ne!(cache_key("abc", &form), cache_key("abc", &other));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let form = sample_form();
        let cache = LayoutCache::in_dir(dir.path(), "abc", &form);

        assert!(!cache.exists());
        assert!(matches!(cache.load(), Err(CacheError::Miss(_))));

        let data = fallback::default_layout(&form);
        cache.save(&data).unwrap();
        assert!(cache.exists());
        assert_eq!(cache.load().unwrap(), data);
    }

    #[test]
    fn corrupt_entries_surface_as_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LayoutCache::in_dir(dir.path(), "abc", &sample_form());
        std::fs::write(cache.path(), "{broken").unwrap();
        assert!(matches!(cache.load(), Err(CacheError::Json(_))));
    }
}
