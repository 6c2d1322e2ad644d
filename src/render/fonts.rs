//! Font file resolution and process-wide font cache.
//!
//! Layouts name fonts the way CSS does ("Arial Black", bold). Files live in
//! FONTS_DIR (default: {manifest}/assets/fonts) named after the family with
//! spaces removed, e.g. ArialBlack-Bold.ttf / ArialBlack.ttf. Unknown
//! families fall back to FLYER_DEFAULT_FONT.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusttype::Font;
use std::{collections::HashMap, path::PathBuf, sync::Arc};

use super::RenderError;

const DEFAULT_FONT_FILE: &str = "Arial.ttf";

static FONT_CACHE: Lazy<Mutex<HashMap<String, Arc<Font<'static>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn fonts_dir() -> PathBuf {
    if let Ok(p) = std::env::var("FONTS_DIR") {
        return PathBuf::from(p);
    }
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join("fonts")
}

fn default_font_file() -> String {
    std::env::var("FLYER_DEFAULT_FONT").unwrap_or_else(|_| DEFAULT_FONT_FILE.to_string())
}

pub fn is_bold(weight: &str) -> bool {
    matches!(
        weight.trim().to_ascii_lowercase().as_str(),
        "bold" | "bolder" | "600" | "700" | "800" | "900"
    )
}

/// Candidate file names, most specific first. The default font is appended
/// last so a misnamed family still renders something.
pub fn candidates(family: &str, weight: &str) -> Vec<String> {
    let fam: String = family.split_whitespace().collect();
    let mut out = Vec::new();
    if !fam.is_empty() {
        if is_bold(weight) {
            out.push(format!("{fam}-Bold.ttf"));
        }
        out.push(format!("{fam}.ttf"));
    }
    let fallback = default_font_file();
    if !out.contains(&fallback) {
        out.push(fallback);
    }
    out
}

pub fn resolve(family: &str, weight: &str) -> Result<Arc<Font<'static>>, RenderError> {
    for name in candidates(family, weight) {
        match load_font_cached(&name) {
            Ok(f) => return Ok(f),
            Err(_) => continue,
        }
    }
    Err(RenderError::Font(format!(
        "no usable font for family '{family}' in {}",
        fonts_dir().display()
    )))
}

fn load_font_cached(name: &str) -> Result<Arc<Font<'static>>, RenderError> {
    if let Some(f) = FONT_CACHE.lock().get(name) {
        return Ok(Arc::clone(f));
    }

    let bytes = std::fs::read(fonts_dir().join(name))
        .map_err(|e| RenderError::Font(format!("failed to read font {name}: {e}")))?;
    let f = Font::try_from_vec(bytes)
        .ok_or_else(|| RenderError::Font(format!("failed to parse font {name}")))?;

    let f = Arc::new(f);
    FONT_CACHE.lock().insert(name.to_string(), Arc::clone(&f));
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_classification() {
        assert!(is_bold("bold"));
        assert!(is_bold("700"));
        assert!(is_bold(" Bold "));
        assert!(!is_bold("normal"));
        assert!(!is_bold("400"));
        assert!(!is_bold(""));
    }

    #[test]
    fn candidate_order_prefers_specific_files() {
        assert_eq!(
            candidates("Arial Black", "bold"),
            vec!["ArialBlack-Bold.ttf", "ArialBlack.ttf", "Arial.ttf"]
        );
        assert_eq!(candidates("Impact", "normal"), vec!["Impact.ttf", "Arial.ttf"]);
        // empty family goes straight to the default
        assert_eq!(candidates("", "bold"), vec!["Arial.ttf"]);
    }

    #[test]
    fn default_family_does_not_duplicate_fallback() {
        assert_eq!(candidates("Arial", "normal"), vec!["Arial.ttf"]);
    }
}
