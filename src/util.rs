use base64::Engine;

/// Strip an optional `data:image/...;base64,` prefix and return the payload.
pub fn parse_data_uri(input: &str) -> Option<String> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(rest) = s.strip_prefix("data:") {
        let (_, b64) = rest.split_once(',')?;
        return Some(b64.trim().to_string());
    }
    // assume plain base64
    Some(s.to_string())
}

pub fn b64_decode(input: &str) -> Option<Vec<u8>> {
    let b64 = parse_data_uri(input)?;
    let engine = base64::engine::general_purpose::STANDARD;
    engine.decode(b64.as_bytes()).ok()
}

/// Cap a string at `max_len` characters, ellipsizing. Counts chars, not
/// bytes: form text is frequently accented Portuguese.
pub fn truncate_with_ellipsis(s: String, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        return s;
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    kept + "..."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_prefix_is_stripped() {
        assert_eq!(
            parse_data_uri("data:image/png;base64,aGVsbG8=").as_deref(),
            Some("aGVsbG8=")
        );
        assert_eq!(parse_data_uri("aGVsbG8=").as_deref(), Some("aGVsbG8="));
        assert!(parse_data_uri("   ").is_none());
    }

    #[test]
    fn b64_decode_handles_both_forms() {
        assert_eq!(b64_decode("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(b64_decode("data:image/png;base64,aGVsbG8=").unwrap(), b"hello");
        assert!(b64_decode("not!!base64").is_none());
    }

    #[test]
    fn truncation_is_char_boundary_safe() {
        let s = "promoção de inauguração".to_string();
        let t = truncate_with_ellipsis(s, 10);
        assert_eq!(t.chars().count(), 10);
        assert!(t.ends_with("..."));

        assert_eq!(truncate_with_ellipsis("curto".into(), 10), "curto");
        assert_eq!(truncate_with_ellipsis("abcdef".into(), 3), "...");
    }
}
