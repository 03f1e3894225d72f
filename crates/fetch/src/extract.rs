//! Content-type classification and plain-text extraction, matching the
//! original's `extractText`/`stripTags`/`isTextContentType`/`isPDFContentType`.

use regex::Regex;
use std::sync::OnceLock;

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap())
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap())
}

fn style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap())
}

fn noscript_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").unwrap())
}

pub fn strip_tags(input: &str) -> String {
    tag_re().replace_all(input, " ").to_string()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns `(title, plain_text)`.
pub fn extract_text(input: &str) -> (String, String) {
    let title = title_re()
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| normalize_whitespace(&strip_tags(m.as_str())))
        .unwrap_or_default();

    let mut clean = title_re().replace_all(input, " ").to_string();
    clean = script_re().replace_all(&clean, " ").to_string();
    clean = style_re().replace_all(&clean, " ").to_string();
    clean = noscript_re().replace_all(&clean, " ").to_string();
    clean = strip_tags(&clean);

    (title, normalize_whitespace(&clean))
}

/// Drops NULs and replaces invalid UTF-8 sequences with a space, matching
/// `sanitizeUTF8`. Input is already a Rust `String` (always valid UTF-8),
/// so this only needs to strip embedded NULs.
pub fn sanitize_utf8(input: &str) -> String {
    if input.is_empty() {
        return input.to_string();
    }
    input.chars().filter(|&c| c != '\0').collect()
}

pub fn is_text_content_type(content_type: &str) -> bool {
    let ct = content_type.trim().to_lowercase();
    if ct.contains("text/html") || ct.contains("text/plain") || ct.contains("application/xhtml+xml")
    {
        return true;
    }
    if ct.is_empty() {
        return true;
    }
    ct.starts_with("text/")
}

pub fn is_pdf_content_type(content_type: &str, url: &str) -> bool {
    let ct = content_type.trim().to_lowercase();
    if ct.contains("application/pdf") {
        return true;
    }
    url.to_lowercase().ends_with(".pdf")
}

fn link_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(href|src)(\s*=\s*)"([^"]*)""#).unwrap())
}

/// Rewrites `href`/`src` attribute values to absolute URLs against
/// `base_url`, matching the original's `converter.WithDomain(sourceURL)`
/// so relative links survive HTML-to-Markdown conversion.
pub fn absolutize_links(html: &str, base_url: &str) -> String {
    let Ok(base) = url::Url::parse(base_url) else {
        return html.to_string();
    };
    link_attr_re()
        .replace_all(html, |caps: &regex::Captures| {
            let attr = &caps[1];
            let eq = &caps[2];
            let value = &caps[3];
            match base.join(value) {
                Ok(resolved) => format!(r#"{attr}{eq}"{resolved}""#),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_strips_scripts_styles() {
        let html = "<html><head><title> Hello <b>World</b> </title><script>bad()</script><style>.x{}</style></head><body><p>Text here</p></body></html>";
        let (title, text) = extract_text(html);
        assert_eq!(title, "Hello World");
        assert_eq!(text, "Text here");
    }

    #[test]
    fn collapses_whitespace_runs() {
        let (_, text) = extract_text("<p>a\n\n   b\t\tc</p>");
        assert_eq!(text, "a b c");
    }

    #[test]
    fn sanitize_drops_nul_bytes() {
        assert_eq!(sanitize_utf8("a\0b"), "ab");
    }

    #[test]
    fn absolutize_links_resolves_relative_href_and_src() {
        let html = r#"<a href="/about">About</a><img src="thumb.png">"#;
        let out = absolutize_links(html, "https://example.com/blog/post");
        assert!(out.contains(r#"href="https://example.com/about""#));
        assert!(out.contains(r#"src="https://example.com/blog/thumb.png""#));
    }

    #[test]
    fn absolutize_links_leaves_absolute_urls_untouched() {
        let html = r#"<a href="https://other.example/page">link</a>"#;
        let out = absolutize_links(html, "https://example.com/blog/post");
        assert!(out.contains(r#"href="https://other.example/page""#));
    }

    #[test]
    fn content_type_classification() {
        assert!(is_text_content_type("text/html; charset=utf-8"));
        assert!(is_text_content_type(""));
        assert!(!is_text_content_type("image/png"));
        assert!(is_pdf_content_type("application/pdf", "https://x.com/a"));
        assert!(is_pdf_content_type("", "https://x.com/a.PDF"));
        assert!(!is_pdf_content_type("text/html", "https://x.com/a"));
    }
}
