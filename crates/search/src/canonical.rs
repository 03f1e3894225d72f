//! URL canonicalisation, matching the original `canonicalizeURL` exactly:
//! lowercase scheme/host, default scheme to https, strip the fragment,
//! drop tracking query params, and normalise the trailing slash.

use url::Url;

const TRACKING_EXACT: &[&str] = &["fbclid", "gclid", "ref"];

pub fn canonicalize(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok().or_else(|| {
        // Mirror Go's url.Parse leniency: a scheme-less URL still parses
        // there, so retry with an assumed https scheme here.
        Url::parse(&format!("https://{raw}")).ok()
    })?;

    let host = parsed.host_str()?.to_lowercase();
    let scheme = if parsed.scheme().is_empty() {
        "https".to_string()
    } else {
        parsed.scheme().to_lowercase()
    };

    let mut out = Url::parse(&format!("{scheme}://{host}")).ok()?;
    if let Some(port) = parsed.port() {
        let _ = out.set_port(Some(port));
    }

    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| {
            let lower = k.to_lowercase();
            !(lower.starts_with("utm_") || TRACKING_EXACT.contains(&lower.as_str()))
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut path = parsed.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }
    out.set_path(&path);

    if retained.is_empty() {
        out.set_query(None);
    } else {
        let mut qp = out.query_pairs_mut();
        qp.clear();
        for (k, v) in &retained {
            qp.append_pair(k, v);
        }
    }
    out.set_fragment(None);

    Some(out.to_string())
}

/// Extracts a bare, lowercased host for display (source cards, dedup by
/// domain), matching the original's `domainFromURL`.
pub fn domain_from_url(raw: &str) -> String {
    let parsed = Url::parse(raw)
        .ok()
        .or_else(|| Url::parse(&format!("https://{raw}")).ok());
    let Some(parsed) = parsed else {
        return raw.to_string();
    };
    let host = parsed.host_str().unwrap_or(raw).to_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_from_url_strips_www_and_scheme() {
        assert_eq!(domain_from_url("https://www.Example.com/a/b"), "example.com");
        assert_eq!(domain_from_url("example.org"), "example.org");
    }

    #[test]
    fn strips_fragment_and_tracking_params() {
        let got = canonicalize("https://Example.com/a/?utm_source=x&utm_medium=y#frag").unwrap();
        assert_eq!(got, "https://example.com/a");
    }

    #[test]
    fn keeps_non_tracking_query_params() {
        let got = canonicalize("https://example.com/search?q=rust&gclid=abc").unwrap();
        assert_eq!(got, "https://example.com/search?q=rust");
    }

    #[test]
    fn defaults_scheme_and_root_path() {
        let got = canonicalize("example.com").unwrap();
        assert_eq!(got, "https://example.com/");
    }

    #[test]
    fn is_idempotent() {
        let once = canonicalize("https://Example.com/a/?ref=x#top").unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn drops_fbclid_gclid_ref_case_insensitively() {
        let got = canonicalize("https://example.com/p?FBCLID=1&GCLID=2&REF=3&q=keep").unwrap();
        assert_eq!(got, "https://example.com/p?q=keep");
    }
}
