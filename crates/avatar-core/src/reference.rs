//! Image reference classification.
//!
//! Decides whether an input string names a local file, a direct image URL,
//! or an image-search detail page that wraps the real image URL in a query
//! parameter, and extracts that inner URL. Pure string work: nothing here
//! touches the filesystem or the network.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use url::Url;

const NETWORK_SCHEMES: [&str; 2] = ["http://", "https://"];

/// A search engine whose detail pages carry the real image URL in a query parameter.
struct SearchSignature {
    /// Registrable domain; subdomains match too.
    domain: &'static str,
    /// Query parameter holding the image URL.
    carrier: &'static str,
    /// The carrier value is percent-encoded a second time inside the query.
    nested_encoding: bool,
}

static SEARCH_SIGNATURES: [SearchSignature; 4] = [
    SearchSignature { domain: "baidu.com", carrier: "objurl", nested_encoding: true },
    SearchSignature { domain: "google.com", carrier: "imgurl", nested_encoding: false },
    SearchSignature { domain: "googleusercontent.com", carrier: "imgurl", nested_encoding: false },
    SearchSignature { domain: "bing.com", carrier: "mediaurl", nested_encoding: false },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    LocalFile,
    DirectUrl,
    IndirectSearchUrl,
}

/// A classified image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    pub raw: String,
    pub kind: ReferenceKind,
    /// Set only for [`ReferenceKind::IndirectSearchUrl`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
}

impl ImageReference {
    /// The string to hand to the detector: the extracted URL when there is one.
    pub fn target(&self) -> &str {
        self.resolved_url.as_deref().unwrap_or(&self.raw)
    }

    pub fn is_remote(&self) -> bool {
        self.kind != ReferenceKind::LocalFile
    }
}

/// Classify a raw image reference. Never fails: anything that is not an
/// http(s) URL is a local path, and unparsable URLs are direct URLs.
pub fn classify(raw: &str) -> ImageReference {
    let reference = classify_inner(raw);
    tracing::debug!(
        kind = ?reference.kind,
        resolved = reference.resolved_url.as_deref(),
        "classified image reference"
    );
    reference
}

fn classify_inner(raw: &str) -> ImageReference {
    let plain = |kind| ImageReference { raw: raw.to_string(), kind, resolved_url: None };

    if !has_network_scheme(raw) {
        return plain(ReferenceKind::LocalFile);
    }
    let Ok(url) = Url::parse(raw) else {
        return plain(ReferenceKind::DirectUrl);
    };
    let Some(signature) = match_signature(&url) else {
        return plain(ReferenceKind::DirectUrl);
    };

    let resolved = extract_carrier(&url, signature).unwrap_or_else(|| {
        tracing::debug!(
            carrier = signature.carrier,
            "carrier parameter unusable; keeping the raw reference"
        );
        raw.to_string()
    });

    ImageReference {
        raw: raw.to_string(),
        kind: ReferenceKind::IndirectSearchUrl,
        resolved_url: Some(resolved),
    }
}

fn has_network_scheme(raw: &str) -> bool {
    NETWORK_SCHEMES.iter().any(|scheme| {
        raw.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn match_signature(url: &Url) -> Option<&'static SearchSignature> {
    let host = url.host_str()?.to_ascii_lowercase();
    SEARCH_SIGNATURES.iter().find(|sig| {
        host_matches(&host, sig.domain) && url.query_pairs().any(|(key, _)| key == sig.carrier)
    })
}

/// Pull the carrier value out of the query. `None` when it is empty or
/// the nested decoding does not produce valid UTF-8.
fn extract_carrier(url: &Url, signature: &SearchSignature) -> Option<String> {
    let value = url
        .query_pairs()
        .find(|(key, _)| key == signature.carrier)
        .map(|(_, value)| value.into_owned())?;
    if value.is_empty() {
        return None;
    }
    if !signature.nested_encoding {
        return Some(value);
    }
    urlencoding::decode(&value).ok().map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAIDU_DETAIL: &str = "https://image.baidu.com/search/detail?adpicid=0&cs=1850186389%2C55921271\
        &fromurl=http%253A%252F%252Fwww.duitang.com%252Fblog%252F%253Fid%253D1512294406\
        &objurl=https%253A%252F%252Fc-ssl.dtstatic.com%252Fuploads%252Fblog%252F202402%252F07%252FV2SOZWG9Cmg0Vq2.thumb.1000_0.png\
        &pd=image_content&tn=baiduimagedetail&word=%E7%9C%9F%E4%BA%BA%E5%A4%B4%E5%83%8F&z=";

    #[test]
    fn test_direct_url() {
        let r = classify("http://x/y.jpg");
        assert_eq!(r.kind, ReferenceKind::DirectUrl);
        assert_eq!(r.resolved_url, None);
        assert_eq!(r.target(), "http://x/y.jpg");
    }

    #[test]
    fn test_local_paths() {
        assert_eq!(classify("/abs/path.jpg").kind, ReferenceKind::LocalFile);
        assert_eq!(classify("rel/path.jpg").kind, ReferenceKind::LocalFile);
        assert_eq!(classify("../imgs/avatar_0001.jpg").kind, ReferenceKind::LocalFile);
        assert_eq!(classify("").kind, ReferenceKind::LocalFile);
        assert!(!classify("a.png").is_remote());
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(classify("HTTPS://example.com/a.png").kind, ReferenceKind::DirectUrl);
    }

    #[test]
    fn test_non_ascii_input_does_not_panic() {
        assert_eq!(classify("头像.jpg").kind, ReferenceKind::LocalFile);
        assert_eq!(classify("ht头").kind, ReferenceKind::LocalFile);
    }

    #[test]
    fn test_baidu_detail_resolves_inner_url() {
        let r = classify(BAIDU_DETAIL);
        assert_eq!(r.kind, ReferenceKind::IndirectSearchUrl);
        assert_eq!(
            r.target(),
            "https://c-ssl.dtstatic.com/uploads/blog/202402/07/V2SOZWG9Cmg0Vq2.thumb.1000_0.png"
        );
        assert!(r.is_remote());
    }

    #[test]
    fn test_google_imgres_single_encoding() {
        let r = classify("https://www.google.com/imgres?imgurl=https%3A%2F%2Fcdn.example.org%2Fface.jpg&tbnid=x");
        assert_eq!(r.kind, ReferenceKind::IndirectSearchUrl);
        assert_eq!(r.resolved_url.as_deref(), Some("https://cdn.example.org/face.jpg"));
    }

    #[test]
    fn test_bing_detail_resolves_mediaurl() {
        let r = classify("https://www.bing.com/images/search?view=detailV2&mediaurl=https%3A%2F%2Fa.example%2Fb.jpg&q=face");
        assert_eq!(r.kind, ReferenceKind::IndirectSearchUrl);
        assert_eq!(r.target(), "https://a.example/b.jpg");
    }

    #[test]
    fn test_googleusercontent_host() {
        let r = classify("https://lh3.googleusercontent.com/imgres?imgurl=https%3A%2F%2Fa.example%2Fc.jpg");
        assert_eq!(r.kind, ReferenceKind::IndirectSearchUrl);
        assert_eq!(r.target(), "https://a.example/c.jpg");
    }

    #[test]
    fn test_host_match_ignores_case() {
        let r = classify("https://IMAGE.BAIDU.COM/search/detail?objurl=https%253A%252F%252Fa.example%252Fd.jpg");
        assert_eq!(r.kind, ReferenceKind::IndirectSearchUrl);
        assert_eq!(r.target(), "https://a.example/d.jpg");
    }

    #[test]
    fn test_search_host_without_carrier_is_direct() {
        let r = classify("https://image.baidu.com/search/index?word=avatar");
        assert_eq!(r.kind, ReferenceKind::DirectUrl);
    }

    #[test]
    fn test_carrier_on_unknown_host_is_direct() {
        let r = classify("https://notbaidu.com/detail?objurl=https%253A%252F%252Fa.b%252Fc.jpg");
        assert_eq!(r.kind, ReferenceKind::DirectUrl);
    }

    #[test]
    fn test_empty_carrier_falls_back_to_raw() {
        let raw = "https://image.baidu.com/search/detail?objurl=&pn=1";
        let r = classify(raw);
        assert_eq!(r.kind, ReferenceKind::IndirectSearchUrl);
        assert_eq!(r.resolved_url.as_deref(), Some(raw));
    }

    #[test]
    fn test_undecodable_carrier_falls_back_to_raw() {
        // %25FF decodes once to %FF, which is not valid UTF-8 on the second pass.
        let raw = "https://image.baidu.com/search/detail?objurl=%25FF%25FE";
        let r = classify(raw);
        assert_eq!(r.kind, ReferenceKind::IndirectSearchUrl);
        assert_eq!(r.target(), raw);
    }

    #[test]
    fn test_malformed_url_is_direct_and_unchanged() {
        let raw = "http://[::1/broken";
        let r = classify(raw);
        assert_eq!(r.kind, ReferenceKind::DirectUrl);
        assert_eq!(r.raw, raw);
        assert_eq!(r.target(), raw);
    }

    #[test]
    fn test_classification_is_deterministic() {
        for raw in [BAIDU_DETAIL, "http://x/y.jpg", "rel/path.jpg", "http://[::1/broken"] {
            assert_eq!(classify(raw), classify(raw));
        }
    }

    #[test]
    fn test_host_matching() {
        assert!(host_matches("baidu.com", "baidu.com"));
        assert!(host_matches("image.baidu.com", "baidu.com"));
        assert!(!host_matches("notbaidu.com", "baidu.com"));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_value(classify("rel/a.jpg")).unwrap();
        assert_eq!(json["kind"], "local_file");
        assert!(json.get("resolvedUrl").is_none());
    }
}
