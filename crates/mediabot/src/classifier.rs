use std::sync::OnceLock;
use regex::Regex;
use url::Url;
use crate::config::BotConfig;

/// Hosts of the chat platform itself; links to them are never media
const PLATFORM_HOSTS: &[&str] = &["t.me", "telegram.me"];

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("static URL pattern compiles"))
}

/// Find every http(s) link in a message, in order of appearance
pub fn extract_urls(text: &str) -> Vec<String> {
    url_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Check if a link points back into the chat platform
pub fn is_platform_link(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => {
            let host = host.to_lowercase();
            PLATFORM_HOSTS
                .iter()
                .any(|p| host == *p || host.ends_with(&format!(".{}", p)))
        }
        None => false,
    }
}

/// Cheap pre-filter deciding whether a URL is worth probing
///
/// Only string inspection, no network. False positives are fine (the
/// resolver rejects them later); false negatives silently drop a link.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    domains: Vec<String>,
    extensions: Vec<String>,
}

impl UrlClassifier {
    pub fn new<D, E>(domains: D, extensions: E) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        UrlClassifier {
            domains: domains.into_iter().map(|d| d.as_ref().to_lowercase()).collect(),
            extensions: extensions.into_iter().map(|e| e.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn from_config(cfg: &BotConfig) -> Self {
        Self::new(&cfg.supported_domains, &cfg.video_extensions)
    }

    /// True when the host contains an allow-listed domain or the path ends with a media extension
    pub fn looks_like_media(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        if let Some(host) = parsed.host_str() {
            let host = host.to_lowercase();
            if self.domains.iter().any(|d| host.contains(d.as_str())) {
                return true;
            }
        }

        let path = parsed.path().to_lowercase();
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::from_config(&BotConfig::default_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_SUPPORTED_DOMAINS, DEFAULT_VIDEO_EXTENSIONS};
    use proptest::prelude::*;

    #[test]
    fn test_classification_table() {
        let classifier = UrlClassifier::default();
        let cases = [
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", true),
            ("https://youtu.be/dQw4w9WgXcQ", true),
            ("https://vm.tiktok.com/ZMabc/", true),
            ("https://X.com/user/status/1", true),
            ("https://old.reddit.com/r/videos/comments/abc", true),
            ("https://cdn.example.org/media/clip.MP4", true),
            ("https://cdn.example.org/media/clip.webm?token=1", true),
            ("https://example.org/live/stream.ts", true),
            ("https://example.org/article.html", false),
            ("https://example.org/", false),
            // extension only counts in the path, not in the query
            ("https://example.org/watch?file=clip.mp4", false),
            // domain only counts in the host, not in the path
            ("https://example.org/youtube.com/clip", false),
            ("not a url", false),
        ];
        for (url, expected) in cases {
            assert_eq!(classifier.looks_like_media(url), expected, "url: {}", url);
        }
    }

    #[test]
    fn test_extract_urls_stops_at_delimiters() {
        let text = "look <https://youtu.be/abc> and \"https://x.com/a/status/1\" or https://example.org/v.mp4, bye";
        assert_eq!(
            extract_urls(text),
            vec![
                "https://youtu.be/abc".to_string(),
                "https://x.com/a/status/1".to_string(),
                "https://example.org/v.mp4,".to_string(),
            ]
        );
        assert!(extract_urls("no links here, just ftp://host/file").is_empty());
    }

    #[test]
    fn test_platform_links() {
        assert!(is_platform_link("https://t.me/somechannel/42"));
        assert!(is_platform_link("https://telegram.me/joinchat/xyz"));
        assert!(!is_platform_link("https://art.media.com/clip.mp4"));
        assert!(!is_platform_link("https://youtube.com/watch?v=1"));
    }

    fn host_label() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,10}"
    }

    fn path_segment() -> impl Strategy<Value = String> {
        "[a-z0-9_]{1,12}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Any host containing an allow-listed domain is accepted whatever the path
        #[test]
        fn test_listed_domain_always_matches(
            prefix in host_label(),
            domain in proptest::sample::select(DEFAULT_SUPPORTED_DOMAINS),
            segment in path_segment(),
        ) {
            let classifier = UrlClassifier::default();
            let url = format!("https://{}.{}/{}", prefix, domain, segment);
            prop_assert!(classifier.looks_like_media(&url), "rejected {}", url);
        }

        /// Any path ending with a listed extension is accepted whatever the host
        #[test]
        fn test_listed_extension_always_matches(
            host in host_label(),
            segment in path_segment(),
            ext in proptest::sample::select(DEFAULT_VIDEO_EXTENSIONS),
        ) {
            let classifier = UrlClassifier::default();
            let url = format!("https://{}.invalid/{}{}", host, segment, ext);
            prop_assert!(classifier.looks_like_media(&url), "rejected {}", url);
        }

        /// With neither a listed domain nor a listed extension, nothing matches
        #[test]
        fn test_unlisted_never_matches(
            host in host_label(),
            segment in path_segment(),
        ) {
            let classifier = UrlClassifier::new(["example-media.net"], [".mp4"]);
            let url = format!("https://{}.invalid/{}.html", host, segment);
            prop_assert!(!classifier.looks_like_media(&url), "accepted {}", url);
        }
    }
}
