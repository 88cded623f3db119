use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use tracing::debug;

const SOCIAL_HOSTS: &[&str] = &["twitter.com", "x.com", "mobile.twitter.com"];

static POST_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"status/(\d+)").unwrap());

/// How a detail view should present an outbound link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", content = "target", rename_all = "snake_case")]
pub enum RenderStrategy {
    /// Embedded post, by post id.
    SocialEmbed(String),
    SocialLinkFallback(String),
    FrameEmbed(String),
    PlainLink(String),
}

/// Pick a strategy for `url`. Never fails: anything unrecognised is a
/// plain link.
pub fn classify(url: &str, embed_mode: bool, frame_failed: bool) -> RenderStrategy {
    let Some(host) = host_of(url) else {
        return RenderStrategy::PlainLink(url.to_string());
    };

    if SOCIAL_HOSTS.contains(&host.as_str()) {
        return match post_id(url) {
            Some(id) => RenderStrategy::SocialEmbed(id.to_string()),
            None => RenderStrategy::SocialLinkFallback(url.to_string()),
        };
    }

    if embed_mode && !frame_failed {
        RenderStrategy::FrameEmbed(url.to_string())
    } else {
        RenderStrategy::PlainLink(url.to_string())
    }
}

/// Lowercased host without a leading `www.`.
fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    })
}

fn post_id(url: &str) -> Option<&str> {
    POST_ID_RE.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Embed state for one rendered detail view.
///
/// Once the frame reports a load error the view sticks to a plain link for
/// the rest of its life.
#[derive(Debug, Clone)]
pub struct EmbedView {
    url: String,
    embed_mode: bool,
    frame_failed: bool,
}

impl EmbedView {
    pub fn new(url: impl Into<String>, embed_mode: bool) -> Self {
        Self {
            url: url.into(),
            embed_mode,
            frame_failed: false,
        }
    }

    pub fn strategy(&self) -> RenderStrategy {
        classify(&self.url, self.embed_mode, self.frame_failed)
    }

    pub fn report_frame_failure(&mut self) {
        if !self.frame_failed {
            debug!("Frame failed to load {}, falling back to a link", self.url);
            self.frame_failed = true;
        }
    }

    pub fn frame_failed(&self) -> bool {
        self.frame_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_with_status_id() {
        assert_eq!(
            classify("https://x.com/user/status/12345", false, false),
            RenderStrategy::SocialEmbed("12345".into())
        );
    }

    #[test]
    fn social_without_status() {
        assert_eq!(
            classify("https://x.com/user", true, false),
            RenderStrategy::SocialLinkFallback("https://x.com/user".into())
        );
    }

    #[test]
    fn social_hosts_normalised() {
        for url in [
            "https://WWW.Twitter.com/a/status/7",
            "https://mobile.twitter.com/a/status/7?s=20",
            "http://www.x.com/a/status/7/photo/1",
        ] {
            assert_eq!(classify(url, false, false), RenderStrategy::SocialEmbed("7".into()), "{}", url);
        }
    }

    #[test]
    fn lookalike_hosts_are_not_social() {
        for url in ["https://notx.com/a/status/1", "https://x.com.evil.io/a/status/1", "https://api.twitter.com/status/1"] {
            assert_eq!(classify(url, false, false), RenderStrategy::PlainLink(url.into()), "{}", url);
        }
    }

    #[test]
    fn first_digit_run_wins() {
        assert_eq!(
            classify("https://twitter.com/a/status/111/status/222", false, false),
            RenderStrategy::SocialEmbed("111".into())
        );
    }

    #[test]
    fn frame_only_when_requested() {
        let url = "https://example.com/page";
        assert_eq!(classify(url, true, false), RenderStrategy::FrameEmbed(url.into()));
        assert_eq!(classify(url, false, false), RenderStrategy::PlainLink(url.into()));
        assert_eq!(classify(url, true, true), RenderStrategy::PlainLink(url.into()));
    }

    #[test]
    fn malformed_url_is_plain_link() {
        for url in ["not a url", "", "https://", "//x.com/a/status/1"] {
            assert_eq!(classify(url, true, false), RenderStrategy::PlainLink(url.into()), "{:?}", url);
        }
    }

    #[test]
    fn frame_failure_is_permanent() {
        let mut view = EmbedView::new("https://example.com/page", true);
        assert_eq!(view.strategy(), RenderStrategy::FrameEmbed("https://example.com/page".into()));

        view.report_frame_failure();
        assert!(view.frame_failed());
        assert_eq!(view.strategy(), RenderStrategy::PlainLink("https://example.com/page".into()));

        view.report_frame_failure();
        assert_eq!(view.strategy(), RenderStrategy::PlainLink("https://example.com/page".into()));
    }

    #[test]
    fn frame_failure_does_not_touch_social() {
        let mut view = EmbedView::new("https://x.com/a/status/9", true);
        view.report_frame_failure();
        assert_eq!(view.strategy(), RenderStrategy::SocialEmbed("9".into()));
    }

    #[test]
    fn views_are_independent() {
        let mut first = EmbedView::new("https://example.com/page", true);
        let second = EmbedView::new("https://example.com/page", true);
        first.report_frame_failure();
        assert!(matches!(second.strategy(), RenderStrategy::FrameEmbed(_)));
    }

    #[test]
    fn strategy_serialises_tagged() {
        let json = serde_json::to_value(RenderStrategy::SocialEmbed("5".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "strategy": "social_embed", "target": "5" }));
    }
}
