use std::fmt;

use crate::content::{self, Category, ContentRecord};
use crate::embed::{EmbedView, RenderStrategy};

const BIO: &[&str] = &[
    "I am a software engineer passionate about building elegant solutions to complex problems.",
    "Currently focused on frontend development, creating meaningful digital experiences.",
];

fn format_date(record: &ContentRecord) -> String {
    record.date.format("%B %-d, %Y").to_string()
}

/// The `/` page: bio, newest insight, every update.
pub struct HomeView<'a> {
    pub latest_insight: Option<&'a ContentRecord>,
    pub updates: Vec<&'a ContentRecord>,
}

pub fn home(records: &[ContentRecord]) -> HomeView<'_> {
    HomeView {
        latest_insight: content::latest_insight(records),
        updates: content::filter_by_category(records, Category::Update),
    }
}

impl fmt::Display for HomeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "> About Me")?;
        for line in BIO {
            writeln!(f, "  {}", line)?;
        }

        writeln!(f, "\n> Latest Insight")?;
        match self.latest_insight {
            Some(r) => writeln!(f, "  {} ({})", r.title, format_date(r))?,
            None => writeln!(f, "  No insights yet.")?,
        }

        writeln!(f, "\n> Updates")?;
        if self.updates.is_empty() {
            writeln!(f, "  No updates yet.")?;
        }
        for r in &self.updates {
            writeln!(f, "  {:<14} {}  /updates/{}", format_date(r), r.title, r.id)?;
        }
        Ok(())
    }
}

/// The `/updates/{id}` page.
pub struct DetailView<'a> {
    pub update: Option<&'a ContentRecord>,
    pub embed: Option<EmbedView>,
}

/// Only updates resolve here; an insight id is "not found".
pub fn detail<'a>(records: &'a [ContentRecord], id: &str) -> DetailView<'a> {
    let update = content::by_id(records, id).filter(|r| r.category == Category::Update);
    let embed = update.and_then(|r| r.link.as_ref().map(|link| EmbedView::new(link.as_str(), r.embed_mode)));
    DetailView { update, embed }
}

impl DetailView<'_> {
    /// Called when the embedded frame could not load.
    pub fn report_frame_failure(&mut self) {
        if let Some(embed) = self.embed.as_mut() {
            embed.report_frame_failure();
        }
    }
}

impl fmt::Display for DetailView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "< Back to Home")?;
        let Some(update) = self.update else {
            return writeln!(f, "\nUpdate not found.");
        };

        writeln!(f, "\n{}", update.title)?;
        writeln!(f, "{}", format_date(update))?;
        writeln!(f, "[{}]\n", update.category)?;

        match &self.embed {
            Some(embed) => match embed.strategy() {
                RenderStrategy::SocialEmbed(id) => writeln!(f, "Embedded post {}", id),
                RenderStrategy::SocialLinkFallback(url) => writeln!(f, "Visit Tweet: {}", url),
                RenderStrategy::FrameEmbed(url) => {
                    writeln!(f, "Embedded: {}", url)?;
                    writeln!(f, "Open Original: {}", url)
                }
                RenderStrategy::PlainLink(url) => {
                    if embed.frame_failed() {
                        writeln!(f, "(embed unavailable)")?;
                    }
                    writeln!(f, "Visit Source: {}", url)
                }
            },
            None => writeln!(f, "No external link provided."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, category: Category, day: u32, link: Option<&str>, embed_mode: bool) -> ContentRecord {
        ContentRecord {
            id: id.into(),
            title: format!("Post {}", id),
            date: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            category,
            published: true,
            link: link.map(str::to_string),
            embed_mode,
        }
    }

    fn sample() -> Vec<ContentRecord> {
        vec![
            record("u1", Category::Update, 2, Some("https://example.com/post"), true),
            record("i1", Category::Insight, 5, None, false),
            record("u2", Category::Update, 9, Some("https://x.com/me/status/42"), false),
            record("u3", Category::Update, 1, None, false),
        ]
    }

    #[test]
    fn home_lists_updates_in_order() {
        let records = sample();
        let view = home(&records);
        assert_eq!(view.latest_insight.map(|r| r.id.as_str()), Some("i1"));
        let ids: Vec<&str> = view.updates.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["u1", "u2", "u3"]);

        let text = view.to_string();
        assert!(text.contains("> About Me"));
        assert!(text.contains("Post i1 (March 5, 2024)"));
        assert!(text.contains("/updates/u2"));
    }

    #[test]
    fn empty_home() {
        let text = home(&[]).to_string();
        assert!(text.contains("No insights yet."));
        assert!(text.contains("No updates yet."));
    }

    #[test]
    fn detail_frame_then_fallback() {
        let records = sample();
        let mut view = detail(&records, "u1");
        assert!(view.to_string().contains("Embedded: https://example.com/post"));

        view.report_frame_failure();
        let text = view.to_string();
        assert!(text.contains("(embed unavailable)"));
        assert!(text.contains("Visit Source: https://example.com/post"));
        assert!(!text.contains("Embedded:"));
    }

    #[test]
    fn detail_social_embed() {
        let records = sample();
        assert!(detail(&records, "u2").to_string().contains("Embedded post 42"));
    }

    #[test]
    fn detail_without_link() {
        let records = sample();
        let mut view = detail(&records, "u3");
        view.report_frame_failure();
        assert!(view.to_string().contains("No external link provided."));
    }

    #[test]
    fn detail_ignores_insights() {
        let records = sample();
        let view = detail(&records, "i1");
        assert!(view.update.is_none());
        assert!(view.to_string().contains("Update not found."));
    }

    #[test]
    fn detail_not_found() {
        let records = sample();
        let view = detail(&records, "missing");
        assert!(view.update.is_none());
        assert!(view.to_string().contains("Update not found."));
    }
}
