pub mod properties;

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::notion::snapshot::{Block, Collection, RecordMap};
use crate::notion::SnapshotSource;
use properties::RowProperties;

const UNTITLED: &str = "Untitled";
const TITLE_KEY: &str = "title";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Insight,
    Update,
}

impl Category {
    /// Anything whose label mentions "Insight" is an insight.
    pub fn from_label(label: &str) -> Self {
        if label.contains("Insight") {
            Category::Insight
        } else {
            Category::Update
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Insight => f.write_str("Insight"),
            Category::Update => f.write_str("Update"),
        }
    }
}

/// One published database row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecord {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub category: Category,
    pub published: bool,
    /// Only set on updates.
    pub link: Option<String>,
    pub embed_mode: bool,
}

/// Schema property ids for the columns we read, looked up by column name.
#[derive(Debug, Default)]
struct PropertyIds<'a> {
    published: Option<&'a str>,
    kind: Option<&'a str>,
    date: Option<&'a str>,
    link: Option<&'a str>,
    embed: Option<&'a str>,
}

impl<'a> PropertyIds<'a> {
    fn resolve(collection: &'a Collection) -> Self {
        let find = |name: &str| {
            collection
                .schema
                .iter()
                .find(|(_, prop)| prop.name == name)
                .map(|(id, _)| id.as_str())
        };
        PropertyIds {
            published: find("Published"),
            kind: find("Type"),
            date: find("Date"),
            link: find("Link"),
            embed: find("Embed"),
        }
    }
}

/// Project every published row of every database on the page.
///
/// Rows come out in the snapshot's block order. `now` is the date of last
/// resort for rows with neither a date value nor a creation time, so two
/// calls on the same snapshot can disagree for such rows.
pub fn extract(snapshot: &RecordMap, now: DateTime<Utc>) -> Vec<ContentRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (view_id, view) in snapshot.blocks().filter(|(_, b)| b.is_collection_view()) {
        let Some(collection_id) = view.collection_id.as_deref() else {
            debug!("Collection view {} has no collection id", view_id);
            continue;
        };
        if !seen.insert(collection_id) {
            continue;
        }
        let Some(collection) = snapshot.collection(collection_id) else {
            debug!("Collection {} missing from snapshot", collection_id);
            continue;
        };

        let ids = PropertyIds::resolve(collection);
        let rows = snapshot
            .blocks()
            .filter(|(_, b)| b.is_page() && b.parent_id == collection_id);
        for (row_id, row) in rows {
            let record = project_row(row_id, row, &ids, now);
            if record.published {
                records.push(record);
            }
        }
    }

    records
}

fn project_row(id: &str, row: &Block, ids: &PropertyIds, now: DateTime<Utc>) -> ContentRecord {
    let props = RowProperties::new(&row.properties);

    // No Published column: everything is public. Column present: must be ticked.
    let published = ids.published.map_or(true, |p| props.is_checked(p));

    let category = ids
        .kind
        .and_then(|p| props.first_text(p))
        .map_or(Category::Update, Category::from_label);

    let title = props.text(TITLE_KEY).unwrap_or_else(|| UNTITLED.to_string());

    let date = ids
        .date
        .and_then(|p| props.date(p))
        .or_else(|| row.created_time.and_then(DateTime::from_timestamp_millis))
        .unwrap_or(now);

    let (link, embed_mode) = match category {
        Category::Update => (
            ids.link.and_then(|p| props.link(p)),
            ids.embed.is_some_and(|p| props.is_checked(p)),
        ),
        Category::Insight => (None, false),
    };

    ContentRecord {
        id: id.to_string(),
        title,
        date,
        category,
        published,
        link,
        embed_mode,
    }
}

/// Fetch a snapshot and extract its records, or nothing if the provider
/// fails or takes longer than `timeout`.
pub async fn load_records<S: SnapshotSource>(
    source: &S,
    page_id: &str,
    timeout: Duration,
) -> Vec<ContentRecord> {
    let fetched = tokio::time::timeout(timeout, source.fetch_page_snapshot(page_id))
        .await
        .unwrap_or_else(|_| Err(ProviderError::Timeout(timeout)));

    match fetched {
        Ok(snapshot) => {
            let records = extract(&snapshot, Utc::now());
            info!("Extracted {} published records", records.len());
            records
        }
        Err(e) => {
            warn!("Error fetching Notion data: {}", e);
            Vec::new()
        }
    }
}

pub fn filter_by_category(records: &[ContentRecord], category: Category) -> Vec<&ContentRecord> {
    records.iter().filter(|r| r.category == category).collect()
}

/// Newest insight; on equal dates the earlier record wins.
pub fn latest_insight(records: &[ContentRecord]) -> Option<&ContentRecord> {
    records
        .iter()
        .filter(|r| r.category == Category::Insight)
        .fold(None, |best: Option<&ContentRecord>, r| match best {
            Some(b) if b.date >= r.date => Some(b),
            _ => Some(r),
        })
}

/// Ids match with or without dashes, in any case.
pub fn by_id<'a>(records: &'a [ContentRecord], id: &str) -> Option<&'a ContentRecord> {
    let wanted = normalize_id(id);
    records.iter().find(|r| normalize_id(&r.id) == wanted)
}

fn normalize_id(id: &str) -> String {
    id.trim()
        .chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

// ── Tests ──
