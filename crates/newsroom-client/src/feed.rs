//! RSS 2.0 / Atom parsing into [`RawArticle`]s.

use chrono::{DateTime, FixedOffset, Utc};
use newsroom_core::error::AppError;
use newsroom_core::models::RawArticle;
use newsroom_core::util::normalize_whitespace;

/// Parse a feed document. RSS is tried first, then Atom.
///
/// `now` stands in for entries without any usable timestamp. Entries without
/// a link are dropped; every other entry is kept.
pub fn parse_feed(bytes: &[u8], now: DateTime<Utc>) -> Result<Vec<RawArticle>, AppError> {
    let rss_err = match rss::Channel::read_from(bytes) {
        Ok(channel) => return Ok(from_rss(&channel, now)),
        Err(e) => e,
    };

    match atom_syndication::Feed::read_from(bytes) {
        Ok(feed) => Ok(from_atom(&feed, now)),
        Err(atom_err) => Err(AppError::FeedParseError(format!(
            "not RSS ({rss_err}) nor Atom ({atom_err})"
        ))),
    }
}

fn from_rss(channel: &rss::Channel, now: DateTime<Utc>) -> Vec<RawArticle> {
    channel
        .items()
        .iter()
        .filter_map(|item| {
            let link = item
                .link()
                .filter(|l| !l.trim().is_empty())
                .or_else(|| item.guid().filter(|g| g.is_permalink()).map(|g| g.value()));
            let url = normalize_whitespace(link.unwrap_or_default());
            if url.is_empty() {
                return None;
            }

            let dublin_core = item.dublin_core_ext();
            let published = item.pub_date().and_then(parse_pub_date);
            let updated = dublin_core
                .and_then(|dc| dc.dates().first())
                .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok());
            let published_at = published
                .or(updated)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now);

            let author = item
                .author()
                .or_else(|| dublin_core.and_then(|dc| dc.creators().first().map(String::as_str)))
                .unwrap_or_default();

            let summary = normalize_whitespace(item.description().unwrap_or_default());
            let content = pick_content(item.content(), &summary);

            Some(RawArticle {
                title: normalize_whitespace(item.title().unwrap_or_default()),
                url,
                summary,
                author: normalize_whitespace(author),
                published_at,
                content,
            })
        })
        .collect()
}

fn from_atom(feed: &atom_syndication::Feed, now: DateTime<Utc>) -> Vec<RawArticle> {
    feed.entries()
        .iter()
        .filter_map(|entry| {
            let links = entry.links();
            let href = links
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| links.first())
                .map(|l| l.href())
                .unwrap_or_default();
            let url = normalize_whitespace(href);
            if url.is_empty() {
                return None;
            }

            // The parser fills a missing <updated> with the Unix epoch.
            let updated = Some(*entry.updated()).filter(|d| d.timestamp() != 0);
            let published_at = entry
                .published()
                .copied()
                .or(updated)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now);

            let summary = normalize_whitespace(entry.summary().map(|s| s.as_str()).unwrap_or_default());
            let content = pick_content(entry.content().and_then(|c| c.value()), &summary);

            Some(RawArticle {
                title: normalize_whitespace(entry.title().as_str()),
                url,
                summary,
                author: entry
                    .authors()
                    .first()
                    .map(|p| normalize_whitespace(p.name()))
                    .unwrap_or_default(),
                published_at,
                content,
            })
        })
        .collect()
}

/// RFC 2822 as the format requires, then the variants feeds emit in practice:
/// a `UTC` zone name and RFC 3339 timestamps.
fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .or_else(|| {
            let prefix = raw.strip_suffix("UTC")?;
            DateTime::parse_from_rfc2822(&format!("{prefix}GMT")).ok()
        })
}

/// Full content when the entry carries it, else the summary.
fn pick_content(full: Option<&str>, summary: &str) -> String {
    match full.map(normalize_whitespace) {
        Some(content) if !content.is_empty() => content,
        _ => summary.to_string(),
    }
}
