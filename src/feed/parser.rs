use anyhow::Result;
use feed_rs::parser;

use crate::model::Item;

/// Parses feed bytes into items, synthesizing a guid when the upstream feed
/// omits one: `link + pubDate`, else `link`, else `title` (spec §3/§8).
pub fn parse_feed(bytes: &[u8], feed_url: &str) -> Result<Vec<Item>> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let pub_date_dt = entry.published.or(entry.updated);
            let pub_date = pub_date_dt.map(|dt| dt.timestamp()).unwrap_or(0);
            let author = entry.authors.first().map(|a| a.name.clone());
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            let existing_id = (!entry.id.is_empty()).then(|| entry.id.trim().to_string());
            let guid = existing_id
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| {
                    let raw_pub_date = pub_date_dt.map(|dt| dt.to_rfc3339());
                    Item::synthesize_guid(link.as_deref(), raw_pub_date.as_deref(), &title)
                });

            let mut item = Item::new(guid, feed_url.to_string());
            item.title = title;
            item.link = link;
            item.author = author;
            item.description = description;
            item.pub_date = pub_date;
            item.enclosure_url = entry.media.first().and_then(|m| {
                m.content.first().and_then(|c| c.url.as_ref().map(|u| u.to_string()))
            });
            item.enclosure_type = entry
                .media
                .first()
                .and_then(|m| m.content.first())
                .and_then(|c| c.content_type.as_ref().map(|m| m.to_string()));
            item
        })
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATOM_NO_ID: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example</title>
  <entry>
    <title>Post</title>
    <link href="https://ex/post"/>
    <updated>2023-07-31T00:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn guid_falls_back_to_link_plus_pubdate() {
        let items = parse_feed(ATOM_NO_ID.as_bytes(), "https://ex/feed.atom").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].guid, "https://ex/post2023-07-31T00:00:00+00:00");
    }
}
