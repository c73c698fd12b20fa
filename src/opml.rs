//! OPML import/export (spec §6's named external collaborator, round-trip
//! law in spec §8: export then import yields the same URL list, order
//! preserved modulo duplicates). Import is adapted from the teacher's
//! `feed/opml.rs`; export is new since the teacher only imported.

use anyhow::{Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use quick_xml::Reader;
use std::io::Cursor;

#[derive(Debug, Clone)]
pub struct OpmlFeed {
    pub title: String,
    pub xml_url: String,
    pub html_url: Option<String>,
    /// Tags, stored round-trip in OPML 2.0's `category` attribute as a
    /// comma-separated list (ignored on OPML 1.0 export).
    pub tags: Vec<String>,
}

pub fn parse(path: &str) -> Result<Vec<OpmlFeed>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read OPML file: {}", path))?;
    parse_opml_content(&content)
}

pub fn parse_opml_content(content: &str) -> Result<Vec<OpmlFeed>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                let mut xml_url = None;
                let mut html_url = None;
                let mut title = None;
                let mut category = None;

                for attr in e.attributes().flatten() {
                    let decoder = reader.decoder();
                    match attr.key.as_ref() {
                        b"xmlUrl" => {
                            xml_url = Some(attr.decode_and_unescape_value(decoder)?.to_string())
                        }
                        b"htmlUrl" => {
                            html_url = Some(attr.decode_and_unescape_value(decoder)?.to_string())
                        }
                        b"title" => {
                            title = Some(attr.decode_and_unescape_value(decoder)?.to_string())
                        }
                        b"text" => {
                            if title.is_none() {
                                title = Some(attr.decode_and_unescape_value(decoder)?.to_string())
                            }
                        }
                        b"category" => {
                            category = Some(attr.decode_and_unescape_value(decoder)?.to_string())
                        }
                        _ => {}
                    }
                }

                if let Some(url) = xml_url {
                    let tags = category
                        .map(|c| {
                            c.split(',')
                                .map(|s| s.trim().to_string())
                                .filter(|s| !s.is_empty())
                                .collect()
                        })
                        .unwrap_or_default();
                    feeds.push(OpmlFeed {
                        title: title.unwrap_or_else(|| url.clone()),
                        xml_url: url,
                        html_url,
                        tags,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(feeds)
}

pub enum OpmlVersion {
    V1,
    V2,
}

/// Serializes `feeds` as an OPML document. `version` controls the `<opml
/// version>` attribute and whether `category` is emitted (V1 omits it, for
/// maximal consumer compatibility).
pub fn write_opml(feeds: &[OpmlFeed], version: OpmlVersion) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let version_str = match version {
        OpmlVersion::V1 => "1.0",
        OpmlVersion::V2 => "2.0",
    };

    writer.write_event(Event::Decl(quick_xml::events::BytesDecl::new(
        "1.0",
        Some("UTF-8"),
        None,
    )))?;

    let mut opml_start = BytesStart::new("opml");
    opml_start.push_attribute(("version", version_str));
    writer.write_event(Event::Start(opml_start))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    writer.write_event(Event::Start(BytesStart::new("title")))?;
    writer.write_event(Event::Text(BytesText::new("feedspar subscriptions")))?;
    writer.write_event(Event::End(BytesEnd::new("title")))?;
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    for feed in feeds {
        let mut outline = BytesStart::new("outline");
        outline.push_attribute(("type", "rss"));
        outline.push_attribute(("text", feed.title.as_str()));
        outline.push_attribute(("title", feed.title.as_str()));
        outline.push_attribute(("xmlUrl", feed.xml_url.as_str()));
        if let Some(html_url) = &feed.html_url {
            outline.push_attribute(("htmlUrl", html_url.as_str()));
        }
        if matches!(version, OpmlVersion::V2) && !feed.tags.is_empty() {
            outline.push_attribute(("category", feed.tags.join(",").as_str()));
        }
        writer.write_event(Event::Empty(outline))?;
    }
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("opml")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_import_preserves_url_order() {
        let feeds = vec![
            OpmlFeed {
                title: "A".into(),
                xml_url: "https://a/feed".into(),
                html_url: None,
                tags: vec!["~starred".into()],
            },
            OpmlFeed {
                title: "B".into(),
                xml_url: "https://b/feed".into(),
                html_url: Some("https://b".into()),
                tags: vec![],
            },
        ];

        let xml = write_opml(&feeds, OpmlVersion::V2).unwrap();
        let round_tripped = parse_opml_content(&xml).unwrap();

        let urls: Vec<&str> = round_tripped.iter().map(|f| f.xml_url.as_str()).collect();
        assert_eq!(urls, vec!["https://a/feed", "https://b/feed"]);
        assert_eq!(round_tripped[0].tags, vec!["~starred".to_string()]);
    }

    #[test]
    fn opml_v1_export_omits_category() {
        let feeds = vec![OpmlFeed {
            title: "A".into(),
            xml_url: "https://a/feed".into(),
            html_url: None,
            tags: vec!["tag".into()],
        }];
        let xml = write_opml(&feeds, OpmlVersion::V1).unwrap();
        assert!(!xml.contains("category"));
    }

    #[test]
    fn test_fallback_to_text() {
        let content = r#"<?xml version="1.0"?>
<opml version="2.0">
  <body>
    <outline type="rss" text="Text Only" xmlUrl="https://textonly.com/feed"/>
  </body>
</opml>"#;

        let feeds = parse_opml_content(content).unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "Text Only");
    }
}
