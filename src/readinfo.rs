//! Read-article state import/export (`-I`/`-E`, spec §6): a line-oriented
//! `guid feedurl` format, one read article per line.

pub struct ReadInfoEntry {
    pub guid: String,
    pub feedurl: String,
}

pub fn parse(content: &str) -> Vec<ReadInfoEntry> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let mut parts = line.splitn(2, ' ');
            let guid = parts.next()?.to_string();
            let feedurl = parts.next()?.to_string();
            Some(ReadInfoEntry { guid, feedurl })
        })
        .collect()
}

pub fn write(entries: &[ReadInfoEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.guid);
        out.push(' ');
        out.push_str(&entry.feedurl);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_guid_and_feedurl_per_line() {
        let content = "g1 https://a/feed\ng2 https://b/feed\n";
        let entries = parse(content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].guid, "g1");
        assert_eq!(entries[0].feedurl, "https://a/feed");
    }

    #[test]
    fn round_trip() {
        let entries = vec![ReadInfoEntry {
            guid: "g1".into(),
            feedurl: "https://a/feed".into(),
        }];
        let content = write(&entries);
        let parsed = parse(&content);
        assert_eq!(parsed[0].guid, entries[0].guid);
        assert_eq!(parsed[0].feedurl, entries[0].feedurl);
    }
}
