//! Virtual feeds materialized by evaluating a filter expression over all real feeds.

use std::sync::Arc;

use thiserror::Error;

use crate::matcher::{Matcher, ParseError};
use crate::model::{Feed, SharedFeed, SortStrategy};

#[derive(Debug, Error)]
pub enum QueryFeedError {
    #[error("query url must have at least three colon-separated parts")]
    Malformed,
    #[error("filter parse error: {0}")]
    Parse(#[from] ParseError),
}

pub struct QueryFeedSpec {
    pub rssurl: String,
    pub title: String,
    pub matcher: Matcher,
}

/// Parses a `query:<title>:<expr>` URL. Because ranges use `:`, only the
/// FIRST two colons are tokenized; the remainder joins back into the
/// expression.
pub fn parse_query_url(rssurl: &str) -> Result<QueryFeedSpec, QueryFeedError> {
    let rest = rssurl
        .strip_prefix(crate::model::QUERY_FEED_PREFIX)
        .ok_or(QueryFeedError::Malformed)?;
    let mut parts = rest.splitn(2, ':');
    let title = parts.next().ok_or(QueryFeedError::Malformed)?;
    let expr = parts.next().ok_or(QueryFeedError::Malformed)?;
    if title.is_empty() || expr.is_empty() {
        return Err(QueryFeedError::Malformed);
    }
    let matcher = Matcher::parse(expr)?;
    Ok(QueryFeedSpec {
        rssurl: rssurl.to_string(),
        title: title.to_string(),
        matcher,
    })
}

/// Evaluates `spec`'s filter over every non-query feed in `all_feeds`,
/// wiring each matched item's `feedptr` at its original owning feed, and
/// returns a materialized `Feed` holding strong references to those items.
/// Invariant: a query feed owns no items whose owning feed is itself a
/// query feed.
pub fn materialize(spec: &QueryFeedSpec, all_feeds: &[SharedFeed], sort: SortStrategy) -> Feed {
    let mut feed = Feed::new(spec.rssurl.clone());
    feed.title = spec.title.clone();

    let mut matched = Vec::new();
    for real in all_feeds {
        let real_locked = real.lock().unwrap();
        if real_locked.is_query_feed() {
            continue;
        }
        for item in real_locked.items() {
            let ok = {
                let locked = item.lock().unwrap();
                spec.matcher.matches(&*locked).unwrap_or(false)
            };
            if ok {
                item.lock().unwrap().feedptr = Arc::downgrade(real);
                matched.push(item.clone());
            }
        }
    }

    crate::model::sort_items(&mut matched, sort);
    feed.replace_items(matched);
    feed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeedModel, Item, SortDirection, SortMethod};

    #[test]
    fn url_with_fewer_than_three_parts_fails() {
        assert!(parse_query_url("query:onlytitle").is_err());
    }

    #[test]
    fn colon_in_range_value_is_preserved_in_expression() {
        let spec = parse_query_url("query:My Unread:unread = \"yes\" and age between 0:7").unwrap();
        assert_eq!(spec.title, "My Unread");
        assert_eq!(
            spec.matcher.expression(),
            "unread = \"yes\" and age between 0:7"
        );
    }

    #[test]
    fn materializes_matching_items_with_feedptr_at_original_owner() {
        let sort = SortStrategy::new(SortMethod::Date, SortDirection::Desc);
        let mut model = FeedModel::new(sort);
        let real = model.add_feed(Feed::new("https://a/feed".into()));
        {
            let mut locked = real.lock().unwrap();
            let mut it = Item::new("g1".into(), "https://a/feed".into());
            it.unread = true;
            locked.add_item(it);
        }

        let spec = parse_query_url("query:Unread:unread = \"yes\"").unwrap();
        let materialized = materialize(&spec, model.feeds(), sort);
        assert_eq!(materialized.items().len(), 1);
        let item = materialized.items()[0].clone();
        let owner = item.lock().unwrap().feedptr.upgrade().unwrap();
        assert!(Arc::ptr_eq(&owner, &real));
    }
}
