// src/services/feed.rs

//! RSS/Atom feed parsing.

use feed_rs::model::Entry;
use feed_rs::parser;

use crate::models::FeedLink;

/// Parse a feed body into one link per item, in feed order.
///
/// An unparsable body is logged and yields no links.
pub fn parse_links(body: &[u8], site: &str) -> Vec<FeedLink> {
    let feed = match parser::parse(body) {
        Ok(feed) => feed,
        Err(e) => {
            log::warn!("Unparsable feed for site {}: {}", site, e);
            return Vec::new();
        }
    };

    feed.entries
        .into_iter()
        .filter_map(|entry| {
            let Some(url) = permalink(&entry) else {
                log::debug!("Skipping feed item without a link (id {})", entry.id);
                return None;
            };
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty());
            Some(FeedLink {
                url,
                title,
                site: site.to_string(),
            })
        })
        .collect()
}

/// The item's permalink: its alternate link, else its first link, else an
/// id that is itself a URL.
fn permalink(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find(|link| matches!(link.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|link| link.href.trim().to_string())
        .filter(|href| !href.is_empty())
        .or_else(|| {
            let id = entry.id.trim();
            (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <link>https://blog.example.org/</link>
    <description>Posts</description>
    <item>
      <title>First post</title>
      <link>https://blog.example.org/posts/1</link>
    </item>
    <item>
      <title>Second post</title>
      <link>https://blog.example.org/posts/2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_rss_items_in_order() {
        let links = parse_links(RSS.as_bytes(), "site-1");
        assert_eq!(
            links,
            vec![
                FeedLink {
                    url: "https://blog.example.org/posts/1".into(),
                    title: Some("First post".into()),
                    site: "site-1".into(),
                },
                FeedLink {
                    url: "https://blog.example.org/posts/2".into(),
                    title: Some("Second post".into()),
                    site: "site-1".into(),
                },
            ]
        );
    }

    #[test]
    fn test_atom_prefers_alternate_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Entry</title>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <link rel="edit" href="https://blog.example.org/edit/7"/>
    <link rel="alternate" href="https://blog.example.org/posts/7"/>
  </entry>
</feed>"#;
        let links = parse_links(atom.as_bytes(), "s");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://blog.example.org/posts/7");
    }

    #[test]
    fn test_missing_title_is_absent() {
        let rss = r#"<rss version="2.0"><channel><title>t</title>
            <item><link>https://blog.example.org/posts/3</link></item>
        </channel></rss>"#;
        let links = parse_links(rss.as_bytes(), "s");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, None);
    }

    #[test]
    fn test_guid_permalink_fallback() {
        let rss = r#"<rss version="2.0"><channel><title>t</title>
            <item><title>g</title><guid isPermaLink="true">https://blog.example.org/posts/9</guid></item>
            <item><title>no link at all</title></item>
        </channel></rss>"#;
        let links = parse_links(rss.as_bytes(), "s");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://blog.example.org/posts/9");
    }

    #[test]
    fn test_malformed_feed_yields_nothing() {
        assert!(parse_links(b"this is not a feed", "s").is_empty());
        assert!(parse_links(b"", "s").is_empty());
    }
}
