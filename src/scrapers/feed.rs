//! RSS and Atom feed parsing.
//!
//! Documents are deserialized with `quick-xml`'s serde support into the
//! shapes below and then flattened into [`FeedEntry`]. Supported layouts:
//!
//! | Format | Root | Entries |
//! |--------|------|---------|
//! | RSS 2.0 | `<rss>` | `channel/item` |
//! | RSS 1.0 (RDF) | `<rdf:RDF>` | `item` |
//! | Atom 1.0 | `<feed>` | `entry` |
//!
//! Namespaced elements (`content:encoded`, `dc:creator`, `media:thumbnail`)
//! are matched by local name with the prefixed form as an alias.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::error::Error;

/// A feed item normalised across formats. Text fields still contain
/// whatever markup the publisher put in them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub content: String,
    pub published: Option<String>,
    pub author: String,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FeedKind {
    Rss,
    Atom,
}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    #[serde(default)]
    channel: Option<RssChannel>,
    /// RSS 1.0 puts items next to the channel instead of inside it.
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<Text>,
    #[serde(default)]
    link: Option<Text>,
    #[serde(default)]
    description: Option<Text>,
    #[serde(rename = "encoded", alias = "content:encoded", default)]
    encoded: Option<Text>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<Text>,
    #[serde(rename = "date", alias = "dc:date", default)]
    dc_date: Option<Text>,
    #[serde(rename = "author", default)]
    authors: Vec<Text>,
    #[serde(rename = "creator", alias = "dc:creator", default)]
    creators: Vec<Text>,
    #[serde(rename = "category", default)]
    categories: Vec<Text>,
    #[serde(rename = "enclosure", default)]
    enclosures: Vec<MediaRef>,
    #[serde(rename = "content", alias = "media:content", default)]
    media_content: Vec<MediaRef>,
    #[serde(rename = "thumbnail", alias = "media:thumbnail", default)]
    thumbnails: Vec<MediaRef>,
}

#[derive(Debug, Default, Deserialize)]
struct MediaRef {
    #[serde(rename = "@url", default)]
    url: String,
    #[serde(rename = "@type", default)]
    mime: Option<String>,
    #[serde(rename = "@medium", default)]
    medium: Option<String>,
}

impl MediaRef {
    fn is_image(&self) -> bool {
        if self.url.is_empty() {
            return false;
        }
        match (&self.mime, &self.medium) {
            (Some(m), _) => m.starts_with("image/"),
            (None, Some(medium)) => medium == "image",
            (None, None) => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    summary: Option<Text>,
    #[serde(default)]
    content: Option<Text>,
    #[serde(default)]
    published: Option<Text>,
    #[serde(default)]
    updated: Option<Text>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
    #[serde(rename = "thumbnail", alias = "media:thumbnail", default)]
    thumbnails: Vec<MediaRef>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
    #[serde(rename = "@type", default)]
    mime: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomAuthor {
    #[serde(default)]
    name: Option<Text>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term", default)]
    term: String,
}

fn text(t: Option<Text>) -> String {
    t.map(|t| t.value.trim().to_string()).unwrap_or_default()
}

fn first_non_empty(texts: Vec<Text>) -> String {
    texts
        .into_iter()
        .map(|t| t.value.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Look at the first element to tell RSS from Atom.
fn detect_kind(xml: &str) -> Result<FeedKind, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return match e.local_name().as_ref() {
                    b"feed" => Ok(FeedKind::Atom),
                    b"rss" | b"RDF" => Ok(FeedKind::Rss),
                    other => Err(format!(
                        "unrecognised feed root <{}>",
                        String::from_utf8_lossy(other)
                    )
                    .into()),
                };
            }
            Event::Eof => return Err("document has no root element".into()),
            _ => {}
        }
    }
}

/// Raw inner markup of each entry's `<content type="xhtml">`, indexed by
/// entry position. The serde pass only sees text nodes, and xhtml content
/// is wrapped in a `<div>`, so it would otherwise come back empty.
fn atom_xhtml_contents(xml: &str) -> Result<Vec<Option<String>>, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    let mut contents = Vec::new();
    let mut in_entry = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"entry" => {
                in_entry = true;
                contents.push(None);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"entry" => contents.push(None),
            Event::End(e) if e.local_name().as_ref() == b"entry" => in_entry = false,
            Event::Start(e) if in_entry && e.name().as_ref() == b"content" => {
                let is_xhtml = e
                    .try_get_attribute("type")?
                    .is_some_and(|a| a.value.as_ref() == b"xhtml");
                let end = e.to_end().into_owned();
                let inner = reader.read_text(end.name())?;
                if is_xhtml {
                    if let Some(slot) = contents.last_mut() {
                        *slot = Some(inner.into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(contents)
}

/// Parse an RSS or Atom document into entries, in document order.
///
/// # Errors
///
/// Returns an error when the document is not well-formed XML or its root
/// is neither `<rss>`, `<rdf:RDF>`, nor `<feed>`.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, Box<dyn Error>> {
    match detect_kind(xml)? {
        FeedKind::Rss => {
            let doc: RssDocument = quick_xml::de::from_str(xml)?;
            let mut items = doc.channel.map(|c| c.items).unwrap_or_default();
            items.extend(doc.items);
            Ok(items.into_iter().map(rss_entry).collect())
        }
        FeedKind::Atom => {
            let feed: AtomFeed = quick_xml::de::from_str(xml)?;
            let xhtml = atom_xhtml_contents(xml)?;
            Ok(feed
                .entries
                .into_iter()
                .enumerate()
                .map(|(i, e)| {
                    let mut entry = atom_entry(e);
                    if entry.content.is_empty() {
                        if let Some(Some(markup)) = xhtml.get(i) {
                            entry.content = markup.trim().to_string();
                        }
                    }
                    entry
                })
                .collect())
        }
    }
}

fn rss_entry(item: RssItem) -> FeedEntry {
    let image_url = item
        .enclosures
        .iter()
        .chain(item.media_content.iter())
        .chain(item.thumbnails.iter())
        .find(|m| m.is_image())
        .map(|m| m.url.clone());

    let published = Some(text(item.pub_date))
        .filter(|s| !s.is_empty())
        .or_else(|| Some(text(item.dc_date)).filter(|s| !s.is_empty()));

    let mut author = first_non_empty(item.creators);
    if author.is_empty() {
        author = first_non_empty(item.authors);
    }

    FeedEntry {
        title: text(item.title),
        link: text(item.link),
        summary: text(item.description),
        content: text(item.encoded),
        published,
        author,
        tags: item
            .categories
            .into_iter()
            .map(|c| c.value.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        image_url,
    }
}

fn atom_entry(entry: AtomEntry) -> FeedEntry {
    let link = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default();

    let image_url = entry
        .links
        .iter()
        .find(|l| {
            l.rel.as_deref() == Some("enclosure")
                && l.mime.as_deref().is_some_and(|m| m.starts_with("image/"))
        })
        .map(|l| l.href.clone())
        .or_else(|| {
            entry
                .thumbnails
                .iter()
                .find(|m| m.is_image())
                .map(|m| m.url.clone())
        });

    let published = Some(text(entry.published))
        .filter(|s| !s.is_empty())
        .or_else(|| Some(text(entry.updated)).filter(|s| !s.is_empty()));

    FeedEntry {
        title: text(entry.title),
        link,
        summary: text(entry.summary),
        content: text(entry.content),
        published,
        author: entry
            .authors
            .into_iter()
            .map(|a| text(a.name))
            .find(|n| !n.is_empty())
            .unwrap_or_default(),
        tags: entry
            .categories
            .into_iter()
            .map(|c| c.term.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        image_url,
    }
}

/// Parse a feed timestamp. RFC 2822 (RSS) and RFC 3339 (Atom) first, then
/// a few zone-less layouts that are taken to be UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:dc="http://purl.org/dc/elements/1.1/"
     xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>TechCrunch</title>
    <link>https://techcrunch.com</link>
    <description>Startup and Technology News</description>
    <item>
      <title>OpenAI launches a new reasoning model</title>
      <link>https://techcrunch.com/2024/12/12/openai-reasoning/</link>
      <dc:creator><![CDATA[Kyle Wiggers]]></dc:creator>
      <pubDate>Thu, 12 Dec 2024 18:30:00 +0000</pubDate>
      <category><![CDATA[AI]]></category>
      <category><![CDATA[OpenAI]]></category>
      <description><![CDATA[<p>The model is <b>faster</b>.</p>]]></description>
      <content:encoded><![CDATA[<p>Full body &amp; details.</p>]]></content:encoded>
      <media:content url="https://techcrunch.com/img.jpg" medium="image" />
    </item>
    <item>
      <title>Fintech raises Series B</title>
      <link>https://techcrunch.com/2024/12/12/fintech/</link>
      <pubDate>Thu, 12 Dec 2024 10:00:00 GMT</pubDate>
      <description>Money news</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Research Blog</title>
  <entry>
    <title type="html">Scaling laws for LLM agents</title>
    <link rel="self" href="https://blog.example.com/feeds/1"/>
    <link rel="alternate" type="text/html" href="https://blog.example.com/scaling"/>
    <updated>2024-12-11T08:00:00Z</updated>
    <published>2024-12-10T08:00:00+02:00</published>
    <author><name>Research Team</name></author>
    <category term="machine learning"/>
    <summary>We study agents.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title, "OpenAI launches a new reasoning model");
        assert_eq!(first.link, "https://techcrunch.com/2024/12/12/openai-reasoning/");
        assert_eq!(first.author, "Kyle Wiggers");
        assert_eq!(first.tags, vec!["AI", "OpenAI"]);
        assert_eq!(first.summary, "<p>The model is <b>faster</b>.</p>");
        assert_eq!(first.content, "<p>Full body &amp; details.</p>");
        assert_eq!(first.published.as_deref(), Some("Thu, 12 Dec 2024 18:30:00 +0000"));
        assert_eq!(first.image_url.as_deref(), Some("https://techcrunch.com/img.jpg"));

        let second = &entries[1];
        assert_eq!(second.summary, "Money news");
        assert!(second.content.is_empty());
        assert!(second.tags.is_empty());
        assert!(second.image_url.is_none());
    }

    #[test]
    fn test_parse_atom_entries() {
        let entries = parse_feed(ATOM).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.title, "Scaling laws for LLM agents");
        assert_eq!(e.link, "https://blog.example.com/scaling");
        assert_eq!(e.author, "Research Team");
        assert_eq!(e.tags, vec!["machine learning"]);
        assert_eq!(e.published.as_deref(), Some("2024-12-10T08:00:00+02:00"));
    }

    #[test]
    fn test_parse_atom_xhtml_content() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Agents ship</title>
    <link href="https://blog.example.com/agents"/>
    <summary>Short teaser</summary>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Hello <b>AI</b></p></div></content>
  </entry>
  <entry>
    <title>Plain</title>
    <link href="https://blog.example.com/plain"/>
    <content type="html">&lt;p&gt;Escaped body&lt;/p&gt;</content>
  </entry>
</feed>"#;
        let entries = parse_feed(atom).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].content.contains("<p>Hello <b>AI</b></p>"));
        assert_eq!(crate::utils::strip_html(&entries[0].content), "Hello AI");
        assert_eq!(entries[0].summary, "Short teaser");
        assert_eq!(entries[1].content, "<p>Escaped body</p>");
    }

    #[test]
    fn test_parse_rdf_items() {
        let rdf = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns="http://purl.org/rss/1.0/"
         xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://example.org/">
    <title>Example</title>
  </channel>
  <item rdf:about="https://example.org/1">
    <title>Deep learning on the edge</title>
    <link>https://example.org/1</link>
    <dc:date>2024-12-09T12:00:00Z</dc:date>
  </item>
</rdf:RDF>"#;
        let entries = parse_feed(rdf).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Deep learning on the edge");
        assert_eq!(entries[0].published.as_deref(), Some("2024-12-09T12:00:00Z"));
    }

    #[test]
    fn test_parse_rejects_non_feed() {
        assert!(parse_feed("<html><body>nope</body></html>").is_err());
        assert!(parse_feed("").is_err());
        assert!(parse_feed("not xml at all").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let d = parse_date("Thu, 12 Dec 2024 18:30:00 +0000").unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (2024, 12, 12, 18));

        let d = parse_date("2024-12-10T08:00:00+02:00").unwrap();
        assert_eq!(d.hour(), 6);

        let d = parse_date("2024-12-10 08:00:00").unwrap();
        assert_eq!(d.hour(), 8);

        let d = parse_date("2024-12-10").unwrap();
        assert_eq!((d.day(), d.hour()), (10, 0));

        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday").is_none());
    }
}
