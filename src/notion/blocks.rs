//! JSON builders for Notion page properties, filters, and content blocks.
//!
//! Everything here is pure so the shapes can be checked without a network.

use crate::models::{Report, ReportEntry};
use chrono::NaiveDate;
use serde_json::{json, Value};
use url::Url;

/// Notion rejects rich-text objects longer than this many characters.
pub const RICH_TEXT_LIMIT: usize = 2000;
/// Notion caps array property values (multi-select included) at 100 items.
pub const MULTI_SELECT_LIMIT: usize = 100;

pub fn report_title(date: NaiveDate) -> String {
    format!("【AI Daily Report】{}", date.format("%Y-%m-%d"))
}

/// Split `content` into rich-text objects of at most [`RICH_TEXT_LIMIT`]
/// chars, each carrying `link` when given.
pub fn rich_text(content: &str, link: Option<&str>) -> Vec<Value> {
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return vec![text_object("", link)];
    }
    chars
        .chunks(RICH_TEXT_LIMIT)
        .map(|chunk| text_object(&chunk.iter().collect::<String>(), link))
        .collect()
}

fn text_object(content: &str, link: Option<&str>) -> Value {
    let mut text = json!({ "content": content });
    if let Some(url) = link {
        text["link"] = json!({ "url": url });
    }
    json!({ "type": "text", "text": text })
}

fn block(kind: &str, body: Value) -> Value {
    let mut block = json!({ "object": "block", "type": kind });
    block[kind] = body;
    block
}

pub fn heading_2(title: &str, link: Option<&str>) -> Value {
    block("heading_2", json!({ "rich_text": rich_text(title, link) }))
}

pub fn paragraph(content: &str) -> Value {
    block("paragraph", json!({ "rich_text": rich_text(content, None) }))
}

pub fn bulleted(content: &str) -> Value {
    block("bulleted_list_item", json!({ "rich_text": rich_text(content, None) }))
}

pub fn image(url: &str) -> Value {
    block("image", json!({ "type": "external", "external": { "url": url } }))
}

pub fn divider() -> Value {
    block("divider", json!({}))
}

/// Notion only accepts absolute http(s) URLs for links, images and covers.
pub fn is_web_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Blocks for one report entry, in page order.
pub fn entry_blocks(entry: &ReportEntry) -> Vec<Value> {
    let link = is_web_url(&entry.url).then_some(entry.url.as_str());
    let mut blocks = vec![heading_2(&entry.title, link)];

    if !entry.summary.trim().is_empty() {
        blocks.push(paragraph(&entry.summary));
    }
    blocks.extend(entry.key_points.iter().map(|p| bulleted(p)));
    if let Some(img) = entry.image_url.as_deref().filter(|u| is_web_url(u)) {
        blocks.push(image(img));
    }
    blocks.push(bulleted(&format!(
        "Published: {} · Source: {} · Category: {} · Relevance: {:.2}",
        entry.published_date.format("%Y-%m-%d %H:%M UTC"),
        entry.source,
        entry.category.label(),
        entry.relevance_score
    )));
    blocks.push(divider());
    blocks
}

/// Entries whose blocks go out in one append request, with their ids.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntryBatch {
    pub ids: Vec<String>,
    pub blocks: Vec<Value>,
}

/// Group entries so no batch exceeds `max_blocks` and no entry is split
/// across batches. An entry that alone needs more than `max_blocks` gets a
/// batch of its own.
pub fn entry_batches(entries: &[&ReportEntry], max_blocks: usize) -> Vec<EntryBatch> {
    let mut batches: Vec<EntryBatch> = Vec::new();
    let mut current = EntryBatch::default();
    for entry in entries {
        let blocks = entry_blocks(entry);
        if !current.ids.is_empty() && current.blocks.len() + blocks.len() > max_blocks {
            batches.push(std::mem::take(&mut current));
        }
        current.ids.push(entry.id.clone());
        current.blocks.extend(blocks);
    }
    if !current.ids.is_empty() {
        batches.push(current);
    }
    batches
}

/// The `article_ids` property value. Callers keep `ids` within
/// [`MULTI_SELECT_LIMIT`]; nothing is dropped here.
pub fn article_ids_property(ids: &[String]) -> Value {
    let options: Vec<Value> = ids.iter().map(|id| json!({ "name": id })).collect();
    json!({ "multi_select": options })
}

/// Properties for a new report page. `article_ids` starts empty and is
/// filled once the entries have been appended.
pub fn page_properties(report: &Report, category: &str) -> Value {
    json!({
        "title": { "title": rich_text(&report_title(report.date), None) },
        "type": { "select": { "name": "Post" } },
        "status": { "select": { "name": "Published" } },
        "date": { "date": { "start": report.date.format("%Y-%m-%d").to_string() } },
        "category": { "select": { "name": category } },
        "tags": { "multi_select": [{ "name": "AI" }] },
        "article_ids": article_ids_property(&[]),
    })
}

pub fn external_cover(url: &str) -> Value {
    json!({ "type": "external", "external": { "url": url } })
}

pub fn report_page_filter(date: NaiveDate, category: &str) -> Value {
    json!({
        "and": [
            { "property": "date", "date": { "equals": date.format("%Y-%m-%d").to_string() } },
            { "property": "category", "select": { "equals": category } },
        ]
    })
}

pub fn article_filter(article_id: &str) -> Value {
    json!({ "property": "article_ids", "multi_select": { "contains": article_id } })
}

pub fn older_than_filter(cutoff: NaiveDate, category: &str) -> Value {
    json!({
        "and": [
            { "property": "date", "date": { "before": cutoff.format("%Y-%m-%d").to_string() } },
            { "property": "category", "select": { "equals": category } },
        ]
    })
}

/// Ids stored in a page's `article_ids` property, in stored order.
pub fn existing_article_ids(properties: &Value) -> Vec<String> {
    properties
        .pointer("/article_ids/multi_select")
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| o.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::outputs::fixtures;

    #[test]
    fn test_rich_text_chunks_on_char_boundaries() {
        let long = "é".repeat(RICH_TEXT_LIMIT + 5);
        let parts = rich_text(&long, Some("https://a.b"));
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0]["text"]["content"].as_str().unwrap().chars().count(),
            RICH_TEXT_LIMIT
        );
        assert_eq!(parts[1]["text"]["content"].as_str().unwrap(), "ééééé");
        assert_eq!(parts[1]["text"]["link"]["url"], "https://a.b");

        let empty = rich_text("", None);
        assert_eq!(empty.len(), 1);
        assert!(empty[0]["text"].get("link").is_none());
    }

    #[test]
    fn test_entry_blocks_layout() {
        let mut entry = fixtures::entry("t1", "Agents", Category::TechnicalInnovation);
        entry.image_url = Some("https://img.example.com/a.png".to_string());
        let blocks = entry_blocks(&entry);
        let kinds: Vec<_> = blocks.iter().map(|b| b["type"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec![
                "heading_2",
                "paragraph",
                "bulleted_list_item",
                "bulleted_list_item",
                "image",
                "bulleted_list_item",
                "divider"
            ]
        );
        assert_eq!(
            blocks[0]["heading_2"]["rich_text"][0]["text"]["link"]["url"],
            "https://example.com/t1"
        );
        assert_eq!(
            blocks[5]["bulleted_list_item"]["rich_text"][0]["text"]["content"],
            "Published: 2024-12-12 09:00 UTC · Source: techcrunch · Category: Technical Innovation · Relevance: 0.75"
        );
    }

    #[test]
    fn test_entry_blocks_skip_empty_parts() {
        let mut entry = fixtures::entry("t1", "Agents", Category::ResearchProgress);
        entry.summary = "  ".to_string();
        entry.key_points.clear();
        entry.image_url = Some("data:image/png;base64,AAAA".to_string());
        let kinds: Vec<_> = entry_blocks(&entry)
            .iter()
            .map(|b| b["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["heading_2", "bulleted_list_item", "divider"]);
    }

    #[test]
    fn test_page_properties() {
        let report = fixtures::report(vec![]);
        let props = page_properties(&report, "AI Daily Report");
        assert_eq!(
            props["title"]["title"][0]["text"]["content"],
            "【AI Daily Report】2024-12-12"
        );
        assert_eq!(props["type"]["select"]["name"], "Post");
        assert_eq!(props["status"]["select"]["name"], "Published");
        assert_eq!(props["date"]["date"]["start"], "2024-12-12");
        assert_eq!(props["category"]["select"]["name"], "AI Daily Report");
        assert_eq!(props["tags"]["multi_select"][0]["name"], "AI");
        assert_eq!(props["article_ids"]["multi_select"], json!([]));
    }

    #[test]
    fn test_article_ids_property_keeps_every_id() {
        let ids: Vec<String> = (0..MULTI_SELECT_LIMIT).map(|i| format!("id{i}")).collect();
        let prop = article_ids_property(&ids);
        let opts = prop["multi_select"].as_array().unwrap();
        assert_eq!(opts.len(), MULTI_SELECT_LIMIT);
        assert_eq!(opts[0]["name"], "id0");
        assert_eq!(opts[99]["name"], "id99");
    }

    #[test]
    fn test_entry_batches_keep_entries_whole() {
        let entries: Vec<ReportEntry> = (0..20)
            .map(|i| fixtures::entry(&format!("e{i}"), "Agents", Category::TechnicalInnovation))
            .collect();
        let refs: Vec<&ReportEntry> = entries.iter().collect();
        // heading, summary, two key points, metadata, divider
        assert_eq!(entry_blocks(refs[0]).len(), 6);

        let batches = entry_batches(&refs, 100);
        let sizes: Vec<_> = batches.iter().map(|b| (b.ids.len(), b.blocks.len())).collect();
        assert_eq!(sizes, vec![(16, 96), (4, 24)]);
        assert_eq!(batches[1].ids[0], "e16");
        assert!(entry_batches(&[], 100).is_empty());
    }

    #[test]
    fn test_entry_batches_oversized_entry_stands_alone() {
        let small = fixtures::entry("a", "Small", Category::ResearchProgress);
        let mut big = fixtures::entry("b", "Big", Category::ResearchProgress);
        big.key_points = (0..10).map(|i| format!("point {i}")).collect();
        let batches = entry_batches(&[&small, &big, &small], 8);
        let ids: Vec<_> = batches.iter().map(|b| b.ids.clone()).collect();
        assert_eq!(ids, vec![vec!["a"], vec!["b"], vec!["a"]]);
        assert_eq!(batches[1].blocks.len(), 14);
    }

    #[test]
    fn test_existing_article_ids() {
        let props = json!({
            "article_ids": { "multi_select": [{ "id": "x", "name": "aaa" }, { "name": "bbb" }] }
        });
        assert_eq!(existing_article_ids(&props), vec!["aaa", "bbb"]);
        assert!(existing_article_ids(&json!({})).is_empty());
    }

    #[test]
    fn test_filters() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 12).unwrap();
        let f = report_page_filter(date, "AI Daily Report");
        assert_eq!(f["and"][0]["date"]["equals"], "2024-12-12");
        assert_eq!(f["and"][1]["select"]["equals"], "AI Daily Report");

        assert_eq!(article_filter("abc")["multi_select"]["contains"], "abc");

        let old = older_than_filter(date, "AI Daily Report");
        assert_eq!(old["and"][0]["date"]["before"], "2024-12-12");
    }

    #[test]
    fn test_is_web_url() {
        assert!(is_web_url("https://example.com/x"));
        assert!(is_web_url("http://example.com"));
        assert!(!is_web_url("ftp://example.com"));
        assert!(!is_web_url("/relative/path"));
    }
}
