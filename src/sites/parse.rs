//! Link extraction from serialized pages.
//!
//! Parsing is synchronous: `scraper::Html` is not `Send` and must never be
//! held across an await point.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::profiles::AttachmentRule;

/// An anchor resolved against its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub text: String,
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|mut url| {
        url.set_fragment(None);
        url.to_string()
    })
}

fn collect(
    html: &Html,
    base: &str,
    selector: &Selector,
    mut keep: impl FnMut(&str) -> bool,
) -> Vec<Link> {
    let Ok(base) = Url::parse(base) else {
        debug!("Unparseable page URL {}", base);
        return Vec::new();
    };
    let mut seen = HashSet::new();
    html.select(selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            if !keep(href) {
                return None;
            }
            let url = resolve(&base, href)?;
            let text = el.text().collect::<String>().trim().to_string();
            Some(Link { url, text })
        })
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}

/// Anchors matching `selector`, deduplicated by URL in document order.
pub fn links(page: &str, base: &str, selector: &str) -> Vec<Link> {
    let Ok(selector) = Selector::parse(selector) else {
        debug!("Invalid selector {}", selector);
        return Vec::new();
    };
    collect(&Html::parse_document(page), base, &selector, |_| true)
}

/// Attachment anchors on a topic page.
pub fn attachments(page: &str, base: &str, rule: &AttachmentRule) -> Vec<Link> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    collect(&Html::parse_document(page), base, &selector, |href| {
        rule.matches(href)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><body>
          <ul class="topics">
            <li><a class="t" href="viewtopic.php?t=1"> ME7 dump </a></li>
            <li><a class="t" href="/forum/viewtopic.php?t=2">EDC16 read</a></li>
            <li><a class="t" href="viewtopic.php?t=1#p5">ME7 dump again</a></li>
            <li><a class="t" href="#top">Top</a></li>
            <li><a class="t">No href</a></li>
          </ul>
          <a href="index.php?action=dlattach;attach=1">flash.bin</a>
          <a href="index.php?action=dlattach;attach=1;image">preview.png</a>
          <a href="http://other.example/dlattach/2">mirror.bin</a>
        </body></html>
    "##;

    #[test]
    fn links_resolve_and_dedupe() {
        let found = links(PAGE, "http://forum.example/forum/search.php", "a.t");
        assert_eq!(
            found,
            vec![
                Link {
                    url: "http://forum.example/forum/viewtopic.php?t=1".to_string(),
                    text: "ME7 dump".to_string()
                },
                Link {
                    url: "http://forum.example/forum/viewtopic.php?t=2".to_string(),
                    text: "EDC16 read".to_string()
                },
            ]
        );
    }

    #[test]
    fn attachments_follow_rule() {
        let rule = AttachmentRule {
            href_contains: "dlattach",
            reject_suffix: Some("image"),
        };
        let found = attachments(PAGE, "http://forum.example/index.php?topic=9", &rule);
        let urls: Vec<&str> = found.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://forum.example/index.php?action=dlattach;attach=1",
                "http://other.example/dlattach/2",
            ]
        );
        assert_eq!(found[0].text, "flash.bin");
    }

    #[test]
    fn bad_base_or_selector_yields_nothing() {
        assert!(links(PAGE, "not a url", "a.t").is_empty());
        assert!(links(PAGE, "http://forum.example/", "a[").is_empty());
    }
}
