//! Markdown to HTML for user-authored content (job descriptions, profiles).
//!
//! Links open in a new tab and carry `rel="nofollow noreferrer"`. Links to
//! anything but http(s), ftp, mailto or site-relative paths lose their
//! anchor and keep only their text. Raw HTML in the source is escaped.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};

const SAFE_PREFIXES: &[&str] = &[
    "http://", "https://", "ftp://", "mailto:", "/", "./", "../", "#",
];

pub fn markdown_to_html(src: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    // One entry per open link: whether its anchor was emitted.
    let mut open_links: Vec<bool> = Vec::new();

    let events = Parser::new_ext(src, options).filter_map(|event| match event {
        Event::Start(Tag::Link { dest_url, title, .. }) => {
            let safe = is_safe_link(&dest_url);
            open_links.push(safe);
            safe.then(|| Event::InlineHtml(CowStr::from(anchor_open(&dest_url, &title))))
        }
        Event::End(TagEnd::Link) => open_links
            .pop()
            .unwrap_or(false)
            .then(|| Event::InlineHtml(CowStr::Borrowed("</a>"))),
        Event::Html(raw) | Event::InlineHtml(raw) => Some(Event::Text(raw)),
        other => Some(other),
    });

    let mut out = String::with_capacity(src.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn is_safe_link(url: &str) -> bool {
    let url = url.trim().to_ascii_lowercase();
    SAFE_PREFIXES.iter().any(|p| url.starts_with(p))
}

fn anchor_open(href: &str, title: &str) -> String {
    let mut tag = format!("<a href=\"{}\"", escape_attr(href));
    if !title.is_empty() {
        tag.push_str(&format!(" title=\"{}\"", escape_attr(title)));
    }
    tag.push_str(" rel=\"nofollow noreferrer\" target=\"_blank\">");
    tag
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
