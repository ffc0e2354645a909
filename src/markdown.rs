//! Confluence `view` HTML to Markdown conversion.
//!
//! The raw view HTML carries Confluence-specific markup (panel macros,
//! status lozenges, site-relative links) that converts badly as-is, so it is
//! normalized with a few targeted rewrites before handing it to `htmd`.

use anyhow::Result;
use htmd::HtmlToMarkdown;
use regex::Regex;

pub fn html_to_markdown(html: &str, base_url: &str) -> Result<String> {
    let cleaned = preprocess_html(html, base_url)?;
    let markdown = HtmlToMarkdown::new().convert(&cleaned)?;
    Ok(markdown.trim().to_string())
}

fn preprocess_html(html: &str, base_url: &str) -> Result<String> {
    let mut content = html.to_string();
    let base_root = base_url.trim_end_matches('/').trim_end_matches("/wiki");

    let style_re = Regex::new(r"(?s)<style[^>]*>.*?</style>")?;
    content = style_re.replace_all(&content, "").to_string();

    // Panel macros render as nested divs; keep the inner content as a quote.
    let panel_re = Regex::new(
        r#"(?s)<div class="panel[^"]*"[^>]*>\s*<div class="panelContent[^"]*"[^>]*>(.*?)</div>\s*</div>"#,
    )?;
    content = panel_re
        .replace_all(&content, "<blockquote>$1</blockquote>")
        .to_string();

    let status_re =
        Regex::new(r#"(?s)<span[^>]*class="[^"]*status-macro[^"]*"[^>]*>(.*?)</span>"#)?;
    content = status_re.replace_all(&content, "[$1]").to_string();

    // Site-relative links and images must survive outside the site.
    let href_re = Regex::new(r#"href="(/wiki[^"]*)""#)?;
    content = href_re
        .replace_all(&content, format!("href=\"{base_root}$1\""))
        .to_string();

    let src_re = Regex::new(r#"src="(/wiki[^"]*)""#)?;
    content = src_re
        .replace_all(&content, format!("src=\"{base_root}$1\""))
        .to_string();

    Ok(content)
}
