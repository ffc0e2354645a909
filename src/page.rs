//! Export-ready pages: a crawled entity joined with its fetched body.

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::entity::Entity;
use crate::markdown::html_to_markdown;
use crate::models::PageRecord;

const TAB: &str = "  ";

/// Fields that can appear in an exported document, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PageField {
    SourceType,
    ConfluenceUrl,
    Title,
    MarkdownContent,
}

impl PageField {
    fn tag(&self) -> &'static str {
        match self {
            PageField::SourceType => "source_type",
            PageField::ConfluenceUrl => "confluence_url",
            PageField::Title => "title",
            PageField::MarkdownContent => "markdown_content",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub entity: Entity,
    pub record: PageRecord,
    /// Site base URL including `/wiki`, for browser links.
    pub base_url: String,
}

impl Page {
    pub fn new(entity: Entity, record: PageRecord, base_url: impl Into<String>) -> Self {
        Page {
            entity,
            record,
            base_url: base_url.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.record.title
    }

    pub fn webui_url(&self) -> String {
        match self.record.webui_link() {
            Some(webui) => format!("{}{webui}", self.base_url.trim_end_matches('/')),
            None => self.base_url.clone(),
        }
    }

    /// Markdown rendition: a title heading followed by the converted body.
    ///
    /// With `ignore_error` the body is dropped on conversion failure and the
    /// heading alone survives; otherwise the failure propagates.
    pub fn to_markdown(&self, ignore_error: bool) -> Result<String> {
        let mut lines = vec![format!("# {}", self.title()), String::new()];
        let body = match self.record.body_html() {
            Some(html) => match html_to_markdown(html, &self.base_url) {
                Ok(markdown) => markdown,
                Err(_) if ignore_error => String::new(),
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("Markdown conversion failed for page {}", self.record.id)
                    });
                }
            },
            None => String::new(),
        };
        lines.extend(body.lines().map(|line| line.to_string()));
        Ok(lines.join("\n").trim_end().to_string())
    }

    /// Render the page as a `<document>` block with a stable tag order,
    /// optionally restricted to `wanted_fields`.
    pub fn to_xml(&self, wanted_fields: Option<&[PageField]>, ignore_error: bool) -> Result<String> {
        let wanted = |field: PageField| match wanted_fields {
            Some(fields) => fields.contains(&field),
            None => true,
        };

        let mut lines = vec!["<document>".to_string()];

        if wanted(PageField::SourceType) {
            let tag = PageField::SourceType.tag();
            lines.push(format!("{TAB}<{tag}>Confluence Page</{tag}>"));
        }
        if wanted(PageField::ConfluenceUrl) {
            let tag = PageField::ConfluenceUrl.tag();
            lines.push(format!("{TAB}<{tag}>{}</{tag}>", xml_escape(&self.webui_url())));
        }
        if wanted(PageField::Title) {
            let tag = PageField::Title.tag();
            lines.push(format!("{TAB}<{tag}>{}</{tag}>", xml_escape(self.title())));
        }
        if wanted(PageField::MarkdownContent) {
            let tag = PageField::MarkdownContent.tag();
            lines.push(format!("{TAB}<{tag}>"));
            lines.push(xml_escape(&self.to_markdown(ignore_error)?));
            lines.push(format!("{TAB}</{tag}>"));
        }

        lines.push("</document>".to_string());
        Ok(lines.join("\n"))
    }
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
