//! Turn the `crawl` command's target argument into a crawl root.

use anyhow::Result;
use confpack::client::ApiClient;
use confpack::models::RootKind;
use confpack::pipeline::resolve_space;
use url::Url;

/// What a crawl should start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub root_id: String,
    pub root_kind: RootKind,
}

/// Resolve a target: a page/folder URL carries its own id and kind, a bare
/// numeric id uses the caller-chosen kind, anything else is treated as a
/// space key whose homepage becomes the root.
pub async fn resolve_crawl_target(
    client: &ApiClient,
    target: &str,
    fallback_kind: RootKind,
) -> Result<CrawlTarget> {
    if !target.is_empty() && target.chars().all(|c| c.is_ascii_digit()) {
        return Ok(CrawlTarget {
            root_id: target.to_string(),
            root_kind: fallback_kind,
        });
    }

    if let Ok(url) = Url::parse(target)
        && let Some(found) = target_from_url(&url)
    {
        return Ok(found);
    }

    let space = resolve_space(client, target).await?;
    let root_id = space
        .homepage_id
        .ok_or_else(|| anyhow::anyhow!("Space {} has no homepage", space.key))?;
    Ok(CrawlTarget {
        root_id,
        root_kind: RootKind::Page,
    })
}

fn target_from_url(url: &Url) -> Option<CrawlTarget> {
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        let kind = match segment {
            "pages" => RootKind::Page,
            "folder" => RootKind::Folder,
            _ => continue,
        };
        if let Some(id) = segments.next()
            && !id.is_empty()
            && id.chars().all(|c| c.is_ascii_digit())
        {
            return Some(CrawlTarget {
                root_id: id.to_string(),
                root_kind: kind,
            });
        }
        return None;
    }
    None
}
