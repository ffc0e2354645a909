//! Typed wrappers over the REST client for the handful of endpoints the
//! crawler and exporter need.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::client::ApiClient;
use crate::models::{Node, PageRecord, Space};

/// Depth cap enforced by the descendants endpoints.
pub const MAX_DEPTH: i64 = 5;
/// Page size used for every paginated request.
pub const PAGE_SIZE: usize = 250;
/// Body representation fetched for export.
const BODY_FORMAT: &str = "view";

pub async fn get_space_by_id(client: &ApiClient, space_id: &str) -> Result<Space> {
    let url = client.v2_url(&format!("/spaces/{space_id}"));
    let (json, _) = client.get_json(url).await?;
    from_value(json)
}

pub async fn get_space_by_key(client: &ApiClient, space_key: &str) -> Result<Space> {
    let url = with_query(
        &client.v2_url("/spaces"),
        &[("keys", space_key), ("limit", "1")],
    )?;
    let results = client.get_paginated_results(url, Some(1)).await?;
    let space = results
        .into_iter()
        .next()
        .with_context(|| format!("Space '{space_key}' not found"))?;
    from_value(space)
}

/// All pages of a space, bodies included, in no particular order.
pub async fn get_pages_in_space(
    client: &ApiClient,
    space_id: &str,
    max_items: Option<usize>,
) -> Result<Vec<PageRecord>> {
    let url = with_query(
        &client.v2_url(&format!("/spaces/{space_id}/pages")),
        &[
            ("body-format", BODY_FORMAT),
            ("limit", &PAGE_SIZE.to_string()),
        ],
    )?;
    let results = client.get_paginated_results(url, max_items).await?;
    results.into_iter().map(from_value).collect()
}

/// Batch-fetch pages by id, bodies included. Ids the server does not know
/// are silently absent from the result; callers needing completeness must
/// compare counts.
pub async fn get_pages_by_ids(client: &ApiClient, ids: &[String]) -> Result<Vec<PageRecord>> {
    let mut pages = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(PAGE_SIZE) {
        let url = with_query(
            &client.v2_url("/pages"),
            &[
                ("id", &chunk.join(",")),
                ("body-format", BODY_FORMAT),
                ("limit", &PAGE_SIZE.to_string()),
            ],
        )?;
        let results = client.get_paginated_results(url, None).await?;
        for value in results {
            pages.push(from_value(value)?);
        }
    }
    Ok(pages)
}

/// Descendants of a page, up to `MAX_DEPTH` levels below it.
pub async fn get_descendants_of_page(
    client: &ApiClient,
    page_id: &str,
    max_items: Option<usize>,
) -> Result<Vec<Node>> {
    get_descendants(client, "pages", page_id, max_items).await
}

/// Descendants of a folder, up to `MAX_DEPTH` levels below it.
pub async fn get_descendants_of_folder(
    client: &ApiClient,
    folder_id: &str,
    max_items: Option<usize>,
) -> Result<Vec<Node>> {
    get_descendants(client, "folders", folder_id, max_items).await
}

async fn get_descendants(
    client: &ApiClient,
    endpoint: &str,
    id: &str,
    max_items: Option<usize>,
) -> Result<Vec<Node>> {
    let url = with_query(
        &client.v2_url(&format!("/{endpoint}/{id}/descendants")),
        &[
            ("depth", &MAX_DEPTH.to_string()),
            ("limit", &PAGE_SIZE.to_string()),
        ],
    )?;
    let results = client.get_paginated_results(url, max_items).await?;
    results.into_iter().map(from_value).collect()
}

/// Id and title of content created through the factory helpers.
#[cfg(feature = "write")]
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreatedContent {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[cfg(feature = "write")]
pub async fn create_page(
    client: &ApiClient,
    space_id: &str,
    parent_id: Option<&str>,
    title: &str,
    body_html: &str,
) -> Result<CreatedContent> {
    let mut body = serde_json::json!({
        "spaceId": space_id,
        "status": "current",
        "title": title,
        "body": {"representation": "storage", "value": body_html},
    });
    if let Some(parent_id) = parent_id {
        body["parentId"] = Value::String(parent_id.to_string());
    }
    let json = client.post_json(client.v2_url("/pages"), body).await?;
    from_value(json)
}

#[cfg(feature = "write")]
pub async fn create_folder(
    client: &ApiClient,
    space_id: &str,
    parent_id: Option<&str>,
    title: &str,
) -> Result<CreatedContent> {
    let mut body = serde_json::json!({
        "spaceId": space_id,
        "title": title,
    });
    if let Some(parent_id) = parent_id {
        body["parentId"] = Value::String(parent_id.to_string());
    }
    let json = client.post_json(client.v2_url("/folders"), body).await?;
    from_value(json)
}

#[cfg(feature = "write")]
pub async fn delete_page(client: &ApiClient, page_id: &str) -> Result<()> {
    client.delete(client.v2_url(&format!("/pages/{page_id}"))).await
}

#[cfg(feature = "write")]
pub async fn delete_folder(client: &ApiClient, folder_id: &str) -> Result<()> {
    client
        .delete(client.v2_url(&format!("/folders/{folder_id}")))
        .await
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).context("Unexpected response shape")
}

fn with_query(base: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(base)?;
    {
        let mut qp = url.query_pairs_mut();
        for (key, value) in params {
            qp.append_pair(key, value);
        }
    }
    Ok(url.to_string())
}
