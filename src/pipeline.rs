//! End-to-end export: resolve a space, crawl its hierarchy, filter it,
//! fetch page bodies, and write the XML pack.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use crate::cache::DiskCache;
use crate::client::ApiClient;
use crate::crawler::{crawl_descendants, crawl_descendants_with_cache};
use crate::entity::Entity;
use crate::exporter::{BreadcrumbKind, ExportReport, export};
use crate::models::{NodeType, RootKind, Space};
use crate::page::{Page, PageField};
use crate::selector::filter_pages;
use crate::shortcuts::{PAGE_SIZE, get_pages_by_ids, get_space_by_id, get_space_by_key};

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy<'a> {
    pub cache: &'a DiskCache,
    pub expire: Option<Duration>,
    pub force_refresh: bool,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub breadcrumb: BreadcrumbKind,
    pub wanted_fields: Option<Vec<PageField>>,
    pub ignore_markdown_errors: bool,
    pub all_in_one: bool,
    /// Concurrent body-fetch requests.
    pub concurrency: usize,
    pub progress: bool,
    pub verbose: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            include: Vec::new(),
            exclude: Vec::new(),
            breadcrumb: BreadcrumbKind::Title,
            wanted_fields: None,
            ignore_markdown_errors: true,
            all_in_one: false,
            concurrency: 4,
            progress: false,
            verbose: false,
        }
    }
}

#[derive(Debug)]
pub struct ExportSummary {
    pub space: Space,
    /// Nodes discovered by the crawl (pages and folders).
    pub crawled: usize,
    /// Pages that survived the selector.
    pub selected: usize,
    pub report: ExportReport,
}

/// Resolve a space reference (key or numeric id) to its record.
pub async fn resolve_space(client: &ApiClient, space: &str) -> Result<Space> {
    if !space.is_empty() && space.chars().all(|c| c.is_ascii_digit()) {
        get_space_by_id(client, space).await
    } else {
        get_space_by_key(client, space).await
    }
}

/// Crawl `space`, keep the pages passing the include/exclude patterns, fetch
/// their bodies, and export them to `dir_out`.
pub async fn export_space(
    client: &ApiClient,
    space: &str,
    dir_out: &Path,
    cache: Option<CachePolicy<'_>>,
    opts: &ExportOptions,
) -> Result<ExportSummary> {
    let space = resolve_space(client, space).await?;
    let homepage_id = space
        .homepage_id
        .clone()
        .with_context(|| format!("Space {} has no homepage", space.key))?;

    let entities = match cache {
        Some(policy) => {
            crawl_descendants_with_cache(
                client,
                &homepage_id,
                RootKind::Page,
                policy.cache,
                None,
                policy.expire,
                policy.force_refresh,
                opts.verbose,
            )
            .await?
        }
        None => {
            crawl_descendants(client, &homepage_id, RootKind::Page, opts.verbose, None).await?
        }
    };
    let crawled = entities.len();

    let filtered = filter_pages(entities, &opts.include, &opts.exclude)?;
    let page_entities: Vec<Entity> = filtered
        .into_iter()
        .filter(|entity| entity.node().kind == NodeType::Page)
        .collect();
    let selected = page_entities.len();
    if opts.verbose {
        eprintln!("Crawled {crawled} node(s), exporting {selected} page(s)");
    }

    let ids: Vec<String> = page_entities
        .iter()
        .map(|entity| entity.node().id.clone())
        .collect();
    let mut records = fetch_bodies(client, &ids, opts.concurrency, opts.progress).await?;

    if records.len() != page_entities.len() {
        bail!(
            "Integrity error: {} page(s) selected but {} bodies fetched",
            page_entities.len(),
            records.len()
        );
    }

    let mut pages = Vec::with_capacity(page_entities.len());
    for entity in page_entities {
        let record = records.remove(&entity.node().id).with_context(|| {
            format!("Integrity error: no body fetched for page {}", entity.node().id)
        })?;
        pages.push(Page::new(entity, record, client.base_url()));
    }

    let report = export(
        &pages,
        dir_out,
        opts.breadcrumb,
        opts.wanted_fields.as_deref(),
        opts.ignore_markdown_errors,
        opts.all_in_one,
    )?;

    Ok(ExportSummary {
        space,
        crawled,
        selected,
        report,
    })
}

/// Fetch page bodies in batches, a bounded number of batches in flight.
async fn fetch_bodies(
    client: &ApiClient,
    ids: &[String],
    concurrency: usize,
    progress: bool,
) -> Result<HashMap<String, crate::models::PageRecord>> {
    let bar = if progress && !ids.is_empty() {
        let bar = ProgressBar::new(ids.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {pos}/{len} {wide_msg}").unwrap(),
        );
        bar.set_message("page bodies");
        Some(bar)
    } else {
        None
    };

    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let client = Arc::new(client.clone());
    let mut tasks = Vec::new();
    for chunk in ids.chunks(PAGE_SIZE) {
        let permit = sem.clone().acquire_owned().await?;
        let client = client.clone();
        let chunk: Vec<String> = chunk.to_vec();
        let bar = bar.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = permit;
            let pages = get_pages_by_ids(&client, &chunk).await?;
            if let Some(bar) = &bar {
                bar.inc(chunk.len() as u64);
            }
            Ok::<_, anyhow::Error>(pages)
        }));
    }

    let mut records = HashMap::new();
    for task in tasks {
        for record in task.await.context("Body fetch task failed")?? {
            records.insert(record.id.clone(), record);
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::auth::AuthMethod;
    use crate::test_support::fixture::{
        Fixture, parse_descendants_target, parse_page_ids_target,
    };
    use crate::test_support::http_server::start_server;

    const SPACE_ID: &str = "9";

    fn space_json(fixture: &Fixture) -> serde_json::Value {
        serde_json::json!({
            "id": SPACE_ID,
            "key": "TEST",
            "name": "Test Space",
            "homepageId": fixture.homepage_id(),
        })
    }

    /// Serve space lookup, descendants, and body batch requests for a
    /// fixture. `missing_body` suppresses one page from batch responses.
    fn full_handler(
        fixture: Arc<Fixture>,
        missing_body: Option<String>,
    ) -> impl Fn(usize, &str) -> (u16, Vec<(String, String)>, Vec<u8>) + Send + Sync + 'static
    {
        move |_hit, target| {
            let respond =
                |value: serde_json::Value| (200, vec![], serde_json::to_vec(&value).unwrap());

            if target.starts_with("/wiki/api/v2/spaces?") {
                return respond(serde_json::json!({"results": [space_json(&fixture)]}));
            }
            if target == format!("/wiki/api/v2/spaces/{SPACE_ID}") {
                return respond(space_json(&fixture));
            }
            if let Some(ids) = parse_page_ids_target(target) {
                let results: Vec<serde_json::Value> = ids
                    .iter()
                    .filter(|id| missing_body.as_deref() != Some(id.as_str()))
                    .map(|id| fixture.page_record_json(id))
                    .collect();
                return respond(serde_json::json!({"results": results}));
            }
            if let Some((_, id)) = parse_descendants_target(target)
                && let Some(body) = fixture.descendants_response(&id)
            {
                return respond(body);
            }
            (404, vec![], b"not found".to_vec())
        }
    }

    fn small_fixture() -> Arc<Fixture> {
        Arc::new(Fixture::from_paths(&[
            "p01-L1",
            "p01-L1/f02-L2",
            "p01-L1/f02-L2/p03-L3",
            "p01-L1/p04-L2",
        ]))
    }

    fn test_client(base: &str) -> ApiClient {
        ApiClient::new(
            base.to_string(),
            AuthMethod::Bearer {
                token: "token".to_string(),
            },
            0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn exports_a_space_end_to_end() {
        let fixture = small_fixture();
        let server = start_server(full_handler(fixture.clone(), None)).await;
        let client = test_client(&server.base_url);
        let dir = tempfile::tempdir().unwrap();

        let opts = ExportOptions {
            all_in_one: true,
            ..ExportOptions::default()
        };
        let summary = export_space(&client, "TEST", dir.path(), None, &opts)
            .await
            .unwrap();

        assert_eq!(summary.space.key, "TEST");
        assert_eq!(summary.crawled, 4);
        assert_eq!(summary.selected, 3);
        assert_eq!(summary.report.files.len(), 3);

        assert!(dir.path().join("p01-L1.xml").exists());
        assert!(dir.path().join("p01-L1~f02-L2~p03-L3.xml").exists());
        assert!(dir.path().join("p01-L1~p04-L2.xml").exists());

        let combined =
            std::fs::read_to_string(summary.report.all_in_one.unwrap()).unwrap();
        let first = combined.find("<title>p01-L1</title>").unwrap();
        let second = combined.find("<title>p03-L3</title>").unwrap();
        let third = combined.find("<title>p04-L2</title>").unwrap();
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn include_patterns_narrow_the_export() {
        let fixture = small_fixture();
        let root_id = fixture.id_of("p01-L1");
        let server = start_server(full_handler(fixture.clone(), None)).await;
        let client = test_client(&server.base_url);
        let dir = tempfile::tempdir().unwrap();

        let opts = ExportOptions {
            // strict descendants: p01 itself stays out
            include: vec![format!(
                "https://acme.atlassian.net/wiki/spaces/TEST/pages/{root_id}/p01/*"
            )],
            ..ExportOptions::default()
        };
        let summary = export_space(&client, SPACE_ID, dir.path(), None, &opts)
            .await
            .unwrap();

        assert_eq!(summary.selected, 2);
        assert!(!dir.path().join("p01-L1.xml").exists());
        assert!(dir.path().join("p01-L1~f02-L2~p03-L3.xml").exists());
        assert!(dir.path().join("p01-L1~p04-L2.xml").exists());
    }

    #[tokio::test]
    async fn missing_body_is_an_integrity_error() {
        let fixture = small_fixture();
        let missing = fixture.id_of("p04-L2");
        let server = start_server(full_handler(fixture.clone(), Some(missing))).await;
        let client = test_client(&server.base_url);
        let dir = tempfile::tempdir().unwrap();

        let err = export_space(
            &client,
            "TEST",
            dir.path(),
            None,
            &ExportOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Integrity error"));
    }

    #[tokio::test]
    async fn cached_export_reuses_the_crawl() {
        let fixture = small_fixture();
        let server = start_server(full_handler(fixture.clone(), None)).await;
        let client = test_client(&server.base_url);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(cache_dir.path()).unwrap();
        let opts = ExportOptions::default();

        let dir1 = tempfile::tempdir().unwrap();
        export_space(
            &client,
            "TEST",
            dir1.path(),
            Some(CachePolicy {
                cache: &cache,
                expire: Some(Duration::from_secs(60)),
                force_refresh: false,
            }),
            &opts,
        )
        .await
        .unwrap();
        let cold_hits = server.hit_count();

        let dir2 = tempfile::tempdir().unwrap();
        export_space(
            &client,
            "TEST",
            dir2.path(),
            Some(CachePolicy {
                cache: &cache,
                expire: Some(Duration::from_secs(60)),
                force_refresh: false,
            }),
            &opts,
        )
        .await
        .unwrap();

        // the second run re-resolves the space and re-fetches bodies, but
        // performs no descendants requests
        let descendants_requests = 1; // tree fits one wave
        assert_eq!(
            server.hit_count(),
            cold_hits + (cold_hits - descendants_requests)
        );
        assert!(dir2.path().join("p01-L1.xml").exists());
    }
}
