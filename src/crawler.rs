//! Space crawling through the depth-capped descendants API.
//!
//! The descendants endpoints only return nodes within [`MAX_DEPTH`] levels
//! of the queried root, so a deep hierarchy cannot be fetched in one call.
//! The crawler expands the tree in waves: nodes returned at the cap are
//! *boundary nodes* that may have unseen children, and each wave re-fetches
//! from their nearest page ancestors. Clustering boundary nodes by ancestor
//! amortizes one request across all of its boundary descendants.
//!
//! Folders complicate re-rooting: the page descendants endpoint rejects
//! them, so the re-root walk looks for a page. A page more than four hops
//! above a boundary node is useless as a re-root (its fetch cannot reach
//! past the boundary), which happens when a long folder chain sits between
//! two pages; in that case the boundary node's parent folder is queried
//! through the folder descendants endpoint instead. The crawl root itself
//! is the last resort for nodes whose parents were never seen.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Result;

use crate::cache::DiskCache;
use crate::client::{ApiClient, is_not_found};
use crate::codec::{deserialize_entities, serialize_entities};
use crate::entity::{Entity, sort_entities};
use crate::models::{Node, NodeType, RootKind};
use crate::shortcuts::{MAX_DEPTH, get_descendants_of_folder, get_descendants_of_page};

/// Hard cap on ancestor walks, in case the server ever hands back a parent
/// cycle.
const MAX_LINEAGE_HOPS: usize = 1024;

/// A page this far above a boundary node (or farther) cannot expose the
/// node's children within the depth cap.
const MAX_REROOT_DISTANCE: usize = (MAX_DEPTH - 1) as usize;

/// Fetch the complete descendant subtree of `root_id`, regardless of depth.
///
/// The root itself is not included. Entities come back in depth-first
/// preorder (`position_path` order, ties broken by id) and each carries its
/// full lineage up to the crawl root's children.
///
/// `limit` caps the number of nodes fetched per re-root request, mostly
/// useful for sampling very large spaces.
pub async fn crawl_descendants(
    client: &ApiClient,
    root_id: &str,
    root_kind: RootKind,
    verbose: bool,
    limit: Option<usize>,
) -> Result<Vec<Entity>> {
    let mut node_pool: HashMap<String, Entity> = HashMap::new();
    // id -> endpoint kind; BTreeMap keeps fetch order deterministic
    let mut current_roots: BTreeMap<String, RootKind> = BTreeMap::new();
    current_roots.insert(root_id.to_string(), root_kind);
    let mut iteration = 0u32;

    while !current_roots.is_empty() {
        iteration += 1;
        if verbose {
            eprintln!(
                "Iteration {iteration}: fetching from {} root(s)",
                current_roots.len()
            );
        }

        let mut new_nodes = 0usize;
        let mut boundary_ids: Vec<String> = Vec::new();

        for (fetch_root, fetch_kind) in &current_roots {
            let fetched = match fetch_kind {
                RootKind::Page => get_descendants_of_page(client, fetch_root, limit).await,
                RootKind::Folder => get_descendants_of_folder(client, fetch_root, limit).await,
            };
            let nodes = match fetched {
                Ok(nodes) => nodes,
                Err(err) if iteration > 1 && is_not_found(&err) => {
                    // Deleted between waves; the remaining roots still cover
                    // their own clusters.
                    if verbose {
                        eprintln!("  - Re-root {fetch_root} no longer exists, skipping");
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };

            for node in nodes {
                if node_pool.contains_key(&node.id) {
                    continue;
                }
                new_nodes += 1;

                let is_boundary = node.depth == MAX_DEPTH
                    && matches!(node.kind, NodeType::Page | NodeType::Folder);
                if is_boundary {
                    boundary_ids.push(node.id.clone());
                }

                let lineage = build_lineage(node, &node_pool);
                let entity = Entity::new(lineage);
                node_pool.insert(entity.node().id.clone(), entity);
            }
        }

        if verbose {
            eprintln!(
                "  - Found {new_nodes} new node(s), {} at the depth boundary",
                boundary_ids.len()
            );
        }

        if boundary_ids.is_empty() {
            break;
        }

        current_roots = cluster_reroots(&boundary_ids, &node_pool, root_id, root_kind);
        if verbose {
            eprintln!(
                "  - Clustered into {} re-root(s) for the next iteration",
                current_roots.len()
            );
        }
    }

    if verbose {
        eprintln!(
            "Completed: {} node(s) in {iteration} iteration(s)",
            node_pool.len()
        );
    }

    let mut entities: Vec<Entity> = node_pool.into_values().collect();
    sort_entities(&mut entities);
    Ok(entities)
}

/// Lineage of a freshly discovered node: itself, then every ancestor already
/// in the pool, ending at the first unknown parent (the crawl root or an
/// out-of-scope node).
fn build_lineage(node: Node, node_pool: &HashMap<String, Entity>) -> Vec<Node> {
    let mut lineage = vec![node];
    let mut current = lineage[0].parent_id.clone();
    while let Some(parent_id) = current {
        if lineage.len() >= MAX_LINEAGE_HOPS {
            eprintln!(
                "Ancestor chain above node {} exceeds {MAX_LINEAGE_HOPS} hops, truncating \
                 (parent data is likely cyclic)",
                lineage[0].id
            );
            break;
        }
        match node_pool.get(&parent_id) {
            Some(parent) => {
                lineage.push(parent.node().clone());
                current = parent.node().parent_id.clone();
            }
            None => break,
        }
    }
    lineage
}

/// Pick the next wave of re-roots for a set of boundary nodes.
///
/// Preference order per node: nearest page ancestor within
/// [`MAX_REROOT_DISTANCE`] hops, else the parent folder (folder endpoint),
/// else the original crawl root.
fn cluster_reroots(
    boundary_ids: &[String],
    node_pool: &HashMap<String, Entity>,
    root_id: &str,
    root_kind: RootKind,
) -> BTreeMap<String, RootKind> {
    let mut reroots = BTreeMap::new();

    for boundary_id in boundary_ids {
        let parent_id = node_pool[boundary_id].node().parent_id.clone();

        let mut page_ancestor = None;
        let mut current = parent_id.clone();
        for _ in 0..MAX_REROOT_DISTANCE {
            let Some(id) = current else {
                break;
            };
            let Some(entity) = node_pool.get(&id) else {
                break;
            };
            if entity.node().kind == NodeType::Page {
                page_ancestor = Some(id);
                break;
            }
            current = entity.node().parent_id.clone();
        }

        if let Some(id) = page_ancestor {
            reroots.insert(id, RootKind::Page);
        } else if let Some(id) = parent_id.filter(|id| node_pool.contains_key(id)) {
            // Folder spine: no page is close enough to expose the frontier,
            // so query the parent folder directly.
            reroots.insert(id, RootKind::Folder);
        } else {
            reroots.insert(root_id.to_string(), root_kind);
        }
    }

    reroots
}

/// Cache-through variant of [`crawl_descendants`].
///
/// A fresh cache entry short-circuits the crawl entirely; a missing,
/// expired, or unreadable entry falls back to a live crawl whose result is
/// written back with the given TTL. `force_refresh` skips the read but
/// still writes.
#[allow(clippy::too_many_arguments)]
pub async fn crawl_descendants_with_cache(
    client: &ApiClient,
    root_id: &str,
    root_kind: RootKind,
    cache: &DiskCache,
    cache_key: Option<&str>,
    expire: Option<Duration>,
    force_refresh: bool,
    verbose: bool,
) -> Result<Vec<Entity>> {
    let default_key = format!("crawl_descendants@{root_id}");
    let key = cache_key.unwrap_or(&default_key);

    if !force_refresh
        && let Some(bytes) = cache.get(key)?
    {
        match deserialize_entities(&bytes) {
            Ok(entities) => {
                if verbose {
                    eprintln!("Cache hit for {key}: {} node(s)", entities.len());
                }
                return Ok(entities);
            }
            Err(err) => {
                if verbose {
                    eprintln!("Discarding unreadable cache entry {key}: {err}");
                }
            }
        }
    }

    let entities = crawl_descendants(client, root_id, root_kind, verbose, None).await?;
    cache.set(key, &serialize_entities(&entities)?, expire)?;
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::AuthMethod;
    use crate::test_support::fixture::{
        DEEP_HIERARCHY, FOLDER_SPINE, Fixture, descendants_handler, parse_descendants_target,
    };
    use crate::test_support::http_server::start_server;

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

    // The deep fixture needs four waves of requests:
    //   1 (homepage) + 4 (L3/L4 pages) + 5 (L7/L8 pages) + 3 (L11 pages),
    // the last wave finding nothing new.
    const DEEP_FIXTURE_REQUESTS: usize = 13;

    #[tokio::test]
    async fn crawls_the_deep_hierarchy_completely() {
        let fixture = Arc::new(Fixture::from_paths(DEEP_HIERARCHY));
        let server = start_server(descendants_handler(fixture.clone())).await;
        let client = test_client(&server.base_url);

        let entities = crawl_descendants(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            false,
            None,
        )
        .await
        .unwrap();

        assert_eq!(entities.len(), 77);
        assert_eq!(entities.len(), fixture.node_count());

        let pages = entities
            .iter()
            .filter(|e| e.node().kind == NodeType::Page)
            .count();
        let folders = entities
            .iter()
            .filter(|e| e.node().kind == NodeType::Folder)
            .count();
        assert_eq!((pages, folders), (42, 35));

        let max_lineage = entities.iter().map(|e| e.lineage().len()).max().unwrap();
        assert_eq!(max_lineage, 12);

        assert_eq!(server.hit_count(), DEEP_FIXTURE_REQUESTS);
    }

    #[tokio::test]
    async fn returns_depth_first_preorder() {
        let fixture = Arc::new(Fixture::from_paths(DEEP_HIERARCHY));
        let server = start_server(descendants_handler(fixture.clone())).await;
        let client = test_client(&server.base_url);

        let entities = crawl_descendants(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            false,
            None,
        )
        .await
        .unwrap();

        let titles: Vec<&str> = entities
            .iter()
            .take(10)
            .map(|e| e.node().title.as_str())
            .collect();
        assert_eq!(
            titles,
            [
                "p01-L1", "p02-L2", "p03-L3", "f04-L4", "p05-L5", "p06-L6", "p07-L7", "f08-L8",
                "p09-L9", "p10-L10",
            ]
        );

        let paths: Vec<Vec<i64>> = entities.iter().map(|e| e.position_path()).collect();
        assert!(paths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn lineages_are_sound() {
        let fixture = Arc::new(Fixture::from_paths(DEEP_HIERARCHY));
        let server = start_server(descendants_handler(fixture.clone())).await;
        let client = test_client(&server.base_url);

        let entities = crawl_descendants(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            false,
            None,
        )
        .await
        .unwrap();

        let mut seen = std::collections::HashSet::new();
        for entity in &entities {
            assert!(seen.insert(entity.node().id.clone()), "duplicate entity");

            let lineage = entity.lineage();
            for pair in lineage.windows(2) {
                assert_eq!(pair[0].parent_id.as_deref(), Some(pair[1].id.as_str()));
            }
            // every lineage tops out at a child of the crawl root
            let top = lineage.last().unwrap();
            assert_eq!(top.parent_id.as_deref(), Some(fixture.homepage_id()));
        }
    }

    #[tokio::test]
    async fn crawl_root_may_be_a_folder() {
        let fixture = Arc::new(Fixture::from_paths(DEEP_HIERARCHY));
        let folder_root = fixture.id_of("f66-L1");
        let fixture_for_handler = fixture.clone();
        let server = start_server(move |_hit, target| {
            let Some((endpoint, id)) = parse_descendants_target(target) else {
                return (404, vec![], Vec::new());
            };
            // the folder root must arrive on the folder endpoint
            if id == fixture_for_handler.id_of("f66-L1") {
                assert_eq!(endpoint, "folders");
            } else {
                assert_eq!(endpoint, "pages");
            }
            match fixture_for_handler.descendants_response(&id) {
                Some(body) => (200, vec![], serde_json::to_vec(&body).unwrap()),
                None => (404, vec![], Vec::new()),
            }
        })
        .await;
        let client = test_client(&server.base_url);

        let entities = crawl_descendants(&client, &folder_root, RootKind::Folder, false, None)
            .await
            .unwrap();

        // branch 3 below f66: p67 .. p77
        assert_eq!(entities.len(), 11);
        assert_eq!(
            entities.iter().map(|e| e.node().title.as_str()).max(),
            Some("p77-L12")
        );
    }

    #[tokio::test]
    async fn folder_spine_is_fully_crawled() {
        let fixture = Arc::new(Fixture::from_paths(FOLDER_SPINE));
        let server = start_server(descendants_handler(fixture.clone())).await;
        let client = test_client(&server.base_url);

        let entities = crawl_descendants(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            false,
            None,
        )
        .await
        .unwrap();

        assert_eq!(entities.len(), fixture.node_count());
        let bottom = entities
            .iter()
            .find(|e| e.node().title == "p85-L8")
            .expect("page below the folder chain was crawled");
        assert_eq!(bottom.lineage().len(), 8);
    }

    #[tokio::test]
    async fn selector_patterns_filter_crawled_entities() {
        let fixture = Arc::new(Fixture::from_paths(DEEP_HIERARCHY));
        let server = start_server(descendants_handler(fixture.clone())).await;
        let client = test_client(&server.base_url);

        let entities = crawl_descendants(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            false,
            None,
        )
        .await
        .unwrap();

        // descendants of the f04 folder, without f04 itself
        let f04 = fixture.id_of("f04-L4");
        let include = format!(
            "https://acme.atlassian.net/wiki/spaces/TEST/folder/{f04}?atlOrigin=x/*"
        );
        let kept =
            crate::selector::filter_pages(entities.clone(), &[include.as_str()], &[]).unwrap();
        assert_eq!(kept.len(), fixture.subtree_ids(&f04).len());
        assert!(kept.iter().all(|e| e.node().title != "f04-L4"));

        // the whole p01 branch minus everything below (and including) p07
        let p01 = fixture.id_of("p01-L1");
        let p07 = fixture.id_of("p07-L7");
        let include = format!(
            "https://acme.atlassian.net/wiki/spaces/TEST/pages/{p01}/Branch/**"
        );
        let exclude = format!(
            "https://acme.atlassian.net/wiki/spaces/TEST/pages/{p07}/Deep/**"
        );
        let kept = crate::selector::filter_pages(
            entities,
            &[include.as_str()],
            &[exclude.as_str()],
        )
        .unwrap();
        assert!(kept.iter().any(|e| e.node().title == "p01-L1"));
        assert!(
            kept.iter()
                .all(|e| e.id_path().iter().all(|id| *id != p07))
        );
        let p01_branch_size = fixture.subtree_ids(&p01).len() + 1;
        let p07_branch_size = fixture.subtree_ids(&p07).len() + 1;
        assert_eq!(kept.len(), p01_branch_size - p07_branch_size);
    }

    #[tokio::test]
    async fn vanished_reroot_is_tolerated() {
        // p86 .. p91: a pure page chain one level past the cap
        let specs = ["p86-L1/p87-L2/p88-L3/p89-L4/p90-L5/p91-L6"];
        let fixture = Arc::new(Fixture::from_paths(&specs));
        let vanished = fixture.id_of("p89-L4");
        let fixture_for_handler = fixture.clone();
        let server = start_server(move |_hit, target| {
            match parse_descendants_target(target) {
                Some((_, id)) if id == vanished => (404, vec![], Vec::new()),
                Some((_, id)) => match fixture_for_handler.descendants_response(&id) {
                    Some(body) => (200, vec![], serde_json::to_vec(&body).unwrap()),
                    None => (404, vec![], Vec::new()),
                },
                None => (404, vec![], Vec::new()),
            }
        })
        .await;
        let client = test_client(&server.base_url);

        let entities = crawl_descendants(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            false,
            None,
        )
        .await
        .unwrap();

        // everything visible from the first wave survives
        assert_eq!(entities.len(), 5);
    }

    #[tokio::test]
    async fn missing_crawl_root_is_fatal() {
        let fixture = Arc::new(Fixture::from_paths(&["p01-L1"]));
        let server = start_server(descendants_handler(fixture)).await;
        let client = test_client(&server.base_url);

        let err = crawl_descendants(&client, "424242", RootKind::Page, false, None)
            .await
            .unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn cache_hit_skips_the_api_entirely() {
        let fixture = Arc::new(Fixture::from_paths(DEEP_HIERARCHY));
        let server = start_server(descendants_handler(fixture.clone())).await;
        let client = test_client(&server.base_url);
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();

        let first = crawl_descendants_with_cache(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            &cache,
            None,
            Some(Duration::from_secs(60)),
            false,
            false,
        )
        .await
        .unwrap();
        assert_eq!(first.len(), 77);
        assert_eq!(server.hit_count(), DEEP_FIXTURE_REQUESTS);

        let second = crawl_descendants_with_cache(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            &cache,
            None,
            Some(Duration::from_secs(60)),
            false,
            false,
        )
        .await
        .unwrap();
        assert_eq!(second, first);
        assert_eq!(server.hit_count(), DEEP_FIXTURE_REQUESTS);
    }

    #[tokio::test]
    async fn force_refresh_crawls_again_but_rewrites_the_cache() {
        let fixture = Arc::new(Fixture::from_paths(DEEP_HIERARCHY));
        let server = start_server(descendants_handler(fixture.clone())).await;
        let client = test_client(&server.base_url);
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();

        for _ in 0..2 {
            let entities = crawl_descendants_with_cache(
                &client,
                fixture.homepage_id(),
                RootKind::Page,
                &cache,
                None,
                None,
                true,
                false,
            )
            .await
            .unwrap();
            assert_eq!(entities.len(), 77);
        }
        assert_eq!(server.hit_count(), 2 * DEEP_FIXTURE_REQUESTS);

        let key = format!("crawl_descendants@{}", fixture.homepage_id());
        assert!(cache.get(&key).unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_cache_entry_degrades_to_a_fresh_crawl() {
        let fixture = Arc::new(Fixture::from_paths(DEEP_HIERARCHY));
        let server = start_server(descendants_handler(fixture.clone())).await;
        let client = test_client(&server.base_url);
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();

        let key = format!("crawl_descendants@{}", fixture.homepage_id());
        cache.set(&key, b"not a gzip payload", None).unwrap();

        let entities = crawl_descendants_with_cache(
            &client,
            fixture.homepage_id(),
            RootKind::Page,
            &cache,
            None,
            None,
            false,
            false,
        )
        .await
        .unwrap();
        assert_eq!(entities.len(), 77);
        assert_eq!(server.hit_count(), DEEP_FIXTURE_REQUESTS);

        // the bad entry was replaced by a readable one
        let bytes = cache.get(&key).unwrap().unwrap();
        assert_eq!(deserialize_entities(&bytes).unwrap().len(), 77);
    }
}
