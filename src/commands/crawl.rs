use std::time::Duration;

use anyhow::Result;
use confpack::cache::DiskCache;
use confpack::crawler::{crawl_descendants, crawl_descendants_with_cache};
use confpack::entity::Entity;
use confpack::output::{OutputFormat, print_json, print_table_with_count};

use crate::cli::CrawlArgs;
use crate::context::AppContext;
use crate::resolve::resolve_crawl_target;

pub async fn handle(ctx: &AppContext, args: CrawlArgs) -> Result<()> {
    let client = crate::context::load_client(ctx)?;
    let target = resolve_crawl_target(&client, &args.target, args.root_kind).await?;
    let verbose = ctx.verbose > 0;

    let entities = match &args.cache.cache_dir {
        Some(dir) => {
            let cache = DiskCache::open(dir)?;
            let expire = match args.cache.expire {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
            crawl_descendants_with_cache(
                &client,
                &target.root_id,
                target.root_kind,
                &cache,
                None,
                expire,
                args.cache.force_refresh,
                verbose,
            )
            .await?
        }
        None => {
            crawl_descendants(
                &client,
                &target.root_id,
                target.root_kind,
                verbose,
                args.limit,
            )
            .await?
        }
    };

    if ctx.quiet {
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => print_json(&entities),
        OutputFormat::Table => {
            if args.tree {
                for line in tree_lines(&entities) {
                    println!("{line}");
                }
            } else {
                let rows = entities
                    .iter()
                    .map(|entity| {
                        let node = entity.node();
                        vec![
                            node.id.clone(),
                            node.title.clone(),
                            node.kind.as_str().to_string(),
                            node.parent_id.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                print_table_with_count(&["ID", "Title", "Type", "Parent"], rows);
            }
            Ok(())
        }
    }
}

/// Indented view of an already depth-first-ordered entity list.
fn tree_lines(entities: &[Entity]) -> Vec<String> {
    entities
        .iter()
        .map(|entity| {
            let node = entity.node();
            format!(
                "{}- {} ({})",
                "  ".repeat(entity.lineage().len() - 1),
                node.title,
                node.id
            )
        })
        .collect()
}
