use anyhow::Result;
use confpack::cache::DiskCache;
use confpack::output::{OutputFormat, print_json, print_table_with_count};
use humansize::{BINARY, format_size};

use crate::cli::{CacheCommand, CacheClearArgs, CacheListArgs};
use crate::context::{AppContext, print_line};

pub fn handle(ctx: &AppContext, cmd: CacheCommand) -> Result<()> {
    match cmd {
        CacheCommand::List(args) => cache_list(ctx, args),
        CacheCommand::Clear(args) => cache_clear(ctx, args),
    }
}

fn cache_list(ctx: &AppContext, args: CacheListArgs) -> Result<()> {
    let cache = DiskCache::open(&args.cache_dir)?;
    let entries = cache.entries()?;
    if ctx.quiet {
        return Ok(());
    }
    match args.output {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Table => {
            let now_ms = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64;
            let rows = entries
                .iter()
                .map(|entry| {
                    let expiry = match entry.expires_at_ms {
                        None => "never".to_string(),
                        Some(at) if at <= now_ms => "expired".to_string(),
                        Some(at) => format!("in {}s", (at - now_ms) / 1000),
                    };
                    vec![
                        entry.key.clone(),
                        format_size(entry.size, BINARY),
                        expiry,
                    ]
                })
                .collect();
            print_table_with_count(&["Key", "Size", "Expires"], rows);
            Ok(())
        }
    }
}

fn cache_clear(ctx: &AppContext, args: CacheClearArgs) -> Result<()> {
    let cache = DiskCache::open(&args.cache_dir)?;
    let removed = cache.clear()?;
    let label = if removed == 1 { "entry" } else { "entries" };
    print_line(ctx, &format!("Removed {removed} cache {label}."));
    Ok(())
}
