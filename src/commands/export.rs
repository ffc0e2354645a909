use std::time::Duration;

use anyhow::Result;
use confpack::cache::DiskCache;
use confpack::pipeline::{CachePolicy, ExportOptions, export_space};

use crate::cli::ExportArgs;
use crate::context::{AppContext, print_line};

pub async fn handle(ctx: &AppContext, args: ExportArgs) -> Result<()> {
    let client = crate::context::load_client(ctx)?;

    let cache = match &args.cache.cache_dir {
        Some(dir) => Some(DiskCache::open(dir)?),
        None => None,
    };
    let expire = match args.cache.expire {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let opts = ExportOptions {
        include: args.include,
        exclude: args.exclude,
        breadcrumb: args.breadcrumb,
        wanted_fields: args.fields,
        ignore_markdown_errors: !args.strict_markdown,
        all_in_one: args.all_in_one,
        concurrency: args.concurrency,
        progress: !ctx.quiet,
        verbose: ctx.verbose > 0,
    };

    let summary = export_space(
        &client,
        &args.space,
        &args.dest,
        cache.as_ref().map(|cache| CachePolicy {
            cache,
            expire,
            force_refresh: args.cache.force_refresh,
        }),
        &opts,
    )
    .await?;

    print_line(
        ctx,
        &format!(
            "Exported {} of {} crawled node(s) from space {} to {}",
            summary.selected,
            summary.crawled,
            summary.space.key,
            args.dest.display()
        ),
    );
    if let Some(path) = &summary.report.all_in_one {
        print_line(ctx, &format!("Wrote {}", path.display()));
    }
    Ok(())
}
