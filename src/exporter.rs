//! Write rendered pages to disk, one XML file per page plus an optional
//! concatenated `all_in_one.txt`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::page::{Page, PageField};

pub const ALL_IN_ONE_FILE: &str = "all_in_one.txt";

/// Which path flavour names the per-page files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BreadcrumbKind {
    Id,
    Title,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub all_in_one: Option<PathBuf>,
}

/// Render and write `pages` in the order given (callers pass them in entity
/// sort order, which `all_in_one.txt` preserves).
pub fn export(
    pages: &[Page],
    dir_out: &Path,
    breadcrumb: BreadcrumbKind,
    wanted_fields: Option<&[PageField]>,
    ignore_error: bool,
    all_in_one: bool,
) -> Result<ExportReport> {
    fs::create_dir_all(dir_out)
        .with_context(|| format!("Failed to create output dir: {}", dir_out.display()))?;

    let mut files = Vec::with_capacity(pages.len());
    let mut documents = Vec::with_capacity(pages.len());

    for page in pages {
        let xml = page.to_xml(wanted_fields, ignore_error)?;
        let breadcrumb_path = match breadcrumb {
            BreadcrumbKind::Id => page.entity.id_breadcrumb_path(),
            BreadcrumbKind::Title => page.entity.title_breadcrumb_path(),
        };
        let path = dir_out.join(format!("{breadcrumb_path}.xml"));
        fs::write(&path, &xml)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        files.push(path);
        documents.push(xml);
    }

    let all_in_one = if all_in_one {
        let path = dir_out.join(ALL_IN_ONE_FILE);
        fs::write(&path, documents.join("\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Some(path)
    } else {
        None
    };

    Ok(ExportReport { files, all_in_one })
}
