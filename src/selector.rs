//! Include/exclude filtering of crawled entities by Confluence URL patterns.
//!
//! A pattern names a page or folder id and a match mode derived from its
//! suffix: no suffix selects the node itself, `/*` its strict descendants,
//! `/**` both. Patterns are matched against root-to-leaf id paths.

use anyhow::{Result, bail};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Only the node whose id equals the pattern id.
    SelfOnly,
    /// Only strict descendants of the pattern id.
    Descendants,
    /// The node itself plus all descendants.
    Recursive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub id: String,
    pub mode: MatchMode,
}

/// Parse a pattern from a Confluence page URL, folder URL, or bare decimal
/// id, with an optional `/*` or `/**` suffix.
pub fn parse_pattern(input: &str) -> Result<Pattern> {
    let (base, mode) = if let Some(base) = input.strip_suffix("/**") {
        (base, MatchMode::Recursive)
    } else if let Some(base) = input.strip_suffix("/*") {
        (base, MatchMode::Descendants)
    } else {
        (input, MatchMode::SelfOnly)
    };

    if !base.is_empty() && base.chars().all(|c| c.is_ascii_digit()) {
        return Ok(Pattern {
            id: base.to_string(),
            mode,
        });
    }

    if let Ok(url) = Url::parse(base)
        && let Some(id) = content_id_from_url(&url)
    {
        return Ok(Pattern { id, mode });
    }

    bail!("Invalid Confluence URL pattern: {input}")
}

/// Pull the numeric id out of `.../pages/<id>/...` or `.../folder/<id>`.
fn content_id_from_url(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "pages" || segment == "folder" {
            if let Some(id) = segments.next()
                && !id.is_empty()
                && id.chars().all(|c| c.is_ascii_digit())
            {
                return Some(id.to_string());
            }
            return None;
        }
    }
    None
}

/// Match a pattern against a root-to-leaf id path. Empty paths never match.
pub fn is_match(pattern: &Pattern, id_path: &[String]) -> bool {
    let Some((leaf, ancestors)) = id_path.split_last() else {
        return false;
    };
    match pattern.mode {
        MatchMode::SelfOnly => *leaf == pattern.id,
        MatchMode::Descendants => ancestors.iter().any(|id| *id == pattern.id),
        MatchMode::Recursive => id_path.iter().any(|id| *id == pattern.id),
    }
}

/// Combined include/exclude rule set. An empty include list admits
/// everything; exclude always wins.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Selector {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        Ok(Selector {
            include: parse_patterns(include)?,
            exclude: parse_patterns(exclude)?,
        })
    }

    pub fn should_include(&self, id_path: &[String]) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| is_match(p, id_path));
        if !included {
            return false;
        }
        !self.exclude.iter().any(|p| is_match(p, id_path))
    }

    /// Filter `(item, id_path)` pairs, keeping selected ones.
    pub fn select<T>(
        &self,
        items: impl IntoIterator<Item = (T, Vec<String>)>,
    ) -> impl Iterator<Item = (T, Vec<String>)> {
        items
            .into_iter()
            .filter(|(_, id_path)| self.should_include(id_path))
    }
}

fn parse_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>> {
    patterns.iter().map(|p| parse_pattern(p.as_ref())).collect()
}

/// Convenience wrapper: keep the entities whose id path passes the given
/// include/exclude patterns.
pub fn filter_pages<S: AsRef<str>>(
    entities: Vec<crate::entity::Entity>,
    include: &[S],
    exclude: &[S],
) -> Result<Vec<crate::entity::Entity>> {
    let selector = Selector::new(include, exclude)?;
    Ok(entities
        .into_iter()
        .filter(|entity| selector.should_include(&entity.id_path()))
        .collect())
}
