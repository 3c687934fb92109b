//! Derives [`Post`]s from loaded [`Source`]s: slugs, publication timestamps,
//! draft flags, templates and tags.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::parser::Source;
use crate::post::{Post, Template};
use crate::tag::Tag;
use crate::timestamp::{Published, TimestampKey, TimestampLookup};

/// The file name which makes a directory a post bundle: `foo/index.md` is
/// the post `/foo`.
const BUNDLE_INDEX: &str = "index.md";

/// Derives [`Post`]s from [`Source`]s. Timestamps come from an injected
/// [`TimestampLookup`], so deriving is otherwise pure.
pub struct Deriver<'a> {
    lookup: &'a dyn TimestampLookup,
}

impl<'a> Deriver<'a> {
    pub fn new(lookup: &'a dyn TimestampLookup) -> Deriver<'a> {
        Deriver { lookup }
    }

    /// Derives every source, failing on the first error.
    pub fn derive_all(&self, sources: Vec<Source>) -> Result<Vec<Post>> {
        sources.into_iter().map(|s| self.derive(s)).collect()
    }

    /// Derives a single [`Post`]:
    ///
    /// * `slug` is the front-matter `slug` if present, otherwise the path
    ///   relative to the content root without its extension (`foo/index.md`
    ///   counts as `foo`). Either way it is normalized to `/a/b`.
    /// * `draft` defaults to `false`.
    /// * `published` is only resolved for blog posts. A lookup that fails or
    ///   finds nothing leaves the post [`Published::Unpublished`]. The
    ///   lookup key is the path slug with its `/`s removed plus `.md`, so
    ///   `2020/hello.md` is asked for as `2020hello.md`.
    /// * `tags` keep their written order, minus duplicates.
    pub fn derive(&self, source: Source) -> Result<Post> {
        let path_slug = path_slug(&source.relative_path)?;
        let slug = match &source.frontmatter.slug {
            Some(explicit) => normalize_slug(explicit)
                .ok_or_else(|| Error::EmptySlug(source.path.clone()))?,
            None => format!("/{}", path_slug.join("/")),
        };

        let template = Template::from_key(source.frontmatter.template_key.as_deref());
        let published = match template {
            Template::BlogPost => {
                let name = format!("{}.md", path_slug.concat());
                self.published(&name, &source.path)
            }
            _ => Published::Unpublished,
        };

        let mut tags: Vec<Tag> = Vec::new();
        for name in source.frontmatter.tags.iter().flatten() {
            let tag = Tag::new(name);
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        debug!(slug = %slug, template = template.key(), %published, "derived post");
        Ok(Post {
            slug,
            title: source.frontmatter.title,
            tags,
            template,
            draft: source.frontmatter.draft.unwrap_or(false),
            published,
            date: source.frontmatter.date,
            image: source.frontmatter.image,
            excerpt: source.excerpt,
            source: source.path,
        })
    }

    fn published(&self, name: &str, path: &Path) -> Published {
        match self.lookup.lookup(&TimestampKey { name, path }) {
            Ok(Some(at)) => Published::At(at),
            Ok(None) => {
                debug!(post = name, "no timestamp found; marking unpublished");
                Published::Unpublished
            }
            Err(err) => {
                warn!(post = name, %err, "resolving timestamp failed; marking unpublished");
                Published::Unpublished
            }
        }
    }
}

/// Splits a source path (relative to its content root) into slug segments,
/// dropping the extension and collapsing `foo/index.md` into `foo`.
fn path_slug(relative_path: &Path) -> Result<Vec<String>> {
    let invalid = || Error::InvalidFileName(relative_path.to_owned());

    // A bundle's directory name is kept whole, dots included.
    let stem = match relative_path.file_name() {
        Some(name) if name == BUNDLE_INDEX => {
            relative_path.parent().ok_or_else(invalid)?.to_owned()
        }
        _ => relative_path.with_extension(""),
    };

    let mut segments = Vec::new();
    for component in stem.components() {
        match component {
            Component::Normal(segment) => {
                segments.push(segment.to_str().ok_or_else(invalid)?.to_owned())
            }
            Component::CurDir => {}
            _ => return Err(invalid()),
        }
    }
    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments)
}

/// Normalizes an explicit slug to `/a/b` form, or `None` if nothing is left.
fn normalize_slug(slug: &str) -> Option<String> {
    let trimmed = slug.trim().trim_matches('/');
    match trimmed.is_empty() {
        true => None,
        false => Some(format!("/{}", trimmed)),
    }
}

/// The result of a fallible derivation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error deriving a [`Post`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a source path can't be turned into a slug (it isn't
    /// valid UTF-8, escapes its root, or is a bare `index.md`).
    #[error("invalid file name: {0:?}")]
    InvalidFileName(PathBuf),

    /// Returned when an explicit front-matter `slug` is empty.
    #[error("empty slug in `{}`", .0.display())]
    EmptySlug(PathBuf),
}
