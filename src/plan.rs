//! Plans the output pages for a set of [`Post`]s. Planning is a pure
//! function: it does no I/O and, given the same posts in any order, always
//! produces the same pages in the same order. The pages are, in order:
//!
//! 1. Index pages: the listed posts (neither drafts nor static pages),
//!    paginated. The first page is `/`, the rest are `/2`, `/3`, etc.
//! 2. Post pages: one per post, static pages included, at the post's slug.
//! 3. Tag pages: one per tag used by a listed post, at
//!    `/tags/{tag-with-hyphens}/`.
//! 4. The tag overview page at `/tags/`.
//!
//! Every post is sorted by slug, descending, before any of this happens; all
//! of the pages above inherit that order.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::post::{Post, Template};
use crate::tag::Tag;
use crate::timestamp::Published;

/// The route of the first index page.
pub const ROOT_ROUTE: &str = "/";

/// The route of the tag overview page.
pub const TAGS_ROUTE: &str = "/tags/";

/// Knobs for [`plan`].
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// The number of posts per index page. Must be positive.
    pub page_size: usize,

    /// The maximum number of related posts listed on a post page.
    pub related_limit: usize,
}

/// A planned output page. Pages are immutable; an external renderer turns
/// each into markup using the page's kind (and, for posts, its template).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Page {
    /// A post or static page.
    Post {
        route: String,
        template: Template,
        source: PathBuf,
        context: PostContext,
    },

    /// All listed posts carrying one tag.
    Tag {
        route: String,
        tag: Tag,
        count: usize,
        items: Vec<Link>,
    },

    /// Every tag with its post count.
    TagIndex {
        route: String,
        tags: Vec<TagIndexEntry>,
    },

    /// One slice of the paginated post listing.
    Index {
        route: String,
        current_page: usize,
        num_pages: usize,
        skip: usize,
        limit: usize,
        items: Vec<Summary>,
        previous: Option<String>,
        next: Option<String>,
    },
}

impl Page {
    /// The page's route, e.g., `/hello-world` or `/tags/rust/`.
    pub fn route(&self) -> &str {
        match self {
            Page::Post { route, .. }
            | Page::Tag { route, .. }
            | Page::TagIndex { route, .. }
            | Page::Index { route, .. } => route,
        }
    }
}

impl fmt::Display for Page {
    /// Describes the page for error messages.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Page::Post { route, source, .. } => {
                write!(f, "post `{}` from `{}`", route, source.display())
            }
            Page::Tag { tag, .. } => write!(f, "tag page for `{}`", tag.name),
            Page::TagIndex { .. } => f.write_str("tag overview"),
            Page::Index { current_page, .. } => write!(f, "index page {}", current_page),
        }
    }
}

/// The data a post page is rendered with.
#[derive(Clone, Debug, Serialize)]
pub struct PostContext {
    pub slug: String,
    pub title: String,
    pub published: Published,
    pub date: Option<String>,
    pub image: Option<String>,
    pub excerpt: String,
    pub draft: bool,
    pub tags: Vec<Tag>,

    /// The post before this one in the sorted order, if any.
    pub previous: Option<Link>,

    /// The post after this one in the sorted order, if any.
    pub next: Option<Link>,

    /// Listed posts sharing at least one tag with this one.
    pub related: Vec<Link>,
}

/// A reference to another post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Link {
    pub slug: String,
    pub title: String,
}

impl From<&Post> for Link {
    fn from(p: &Post) -> Link {
        Link {
            slug: p.slug.clone(),
            title: p.title.clone(),
        }
    }
}

/// A post as it appears on an index page.
#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub slug: String,
    pub title: String,
    pub published: Published,
    pub tags: Vec<Tag>,
    pub excerpt: String,
    pub image: Option<String>,
}

impl From<&Post> for Summary {
    fn from(p: &Post) -> Summary {
        Summary {
            slug: p.slug.clone(),
            title: p.title.clone(),
            published: p.published,
            tags: p.tags.clone(),
            excerpt: p.excerpt.clone(),
            image: p.image.clone(),
        }
    }
}

/// A tag, the number of listed posts carrying it, and their slugs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagIndexEntry {
    pub tag: Tag,
    pub count: usize,
    pub slugs: Vec<String>,
}

/// Plans every page for `posts`. See the module documentation for the
/// layout. Fails if the page size is zero or if two pages claim the same
/// route (most likely two posts with the same slug).
pub fn plan(mut posts: Vec<Post>, options: &Options) -> Result<Vec<Page>> {
    if options.page_size == 0 {
        return Err(Error::ZeroPageSize);
    }

    posts.sort_by(|a, b| b.slug.cmp(&a.slug));
    let sequence: Vec<&Post> = posts.iter().filter(|p| !p.template.is_page()).collect();
    let listed: Vec<&Post> = posts.iter().filter(|p| p.is_listed()).collect();
    let tags = index_tags(&listed);

    let mut pages = index_pages(&listed, options.page_size);
    pages.extend(post_pages(&posts, &sequence, &listed, options.related_limit));
    pages.extend(tag_pages(&tags, &listed));
    pages.push(tag_index_page(&tags));

    check_routes(&pages)?;
    Ok(pages)
}

/// Creates the paginated index pages. There is always at least one (the
/// root), even with no posts to list.
fn index_pages(listed: &[&Post], page_size: usize) -> Vec<Page> {
    let num_pages = usize::max(1, listed.len().div_ceil(page_size));
    let route = |i: usize| match i {
        0 => String::from(ROOT_ROUTE),
        _ => format!("/{}", i + 1),
    };

    (0..num_pages)
        .map(|i| {
            let skip = i * page_size;
            let end = usize::min(skip + page_size, listed.len());
            Page::Index {
                route: route(i),
                current_page: i + 1,
                num_pages,
                skip,
                limit: page_size,
                items: listed[skip.min(end)..end]
                    .iter()
                    .map(|p| Summary::from(*p))
                    .collect(),
                previous: match i {
                    0 => None,
                    _ => Some(route(i - 1)),
                },
                next: match i + 1 < num_pages {
                    true => Some(route(i + 1)),
                    false => None,
                },
            }
        })
        .collect()
}

/// Creates one page per post. Neighbors are taken from `sequence` (every
/// post but static pages, drafts included); related posts from `listed`.
fn post_pages(
    posts: &[Post],
    sequence: &[&Post],
    listed: &[&Post],
    related_limit: usize,
) -> Vec<Page> {
    let mut position: usize = 0;
    posts
        .iter()
        .map(|post| {
            let (previous, next, related) = match post.template {
                Template::Page => (None, None, Vec::new()),
                _ => {
                    let i = position;
                    position += 1;
                    (
                        i.checked_sub(1).map(|j| Link::from(sequence[j])),
                        sequence.get(i + 1).map(|p| Link::from(*p)),
                        related_posts(post, listed, related_limit),
                    )
                }
            };

            Page::Post {
                route: post.slug.clone(),
                template: post.template.clone(),
                source: post.source.clone(),
                context: PostContext {
                    slug: post.slug.clone(),
                    title: post.title.clone(),
                    published: post.published,
                    date: post.date.clone(),
                    image: post.image.clone(),
                    excerpt: post.excerpt.clone(),
                    draft: post.draft,
                    tags: post.tags.clone(),
                    previous,
                    next,
                    related,
                },
            }
        })
        .collect()
}

fn related_posts(post: &Post, listed: &[&Post], limit: usize) -> Vec<Link> {
    listed
        .iter()
        .filter(|other| other.slug != post.slug && post.shares_tag_with(other))
        .take(limit)
        .map(|other| Link::from(*other))
        .collect()
}

/// Collects every tag used by a listed post, in order of first appearance.
fn index_tags(listed: &[&Post]) -> Vec<TagIndexEntry> {
    let mut entries: Vec<TagIndexEntry> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for post in listed {
        for tag in &post.tags {
            match positions.get(tag.name.as_str()) {
                Some(&i) => {
                    entries[i].count += 1;
                    entries[i].slugs.push(post.slug.clone());
                }
                None => {
                    positions.insert(&tag.name, entries.len());
                    entries.push(TagIndexEntry {
                        tag: tag.clone(),
                        count: 1,
                        slugs: vec![post.slug.clone()],
                    });
                }
            }
        }
    }
    entries
}

/// Creates one page per tag, listing its posts in the sorted order.
fn tag_pages(tags: &[TagIndexEntry], listed: &[&Post]) -> Vec<Page> {
    tags.iter()
        .map(|entry| Page::Tag {
            route: entry.tag.route.clone(),
            tag: entry.tag.clone(),
            count: entry.count,
            items: listed
                .iter()
                .filter(|p| p.tags.contains(&entry.tag))
                .map(|p| Link::from(*p))
                .collect(),
        })
        .collect()
}

fn tag_index_page(tags: &[TagIndexEntry]) -> Page {
    let mut tags = tags.to_vec();
    tags.sort_by(|a, b| a.tag.name.cmp(&b.tag.name));
    Page::TagIndex {
        route: String::from(TAGS_ROUTE),
        tags,
    }
}

/// Fails on the first route claimed by two pages. Routes which differ only
/// by a trailing `/` land on the same output file, so they collide too.
fn check_routes(pages: &[Page]) -> Result<()> {
    let mut seen: HashMap<&str, &Page> = HashMap::new();
    for page in pages {
        if let Some(first) = seen.insert(output_key(page.route()), page) {
            return Err(Error::DuplicateRoute {
                route: page.route().to_owned(),
                first: first.to_string(),
                second: page.to_string(),
            });
        }
    }
    Ok(())
}

fn output_key(route: &str) -> &str {
    match route.trim_end_matches('/') {
        "" => ROOT_ROUTE,
        trimmed => trimmed,
    }
}

/// The result of a fallible planning operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error planning pages.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Returned when two pages share a route. Two posts with the same slug
    /// (or tags that differ only by spaces versus hyphens) cause this.
    #[error("route `{route}` is claimed by both {first} and {second}")]
    DuplicateRoute {
        route: String,
        first: String,
        second: String,
    },

    /// Returned when the index page size is zero.
    #[error("index page size must be positive")]
    ZeroPageSize,
}
