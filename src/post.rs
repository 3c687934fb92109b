//! Defines the [`Post`] and [`Template`] types.

use crate::tag::Tag;
use crate::timestamp::Published;
use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// The template a post is rendered with. Front-matter selects it by string
/// key (`templateKey`); everything downstream matches on the variant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Template {
    /// The default template for dated, tagged posts (`blog-post`).
    #[default]
    BlogPost,

    /// Plain static pages (`page`). They are never paginated, tagged, or
    /// linked as a neighbor.
    Page,

    /// Any other key; treated like a blog post but rendered with the named
    /// template.
    Custom(String),
}

impl Template {
    pub const BLOG_POST_KEY: &'static str = "blog-post";
    pub const PAGE_KEY: &'static str = "page";

    /// Resolves a front-matter `templateKey`. A missing key means
    /// [`Template::BlogPost`].
    pub fn from_key(key: Option<&str>) -> Template {
        match key {
            None | Some(Template::BLOG_POST_KEY) => Template::BlogPost,
            Some(Template::PAGE_KEY) => Template::Page,
            Some(other) => Template::Custom(other.to_owned()),
        }
    }

    /// The template's string key.
    pub fn key(&self) -> &str {
        match self {
            Template::BlogPost => Template::BLOG_POST_KEY,
            Template::Page => Template::PAGE_KEY,
            Template::Custom(key) => key,
        }
    }

    pub fn is_page(&self) -> bool {
        *self == Template::Page
    }
}

impl Serialize for Template {
    /// Serializes a [`Template`] as its key.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// A content item with all of its derived fields populated. See
/// [`crate::derive::Deriver`] for how each field is computed.
#[derive(Clone, Debug)]
pub struct Post {
    /// The post's unique identifier and route, e.g., `/hello-world`. Always
    /// starts with a `/` and never ends with one.
    pub slug: String,

    /// The title of the post.
    pub title: String,

    /// The post's tags, in the order the author wrote them.
    pub tags: Vec<Tag>,

    /// The template the post is rendered with.
    pub template: Template,

    /// Whether the post is a draft.
    pub draft: bool,

    /// When the post was published.
    pub published: Published,

    /// The front-matter date, if any, as written.
    pub date: Option<String>,

    /// The front-matter image, if any, as written.
    pub image: Option<String>,

    /// A plain-text excerpt of the post's body.
    pub excerpt: String,

    /// The source file the post was loaded from.
    pub source: PathBuf,
}

impl Post {
    /// Whether the post shows up in index pages, tag pages, and related
    /// posts: i.e., it is neither a static page nor a draft.
    pub fn is_listed(&self) -> bool {
        !self.template.is_page() && !self.draft
    }

    /// Whether the post shares at least one tag with `other`.
    pub fn shares_tag_with(&self, other: &Post) -> bool {
        self.tags.iter().any(|t| other.tags.contains(t))
    }
}
