//! The library code for the `quire` blog planner. `quire` doesn't render
//! anything; it works out which pages a blog has and what goes on each, and
//! hands that plan to a renderer as a JSON manifest. The architecture can be
//! generally broken down into three distinct steps:
//!
//! 1. Loading post sources from the content directories ([`crate::parser`])
//! 2. Deriving each post's slug, timestamp, and tags ([`crate::derive`])
//! 3. Planning the pages ([`crate::plan`])
//!
//! Of the three, the last is the most involved. It sorts the posts by slug
//! (descending) and then emits the paginated index pages, one page per post
//! with links to its neighbors and related posts, one page per tag, and a tag
//! overview. Drafts get a page of their own but are otherwise kept out of
//! sight, and static pages (`templateKey: page`) are never listed.
//!
//! Publication timestamps come from a cached timestamp table or, failing
//! that, from git ([`crate::timestamp`]). A post neither of them knows about
//! is still planned, just marked unpublished.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod derive;
pub mod markdown;
pub mod parser;
pub mod plan;
pub mod post;
pub mod tag;
pub mod timestamp;
mod util;
