//! Defines the [`Tag`] type, which represents a [`crate::post::Post`] tag.

use serde::Serialize;
use std::hash::{Hash, Hasher};

/// Represents a [`crate::post::Post`] tag. The tag keeps the name exactly as
/// it was written in the front-matter (it is what gets displayed) alongside
/// the route of its tag page.
#[derive(Clone, Debug, Serialize)]
pub struct Tag {
    /// The tag's name as written by the author, e.g., `site reliability`.
    pub name: String,

    /// The route for the tag's page. Every space in the name is replaced with
    /// a hyphen, so `site reliability` lives at
    /// `/tags/site-reliability/`.
    pub route: String,
}

impl Tag {
    /// Creates a [`Tag`] from its display name, computing its route.
    pub fn new(name: &str) -> Tag {
        Tag {
            name: name.to_owned(),
            route: format!("/tags/{}/", name.replace(' ', "-")),
        }
    }
}

impl Hash for Tag {
    /// Implements [`Hash`] for [`Tag`] by delegating directly to the `name`
    /// field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialEq for Tag {
    /// Implements [`PartialEq`] and [`Eq`] for [`Tag`] by delegating directly
    /// to the `name` field.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Tag {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_route_replaces_spaces() {
        let tag = Tag::new("site reliability");
        assert_eq!("site reliability", tag.name);
        assert_eq!("/tags/site-reliability/", tag.route);
    }

    #[test]
    fn test_route_replaces_every_space() {
        assert_eq!("/tags/a-b--c/", Tag::new("a b  c").route);
    }

    #[test]
    fn test_equality_ignores_route() {
        let mut other = Tag::new("rust");
        other.route = String::from("/elsewhere/");
        assert_eq!(Tag::new("rust"), other);
    }
}
