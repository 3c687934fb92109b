//! Defines the [`Parser`], [`Source`], and [`Error`] types. Also defines the
//! logic for loading post sources from the file system into memory. A
//! [`Source`] is a post exactly as it was written; deriving slugs, dates and
//! tags from it is [`crate::derive`]'s job.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::markdown;

const MARKDOWN_EXTENSION: &str = "md";

/// Loads [`Source`] objects from the content roots.
pub struct Parser<'a> {
    /// The directories which are searched for `.md` files, e.g.,
    /// `content/blog` and `content/pages`. Slugs are derived from paths
    /// relative to the root a source was found in.
    content_roots: &'a [PathBuf],

    /// The maximum length of a source's excerpt, in characters.
    excerpt_length: usize,
}

/// A post as loaded from disk.
#[derive(Clone, Debug)]
pub struct Source {
    /// The content root the source was found in.
    pub root: PathBuf,

    /// The path to the source file (`root` joined with `relative_path`).
    pub path: PathBuf,

    /// The path of the source file relative to `root`.
    pub relative_path: PathBuf,

    /// The parsed front-matter.
    pub frontmatter: Frontmatter,

    /// A plain-text excerpt of the body.
    pub excerpt: String,
}

/// The front-matter fields a source may carry. Only `title` is required.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Frontmatter {
    /// The title of the post.
    pub title: String,

    /// Overrides the slug derived from the file path.
    #[serde(default)]
    pub slug: Option<String>,

    /// The tags associated with the post. `tags:` with no value is the same
    /// as no tags at all.
    #[serde(default)]
    pub tags: Option<Vec<String>>,

    /// Selects the template, e.g., `blog-post` or `page`.
    #[serde(default)]
    pub template_key: Option<String>,

    /// Drafts get a page of their own but are left out of tags and
    /// listings.
    #[serde(default)]
    pub draft: Option<bool>,

    /// A display date; passed through to the renderer untouched.
    #[serde(default)]
    pub date: Option<String>,

    /// A cover image; passed through to the renderer untouched.
    #[serde(default)]
    pub image: Option<String>,
}

impl<'a> Parser<'a> {
    /// Constructs a new parser. See fields on [`Parser`] for argument
    /// descriptions.
    pub fn new(content_roots: &'a [PathBuf], excerpt_length: usize) -> Parser<'a> {
        Parser {
            content_roots,
            excerpt_length,
        }
    }

    /// Searches every content root for source files (extension = `.md`) and
    /// returns them in a stable order (by root, then by path). Each source
    /// file must be structured as follows:
    ///
    /// 1. Initial frontmatter fence (`---`)
    /// 2. YAML frontmatter with a `title` and optionally `slug`, `tags`,
    ///    `templateKey`, `draft`, `date`, and `image`
    /// 3. Terminal frontmatter fence (`---`)
    /// 4. Post body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// tags: [greet, site reliability]
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    ///
    /// A content root that doesn't exist is skipped with a warning.
    pub fn parse_sources(&self) -> Result<Vec<Source>> {
        let mut sources = Vec::new();
        for root in self.content_roots {
            if !root.is_dir() {
                warn!(root = %root.display(), "content root does not exist; skipping");
                continue;
            }

            for result in WalkDir::new(root).sort_by_file_name() {
                let entry = result?;
                if !entry.file_type().is_file()
                    || entry.path().extension().and_then(|e| e.to_str()) != Some(MARKDOWN_EXTENSION)
                {
                    continue;
                }
                // strip_prefix() should never fail; `root` is an ancestor of
                // every entry WalkDir yields.
                let relative_path = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or_else(|_| entry.path())
                    .to_owned();
                sources.push(self.parse_source(root, &relative_path)?);
            }
        }
        debug!(count = sources.len(), "loaded sources");
        Ok(sources)
    }

    /// Loads a single [`Source`], annotating any error with the file's path.
    pub fn parse_source(&self, root: &Path, relative_path: &Path) -> Result<Source> {
        let path = root.join(relative_path);
        match self._parse_source(&path) {
            Ok((frontmatter, excerpt)) => Ok(Source {
                root: root.to_owned(),
                path,
                relative_path: relative_path.to_owned(),
                frontmatter,
                excerpt,
            }),
            Err(e) => Err(Error::Annotated(
                format!("parsing source `{}`", path.display()),
                Box::new(e),
            )),
        }
    }

    fn _parse_source(&self, path: &Path) -> Result<(Frontmatter, String)> {
        use std::io::Read;
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        let (frontmatter, body) = split(&contents)?;
        Ok((frontmatter, markdown::excerpt(body, self.excerpt_length)))
    }
}

/// Splits a source file's contents into its parsed front-matter and its
/// body.
pub fn split(input: &str) -> Result<(Frontmatter, &str)> {
    fn frontmatter_indices(input: &str) -> Result<(usize, usize, usize)> {
        const FENCE: &str = "---";
        if !input.starts_with(FENCE) {
            return Err(Error::FrontmatterMissingStartFence);
        }
        // The closing fence has to start a line.
        match input[FENCE.len()..].find("\n---") {
            None => Err(Error::FrontmatterMissingEndFence),
            Some(offset) => Ok((
                FENCE.len(),                             // yaml_start
                FENCE.len() + offset + 1,                // yaml_stop
                FENCE.len() + offset + 1 + FENCE.len(),  // body_start
            )),
        }
    }

    let (yaml_start, yaml_stop, body_start) = frontmatter_indices(input)?;
    let frontmatter: Frontmatter = serde_yaml::from_str(&input[yaml_start..yaml_stop])?;
    Ok((frontmatter, &input[body_start..]))
}

/// Represents the result of a [`Source`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a [`Source`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a source file is missing its starting frontmatter fence
    /// (`---`).
    #[error("source must begin with `---`")]
    FrontmatterMissingStartFence,

    /// Returned when a source file is missing its terminal frontmatter fence
    /// (`---` i.e., the starting fence was found but the ending one was
    /// missing).
    #[error("missing closing `---`")]
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML,
    /// including a missing `title`.
    #[error(transparent)]
    DeserializeYaml(#[from] serde_yaml::Error),

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Returned for WalkDir I/O errors.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    /// An error with an annotation.
    #[error("{0}: {1}")]
    Annotated(String, #[source] Box<Error>),
}
