//! Loads the project configuration from `quire.yaml`.

use crate::plan::Options as PlanOptions;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "quire.yaml";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(5)
    }
}

#[derive(Deserialize)]
struct RelatedPosts(usize);
impl Default for RelatedPosts {
    fn default() -> Self {
        RelatedPosts(5)
    }
}

#[derive(Deserialize)]
struct ExcerptLength(usize);
impl Default for ExcerptLength {
    fn default() -> Self {
        ExcerptLength(280)
    }
}

fn default_content_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("content/blog"), PathBuf::from("content/pages")]
}

fn default_timestamps_file() -> PathBuf {
    PathBuf::from("content/blog/timestamps.json")
}

#[derive(Deserialize)]
struct Project {
    title: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    author: Option<Author>,

    site_url: Url,

    #[serde(default = "default_content_roots")]
    content_roots: Vec<PathBuf>,

    #[serde(default = "default_timestamps_file")]
    timestamps_file: PathBuf,

    #[serde(default)]
    index_page_size: PageSize,

    #[serde(default)]
    related_posts: RelatedPosts,

    #[serde(default)]
    excerpt_length: ExcerptLength,
}

/// The site's author.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub summary: Option<String>,
}

/// Site-wide metadata handed to the renderer alongside the pages.
#[derive(Clone, Debug, Serialize)]
pub struct Site {
    pub title: String,
    pub description: String,
    pub author: Option<Author>,

    /// The absolute URL of the site root. Always ends with a `/`.
    pub site_url: Url,
}

pub struct Config {
    /// The directory containing the project file.
    pub project_root: PathBuf,
    pub site: Site,
    pub content_roots: Vec<PathBuf>,
    pub timestamps_file: PathBuf,
    pub index_page_size: usize,
    pub related_posts: usize,
    pub excerpt_length: usize,
}

impl Config {
    /// Looks for [`PROJECT_FILE`] in `dir` and then in each of its ancestors.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path)
                .with_context(|| format!("Loading configuration from `{}`", path.display()))
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    /// Loads a project file. Relative paths inside it are resolved against
    /// the file's directory.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        use crate::util::open;
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let project_root = match path.parent() {
            None => {
                return Err(anyhow!(
                    "Can't get parent directory for provided project file path '{:?}'",
                    path
                ))
            }
            Some(project_root) => project_root.to_owned(),
        };

        if project.index_page_size.0 == 0 {
            return Err(anyhow!("`index_page_size` must be positive"));
        }

        let mut site_url = project.site_url;
        if site_url.cannot_be_a_base() {
            return Err(anyhow!("`site_url` must be a base URL: {}", site_url));
        }
        // Without a trailing slash `Url::join` would replace the last path
        // segment instead of appending to it.
        if !site_url.path().ends_with('/') {
            site_url.set_path(&format!("{}/", site_url.path()));
        }

        Ok(Config {
            site: Site {
                title: project.title,
                description: project.description,
                author: project.author,
                site_url,
            },
            content_roots: project
                .content_roots
                .iter()
                .map(|root| project_root.join(root))
                .collect(),
            timestamps_file: project_root.join(project.timestamps_file),
            index_page_size: project.index_page_size.0,
            related_posts: project.related_posts.0,
            excerpt_length: project.excerpt_length.0,
            project_root,
        })
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            page_size: self.index_page_size,
            related_limit: self.related_posts,
        }
    }
}
