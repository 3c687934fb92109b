//! Exports the [`build_site`] function which stitches together the high-level
//! steps of planning the site: loading sources ([`crate::parser`]), deriving
//! posts from them ([`crate::derive`]), planning the pages
//! ([`crate::plan`]), and writing the page manifest for the renderer.

use crate::config::{Config, Site};
use crate::derive::{Deriver, Error as DeriveError};
use crate::parser::{Error as ParseError, Parser};
use crate::plan::{plan, Error as PlanError, Page};
use crate::timestamp::{Error as TimestampError, Fallback, GitHistory, TimestampTable};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Plans the site described by `config` and writes the manifest to `output`.
/// Returns the planned pages.
pub fn build_site(config: &Config, output: &Path) -> Result<Vec<Page>> {
    let pages = plan_site(config)?;
    let manifest = Manifest::new(&config.site, &pages)?;

    if let Some(dir) = output.parent() {
        std::fs::create_dir_all(dir).map_err(|err| Error::Io {
            path: dir.to_owned(),
            err,
        })?;
    }
    let file = File::create(output).map_err(|err| Error::Io {
        path: output.to_owned(),
        err,
    })?;
    manifest.write_to(BufWriter::new(file))?;

    info!(pages = pages.len(), output = %output.display(), "wrote manifest");
    Ok(pages)
}

/// Loads, derives, and plans every page of the site without writing
/// anything.
pub fn plan_site(config: &Config) -> Result<Vec<Page>> {
    let parser = Parser::new(&config.content_roots, config.excerpt_length);
    let sources = parser.parse_sources()?;
    info!(sources = sources.len(), "loaded sources");

    let lookup = timestamp_lookup(config)?;
    let posts = Deriver::new(&lookup).derive_all(sources)?;

    let pages = plan(posts, &config.plan_options())?;
    info!(pages = pages.len(), "planned pages");
    Ok(pages)
}

/// Builds the timestamp lookup chain: the cached table first, then git. A
/// malformed table is fatal; a missing table or repository is not.
fn timestamp_lookup(config: &Config) -> Result<Fallback> {
    let mut chain = Fallback::new();

    let table = TimestampTable::from_file(&config.timestamps_file)?;
    debug!(entries = table.len(), "loaded timestamp table");
    chain.push(table);

    match GitHistory::discover(&config.project_root) {
        Ok(history) => chain.push(history),
        Err(err) => debug!(%err, "no git history available"),
    }
    Ok(chain)
}

/// The manifest handed to the renderer: site metadata plus every page.
#[derive(Serialize)]
pub struct Manifest<'a> {
    pub site: &'a Site,
    pub pages: Vec<ManifestPage<'a>>,
}

/// A [`Page`] with its absolute URL.
#[derive(Serialize)]
pub struct ManifestPage<'a> {
    pub permalink: Url,

    #[serde(flatten)]
    pub page: &'a Page,
}

impl<'a> Manifest<'a> {
    pub fn new(site: &'a Site, pages: &'a [Page]) -> Result<Manifest<'a>> {
        Ok(Manifest {
            site,
            pages: pages
                .iter()
                .map(|page| {
                    Ok(ManifestPage {
                        permalink: permalink(&site.site_url, page.route())?,
                        page,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Writes the manifest as pretty-printed JSON.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut w, self)?;
        w.write_all(b"\n").map_err(|err| Error::Io {
            path: PathBuf::new(),
            err,
        })?;
        w.flush().map_err(|err| Error::Io {
            path: PathBuf::new(),
            err,
        })?;
        Ok(())
    }
}

/// Joins a route onto the site URL. `site_url` must end in a `/`.
pub fn permalink(site_url: &Url, route: &str) -> Result<Url> {
    Ok(site_url.join(route.trim_start_matches('/'))?)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during loading,
/// deriving, planning, or writing the manifest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned for errors loading sources.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Returned for errors deriving posts.
    #[error(transparent)]
    Derive(#[from] DeriveError),

    /// Returned for errors loading the timestamp table.
    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    /// Returned for errors planning pages, e.g., duplicate routes.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Returned when a route can't be joined onto the site URL.
    #[error("building permalink: {0}")]
    Url(#[from] url::ParseError),

    /// Returned for errors serializing the manifest.
    #[error("writing manifest: {0}")]
    Json(#[from] serde_json::Error),

    /// Returned for other I/O errors.
    #[error("writing `{}`: {err}", path.display())]
    Io { path: PathBuf, err: std::io::Error },
}

#[cfg(test)]
mod test {
    use super::*;

    fn testdata() -> Config {
        Config::from_project_file(Path::new("./testdata/blog/quire.yaml")).unwrap()
    }

    #[test]
    fn test_permalink() -> Result<()> {
        let site_url = Url::parse("https://example.org/blog/").unwrap();
        assert_eq!("https://example.org/blog/", permalink(&site_url, "/")?.as_str());
        assert_eq!("https://example.org/blog/2", permalink(&site_url, "/2")?.as_str());
        assert_eq!(
            "https://example.org/blog/tags/site-reliability/",
            permalink(&site_url, "/tags/site-reliability/")?.as_str()
        );
        Ok(())
    }

    #[test]
    fn test_plan_site() -> Result<()> {
        let pages = plan_site(&testdata())?;
        let routes: Vec<&str> = pages.iter().map(Page::route).collect();
        assert_eq!(
            vec![
                "/",
                "/2",
                "/on-call",
                "/hello-world",
                "/draft-notes",
                "/bundled",
                "/about",
                "/tags/site-reliability/",
                "/tags/pager/",
                "/tags/meta/",
                "/tags/",
            ],
            routes
        );

        // hello-world's timestamp comes from the table.
        match &pages[3] {
            Page::Post { context, .. } => {
                assert_eq!(
                    Some(1_585_699_200),
                    context.published.at().map(|at| at.timestamp())
                );
                assert_eq!(Some("/on-call"), context.previous.as_ref().map(|l| l.slug.as_str()));
                assert_eq!(Some("/draft-notes"), context.next.as_ref().map(|l| l.slug.as_str()));
            }
            _ => panic!("expected a post page"),
        }
        Ok(())
    }

    #[test]
    fn test_build_site_writes_manifest() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("public").join("pages.json");
        let config = testdata();
        build_site(&config, &output)?;

        let first = std::fs::read(&output).unwrap();
        let manifest: serde_json::Value = serde_json::from_slice(&first)?;
        assert_eq!("Today I Learned", manifest["site"]["title"]);
        assert_eq!("https://blog.example.org/", manifest["pages"][0]["permalink"]);
        assert_eq!("index", manifest["pages"][0]["kind"]);
        assert_eq!(
            "https://blog.example.org/tags/site-reliability/",
            manifest["pages"][7]["permalink"]
        );
        assert_eq!("page", manifest["pages"][6]["template"]);

        // Rebuilding produces the same bytes.
        build_site(&config, &output)?;
        assert_eq!(first, std::fs::read(&output).unwrap());
        Ok(())
    }

    #[test]
    fn test_duplicate_slug_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let blog = dir.path().join("content").join("blog");
        std::fs::create_dir_all(&blog).unwrap();
        std::fs::write(blog.join("one.md"), "---\ntitle: One\nslug: same\n---\n").unwrap();
        std::fs::write(blog.join("two.md"), "---\ntitle: Two\nslug: same\n---\n").unwrap();
        std::fs::write(
            dir.path().join("quire.yaml"),
            "title: T\nsite_url: https://example.org/\n",
        )
        .unwrap();

        let config = Config::from_project_file(&dir.path().join("quire.yaml")).unwrap();
        match plan_site(&config) {
            Err(Error::Plan(PlanError::DuplicateRoute { route, .. })) => assert_eq!("/same", route),
            other => panic!("expected a duplicate route, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_missing_title_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let blog = dir.path().join("content").join("blog");
        std::fs::create_dir_all(&blog).unwrap();
        std::fs::write(blog.join("untitled.md"), "---\ntags: [a]\n---\n").unwrap();
        std::fs::write(
            dir.path().join("quire.yaml"),
            "title: T\nsite_url: https://example.org/\n",
        )
        .unwrap();

        let config = Config::from_project_file(&dir.path().join("quire.yaml")).unwrap();
        assert!(matches!(plan_site(&config), Err(Error::Parse(_))));
    }

    #[test]
    fn test_malformed_timestamp_table_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let blog = dir.path().join("content").join("blog");
        std::fs::create_dir_all(&blog).unwrap();
        std::fs::write(blog.join("timestamps.json"), "not json").unwrap();
        std::fs::write(
            dir.path().join("quire.yaml"),
            "title: T\nsite_url: https://example.org/\n",
        )
        .unwrap();

        let config = Config::from_project_file(&dir.path().join("quire.yaml")).unwrap();
        assert!(matches!(plan_site(&config), Err(Error::Timestamp(_))));
    }
}
