//! Resolves publication timestamps for posts. A post's timestamp comes from
//! one of two places: a cached timestamp table (a JSON file mapping
//! `<name>.md` to `{ "created": <unix-seconds> }`) or the git history of the
//! post's source file. Both implement [`TimestampLookup`], and a
//! [`Fallback`] tries each in turn. None of the lookups are fatal to a build:
//! the [`crate::derive::Deriver`] degrades a post to
//! [`Published::Unpublished`] when nothing resolves.

use chrono::{DateTime, Datelike, FixedOffset};
use git2::Repository;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The text rendered in place of a date for posts without a timestamp.
pub const UNPUBLISHED: &str = "<Unpublished Post />";

/// When a post was published, if ever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Published {
    /// The post has a resolved timestamp.
    At(DateTime<FixedOffset>),

    /// Neither the timestamp table nor version control knew about the post.
    Unpublished,
}

impl Published {
    /// Returns the timestamp, if any.
    pub fn at(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Published::At(at) => Some(*at),
            Published::Unpublished => None,
        }
    }
}

impl fmt::Display for Published {
    /// Formats the timestamp as `MMM Do YYYY, h:mma` (e.g.,
    /// `Mar 3rd 2021, 9:05pm`), or [`UNPUBLISHED`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Published::At(at) => write!(
                f,
                "{} {}{} {}",
                at.format("%b"),
                at.day(),
                ordinal_suffix(at.day()),
                at.format("%Y, %-I:%M%P"),
            ),
            Published::Unpublished => f.write_str(UNPUBLISHED),
        }
    }
}

impl Serialize for Published {
    /// Serializes as `{ "at": <rfc3339 or null>, "display": <text> }` so the
    /// renderer gets both a machine-readable and a display form.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Published", 2)?;
        s.serialize_field("at", &self.at().map(|at| at.to_rfc3339()))?;
        s.serialize_field("display", &self.to_string())?;
        s.end()
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Identifies the post whose timestamp is being looked up.
#[derive(Clone, Copy, Debug)]
pub struct TimestampKey<'a> {
    /// The key into the timestamp table, e.g., `hello-world.md`.
    pub name: &'a str,

    /// The post's source file on disk.
    pub path: &'a Path,
}

/// A source of publication timestamps. `Ok(None)` means the source has no
/// opinion about the post; an `Err` means the source itself failed.
pub trait TimestampLookup {
    fn lookup(&self, key: &TimestampKey) -> Result<Option<DateTime<FixedOffset>>>;
}

#[derive(Deserialize)]
struct TableEntry {
    created: i64,
}

/// The cached timestamp table.
#[derive(Default)]
pub struct TimestampTable {
    entries: HashMap<String, TableEntry>,
}

impl TimestampTable {
    /// Loads the table from a JSON file. A missing file yields an empty
    /// table; a malformed one is an error.
    pub fn from_file(path: &Path) -> Result<TimestampTable> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no timestamp table");
                return Ok(TimestampTable::default());
            }
            Err(e) => {
                return Err(Error::Io {
                    path: path.to_owned(),
                    err: e,
                })
            }
        };
        let entries = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|err| Error::Table {
                path: path.to_owned(),
                err,
            })?;
        Ok(TimestampTable { entries })
    }

    /// Parses a table from a JSON string.
    pub fn from_json(json: &str) -> serde_json::Result<TimestampTable> {
        Ok(TimestampTable {
            entries: serde_json::from_str(json)?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TimestampLookup for TimestampTable {
    fn lookup(&self, key: &TimestampKey) -> Result<Option<DateTime<FixedOffset>>> {
        match self.entries.get(key.name) {
            None => Ok(None),
            Some(entry) => match DateTime::from_timestamp(entry.created, 0) {
                Some(at) => Ok(Some(at.fixed_offset())),
                None => Err(Error::OutOfRange {
                    name: key.name.to_owned(),
                    seconds: entry.created,
                }),
            },
        }
    }
}

/// Looks up the author time of the most recent commit touching a file,
/// equivalent to `git log -1 --pretty=format:%aI <path>`. The history is
/// walked once, on the first lookup, and remembered for every file.
pub struct GitHistory {
    repo: Repository,
    workdir: PathBuf,
    history: OnceCell<HashMap<PathBuf, DateTime<FixedOffset>>>,
}

impl GitHistory {
    /// Opens the repository containing `path`.
    pub fn discover(path: &Path) -> Result<GitHistory> {
        let repo = Repository::discover(path)?;
        let workdir = repo.workdir().ok_or(Error::BareRepository)?;
        let workdir = workdir.canonicalize().map_err(|err| Error::Io {
            path: workdir.to_owned(),
            err,
        })?;
        Ok(GitHistory {
            repo,
            workdir,
            history: OnceCell::new(),
        })
    }

    /// Converts `path` into a path relative to the repository's working
    /// directory, or `None` if the file lives outside of it.
    fn relative(&self, path: &Path) -> Result<Option<PathBuf>> {
        let absolute = path.canonicalize().map_err(|err| Error::Io {
            path: path.to_owned(),
            err,
        })?;
        Ok(absolute
            .strip_prefix(&self.workdir)
            .ok()
            .map(Path::to_path_buf))
    }

    fn history(&self) -> Result<&HashMap<PathBuf, DateTime<FixedOffset>>> {
        match self.history.get() {
            Some(history) => Ok(history),
            None => {
                let history = self.walk()?;
                Ok(self.history.get_or_init(|| history))
            }
        }
    }

    /// Walks the history from `HEAD`, newest first, recording the author time
    /// of the first commit seen to touch each path. A commit touches a path
    /// if the path differs from every one of its parents.
    fn walk(&self) -> Result<HashMap<PathBuf, DateTime<FixedOffset>>> {
        let mut touched = HashMap::new();
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(git2::Sort::TIME)?;
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            let tree = commit.tree()?;

            let mut changed: Option<Vec<PathBuf>> = None;
            if commit.parent_count() == 0 {
                changed = Some(self.changed_paths(None, &tree)?);
            }
            for parent in commit.parents() {
                let paths = self.changed_paths(Some(&parent.tree()?), &tree)?;
                changed = Some(match changed {
                    None => paths,
                    Some(previous) => previous
                        .into_iter()
                        .filter(|path| paths.contains(path))
                        .collect(),
                });
            }

            let when = commit.author().when();
            let at = match FixedOffset::east_opt(when.offset_minutes() * 60)
                .zip(DateTime::from_timestamp(when.seconds(), 0))
            {
                Some((offset, at)) => at.with_timezone(&offset),
                None => continue,
            };
            for path in changed.into_iter().flatten() {
                touched.entry(path).or_insert(at);
            }
        }
        debug!(files = touched.len(), "walked git history");
        Ok(touched)
    }

    /// Lists the files added or modified between `old` and `new`.
    fn changed_paths(
        &self,
        old: Option<&git2::Tree>,
        new: &git2::Tree,
    ) -> Result<Vec<PathBuf>> {
        let diff = self.repo.diff_tree_to_tree(old, Some(new), None)?;
        Ok(diff
            .deltas()
            .filter(|delta| delta.status() != git2::Delta::Deleted)
            .filter_map(|delta| delta.new_file().path().map(Path::to_path_buf))
            .collect())
    }
}

impl TimestampLookup for GitHistory {
    fn lookup(&self, key: &TimestampKey) -> Result<Option<DateTime<FixedOffset>>> {
        let relative = match self.relative(key.path)? {
            Some(relative) => relative,
            None => return Ok(None),
        };
        Ok(self.history()?.get(&relative).copied())
    }
}

/// Tries each lookup in order and returns the first timestamp found. A
/// failing lookup is logged and skipped; the error is only returned if no
/// later lookup produces a timestamp.
#[derive(Default)]
pub struct Fallback {
    lookups: Vec<Box<dyn TimestampLookup>>,
}

impl Fallback {
    pub fn new() -> Fallback {
        Fallback::default()
    }

    /// Appends a lookup to the chain.
    pub fn push(&mut self, lookup: impl TimestampLookup + 'static) {
        self.lookups.push(Box::new(lookup));
    }

    pub fn with(mut self, lookup: impl TimestampLookup + 'static) -> Fallback {
        self.push(lookup);
        self
    }
}

impl TimestampLookup for Fallback {
    fn lookup(&self, key: &TimestampKey) -> Result<Option<DateTime<FixedOffset>>> {
        let mut last_err = None;
        for lookup in &self.lookups {
            match lookup.lookup(key) {
                Ok(Some(at)) => return Ok(Some(at)),
                Ok(None) => {}
                Err(err) => {
                    warn!(post = key.name, %err, "timestamp lookup failed");
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

/// The result of a fallible timestamp lookup.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed timestamp lookup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the timestamp table isn't valid JSON of the expected
    /// shape.
    #[error("parsing timestamp table `{}`: {err}", path.display())]
    Table {
        path: PathBuf,
        err: serde_json::Error,
    },

    /// Returned when a table entry can't be represented as a date.
    #[error("timestamp {seconds} for `{name}` is out of range")]
    OutOfRange { name: String, seconds: i64 },

    /// Returned for git errors, including a repository with no commits.
    #[error("git: {0}")]
    Git(#[from] git2::Error),

    /// Returned when the discovered repository has no working directory.
    #[error("git repository has no working directory")]
    BareRepository,

    /// Returned for other I/O errors.
    #[error("reading `{}`: {err}", path.display())]
    Io { path: PathBuf, err: std::io::Error },
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn key<'a>(name: &'a str, path: &'a Path) -> TimestampKey<'a> {
        TimestampKey { name, path }
    }

    #[test]
    fn test_display() {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2021, 3, 3, 21, 5, 0)
            .unwrap();
        assert_eq!("Mar 3rd 2021, 9:05pm", Published::At(at).to_string());
    }

    #[test]
    fn test_display_unpublished() {
        assert_eq!(UNPUBLISHED, Published::Unpublished.to_string());
    }

    #[test]
    fn test_ordinal_suffix() {
        let days = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 30, 31];
        let suffixes: Vec<&str> = days.iter().map(|d| ordinal_suffix(*d)).collect();
        assert_eq!(
            vec!["st", "nd", "rd", "th", "th", "th", "th", "st", "nd", "rd", "th", "st"],
            suffixes
        );
    }

    #[test]
    fn test_serialize() -> serde_json::Result<()> {
        let at = DateTime::from_timestamp(0, 0).unwrap().fixed_offset();
        assert_eq!(
            r#"{"at":"1970-01-01T00:00:00+00:00","display":"Jan 1st 1970, 12:00am"}"#,
            serde_json::to_string(&Published::At(at))?
        );
        assert_eq!(
            r#"{"at":null,"display":"<Unpublished Post />"}"#,
            serde_json::to_string(&Published::Unpublished)?
        );
        Ok(())
    }

    #[test]
    fn test_table_lookup() -> Result<()> {
        let table = TimestampTable::from_json(r#"{"hello.md": {"created": 1600000000}}"#).unwrap();
        let path = Path::new("hello.md");
        assert_eq!(
            Some(DateTime::from_timestamp(1_600_000_000, 0).unwrap().fixed_offset()),
            table.lookup(&key("hello.md", path))?
        );
        assert_eq!(None, table.lookup(&key("missing.md", path))?);
        Ok(())
    }

    #[test]
    fn test_table_missing_file_is_empty() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let table = TimestampTable::from_file(&dir.path().join("timestamps.json"))?;
        assert!(table.is_empty());
        Ok(())
    }

    #[test]
    fn test_table_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timestamps.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            TimestampTable::from_file(&path),
            Err(Error::Table { .. })
        ));
    }

    struct Fails;
    struct Empty;
    struct Fixed(DateTime<FixedOffset>);

    impl TimestampLookup for Fails {
        fn lookup(&self, _: &TimestampKey) -> Result<Option<DateTime<FixedOffset>>> {
            Err(Error::BareRepository)
        }
    }

    impl TimestampLookup for Empty {
        fn lookup(&self, _: &TimestampKey) -> Result<Option<DateTime<FixedOffset>>> {
            Ok(None)
        }
    }

    impl TimestampLookup for Fixed {
        fn lookup(&self, _: &TimestampKey) -> Result<Option<DateTime<FixedOffset>>> {
            Ok(Some(self.0))
        }
    }

    #[test]
    fn test_fallback_skips_failures() -> Result<()> {
        let at = DateTime::from_timestamp(42, 0).unwrap().fixed_offset();
        let chain = Fallback::new().with(Fails).with(Empty).with(Fixed(at));
        assert_eq!(Some(at), chain.lookup(&key("a.md", Path::new("a.md")))?);
        Ok(())
    }

    #[test]
    fn test_fallback_reports_failure_when_nothing_resolves() {
        let chain = Fallback::new().with(Fails).with(Empty);
        assert!(chain.lookup(&key("a.md", Path::new("a.md"))).is_err());
    }

    #[test]
    fn test_fallback_empty() -> Result<()> {
        assert_eq!(None, Fallback::new().lookup(&key("a.md", Path::new("a.md")))?);
        Ok(())
    }

    fn commit_file(repo: &Repository, name: &str, contents: &str, seconds: i64) {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), contents).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature =
            git2::Signature::new("Author", "author@example.org", &git2::Time::new(seconds, 60))
                .unwrap();
        let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, name, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn test_git_history() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path())?;
        commit_file(&repo, "first.md", "one", 1_000_000);
        commit_file(&repo, "second.md", "two", 2_000_000);
        commit_file(&repo, "first.md", "one, edited", 3_000_000);
        std::fs::write(dir.path().join("untracked.md"), "new").unwrap();

        let history = GitHistory::discover(dir.path())?;
        let first = dir.path().join("first.md");
        let second = dir.path().join("second.md");
        let untracked = dir.path().join("untracked.md");

        let at = history.lookup(&key("first.md", &first))?.unwrap();
        assert_eq!(3_000_000, at.timestamp());
        assert_eq!(3600, at.offset().local_minus_utc());
        assert_eq!(
            2_000_000,
            history.lookup(&key("second.md", &second))?.unwrap().timestamp()
        );
        assert_eq!(None, history.lookup(&key("untracked.md", &untracked))?);
        Ok(())
    }

    #[test]
    fn test_git_history_nested_and_deleted_files() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path())?;
        std::fs::create_dir(dir.path().join("posts")).unwrap();
        commit_file(&repo, "posts/a.md", "a", 1_000_000);
        commit_file(&repo, "posts/b.md", "b", 2_000_000);
        commit_file(&repo, "gone.md", "gone", 3_000_000);

        // Remove `gone.md` and put it back unchanged in a later commit.
        let mut index = repo.index()?;
        index.remove_path(Path::new("gone.md"))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature =
            git2::Signature::new("Author", "author@example.org", &git2::Time::new(4_000_000, 0))?;
        let head = repo.head()?.peel_to_commit()?;
        repo.commit(Some("HEAD"), &signature, &signature, "rm", &tree, &[&head])?;
        commit_file(&repo, "gone.md", "gone", 5_000_000);

        let history = GitHistory::discover(dir.path())?;
        let at = |name: &str| -> Result<Option<i64>> {
            let path = dir.path().join(name);
            Ok(history.lookup(&key(name, &path))?.map(|at| at.timestamp()))
        };
        assert_eq!(Some(1_000_000), at("posts/a.md")?);
        assert_eq!(Some(2_000_000), at("posts/b.md")?);
        assert_eq!(Some(5_000_000), at("gone.md")?);
        Ok(())
    }

    #[test]
    fn test_git_history_without_commits() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path())?;
        std::fs::write(dir.path().join("post.md"), "post").unwrap();
        let history = GitHistory::discover(dir.path())?;
        let path = dir.path().join("post.md");
        assert!(history.lookup(&key("post.md", &path)).is_err());
        Ok(())
    }
}
