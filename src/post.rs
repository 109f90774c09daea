//! Defines the [`Post`] data model and the logic for loading posts from a
//! source directory into memory. A post source file is UTF-8 Markdown with a
//! leading YAML front-matter block fenced by `---` lines:
//!
//! ```md
//! ---
//! title: "Hello, world!"
//! date: 2024-01-02
//! author: "Jane Engineer"
//! category: "Backend"
//! tags: ["rust", "blogging"]
//! excerpt: "A first post."
//! ---
//! # Hello
//!
//! World
//! ```
//!
//! The body is rendered to HTML once, at load time; [`Post::html`] is always
//! the render of [`Post::content`] for the current build run.

use std::{
    fmt,
    fs::{create_dir_all, read_dir, File},
    path::Path,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use pulldown_cmark::{html, Options, Parser};
use serde::Deserialize;

/// Read time (in minutes) assumed when the front matter omits `readTime`.
pub const DEFAULT_READ_TIME: u32 = 5;

const MARKDOWN_EXTENSION: &str = ".md";

/// A single blog post, parsed from one Markdown source file. Constructed
/// fresh on every build run; there is no persistent store.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// Identifier derived from the source filename stem. Used to form the
    /// output filename (`posts/{slug}.html`) and URLs. Uniqueness is
    /// assumed, not enforced; two files with the same stem overwrite one
    /// output file.
    pub slug: String,

    /// The post's display title.
    pub title: String,

    /// The publish timestamp. Sole sort key, descending (newest first).
    pub date: NaiveDateTime,

    /// The post's author display name.
    pub author: String,

    /// The post's category. Also displayed as a synthetic tag when `tags`
    /// is empty.
    pub category: String,

    /// Short summary shown on cards and in the page's meta description.
    pub excerpt: String,

    /// Ordered tags. Empty when the front matter omits them.
    pub tags: Vec<String>,

    /// Estimated read time in minutes.
    pub read_time: u32,

    /// Cover image URL. `None` omits the cover block from the rendered page
    /// entirely.
    pub cover: Option<String>,

    /// Per-post author avatar URL, overriding the site-wide avatar.
    pub author_avatar: Option<String>,

    /// Whether this post is the featured one. At most one post should carry
    /// this semantically; the first match wins.
    pub featured: bool,

    /// The raw Markdown body.
    pub content: String,

    /// The HTML render of `content`.
    pub html: String,
}

/// The YAML front-matter block as it appears on disk. Field names follow the
/// source format (`readTime`, `authorAvatar`), not Rust conventions.
#[derive(Deserialize)]
struct Frontmatter {
    title: String,
    date: String,
    author: String,
    category: String,
    excerpt: String,

    #[serde(default)]
    tags: Vec<String>,

    #[serde(default, rename = "readTime")]
    read_time: Option<u32>,

    #[serde(default)]
    cover: Option<String>,

    #[serde(default, rename = "authorAvatar")]
    author_avatar: Option<String>,

    #[serde(default)]
    featured: bool,
}

impl Post {
    /// Parses a single [`Post`] from a `slug` and the raw contents of its
    /// source file.
    pub fn from_str(slug: &str, input: &str) -> Result<Post> {
        fn frontmatter_indices(input: &str) -> Result<(usize, usize, usize)> {
            const FENCE: &str = "---";
            if !input.starts_with(FENCE) {
                return Err(Error::FrontmatterMissingStartFence);
            }
            match input[FENCE.len()..].find(FENCE) {
                None => Err(Error::FrontmatterMissingEndFence),
                Some(offset) => Ok((
                    FENCE.len(),                        // yaml_start
                    FENCE.len() + offset,               // yaml_stop
                    FENCE.len() + offset + FENCE.len(), // body_start
                )),
            }
        }

        let (yaml_start, yaml_stop, body_start) = frontmatter_indices(input)?;
        let frontmatter: Frontmatter = serde_yaml::from_str(&input[yaml_start..yaml_stop])?;

        let date = parse_date(&frontmatter.date)
            .ok_or_else(|| Error::InvalidDate(frontmatter.date.clone()))?;

        let content = input[body_start..].trim_start().to_owned();
        let mut rendered = String::new();
        html::push_html(&mut rendered, Parser::new_ext(&content, markdown_options()));

        Ok(Post {
            slug: slug.to_owned(),
            title: frontmatter.title,
            date,
            author: frontmatter.author,
            category: frontmatter.category,
            excerpt: frontmatter.excerpt,
            tags: frontmatter.tags,
            read_time: frontmatter.read_time.unwrap_or(DEFAULT_READ_TIME),
            cover: none_if_empty(frontmatter.cover),
            author_avatar: none_if_empty(frontmatter.author_avatar),
            featured: frontmatter.featured,
            content,
            html: rendered,
        })
    }
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

// The CMS writes `cover: ""` for posts without a cover image; treat that the
// same as an absent key.
fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Parses a front-matter date string. Accepts RFC 3339 timestamps as well as
/// the date-only `%Y-%m-%d` form (interpreted as midnight).
fn parse_date(s: &str) -> Option<NaiveDateTime> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(s) {
        return Some(date_time.naive_utc());
    }
    if let Ok(date_time) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(date_time);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Searches `source_directory` for post files (extension = `.md`) and
/// returns them as [`Post`] objects sorted by date, most recent first. The
/// sort is stable, so posts with equal dates keep the directory enumeration
/// order. A missing source directory is created empty and yields an empty
/// list ("no posts yet" is not an error). Non-Markdown files are ignored;
/// a malformed post file fails the whole load.
pub fn load_posts(source_directory: &Path) -> Result<Vec<Post>> {
    create_dir_all(source_directory)?;

    let mut posts = Vec::new();
    for result in read_dir(source_directory)? {
        let entry = result?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let os_file_name = entry.file_name();
        let file_name = os_file_name.to_string_lossy();
        if !file_name.ends_with(MARKDOWN_EXTENSION) {
            continue;
        }
        let slug = file_name.trim_end_matches(MARKDOWN_EXTENSION);
        posts.push(parse_post_file(slug, &entry.path()).map_err(|e| {
            Error::Annotated(format!("parsing post `{}`", file_name), Box::new(e))
        })?);
    }

    posts.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(posts)
}

fn parse_post_file(slug: &str, path: &Path) -> Result<Post> {
    use std::io::Read;
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    Post::from_str(slug, &contents)
}

/// Represents the result of a fallible [`Post`]-loading operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a [`Post`] object.
#[derive(Debug)]
pub enum Error {
    /// Returned when a post source file is missing its starting front-matter
    /// fence (`---`).
    FrontmatterMissingStartFence,

    /// Returned when a post source file is missing its terminal front-matter
    /// fence (`---` i.e., the starting fence was found but the ending one
    /// was missing).
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the front matter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when a post's `date` field can't be parsed as a timestamp.
    InvalidDate(String),

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingStartFence => {
                write!(f, "Post must begin with `---`")
            }
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::InvalidDate(date) => {
                write!(f, "Unparseable date `{}`", date)
            }
            Error::Io(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingStartFence => None,
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::InvalidDate(_) => None,
            Error::Io(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    const SIMPLE: &str = r#"---
title: "Welcome"
date: 2024-01-02
author: "Jane Engineer"
category: "Backend"
tags: ["rust", "blogging"]
readTime: 3
cover: "https://example.org/cover.jpg"
excerpt: "A first post."
featured: true
---

# Hello

World
"#;

    #[test]
    fn test_parse_full_frontmatter() -> Result<()> {
        let post = Post::from_str("2024-01-02-welcome", SIMPLE)?;
        assert_eq!(post.slug, "2024-01-02-welcome");
        assert_eq!(post.title, "Welcome");
        assert_eq!(post.author, "Jane Engineer");
        assert_eq!(post.category, "Backend");
        assert_eq!(post.excerpt, "A first post.");
        assert_eq!(post.tags, vec!["rust", "blogging"]);
        assert_eq!(post.read_time, 3);
        assert_eq!(post.cover.as_deref(), Some("https://example.org/cover.jpg"));
        assert!(post.featured);
        assert_eq!(
            post.date,
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!(post.content.starts_with("# Hello"));
        assert!(post.html.contains("<h1>Hello</h1>"));
        Ok(())
    }

    #[test]
    fn test_parse_minimal_frontmatter_defaults() -> Result<()> {
        let post = Post::from_str(
            "minimal",
            "---\ntitle: T\ndate: 2024-01-01\nauthor: A\ncategory: C\nexcerpt: E\n---\nbody",
        )?;
        assert!(post.tags.is_empty());
        assert_eq!(post.read_time, DEFAULT_READ_TIME);
        assert_eq!(post.cover, None);
        assert_eq!(post.author_avatar, None);
        assert!(!post.featured);
        Ok(())
    }

    #[test]
    fn test_empty_cover_is_absent() -> Result<()> {
        let post = Post::from_str(
            "empty-cover",
            "---\ntitle: T\ndate: 2024-01-01\nauthor: A\ncategory: C\nexcerpt: E\ncover: \"\"\n---\n",
        )?;
        assert_eq!(post.cover, None);
        Ok(())
    }

    #[test]
    fn test_rfc3339_date() -> Result<()> {
        let post = Post::from_str(
            "stamped",
            "---\ntitle: T\ndate: 2024-03-04T05:06:07Z\nauthor: A\ncategory: C\nexcerpt: E\n---\n",
        )?;
        assert_eq!(
            post.date,
            NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(5, 6, 7)
                .unwrap()
        );
        Ok(())
    }

    #[test]
    fn test_missing_start_fence() {
        match Post::from_str("bad", "title: T\n---\n") {
            Err(Error::FrontmatterMissingStartFence) => {}
            other => panic!("wanted missing start fence, got {:?}", other.map(|p| p.slug)),
        }
    }

    #[test]
    fn test_missing_end_fence() {
        match Post::from_str("bad", "---\ntitle: T\ndate: 2024-01-01\n") {
            Err(Error::FrontmatterMissingEndFence) => {}
            other => panic!("wanted missing end fence, got {:?}", other.map(|p| p.slug)),
        }
    }

    #[test]
    fn test_invalid_date_rejected() {
        match Post::from_str(
            "bad-date",
            "---\ntitle: T\ndate: someday\nauthor: A\ncategory: C\nexcerpt: E\n---\n",
        ) {
            Err(Error::InvalidDate(date)) => assert_eq!(date, "someday"),
            other => panic!("wanted invalid date, got {:?}", other.map(|p| p.slug)),
        }
    }

    #[test]
    fn test_load_posts_sorted_descending() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_post(dir.path(), "2024-01-01-a.md", "2024-01-01");
        write_post(dir.path(), "2024-01-02-b.md", "2024-01-02");
        fs::write(dir.path().join("notes.txt"), "not a post").unwrap();

        let posts = load_posts(dir.path())?;
        assert_eq!(
            posts.iter().map(|p| p.slug.as_str()).collect::<Vec<_>>(),
            vec!["2024-01-02-b", "2024-01-01-a"],
        );
        Ok(())
    }

    #[test]
    fn test_load_posts_missing_directory_is_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("content").join("posts");
        let posts = load_posts(&source)?;
        assert!(posts.is_empty());
        assert!(source.is_dir());
        Ok(())
    }

    #[test]
    fn test_load_posts_propagates_malformed_post() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.md"), "no front matter here").unwrap();
        match load_posts(dir.path()) {
            Err(Error::Annotated(annotation, _)) => {
                assert!(annotation.contains("broken.md"))
            }
            other => panic!("wanted annotated error, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_load_posts_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_post(dir.path(), "2024-01-01-a.md", "2024-01-01");
        write_post(dir.path(), "2024-01-02-b.md", "2024-01-02");
        assert_eq!(load_posts(dir.path())?, load_posts(dir.path())?);
        Ok(())
    }

    fn write_post(dir: &Path, file_name: &str, date: &str) {
        fs::write(
            dir.join(file_name),
            format!(
                "---\ntitle: {file_name}\ndate: {date}\nauthor: A\ncategory: Backend\nexcerpt: E\n---\nbody",
            ),
        )
        .unwrap();
    }
}
