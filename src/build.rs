//! Exports the [`build_site`] function which stitches together the
//! high-level steps of building the output site: loading the posts
//! ([`crate::post`]), rendering the post and listing pages
//! ([`crate::page`]), and writing the results to disk. The build is one
//! synchronous pass with no partial-failure recovery: any error aborts the
//! whole run. Writes are whole-file overwrites with no atomic rename; the
//! tool is re-run-on-demand, so a truncated file from a crash mid-write is
//! repaired by the next build.

use std::fmt;
use std::fs;
use std::path::Path;

use spdlog::{info, warn};

use crate::config::Config;
use crate::page::{self, PageContext};
use crate::post::{self, Error as ParseError, Post};

/// Builds the site from a [`Config`] object: ensure the output directories
/// exist, load the posts, render one page per post plus the listing page,
/// and report what was written. When the source directory holds no posts,
/// the behavior depends on [`Config::sample_on_empty`]: either a sample
/// welcome post is written and the pipeline re-runs exactly once, or the
/// build warns and stops.
pub fn build_site(config: &Config) -> Result<()> {
    build(config, config.sample_on_empty)
}

fn build(config: &Config, sample_on_empty: bool) -> Result<()> {
    fs::create_dir_all(config.output_directory.join("posts"))?;

    let posts = post::load_posts(&config.posts_source_directory)?;
    info!("Found {} post(s)", posts.len());

    if posts.is_empty() {
        if sample_on_empty {
            warn!("No posts found; creating a sample post");
            write_sample_post(&config.posts_source_directory)?;
            // Re-run once; the sample post must not recurse further.
            return build(config, false);
        }
        warn!("No posts found; nothing to build");
        return Ok(());
    }

    let ctx = PageContext {
        site_title: &config.site_title,
        link_mode: config.link_mode,
        output_directory: &config.output_directory,
    };

    for post in &posts {
        let path = config
            .output_directory
            .join("posts")
            .join(format!("{}.html", post.slug));
        fs::write(&path, page::post_page(post, &posts, &ctx))?;
        info!("Generated posts/{}.html", post.slug);
    }

    fs::write(
        config.output_directory.join("posts.html"),
        page::listing_page(&posts, &ctx),
    )?;
    info!("Generated posts.html");

    note_home_page(&posts);
    info!("Build finished: {}", config.output_directory.display());

    Ok(())
}

/// The home page is a hand-maintained static file; this pipeline never
/// regenerates it. Log what it would feature so the author can update it.
fn note_home_page(posts: &[Post]) {
    let featured = posts.iter().find(|p| p.featured).or_else(|| posts.first());
    if let Some(featured) = featured {
        info!("Home-page featured post: {}", featured.title);
        let recent: Vec<&str> = posts
            .iter()
            .filter(|p| p.slug != featured.slug)
            .take(3)
            .map(|p| p.title.as_str())
            .collect();
        if !recent.is_empty() {
            info!("Recent posts: {}", recent.join(", "));
        }
    }
    info!("index.html left untouched (maintained by hand)");
}

fn write_sample_post(posts_source_directory: &Path) -> Result<()> {
    let today = chrono::Utc::now().format("%Y-%m-%d");
    let sample = format!(
        r#"---
title: "Welcome to TechBlog"
date: {today}
author: "Jane Engineer"
category: "Meta"
tags: ["blogging", "tutorial"]
readTime: 3
excerpt: "A sample post showing the front-matter fields TechBlog understands."
featured: true
---

# Welcome to TechBlog

This is a sample post created because the posts directory was empty.

## Writing posts

1. Add a Markdown file to the posts directory
2. Fill in the front-matter block at the top
3. Run `techblog build` to regenerate the site

Happy writing!
"#
    );
    fs::write(
        posts_source_directory.join(format!("{}-welcome.md", today)),
        sample,
    )?;
    Ok(())
}

/// The result of a fallible build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors happen during post loading or
/// while writing output files.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors loading posts.
    Parse(ParseError),

    /// Returned for I/O errors writing the output pages.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::LinkMode;
    use std::path::PathBuf;

    #[test]
    fn test_build_two_posts() -> Result<()> {
        let fixture = Fixture::new();
        fixture.write_post(
            "2024-01-01-a.md",
            "---\ntitle: Post A\ndate: 2024-01-01\nauthor: A\ncategory: Backend\nexcerpt: About A\n---\nBody A",
        );
        fixture.write_post(
            "2024-01-02-b.md",
            "---\ntitle: Post B\ndate: 2024-01-02\nauthor: A\ncategory: Backend\nexcerpt: About B\nfeatured: true\n---\nBody B",
        );

        build_site(&fixture.config)?;

        // listing lists b before a
        let listing = fixture.read("posts.html");
        let b = listing.find("2024-01-02-b.html").unwrap();
        let a = listing.find("2024-01-01-a.html").unwrap();
        assert!(b < a);

        // a's detail page relates to b, omits the cover block, and renders
        // the category as its single tag
        let page_a = fixture.read("posts/2024-01-01-a.html");
        assert!(page_a.contains("Post B"));
        assert!(!page_a.contains("article-cover"));
        assert!(page_a.contains(r#"<span class="tag tag-backend">Backend</span>"#));
        Ok(())
    }

    #[test]
    fn test_rebuild_is_byte_identical() -> Result<()> {
        let fixture = Fixture::new();
        fixture.write_post(
            "2024-01-01-a.md",
            "---\ntitle: Post A\ndate: 2024-01-01\nauthor: A\ncategory: Backend\nexcerpt: About A\n---\nBody A",
        );
        fixture.write_post(
            "2024-01-02-b.md",
            "---\ntitle: Post B\ndate: 2024-01-02\nauthor: A\ncategory: Frontend\nexcerpt: About B\n---\nBody B",
        );

        build_site(&fixture.config)?;
        let first = fixture.snapshot_outputs();
        build_site(&fixture.config)?;
        assert_eq!(first, fixture.snapshot_outputs());
        Ok(())
    }

    #[test]
    fn test_empty_source_github_variant_stops() -> Result<()> {
        let fixture = Fixture::new_github_pages();
        build_site(&fixture.config)?;
        assert!(!fixture.out.path().join("posts.html").exists());
        assert!(std::fs::read_dir(&fixture.config.posts_source_directory)?
            .next()
            .is_none());
        Ok(())
    }

    #[test]
    fn test_empty_source_root_variant_synthesizes_sample() -> Result<()> {
        let fixture = Fixture::new();
        build_site(&fixture.config)?;
        // the sample post was written and built
        assert_eq!(
            std::fs::read_dir(&fixture.config.posts_source_directory)?.count(),
            1,
        );
        assert!(fixture.out.path().join("posts.html").exists());
        assert_eq!(
            std::fs::read_dir(fixture.out.path().join("posts"))?.count(),
            1,
        );
        Ok(())
    }

    struct Fixture {
        src: tempfile::TempDir,
        out: tempfile::TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Fixture {
            let src = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let config = Config {
                posts_source_directory: src.path().to_owned(),
                output_directory: out.path().to_owned(),
                link_mode: LinkMode::Relative,
                ..Config::default()
            };
            Fixture { src, out, config }
        }

        fn new_github_pages() -> Fixture {
            let mut fixture = Fixture::new();
            let config = std::mem::take(&mut fixture.config).for_github_pages();
            fixture.config = config;
            fixture
        }

        fn write_post(&self, file_name: &str, contents: &str) {
            std::fs::write(self.src.path().join(file_name), contents).unwrap();
        }

        fn read(&self, relative: &str) -> String {
            std::fs::read_to_string(self.out.path().join(relative)).unwrap()
        }

        /// Collects every output file path with its bytes, sorted by path.
        fn snapshot_outputs(&self) -> Vec<(PathBuf, Vec<u8>)> {
            let mut files = Vec::new();
            let mut stack = vec![self.out.path().to_owned()];
            while let Some(dir) = stack.pop() {
                for entry in std::fs::read_dir(&dir).unwrap() {
                    let entry = entry.unwrap();
                    if entry.file_type().unwrap().is_dir() {
                        stack.push(entry.path());
                    } else {
                        files.push((entry.path(), std::fs::read(entry.path()).unwrap()));
                    }
                }
            }
            files.sort();
            files
        }
    }
}
