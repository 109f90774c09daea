//! Build configuration. All knobs live in one explicit [`Config`] structure
//! that is passed into the orchestrator at invocation time; there are no
//! module-level path constants. A project may carry an optional
//! `techblog.yaml` file overriding the defaults.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the optional project file looked up in the working directory.
pub const PROJECT_FILE: &str = "techblog.yaml";

/// How cross-page links are constructed. The two modes are mutually
/// exclusive configuration, selected once at invocation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
    /// Always emit a single leading slash (`/css/style.css`). Suitable when
    /// the site is served from a domain root.
    RootAbsolute,

    /// Compute a `./`- or `../`-repeated prefix from the page's directory
    /// depth. Suitable for static-export hosting under a subpath (GitHub
    /// Pages project sites).
    Relative,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Site name used in page titles and the nav logo.
    pub site_title: String,

    /// Directory holding the Markdown post sources. Created empty when
    /// missing.
    pub posts_source_directory: PathBuf,

    /// Root output directory. Post pages land in `{output}/posts/`, the
    /// listing page at `{output}/posts.html`.
    pub output_directory: PathBuf,

    /// Link-path strategy shared by every rendered page.
    pub link_mode: LinkMode,

    /// When the source directory holds no posts: `true` writes a sample
    /// welcome post and re-runs the build once; `false` warns and stops.
    pub sample_on_empty: bool,

    /// Declared page size for the listing page. Currently unused: pagination
    /// is not applied and the listing always renders the full post list.
    pub posts_per_page: usize,

    /// Local port for the watch command's HTTP server.
    pub serve_port: u16,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            site_title: "TechBlog".to_owned(),
            posts_source_directory: PathBuf::from("content/posts"),
            output_directory: PathBuf::from("."),
            link_mode: LinkMode::RootAbsolute,
            sample_on_empty: true,
            posts_per_page: 6,
            serve_port: 8080,
        }
    }
}

impl Config {
    /// Loads the configuration. An explicitly provided path must exist;
    /// otherwise `techblog.yaml` is used when present in the working
    /// directory, falling back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => Config::from_project_file(path),
            None => {
                let path = Path::new(PROJECT_FILE);
                if path.exists() {
                    Config::from_project_file(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow!("Opening project file `{}`: {}", path.display(), e))?;
        serde_yaml::from_reader(file)
            .map_err(|e| anyhow!("Loading project file `{}`: {}", path.display(), e))
    }

    /// Switches the configuration to the GitHub-pages build variant:
    /// relative links, and no sample post is synthesized when the source
    /// directory is empty.
    pub fn for_github_pages(mut self) -> Config {
        self.link_mode = LinkMode::Relative;
        self.sample_on_empty = false;
        self
    }
}
