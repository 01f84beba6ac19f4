//! Blog layout configuration.
//!
//! Precedence (lowest first): built-in defaults, `<root>/publish.toml`,
//! `BLOG_*` environment variables, then an explicit `--root` from the CLI.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

pub const CONFIG_FILE: &str = "publish.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogConfig {
    pub root: PathBuf,
    pub posts_dir: String,
    pub images_dir: String,
    pub template_file: String,
    pub index_file: String,
    pub author_name: String,
    pub git_remote: String,
    pub git_branch: String,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            posts_dir: "posts".into(),
            images_dir: "images/posts".into(),
            template_file: "posts/post-template.html".into(),
            index_file: "index.html".into(),
            author_name: "Author".into(),
            git_remote: "origin".into(),
            git_branch: "master".into(),
        }
    }
}

impl BlogConfig {
    /// Load settings for the blog at `root` (or the current directory).
    pub fn load(root: Option<&Path>) -> Result<Self, PublishError> {
        let defaults = BlogConfig::default();
        let base = match root {
            Some(r) => r.to_path_buf(),
            None => std::env::current_dir()
                .map_err(|e| PublishError::io("failed to read current directory", e))?,
        };

        let settings = Config::builder()
            .set_default("root", base.to_string_lossy().to_string())?
            .set_default("posts_dir", defaults.posts_dir)?
            .set_default("images_dir", defaults.images_dir)?
            .set_default("template_file", defaults.template_file)?
            .set_default("index_file", defaults.index_file)?
            .set_default("author_name", defaults.author_name)?
            .set_default("git_remote", defaults.git_remote)?
            .set_default("git_branch", defaults.git_branch)?
            .add_source(File::from(base.join(CONFIG_FILE)).required(false))
            .add_source(Environment::with_prefix("BLOG"))
            .build()?;

        let mut cfg: BlogConfig = settings.try_deserialize()?;
        if let Some(r) = root {
            cfg.root = r.to_path_buf();
        }
        Ok(cfg)
    }

    /// Config rooted at `root` with every other field at its default.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn posts_path(&self) -> PathBuf {
        self.root.join(&self.posts_dir)
    }

    pub fn template_path(&self) -> PathBuf {
        self.root.join(&self.template_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.index_file)
    }

    pub fn post_path(&self, filename: &str) -> PathBuf {
        self.posts_path().join(filename)
    }

    /// On-disk directory holding one post's images.
    pub fn asset_dir(&self, slug: &str) -> PathBuf {
        self.root.join(&self.images_dir).join(slug)
    }

    /// Prefix used in `src` attributes, relative to the posts directory.
    pub fn asset_href_prefix(&self, slug: &str) -> String {
        format!("../{}/{}", self.images_dir.trim_end_matches('/'), slug)
    }
}
