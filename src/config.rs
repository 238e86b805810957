use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::parser::strategy::Heuristics;

const ENV_PREFIX: &str = "RT";
const DEFAULT_FILE: &str = "rt_scraper";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub db_path: PathBuf,
    /// When set, raw pages and strategy traces are written here.
    pub dump_dir: Option<PathBuf>,
    pub heuristics: Heuristics,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: "https://www.rottentomatoes.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
            timeout_secs: 10,
            db_path: PathBuf::from("data/rt_lists.sqlite"),
            dump_dir: None,
            heuristics: Heuristics::default(),
        }
    }
}

impl Settings {
    /// Defaults, then `rt_scraper.toml` (or `file`), then `RT_*` env vars.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        load_from(file, None)
    }
}

/// `env` replaces the process environment when given.
fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Settings> {
    let defaults = Config::try_from(&Settings::default()).context("Failed to encode default settings")?;

    let mut builder = Config::builder().add_source(defaults);
    builder = match file {
        Some(path) => builder.add_source(File::from(path.to_path_buf()).required(true)),
        None => builder.add_source(File::with_name(DEFAULT_FILE).required(false)),
    };
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("heuristics.positive_keywords")
            .with_list_parse_key("heuristics.negative_keywords")
            .source(env),
    );

    builder
        .build()
        .context("Failed to load settings")?
        .try_deserialize()
        .context("Invalid settings")
}
