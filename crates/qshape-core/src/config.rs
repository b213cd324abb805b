//! Query shaping configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Page;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size used when the caller does not ask for one.
    pub default_page_size: u64,

    /// Upper bound on page size. Larger pages are rejected, never clamped.
    pub max_page_size: Option<u64>,

    /// Escape `%`, `_` and `\` in SW/EW/LIKE values so they match literally.
    pub like_escape: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: None,
            like_escape: true,
        }
    }
}

impl QueryConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `QSHAPE_DEFAULT_PAGE_SIZE`: page size when none is requested
    /// - `QSHAPE_MAX_PAGE_SIZE`: largest accepted page size
    /// - `QSHAPE_LIKE_ESCAPE`: `true`/`false`, escape pattern metacharacters
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("QSHAPE_DEFAULT_PAGE_SIZE") {
            if let Ok(v) = s.parse::<u64>() {
                if v > 0 {
                    cfg.default_page_size = v;
                }
            }
        }

        if let Ok(s) = std::env::var("QSHAPE_MAX_PAGE_SIZE") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.max_page_size = Some(v);
            }
        }

        if let Ok(s) = std::env::var("QSHAPE_LIKE_ESCAPE") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.like_escape = v;
            }
        }

        cfg
    }

    /// Build a validated page. `size` falls back to `default_page_size`.
    pub fn page(&self, number: i64, size: Option<i64>) -> Result<Page> {
        let size = size.unwrap_or(self.default_page_size as i64);
        let page = Page::new(number, size)?;
        match self.max_page_size {
            Some(max) if page.size() > max => Err(Error::InvalidPage(format!(
                "page size {} exceeds the maximum of {}",
                page.size(),
                max
            ))),
            _ => Ok(page),
        }
    }
}
