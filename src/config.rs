//! Service configuration: defaults, builder, and environment variables.
//!
//! | Variable                      | Meaning                                  |
//! |-------------------------------|------------------------------------------|
//! | `LESSON_FORGE_ADDR`           | HTTP listen address                      |
//! | `LESSON_FORGE_LAYOUT`         | default layout preset                    |
//! | `LESSON_FORGE_FONT_TIER`      | type size override for every preset      |
//! | `LESSON_FORGE_FONTS`          | `family=path;family=path` font files     |
//! | `LESSON_FORGE_FILENAME`       | fallback download filename stem          |
//! | `LESSON_FORGE_MAX_BODY_BYTES` | request body limit                       |

use std::net::SocketAddr;

use crate::engine::FontSource;
use crate::error::ConfigError;
use crate::layout_config::{FontTier, LayoutPreset};

pub const ENV_ADDR: &str = "LESSON_FORGE_ADDR";
pub const ENV_LAYOUT: &str = "LESSON_FORGE_LAYOUT";
pub const ENV_FONT_TIER: &str = "LESSON_FORGE_FONT_TIER";
pub const ENV_FONTS: &str = "LESSON_FORGE_FONTS";
pub const ENV_FILENAME: &str = "LESSON_FORGE_FILENAME";
pub const ENV_MAX_BODY_BYTES: &str = "LESSON_FORGE_MAX_BODY_BYTES";

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    /// Used when a request does not name a layout.
    pub layout: LayoutPreset,
    /// Replaces the preset's own type sizes when set.
    pub font_tier: Option<FontTier>,
    pub fonts: Vec<FontSource>,
    /// Download name stem used when the title yields no usable slug.
    pub default_filename: String,
    pub max_body_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            layout: LayoutPreset::default(),
            font_tier: None,
            fonts: Vec::new(),
            default_filename: "lesson".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_layout(mut self, layout: LayoutPreset) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_font_tier(mut self, tier: FontTier) -> Self {
        self.font_tier = Some(tier);
        self
    }

    pub fn with_fonts(mut self, fonts: Vec<FontSource>) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn with_default_filename(mut self, name: impl Into<String>) -> Self {
        self.default_filename = name.into();
        self
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get(ENV_ADDR) {
            config.addr = addr.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_ADDR,
                value: addr.clone(),
            })?;
        }
        if let Some(layout) = get(ENV_LAYOUT) {
            config.layout = layout.parse()?;
        }
        if let Some(tier) = get(ENV_FONT_TIER) {
            config.font_tier = Some(tier.parse()?);
        }
        if let Some(fonts) = get(ENV_FONTS) {
            config.fonts = fonts
                .split(';')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse::<FontSource>)
                .collect::<Result<_, _>>()?;
        }
        if let Some(name) = get(ENV_FILENAME) {
            config.default_filename = name.trim().to_string();
        }
        if let Some(limit) = get(ENV_MAX_BODY_BYTES) {
            config.max_body_bytes = limit
                .trim()
                .parse()
                .ok()
                .filter(|&n: &usize| n > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: ENV_MAX_BODY_BYTES,
                    value: limit.clone(),
                })?;
        }
        Ok(config)
    }
}
