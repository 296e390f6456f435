//! Configuration management for docraster

use std::env;

use crate::document::DEFAULT_MEMORY_BUDGET_MIB;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub session: SessionConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Mebibytes; non-positive selects the default
    pub memory_budget_mib: i64,
    pub anti_alias_level: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub zoom: f32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub jpeg_quality: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session: SessionConfig {
                memory_budget_mib: DEFAULT_MEMORY_BUDGET_MIB,
                anti_alias_level: 8,
            },
            render: RenderConfig {
                zoom: 1.0,
                tile_width: 512,
                tile_height: 512,
                jpeg_quality: 75,
            },
        }
    }
}

impl Config {
    /// Read `DOCRASTER_*` variables; unset or unparsable values keep defaults
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();
        Ok(Config {
            session: SessionConfig {
                memory_budget_mib: parse_or("DOCRASTER_MEMORY_BUDGET_MIB", defaults.session.memory_budget_mib),
                anti_alias_level: parse_or("DOCRASTER_ANTI_ALIAS_LEVEL", defaults.session.anti_alias_level),
            },
            render: RenderConfig {
                zoom: parse_or("DOCRASTER_ZOOM", defaults.render.zoom),
                tile_width: parse_or("DOCRASTER_TILE_WIDTH", defaults.render.tile_width),
                tile_height: parse_or("DOCRASTER_TILE_HEIGHT", defaults.render.tile_height),
                jpeg_quality: parse_or("DOCRASTER_JPEG_QUALITY", defaults.render.jpeg_quality),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
