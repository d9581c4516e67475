use serde::Serialize;

use crate::{
    error::{Error, Result},
    store_db::StoreDb,
};

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 100;
pub const SNIPPET_CHARS: usize = 320;

const KEYS: &[&str] = &["default_page_size", "max_page_size", "snippet_chars"];

/// Runtime tunables, persisted in the store's `settings` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub snippet_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            snippet_chars: SNIPPET_CHARS,
        }
    }
}

impl Settings {
    /// Read settings from the store, falling back to defaults for unset
    /// keys.
    pub fn load(store: &StoreDb) -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            default_page_size: read(
                store,
                "default_page_size",
                defaults.default_page_size,
            )?,
            max_page_size: read(store, "max_page_size", defaults.max_page_size)?,
            snippet_chars: read(store, "snippet_chars", defaults.snippet_chars)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate and persist a single setting.
    pub fn set(store: &StoreDb, key: &str, value: &str) -> Result<Self> {
        if !KEYS.contains(&key) {
            return Err(Error::Config(format!(
                "unknown setting '{key}' (expected one of {})",
                KEYS.join(", ")
            )));
        }
        parse(key, value)?;

        let previous = store.get_setting(key)?;
        store.set_setting(key, value)?;
        match Self::load(store) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                match previous {
                    Some(old) => store.set_setting(key, &old)?,
                    None => store.set_setting(key, &default_for(key))?,
                }
                Err(e)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(Error::Config("page sizes must be positive".into()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(Error::Config(format!(
                "default_page_size ({}) exceeds max_page_size ({})",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }
}

fn default_for(key: &str) -> String {
    let defaults = Settings::default();
    match key {
        "default_page_size" => defaults.default_page_size,
        "max_page_size" => defaults.max_page_size,
        _ => defaults.snippet_chars,
    }
    .to_string()
}

fn parse(key: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        Error::Config(format!("setting '{key}' expects a number, got '{value}'"))
    })
}

fn read(store: &StoreDb, key: &str, default: usize) -> Result<usize> {
    match store.get_setting(key)? {
        Some(value) => parse(key, &value),
        None => Ok(default),
    }
}
