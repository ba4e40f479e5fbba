//! Engine configuration injected by the host
//!
//! Nothing here is global: every engine carries its own [`EngineConfig`] and
//! functions reach it through [`crate::functions::FunctionContext`].

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use thiserror::Error;

use crate::cache::{CacheBackend, MemoryCache};

/// Failure reported by an [`HttpClient`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned status {0}")]
    Status(u16),
}

/// Blocking HTTP GET used by `WEBSERVICE`
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<String, HttpError>;
}

/// Maps localized function names to the canonical (English) names used by
/// the function table
///
/// ```rust
/// use cellcalc_formula::Locale;
///
/// let fr = Locale::new("fr").with_function("ARRONDI", "ROUND");
/// assert_eq!(fr.canonical_name("arrondi"), "ROUND");
/// assert_eq!(fr.canonical_name("SUM"), "SUM");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    tag: String,
    functions: AHashMap<String, String>,
}

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            functions: AHashMap::new(),
        }
    }

    /// Add a localized name for a canonical function
    pub fn with_function(mut self, localized: &str, canonical: &str) -> Self {
        self.functions
            .insert(localized.to_uppercase(), canonical.to_uppercase());
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Canonical upper-case name for `name`; unknown names map to themselves
    pub fn canonical_name(&self, name: &str) -> String {
        let upper = name.to_uppercase();
        match self.functions.get(&upper) {
            Some(canonical) => canonical.clone(),
            None => upper,
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("en-US")
    }
}

/// Which spreadsheet application's rules apply where the two disagree
///
/// Only a handful of functions consult this, mostly over how text passed
/// directly as an argument is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compatibility {
    #[default]
    Excel,
    OpenOffice,
}

/// Host-provided collaborators for one calculation engine
///
/// Cloning a config shares its cache backend.
#[derive(Clone)]
pub struct EngineConfig {
    pub locale: Locale,
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub cache: Arc<dyn CacheBackend>,
    pub compatibility: Compatibility,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            http_client: None,
            cache: Arc::new(MemoryCache::new()),
            compatibility: Compatibility::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Store calculated values in `cache` instead of a private in-memory map
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_compatibility(mut self, compatibility: Compatibility) -> Self {
        self.compatibility = compatibility;
        self
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("locale", &self.locale)
            .field("http_client", &self.http_client.is_some())
            .field("compatibility", &self.compatibility)
            .finish_non_exhaustive()
    }
}
