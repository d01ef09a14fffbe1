//! When a tile response may be cached

/// Cache policy derived from the configured max age
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age_secs: u64,
}

impl CachePolicy {
    pub fn new(max_age_secs: u64) -> Self {
        Self { max_age_secs }
    }

    pub fn enabled(&self) -> bool {
        self.max_age_secs > 0
    }

    /// Only the default shape of a tile (all fields, no filter) is stored
    pub fn allows_store(&self, fields: Option<&str>, filter: Option<&str>) -> bool {
        fields.is_none() && filter.is_none() && self.enabled()
    }

    /// `Cache-Control` max age for a response of this shape
    pub fn response_max_age(&self, fields: Option<&str>, filter: Option<&str>) -> u64 {
        if fields.is_some() || filter.is_some() {
            0
        } else {
            self.max_age_secs
        }
    }
}
