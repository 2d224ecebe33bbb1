//! Outcome of a cache read

/// Result of looking a key up in the cache store.
///
/// Store failures are a distinct outcome rather than an error: callers treat
/// them like a miss but can still tell the two apart.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    /// The key was present and its value decoded
    Hit(T),
    /// The key was absent, expired, or held an undecodable value
    Miss,
    /// The store could not be reached in time
    StoreError(String),
}

impl<T> CacheLookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }

    /// The cached value, if any
    pub fn into_option(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss | CacheLookup::StoreError(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheLookup<U> {
        match self {
            CacheLookup::Hit(value) => CacheLookup::Hit(f(value)),
            CacheLookup::Miss => CacheLookup::Miss,
            CacheLookup::StoreError(reason) => CacheLookup::StoreError(reason),
        }
    }
}

/// Where a value handed back to a caller came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `x-cache` response header
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_option() {
        assert_eq!(CacheLookup::Hit(1).into_option(), Some(1));
        assert_eq!(CacheLookup::<i32>::Miss.into_option(), None);
        assert_eq!(CacheLookup::<i32>::StoreError("down".into()).into_option(), None);
    }

    #[test]
    fn test_map_preserves_outcome() {
        assert_eq!(CacheLookup::Hit(2).map(|v| v * 2), CacheLookup::Hit(4));
        assert!(CacheLookup::<i32>::Miss.map(|v| v * 2).is_miss());
        assert_eq!(
            CacheLookup::<i32>::StoreError("timeout".into()).map(|v| v * 2),
            CacheLookup::StoreError("timeout".into())
        );
    }

    #[test]
    fn test_header_values() {
        assert_eq!(CacheStatus::Hit.as_header_value(), "HIT");
        assert_eq!(CacheStatus::Miss.as_header_value(), "MISS");
    }
}
