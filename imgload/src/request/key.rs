//! Canonical request keys.
//!
//! Two requests with equal keys are fetch-equivalent: they resolve to the
//! same decoded image and are coalesced onto a single hunter. The key covers
//! the source and every transform parameter, but not policies, priority or
//! tag.

use std::fmt;
use std::sync::Arc;

use super::Request;

/// Separator between key fragments.
const KEY_SEPARATOR: char = '\n';

/// Canonical identity of a request, used for coalescing and cache lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(Arc<str>);

impl RequestKey {
    /// Wraps an already-canonical key string.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key was derived from the given source URI.
    ///
    /// Used to invalidate every transformed variant of one source.
    pub fn is_for_source(&self, uri: &str) -> bool {
        match self.0.split_once(KEY_SEPARATOR) {
            Some((source, _)) => source == uri,
            None => &*self.0 == uri,
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the canonical key for a request.
///
/// The stable key, when present, replaces the source so that callers can
/// share cache entries across differing URIs.
pub(crate) fn create_key(request: &Request) -> RequestKey {
    let mut key = String::with_capacity(64);

    match request.stable_key() {
        Some(stable) => key.push_str(stable),
        None => key.push_str(&request.source().to_string()),
    }
    key.push(KEY_SEPARATOR);

    if request.rotation_degrees() != 0.0 {
        key.push_str("rotation:");
        key.push_str(&request.rotation_degrees().to_string());
        if let Some((x, y)) = request.rotation_pivot() {
            key.push('@');
            key.push_str(&x.to_string());
            key.push('x');
            key.push_str(&y.to_string());
        }
        key.push(KEY_SEPARATOR);
    }

    if let Some((width, height)) = request.resize() {
        key.push_str("resize:");
        key.push_str(&width.to_string());
        key.push('x');
        key.push_str(&height.to_string());
        key.push(KEY_SEPARATOR);
    }

    if request.center_crop() {
        key.push_str("centerCrop:");
        key.push_str(request.center_crop_gravity().as_str());
        key.push(KEY_SEPARATOR);
    } else if request.center_inside() {
        key.push_str("centerInside");
        key.push(KEY_SEPARATOR);
    }

    for transformation in request.transformations() {
        key.push_str(transformation);
        key.push(KEY_SEPARATOR);
    }

    RequestKey(Arc::from(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Gravity, MemoryPolicy, Priority, Request};

    #[test]
    fn test_plain_source_key() {
        let request = Request::uri("https://example.com/a.png").build().unwrap();
        assert_eq!(request.key().as_str(), "https://example.com/a.png\n");
    }

    #[test]
    fn test_transform_fragments_in_fixed_order() {
        let request = Request::uri("file:///tmp/a.png")
            .resize(100, 50)
            .center_crop(Gravity::Center)
            .rotate_about(90.0, 10.0, 20.0)
            .transform("grayscale")
            .build()
            .unwrap();

        assert_eq!(
            request.key().as_str(),
            "file:///tmp/a.png\nrotation:90@10x20\nresize:100x50\ncenterCrop:center\ngrayscale\n"
        );
    }

    #[test]
    fn test_policy_priority_and_tag_do_not_affect_key() {
        let a = Request::uri("https://example.com/a.png").build().unwrap();
        let b = Request::uri("https://example.com/a.png")
            .memory_policy(MemoryPolicy::NO_CACHE)
            .priority(Priority::High)
            .tag("gallery")
            .build()
            .unwrap();

        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_stable_key_replaces_source() {
        let a = Request::uri("https://cdn1.example.com/a.png")
            .stable_key("avatar-42")
            .build()
            .unwrap();
        let b = Request::uri("https://cdn2.example.com/a.png")
            .stable_key("avatar-42")
            .build()
            .unwrap();

        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_resource_source_key() {
        let request = Request::resource(7).build().unwrap();
        assert_eq!(request.key().as_str(), "resource:7\n");
    }

    #[test]
    fn test_is_for_source() {
        let request = Request::uri("https://example.com/a.png")
            .resize(10, 10)
            .build()
            .unwrap();

        assert!(request.key().is_for_source("https://example.com/a.png"));
        assert!(!request.key().is_for_source("https://example.com/b.png"));
    }
}
