//! Image requests.
//!
//! A [`Request`] describes what to load (a source) and how to shape it
//! (transform parameters). It is immutable once built; the only field that
//! changes during dispatch is the network policy, which a retry may tighten
//! via [`Request::with_network_policy`].
//!
//! # Example
//!
//! ```
//! use imgload::request::{Request, Priority};
//!
//! let request = Request::uri("https://example.com/photo.jpg")
//!     .resize(320, 240)
//!     .center_inside()
//!     .priority(Priority::High)
//!     .tag("gallery")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(request.resize(), Some((320, 240)));
//! ```

mod key;
mod policy;

pub use key::RequestKey;
pub use policy::{MemoryPolicy, NetworkPolicy, Priority};

use crate::error::LoaderError;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// URI with a scheme (`file://`, `asset:///`, `https://`, or a custom one).
    Uri(String),
    /// Application-bundled resource identified by number.
    Resource(u32),
}

impl Source {
    /// Returns the URI scheme, if any.
    pub fn scheme(&self) -> Option<&str> {
        match self {
            Self::Uri(uri) => uri.split_once("://").map(|(scheme, _)| scheme),
            Self::Resource(_) => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri(uri) => f.write_str(uri),
            Self::Resource(id) => write!(f, "resource:{}", id),
        }
    }
}

/// Anchor used when center-cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gravity {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

impl Gravity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// An immutable image request.
#[derive(Debug, Clone)]
pub struct Request {
    id: u64,
    source: Source,
    stable_key: Option<String>,
    resize: Option<(u32, u32)>,
    center_crop: bool,
    center_crop_gravity: Gravity,
    center_inside: bool,
    only_scale_down: bool,
    rotation_degrees: f32,
    rotation_pivot: Option<(f32, f32)>,
    transformations: Vec<String>,
    priority: Priority,
    memory_policy: MemoryPolicy,
    network_policy: NetworkPolicy,
    tag: Option<String>,
    key: RequestKey,
}

impl Request {
    /// Starts a request for a URI.
    pub fn uri(uri: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Source::Uri(uri.into()))
    }

    /// Starts a request for a local file path.
    pub fn file(path: impl AsRef<Path>) -> RequestBuilder {
        RequestBuilder::new(Source::Uri(format!(
            "file://{}",
            path.as_ref().display()
        )))
    }

    /// Starts a request for a bundled resource.
    pub fn resource(id: u32) -> RequestBuilder {
        RequestBuilder::new(Source::Resource(id))
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn stable_key(&self) -> Option<&str> {
        self.stable_key.as_deref()
    }

    pub fn resize(&self) -> Option<(u32, u32)> {
        self.resize
    }

    pub fn center_crop(&self) -> bool {
        self.center_crop
    }

    pub fn center_crop_gravity(&self) -> Gravity {
        self.center_crop_gravity
    }

    pub fn center_inside(&self) -> bool {
        self.center_inside
    }

    pub fn only_scale_down(&self) -> bool {
        self.only_scale_down
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn rotation_pivot(&self) -> Option<(f32, f32)> {
        self.rotation_pivot
    }

    pub fn transformations(&self) -> &[String] {
        &self.transformations
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn memory_policy(&self) -> MemoryPolicy {
        self.memory_policy
    }

    pub fn network_policy(&self) -> NetworkPolicy {
        self.network_policy
    }

    /// Caller-supplied grouping tag, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Canonical coalescing key.
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    /// Short identifier used in log lines.
    pub fn log_id(&self) -> String {
        format!("[R{}]", self.id)
    }

    /// Returns a copy with additional network policy flags.
    ///
    /// The key is unchanged; network policy is not part of it.
    pub fn with_network_policy(&self, policy: NetworkPolicy) -> Self {
        let mut request = self.clone();
        request.network_policy = request.network_policy | policy;
        request
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    source: Source,
    stable_key: Option<String>,
    resize: Option<(u32, u32)>,
    center_crop: bool,
    center_crop_gravity: Gravity,
    center_inside: bool,
    only_scale_down: bool,
    rotation_degrees: f32,
    rotation_pivot: Option<(f32, f32)>,
    transformations: Vec<String>,
    priority: Priority,
    memory_policy: MemoryPolicy,
    network_policy: NetworkPolicy,
    tag: Option<String>,
}

impl RequestBuilder {
    fn new(source: Source) -> Self {
        Self {
            source,
            stable_key: None,
            resize: None,
            center_crop: false,
            center_crop_gravity: Gravity::Center,
            center_inside: false,
            only_scale_down: false,
            rotation_degrees: 0.0,
            rotation_pivot: None,
            transformations: Vec::new(),
            priority: Priority::Normal,
            memory_policy: MemoryPolicy::DEFAULT,
            network_policy: NetworkPolicy::DEFAULT,
            tag: None,
        }
    }

    /// Overrides the source for keying purposes.
    pub fn stable_key(mut self, key: impl Into<String>) -> Self {
        self.stable_key = Some(key.into());
        self
    }

    /// Resizes to the given dimensions. One dimension may be zero to
    /// preserve aspect ratio.
    pub fn resize(mut self, width: u32, height: u32) -> Self {
        self.resize = Some((width, height));
        self
    }

    pub fn center_crop(mut self, gravity: Gravity) -> Self {
        self.center_crop = true;
        self.center_crop_gravity = gravity;
        self
    }

    pub fn center_inside(mut self) -> Self {
        self.center_inside = true;
        self
    }

    pub fn only_scale_down(mut self) -> Self {
        self.only_scale_down = true;
        self
    }

    pub fn rotate(mut self, degrees: f32) -> Self {
        self.rotation_degrees = degrees;
        self.rotation_pivot = None;
        self
    }

    pub fn rotate_about(mut self, degrees: f32, pivot_x: f32, pivot_y: f32) -> Self {
        self.rotation_degrees = degrees;
        self.rotation_pivot = Some((pivot_x, pivot_y));
        self
    }

    /// Appends a named transformation; its name becomes part of the key.
    pub fn transform(mut self, key: impl Into<String>) -> Self {
        self.transformations.push(key.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn memory_policy(mut self, policy: MemoryPolicy) -> Self {
        self.memory_policy = self.memory_policy | policy;
        self
    }

    pub fn network_policy(mut self, policy: NetworkPolicy) -> Self {
        self.network_policy = self.network_policy | policy;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Validates and freezes the request.
    pub fn build(self) -> Result<Request, LoaderError> {
        if let Source::Uri(uri) = &self.source {
            if uri.trim().is_empty() {
                return Err(LoaderError::InvalidRequest("empty source URI".into()));
            }
        }
        if let Some((width, height)) = self.resize {
            if width == 0 && height == 0 {
                return Err(LoaderError::InvalidRequest(
                    "resize needs at least one non-zero dimension".into(),
                ));
            }
        }
        if self.center_crop && self.center_inside {
            return Err(LoaderError::InvalidRequest(
                "center crop and center inside are mutually exclusive".into(),
            ));
        }
        if (self.center_crop || self.center_inside) && self.resize.is_none() {
            return Err(LoaderError::InvalidRequest(
                "center crop/inside requires a resize".into(),
            ));
        }
        if self.only_scale_down && self.resize.is_none() {
            return Err(LoaderError::InvalidRequest(
                "only scale down requires a resize".into(),
            ));
        }

        let mut request = Request {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            source: self.source,
            stable_key: self.stable_key,
            resize: self.resize,
            center_crop: self.center_crop,
            center_crop_gravity: self.center_crop_gravity,
            center_inside: self.center_inside,
            only_scale_down: self.only_scale_down,
            rotation_degrees: self.rotation_degrees,
            rotation_pivot: self.rotation_pivot,
            transformations: self.transformations,
            priority: self.priority,
            memory_policy: self.memory_policy,
            network_policy: self.network_policy,
            tag: self.tag,
            key: RequestKey::new(""),
        };
        request.key = key::create_key(&request);
        Ok(request)
    }
}
