//! imgload - asynchronous image loading with request coalescing
//!
//! Requests for the same transformed image (same source, resize, crop,
//! rotation and decode settings) share one load. Results land in a memory
//! cache and are handed to their targets from a single delivery task, in
//! order. Requests can be cancelled per target or per tag, paused and
//! resumed per tag, and failed network loads are retried or replayed when
//! connectivity comes back.
//!
//! # Quick Start
//!
//! ```no_run
//! use imgload::request::Gravity;
//! use imgload::{ImageLoader, Request};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = ImageLoader::builder().start()?;
//!
//! let request = Request::uri("https://example.com/cat.png")
//!     .resize(256, 256)
//!     .center_crop(Gravity::Center)
//!     .build()?;
//!
//! let result = loader.load(request)?.await?;
//! if let Some(bitmap) = result.as_bitmap() {
//!     println!("{}x{} from {:?}", bitmap.width(), bitmap.height(), result.loaded_from());
//! }
//!
//! loader.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`loader`] - the public facade ([`ImageLoader`])
//! - [`dispatcher`] - the single-owner actor that coalesces and schedules loads
//! - [`strategy`] - file, asset and network loaders plus decoding
//! - [`cache`] - memory cache keyed by request key
//! - [`config`] - `~/.imgload/config.ini`

pub mod action;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod hunter;
pub mod loader;
pub mod log;
pub mod logging;
pub mod request;
pub mod result;
pub mod strategy;

pub use action::{CallbackTarget, Tag, Target};
pub use connectivity::{ConnectivityObserver, NetworkKind, NetworkState};
pub use error::{LoadError, LoaderError};
pub use loader::{ImageLoader, ImageLoaderBuilder, LoadHandle};
pub use request::{MemoryPolicy, NetworkPolicy, Priority, Request, Source};
pub use result::{Bitmap, LoadResult, LoadedFrom};

/// Version of the imgload library and CLI.
///
/// Synchronized across the workspace from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
