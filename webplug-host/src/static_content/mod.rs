//! Static bundle serving
//!
//! [`StaticResourceResolver`] decides which file answers a request;
//! [`SinglePageApplication`] turns that decision into a response.

pub mod compressed;
pub mod config;
pub mod resolver;
pub mod spa;

pub use compressed::{AcceptEncoding, CompressedFileType};
pub use config::{StaticContentConfig, StaticContentError};
pub use resolver::{Resolution, ResolvedAsset, StaticAssetRequest, StaticResourceResolver};
pub use spa::SinglePageApplication;
