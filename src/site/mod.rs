//! Site addressing and site ID input.

pub mod address;
pub mod source;

pub use address::{SITE_NETWORK_PREFIX, resolve};
pub use source::{SITE_ID_HEADER, SiteSource};
