//! upcache - transient upload staging
//!
//! Stages uploaded files under generated identifiers so a web form can
//! carry them across validation failures, and reclaims the ones that are
//! abandoned.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod params;

pub use cache::{CacheEntry, CacheSettings, UploadCache};
pub use error::{UpcacheError, UpcacheResult};
pub use params::{Param, ParamBag, Upload};
