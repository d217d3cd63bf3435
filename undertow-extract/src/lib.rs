//! Undertow Extract - Playable stream recovery
//!
//! [`LinkExtractor`] scrapes the provider's delivery page for its variant
//! menu and hands every embed page to [`ScriptUnpacker`], which decodes the
//! packed player script natively to recover the media URL.

pub mod extractor;
pub mod unpacker;

pub use extractor::{LinkExtractor, VariantKey, VariantSource, normalize_language};
pub use unpacker::{PackedArgs, ScriptUnpacker};

pub type Result<T> = std::result::Result<T, undertow_core::LookupError>;
