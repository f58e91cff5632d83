//! The object store: an async collaborator that resolves font and image
//! objects by string id.
//!
//! This crate only consumes the trait; a concrete PDF-backed store is the
//! embedding application's responsibility, the same boundary a content-
//! stream interpreter draws around its own `Resources` dictionary lookups.

use async_trait::async_trait;

use crate::state::ImageArgs;

/// A resolved font object.
#[derive(Debug, Clone)]
pub struct FontObject {
    pub loaded_name: String,
    pub font_matrix: Option<[f64; 6]>,
    pub vertical: bool,
    pub bold: bool,
    pub black: bool,
    pub italic: bool,
    pub default_v_metrics: Option<[f64; 3]>,
    pub missing_file: bool,
    /// Embedded font program bytes, for optional `@font-face` embedding.
    pub data: Option<Vec<u8>>,
    pub mimetype: Option<String>,
}

/// An object-store key: `g_`-prefixed ids resolve against the document-wide
/// store, everything else against the page-local store.
pub fn is_common_ref(id: &str) -> bool {
    id.starts_with("g_")
}

/// Two asynchronous key -> value dictionaries, page-local and
/// document-wide, resolving font objects and image bitmaps by id.
///
/// `get_image` returns the decoded pixel payload in the same shape as an
/// inline image's `ImageArgs`; bitmap-backed sources are the caller's
/// responsibility to reject before handing data to this trait, since
/// those are unsupported as an image-mask source.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_font(&self, id: &str) -> Option<FontObject>;
    async fn get_image(&self, id: &str) -> Option<ImageArgs>;
}
