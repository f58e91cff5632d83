//! The driver facade: resolves external dependencies once, builds the root
//! `<svg>` document, and hands the flattened operator tree to the
//! interpreter (spec.md §6 "Driver").
//!
//! Dependency resolution is a one-time barrier (spec.md §6 "Dependency
//! barrier"): every object id a page's operator list references is looked
//! up exactly once, concurrently, before a single operator is dispatched.
//! The interpreter itself never touches an [`ObjectStore`] — it only reads
//! the caches this module hands it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::counters::Counters;
use crate::error::{Error, Result};
use crate::format::pm;
use crate::interpreter::Interpreter;
use crate::objects::{self, FontObject, ObjectStore};
use crate::oplist::{self, Args, OpCode, Operator};
use crate::path::Viewport;
use crate::svgtree::Document;

/// Render-wide knobs a driver caller sets once per document, not per page
/// (spec.md §6 "Render options").
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Forces inline image hrefs to `data:` URIs. This crate never has an
    /// external sidecar-asset sink to route them to instead, so this is
    /// always effectively on; kept as a field to match the driver contract
    /// a caller might otherwise expect to toggle.
    pub force_data_uri: bool,
    /// Embeds referenced font programs as `@font-face` rules the first time
    /// each is used (spec.md §4.6 "Font embedding").
    pub embed_fonts: bool,
}

impl Default for RenderOptions {
    fn default() -> RenderOptions {
        RenderOptions { force_data_uri: true, embed_fonts: true }
    }
}

enum Resolved {
    Font(FontObject),
    Image(crate::state::ImageArgs),
    Missing,
}

/// Collects every `Dependency` id the flat operator list references,
/// deduplicated in first-seen order.
fn collect_dependency_ids(operator_list: &[Operator]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for operator in operator_list {
        if let (OpCode::Dependency, Args::ImageRef(id)) = (&operator.op, &operator.args) {
            if seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
    }
    ids
}

/// Renders one page's flat operator list into a standalone SVG document.
///
/// `common_objs` backs ids shared across a document's pages (prefixed
/// `g_`, per [`objects::is_common_ref`]); `page_objs` backs everything
/// else. Every dependency is resolved exactly once, concurrently, before
/// interpretation begins; a dependency present in neither store is logged
/// and skipped, not an error, matching the "Missing dependency" category
/// in spec.md §7.
pub async fn render_page(
    operator_list: Vec<Operator>,
    viewport: Viewport,
    common_objs: Arc<dyn ObjectStore>,
    page_objs: Arc<dyn ObjectStore>,
    options: RenderOptions,
    counters: Counters,
) -> Result<Document> {
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        return Err(Error::InvalidViewport { width: viewport.width, height: viewport.height });
    }

    let ids = collect_dependency_ids(&operator_list);
    let resolved = futures::future::join_all(ids.iter().map(|id| {
        let store = if objects::is_common_ref(id) { common_objs.clone() } else { page_objs.clone() };
        let id = id.clone();
        async move {
            let resolved = match store.get_font(&id).await {
                Some(font) => Resolved::Font(font),
                None => match store.get_image(&id).await {
                    Some(img) => Resolved::Image(img),
                    None => Resolved::Missing,
                },
            };
            (id, resolved)
        }
    }))
    .await;

    let mut fonts = HashMap::new();
    let mut images = HashMap::new();
    for (id, resolved) in resolved {
        match resolved {
            Resolved::Font(font) => {
                fonts.insert(id, Arc::new(font));
            }
            Resolved::Image(img) => {
                images.insert(id, img);
            }
            Resolved::Missing => {
                log::warn!("dependency {:?} resolved against neither object store, skipping", id);
            }
        }
    }

    let doc = Document::new(viewport.width, viewport.height);
    let defs = doc.create_element("defs");
    doc.root.append_child(&defs);
    let root_group = doc.create_element("g");
    root_group.set_attr("transform", pm(&viewport.transform));
    doc.root.append_child(&root_group);

    let tree = oplist::flatten(operator_list)?;
    let mut interpreter = Interpreter::new(
        doc,
        defs,
        root_group,
        viewport,
        counters,
        fonts,
        images,
        options.embed_fonts,
        options.force_data_uri,
    );
    interpreter.convert_op_list(&tree)?;
    Ok(interpreter.into_document())
}
