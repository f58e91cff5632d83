use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use pdf2svg::counters::Counters;
use pdf2svg::objects::ObjectStore;
use pdf2svg::opjson::{DocumentJson, JsonObjectStore};
use pdf2svg::{driver, RenderOptions};

/// Renders a JSON-encoded, flattened PDF operator list to standalone SVG
/// pages.
///
/// The input file is not a PDF itself: it is the already-decoded operator
/// list (and the font/image objects it depends on) a PDF content-stream
/// interpreter would otherwise produce, serialized as JSON. One input file
/// holds every page of a document, sharing one document-wide object store.
#[derive(Debug, Parser)]
#[clap(about, version)]
struct Args {
    /// Path to read the JSON operator-list document from.
    #[clap(default_value = "./test3.pdf")]
    input: PathBuf,
    /// Directory to write the rendered SVG into. Created if missing.
    #[clap(long, default_value = ".")]
    out_dir: PathBuf,
    /// Skip embedding referenced font programs as `@font-face` rules.
    #[clap(long)]
    no_embed_fonts: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let name = args
        .input
        .file_stem()
        .context("input path does not point to a file")?
        .to_string_lossy()
        .into_owned();

    let json = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {:?}", args.input))?;
    let document: DocumentJson =
        serde_json::from_str(&json).with_context(|| format!("failed to parse {:?}", args.input))?;

    let common_objects: Arc<dyn ObjectStore> = Arc::new(
        JsonObjectStore::from_map(document.common_objects)
            .context("failed to decode document-wide objects")?,
    );
    let options = RenderOptions { force_data_uri: true, embed_fonts: !args.no_embed_fonts };
    let counters = Counters::new();

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create output directory {:?}", args.out_dir))?;

    // A single page's failure is caught and logged here, not propagated:
    // the rest of the document still gets written (spec.md §7 "other pages
    // continue"). The exit code reflects whether *any* page failed.
    let mut failed = false;
    for (index, page) in document.pages.into_iter().enumerate() {
        let page_num = index + 1;
        match render_one_page(page, &common_objects, &options, &counters) {
            Ok(svg) => {
                let out_path = args.out_dir.join(format!("{}-{}.svg", name, page_num));
                if let Err(err) = fs::write(&out_path, svg) {
                    eprintln!("error: failed to write {:?}: {}", out_path, err);
                    failed = true;
                }
            }
            Err(err) => {
                eprintln!("error: failed to render page {} of {:?}: {}", page_num, args.input, err);
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn render_one_page(
    page: pdf2svg::opjson::PageJson,
    common_objects: &Arc<dyn ObjectStore>,
    options: &RenderOptions,
    counters: &Counters,
) -> anyhow::Result<String> {
    let viewport = page.viewport.into();
    let operators = pdf2svg::opjson::into_operators(page.operators)
        .context("failed to decode operator list")?;
    let page_objects: Arc<dyn ObjectStore> = Arc::new(
        JsonObjectStore::from_map(page.objects).context("failed to decode page-local objects")?,
    );

    let doc = futures::executor::block_on(driver::render_page(
        operators,
        viewport,
        common_objects.clone(),
        page_objects,
        options.clone(),
        counters.clone(),
    ))?;
    Ok(doc.to_string())
}
