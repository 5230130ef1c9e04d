use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use pdf_render_core::{render_page, PageIter, PdfReader, RenderOptions};

/// Render a page of a PDF document to a BMP image.
#[derive(Parser)]
#[command(name = "pdf-render", version, about)]
struct Args {
    /// Input PDF file.
    input: PathBuf,

    /// Page number to render (1-based).
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Output BMP file.
    #[arg(long, default_value = "out.bmp")]
    output: PathBuf,

    /// Device pixels per point.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
}

fn run(args: &Args) -> Result<(), String> {
    if args.page == 0 {
        return Err("page numbers start at 1".to_string());
    }

    let data = std::fs::read(&args.input)
        .map_err(|e| format!("reading {}: {}", args.input.display(), e))?;

    let mut reader = PdfReader::from_bytes(data).map_err(|e| e.to_string())?;
    info!("PDF version 1.{}", reader.version());

    let catalog = reader.catalog().map_err(|e| e.to_string())?;
    let pages_root = catalog.pages().map_err(|e| e.to_string())?.clone();

    let mut iter = PageIter::new(&mut reader, &pages_root).map_err(|e| e.to_string())?;
    let mut target = None;
    while let Some(page) = iter.next_page(&mut reader).map_err(|e| e.to_string())? {
        if iter.page_idx() == args.page {
            target = Some(page);
            break;
        }
    }
    let page = target.ok_or_else(|| {
        format!(
            "document has only {} page(s), requested page {}",
            iter.page_idx(),
            args.page
        )
    })?;

    let options = RenderOptions {
        scale: args.scale,
        ..RenderOptions::default()
    };
    let canvas = render_page(&mut reader, &page, &options).map_err(|e| e.to_string())?;

    canvas
        .write_file(&args.output)
        .map_err(|e| format!("writing {}: {}", args.output.display(), e))?;
    info!("wrote {}", args.output.display());

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{}", message);
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}
