pub mod cascade;
pub mod comments;
pub mod converter;
pub mod docx;
mod error;
pub mod export;
pub mod layout;
pub mod markdown;
pub mod model;
pub mod numbering;
pub mod package;
pub mod styles;
pub mod units;

pub use comments::{Comment, CommentOrigin, ThreadingMethod};
pub use converter::{Converter, InsertContent, Lifecycle, get_numbering_cache};
pub use docx::comments::import_comment_data;
pub use error::Error;
pub use export::{CommentsExportMode, ExportOptions};
pub use model::Document;
pub use package::Package;

use std::path::Path;
use std::time::Instant;

/// Import `input` and export it again to `output`.
pub fn roundtrip_file(input: &Path, output: &Path, options: &ExportOptions) -> Result<(), Error> {
    let data = std::fs::read(input).map_err(Error::Io)?;
    let bytes = roundtrip_bytes(&data, options)?;
    std::fs::write(output, &bytes).map_err(Error::Io)?;
    Ok(())
}

pub fn roundtrip_bytes(input: &[u8], options: &ExportOptions) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();

    let mut converter = Converter::new();
    converter.load(input)?;
    let t_import = t0.elapsed();

    let package = converter.export(options)?;
    let t_export = t0.elapsed();

    let bytes = package.to_bytes()?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: import={:.1}ms, export={:.1}ms, zip={:.1}ms, total={:.1}ms (output {} bytes)",
        t_import.as_secs_f64() * 1000.0,
        (t_export - t_import).as_secs_f64() * 1000.0,
        (t_total - t_export).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(bytes)
}
