use crate::formats::{CatalogParser, RonCatalogParser};
use crate::{Catalog, RuleError};
use log::info;
use std::fs;
use std::path::Path;

/// Loads a catalog from a file, choosing the parser by file extension.
///
/// # Errors
///
/// Returns `RuleError::Io` if the file cannot be read,
/// `RuleError::UnsupportedFormat` for unknown extensions and any parse or
/// validation error from the format parser.
pub fn load_catalog(path: &Path) -> Result<Catalog, RuleError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let parser: Box<dyn CatalogParser> = match extension.as_str() {
        "ron" => Box::new(RonCatalogParser::new()),
        other => return Err(RuleError::UnsupportedFormat(other.to_owned())),
    };
    let content = fs::read_to_string(path)?;
    let catalog = parser.parse(&content)?;
    info!(
        "Loaded {} catalog v{} with {} tiles from {:?}",
        parser.format_name(),
        catalog.version(),
        catalog.len(),
        path
    );
    Ok(catalog)
}
