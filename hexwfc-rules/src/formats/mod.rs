//! Parsers for catalog file formats.

pub mod parser;
pub use parser::CatalogParser;

pub mod ron_format;
pub use ron_format::RonCatalogParser;
