use crate::{Catalog, RuleError};

/// Interface for format-specific catalog parsers.
pub trait CatalogParser {
    /// Parses catalog content into a validated [`Catalog`].
    ///
    /// # Errors
    ///
    /// Returns `RuleError::Parse` when the content is malformed and the
    /// catalog validation errors when a definition is rejected.
    fn parse(&self, content: &str) -> Result<Catalog, RuleError>;

    /// Human-readable name of the format, used in error messages.
    fn format_name(&self) -> &'static str;
}
