//! Rich-text sanitizing backed by `ammonia`.

use rw_core::traits::ContentSanitizer;

/// Keeps ammonia's default whitelist of harmless tags and attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmmoniaSanitizer;

impl ContentSanitizer for AmmoniaSanitizer {
    fn sanitize(&self, text: &str) -> String {
        ammonia::clean(text)
    }
}

/// Rich text as it will be stored. Length rules are checked against this.
pub(crate) fn clean(sanitizer: &dyn ContentSanitizer, text: &str) -> String {
    sanitizer.sanitize(text.trim()).trim().to_string()
}
