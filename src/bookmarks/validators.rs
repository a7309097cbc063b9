// src/bookmarks/validators.rs

use super::models::CreateBookmarkRequest;
use crate::common::{ValidationResult, Validator};

// ============================================================================
// Bookmark Validators
// ============================================================================

pub struct BookmarkValidator;

impl Validator<CreateBookmarkRequest> for BookmarkValidator {
    fn validate(&self, data: &CreateBookmarkRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        let title = data.title.trim();
        if title.is_empty() {
            result.add_error("title", "Title is required");
        } else if title.len() > 200 {
            result.add_error("title", "Title must be less than 200 characters");
        }

        let url = data.url.trim();
        if url.is_empty() {
            result.add_error("url", "URL is required");
        } else {
            if url.len() > 2048 {
                result.add_error("url", "URL must be less than 2048 characters");
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error("url", "URL must start with http:// or https://");
            }
            if url.chars().any(|c| c.is_whitespace()) {
                result.add_error("url", "URL cannot contain whitespace");
            }
        }

        result
    }
}
