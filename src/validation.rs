use validator::Validate;

use crate::error::{GatewayError, Result};
use crate::models::{SearchParams, SearchRequest};

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Check a search request and resolve its defaults (page 1, type "movie").
    pub fn validate_search(request: &SearchRequest) -> Result<SearchParams> {
        request.validate()?;

        let title = request.query.trim();
        if title.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Search query cannot be empty".to_string(),
            ));
        }

        Ok(SearchParams {
            title: title.to_string(),
            page: request.page_or_default(),
            kind: Some(request.type_or_default().trim().to_string()),
            year: request.year,
        })
    }

    /// Returns the trimmed value, or `InvalidRequest` naming `field` when blank.
    pub fn require_non_blank<'a>(value: &'a str, field: &str) -> Result<&'a str> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::InvalidRequest(format!(
                "{} cannot be null or empty",
                field
            )));
        }
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_search_applies_defaults() {
        let params = RequestValidator::validate_search(&SearchRequest::new("  Batman ")).unwrap();
        assert_eq!(params.title, "Batman");
        assert_eq!(params.page, 1);
        assert_eq!(params.kind.as_deref(), Some("movie"));
        assert_eq!(params.year, None);
    }

    #[test]
    fn test_blank_query_rejected() {
        for query in ["", "   "] {
            let err = RequestValidator::validate_search(&SearchRequest::new(query)).unwrap_err();
            assert!(matches!(err, GatewayError::InvalidRequest(_)));
        }
    }

    #[test]
    fn test_query_length_limit() {
        assert!(RequestValidator::validate_search(&SearchRequest::new("a".repeat(100))).is_ok());
        let err = RequestValidator::validate_search(&SearchRequest::new("a".repeat(101))).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }

    #[test]
    fn test_page_must_be_positive() {
        let request = SearchRequest {
            page: Some(0),
            ..SearchRequest::new("Batman")
        };
        let err = RequestValidator::validate_search(&request).unwrap_err();
        assert!(err.to_string().contains("Page must be greater than 0"));
    }

    #[test]
    fn test_require_non_blank() {
        assert_eq!(RequestValidator::require_non_blank(" tt01 ", "IMDB ID").unwrap(), "tt01");
        assert!(RequestValidator::require_non_blank("\t", "Title").is_err());
    }
}
