//! Tests for auth module
//!
//! These tests verify core session functionality including:
//! - Session token minting and validation
//! - Session cookie shape and parsing
//! - Callback error redirect targets

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::auth::extractors::session_token_from_cookie_header;
    use crate::auth::handlers::{
        clear_session_cookie, error_redirect, mint_session_token, session_cookie,
        validate_session_token, CallbackError, SESSION_COOKIE,
    };

    #[test]
    fn test_claims_structure() {
        let claims = models::Claims {
            sub: "U_TEST01".to_string(),
            exp: 1234567890,
        };

        assert_eq!(claims.sub, "U_TEST01");
        assert_eq!(claims.exp, 1234567890);
    }

    #[test]
    fn test_session_token_roundtrip() {
        let secret = "test_secret_key";

        let token = mint_session_token(secret, "U_TEST01").expect("Failed to mint token");
        let claims = validate_session_token(secret, &token).expect("Failed to validate token");

        assert_eq!(claims.sub, "U_TEST01");
    }

    #[test]
    fn test_session_token_fails_with_wrong_secret() {
        let token = mint_session_token("test_secret_key", "U_TEST01").expect("Failed to mint");

        let result = validate_session_token("wrong_secret_key", &token);
        assert!(
            result.is_err(),
            "Token validation should fail with wrong secret"
        );
    }

    #[test]
    fn test_session_cookie_shape() {
        let cookie = session_cookie("tok123");

        assert!(cookie.starts_with(&format!("{}=tok123;", SESSION_COOKIE)));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=86400"));
    }

    #[test]
    fn test_clear_session_cookie_expires_immediately() {
        let cookie = clear_session_cookie();

        assert!(cookie.starts_with(&format!("{}=;", SESSION_COOKIE)));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_session_token_from_cookie_header() {
        let header = format!("theme=dark; {}=tok123; other=1", SESSION_COOKIE);
        assert_eq!(
            session_token_from_cookie_header(&header),
            Some("tok123".to_string())
        );

        // No session cookie present
        assert_eq!(session_token_from_cookie_header("theme=dark"), None);

        // Empty value is treated as absent
        let empty = format!("{}=", SESSION_COOKIE);
        assert_eq!(session_token_from_cookie_header(&empty), None);
    }

    #[test]
    fn test_error_redirect_targets() {
        assert_eq!(
            error_redirect("http://localhost:8080", CallbackError::MissingCode),
            "http://localhost:8080/?error=no-code"
        );
        assert_eq!(
            error_redirect("http://localhost:8080", CallbackError::ExchangeFailed),
            "http://localhost:8080/?error=exchange-failed"
        );
    }

    #[test]
    fn test_user_model_structure() {
        let user = models::User {
            id: "U_TEST01".to_string(),
            email: "test@example.com".to_string(),
            name: Some("Test User".to_string()),
            avatar: Some("http://example.com/avatar.jpg".to_string()),
            provider: Some("google".to_string()),
            provider_id: Some("google-123".to_string()),
            created_at: Some("2024-01-01".to_string()),
        };

        assert_eq!(user.id, "U_TEST01");
        assert_eq!(user.email, "test@example.com");
        assert_eq!(user.provider, Some("google".to_string()));
    }
}
