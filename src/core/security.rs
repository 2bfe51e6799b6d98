#![allow(dead_code)]

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;
use crate::exam::models::StudentIdentity;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("failed to encode token")]
    TokenEncoding,
    #[error("failed to decode token")]
    TokenDecoding,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Bearer token claims issued by the identity provider. Everything beyond
/// `sub` and `exp` is optional; [`Claims::into_identity`] applies fallbacks.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) student_no: Option<String>,
    pub(crate) exp: i64,
}

impl Claims {
    pub(crate) fn into_identity(self) -> StudentIdentity {
        let Claims { sub, name, email, student_no, exp: _ } = self;

        let display_name = if !name.is_empty() {
            name
        } else if !email.is_empty() {
            email.clone()
        } else {
            sub.clone()
        };
        let student_no =
            student_no.filter(|value| !value.is_empty()).unwrap_or_else(|| sub.clone());

        StudentIdentity { id: sub, name: display_name, email, student_no }
    }
}

pub(crate) fn create_access_token(
    student: &StudentIdentity,
    settings: &Settings,
    expires_in: Option<Duration>,
) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let expires_in = expires_in.unwrap_or_else(|| {
        Duration::minutes(settings.security().access_token_expire_minutes as i64)
    });
    let expire_at = OffsetDateTime::now_utc() + expires_in;

    let claims = Claims {
        sub: student.id.clone(),
        name: student.name.clone(),
        email: student.email.clone(),
        student_no: Some(student.student_no.clone()),
        exp: expire_at.unix_timestamp(),
    };

    encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| SecurityError::TokenEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::TokenDecoding)
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{create_access_token, verify_token, Claims};
    use crate::core::config::Settings;
    use crate::exam::models::StudentIdentity;
    use crate::test_support;

    fn student() -> StudentIdentity {
        StudentIdentity {
            id: "student-1".to_string(),
            name: "Alice Nguyen".to_string(),
            email: "alice@example.com".to_string(),
            student_no: "SV001".to_string(),
        }
    }

    #[tokio::test]
    async fn token_roundtrip_preserves_identity() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let token = create_access_token(&student(), &settings, None).expect("token");
        let claims = verify_token(&token, &settings).expect("claims");
        let identity = claims.into_identity();

        assert_eq!(identity.id, "student-1");
        assert_eq!(identity.name, "Alice Nguyen");
        assert_eq!(identity.student_no, "SV001");
    }

    #[test]
    fn identity_fallbacks_fill_missing_claims() {
        let claims = Claims {
            sub: "student-2".to_string(),
            name: String::new(),
            email: "bob@example.com".to_string(),
            student_no: None,
            exp: 0,
        };
        let identity = claims.into_identity();
        assert_eq!(identity.name, "bob@example.com");
        assert_eq!(identity.student_no, "student-2");

        let bare = Claims {
            sub: "student-3".to_string(),
            name: String::new(),
            email: String::new(),
            student_no: Some(String::new()),
            exp: 0,
        };
        let identity = bare.into_identity();
        assert_eq!(identity.name, "student-3");
        assert_eq!(identity.student_no, "student-3");
    }

    #[tokio::test]
    async fn verify_rejects_token_signed_with_other_key() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        std::env::set_var("SECRET_KEY", "another-secret");
        let other = Settings::load().expect("settings");
        std::env::set_var("SECRET_KEY", "test-secret");

        let token = create_access_token(&student(), &other, None).expect("token");
        assert!(verify_token(&token, &settings).is_err());
    }
}
