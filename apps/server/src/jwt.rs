use courier_shared::error::CourierError;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;

/// Verifies access tokens minted by the identity service. This server never
/// issues tokens.
pub struct JwtService {
    decoding_key: DecodingKey,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub purpose: String,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, CourierError> {
        let decoding_key = DecodingKey::from_ed_pem(config.public_key_pem.as_bytes())
            .map_err(|e| CourierError::Internal(format!("invalid JWT public key: {e}")))?;
        Ok(Self { decoding_key })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, CourierError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.required_spec_claims.clear();
        validation.set_required_spec_claims(&["exp"]);
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| CourierError::Unauthorized)?;
        if data.claims.purpose != "access" {
            return Err(CourierError::Unauthorized);
        }
        Ok(data.claims)
    }
}
