use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::{errors::AppError, models::Voter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub struct AuthClaims(pub Claims);

impl AuthClaims {
    pub fn from_token(token: &str) -> Result<Self, (StatusCode, String)> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET must be set".into(),
            )
        })?;
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token".into()))?;

        Ok(Self(token_data.claims))
    }
}

pub fn generate_jwt(user_id: Uuid) -> Result<String, AppError> {
    let expiration = (Utc::now() + Duration::hours(24)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    let secret = std::env::var("JWT_SECRET").map_err(|e| AppError::EnvError(e.to_string()))?;
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AppError::JwtError)
}

/// Voter identity for the current request: user id from a bearer token when
/// one is present, plus the peer IP. A missing Authorization header is an
/// anonymous voter, not an error; whether anonymous voters may vote is the
/// policy's call, checked later in the protocol.
pub struct ResolvedVoter(pub Voter);

impl<S> FromRequestParts<S> for ResolvedVoter
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ip = if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>()
        {
            addr.ip().to_string()
        } else {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Missing peer address".into(),
            ));
        };

        match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await {
            Ok(TypedHeader(Authorization(bearer))) => {
                let claims = AuthClaims::from_token(bearer.token())?;
                let user_id = Uuid::parse_str(&claims.0.sub).map_err(|_| {
                    (
                        StatusCode::UNAUTHORIZED,
                        "Token subject is not a valid user id".into(),
                    )
                })?;
                Ok(Self(Voter::authenticated(user_id, ip)))
            }
            Err(_) => Ok(Self(Voter::anonymous(ip))),
        }
    }
}
