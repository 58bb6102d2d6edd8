// SPDX-License-Identifier: MIT

//! Authentication is an external collaborator this service doesn't own
//! (spec.md §1: "HTTP routing, request authentication... are treated as
//! external collaborators"). This extractor stands in for whatever
//! gateway or middleware would normally resolve a credential to a caller
//! id, reading it directly off a header instead.

use crate::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use crucible_core::OwnerId;
use uuid::Uuid;

pub const OWNER_HEADER: &str = "x-owner-id";

pub struct AuthedOwner(pub OwnerId);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthedOwner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(OWNER_HEADER).ok_or(ApiError::Unauthorized)?;
        let value = header.to_str().map_err(|_| ApiError::Unauthorized)?;
        let owner_id = Uuid::parse_str(value).map_err(|_| ApiError::Unauthorized)?;
        Ok(AuthedOwner(OwnerId::from_uuid(owner_id)))
    }
}
