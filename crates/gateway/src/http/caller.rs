use arena_auth::Principal;
use arena_contracts::digest::secrets_match;
use arena_policy::Subject;
use arena_store::NOT_FOUND_ID;
use axum::http::{HeaderMap, StatusCode};

use super::AppState;
use crate::config::AuthMode;
use crate::endpoints::Caller;
use crate::error::ApiError;
use crate::mapping;

pub(super) const LOCAL_AUTH_SECRET_HEADER: &str = "x-arena-local-auth-secret";
pub(super) const PERSON_ID_HEADER: &str = "x-arena-person-id";
pub(super) const LOGIN_ID_HEADER: &str = "x-arena-login-id";

pub(super) async fn extract_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Principal, ApiError> {
    match state.config.auth_mode {
        AuthMode::Local => {
            validate_local_auth_shared_secret(
                headers,
                state.config.local_auth_shared_secret.as_deref(),
            )?;
            local_principal(headers)
        }
        AuthMode::Oidc => {
            let Some(auth) = state.oidc.as_ref() else {
                tracing::error!("gateway.oidc_missing");
                return Err(ApiError::internal());
            };
            Ok(auth.authenticate(headers).await?)
        }
    }
}

/// Binds the principal to its person record and role memberships. A
/// principal whose person no longer exists cannot call anything.
pub(super) fn resolve_caller(state: &AppState, principal: Principal) -> Result<Caller, ApiError> {
    let store = state.services.store.as_ref();
    let person = store.person(principal.person_id)?;
    if person.person_id == NOT_FOUND_ID {
        tracing::warn!(
            login_id = %principal.login_id,
            person_id = principal.person_id,
            "gateway.principal_unknown_person"
        );
        return Err(auth_invalid("unknown caller"));
    }

    Ok(Caller {
        login_id: principal.login_id,
        subject: Subject {
            person_id: person.person_id,
            role_ids: store.role_ids_for(person.person_id)?,
        },
        family_id: mapping::id(person.family_id),
    })
}

fn validate_local_auth_shared_secret(
    headers: &HeaderMap,
    expected_secret: Option<&str>,
) -> Result<(), ApiError> {
    let Some(expected_secret) = expected_secret else {
        return Ok(());
    };

    let provided_secret = header_value(headers, LOCAL_AUTH_SECRET_HEADER)
        .ok_or_else(|| auth_required("missing local auth secret"))?;

    if !secrets_match(provided_secret, expected_secret) {
        return Err(auth_invalid("invalid local auth secret"));
    }

    Ok(())
}

fn local_principal(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let raw = header_value(headers, PERSON_ID_HEADER)
        .ok_or_else(|| auth_required("missing x-arena-person-id header"))?;
    let person_id = raw
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| auth_invalid("x-arena-person-id must be a positive integer"))?;

    let login_id = header_value(headers, LOGIN_ID_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| person_id.to_string());

    Ok(Principal {
        login_id,
        person_id,
    })
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn auth_required(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "ERR_AUTH_REQUIRED", message)
}

fn auth_invalid(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "ERR_AUTH_INVALID", message)
}
