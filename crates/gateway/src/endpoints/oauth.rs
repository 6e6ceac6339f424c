use arena_contracts::digest::secrets_match;
use arena_contracts::{GenericListResult, ModifyResult, ModifyValidationResult};

use super::{RequestContext, page};
use crate::dispatch::{BoundParameters, Reply};
use crate::error::ApiError;
use crate::mapping;

/// Checks an application's key/secret pair. Unknown keys, inactive clients,
/// and wrong secrets are indistinguishable to the caller.
pub(super) fn validate_client(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let api_key = params.require_str("clientApiKey")?.trim();
    let api_secret = params.require_str("clientApiSecret")?;

    if let Err(retry_after) = ctx
        .services
        .validate_limiter
        .check(api_key, ctx.services.validate_limit_per_window)
    {
        tracing::warn!(
            api_key,
            retry_after_secs = retry_after.as_secs(),
            "oauth.validate_rate_limited"
        );
        return Err(ApiError::rate_limited());
    }

    let client = ctx.store().client_by_api_key(api_key)?;
    match client {
        Some(client) if client.active && secrets_match(api_secret, &client.api_secret) => {
            Ok(Reply::contract(mapping::oauth::map_client(&client)))
        }
        Some(client) => {
            tracing::warn!(client_id = client.client_id, active = client.active, "oauth.validate_rejected");
            Err(ApiError::access_denied())
        }
        None => {
            tracing::warn!(api_key, "oauth.validate_unknown_key");
            Err(ApiError::access_denied())
        }
    }
}

pub(super) fn get_client(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let api_key = params.require_str("clientApiKey")?.trim();
    let client = ctx
        .store()
        .client_by_api_key(api_key)?
        .ok_or_else(|| ApiError::not_found("client"))?;
    Ok(Reply::contract(mapping::oauth::map_client(&client)))
}

/// Applications the calling login has authorized.
pub(super) fn authorizations(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let grants = ctx.store().authorizations_for_login(&ctx.caller.login_id)?;
    let list = GenericListResult::try_from_records(page(params), grants, |grant| {
        let client = ctx.store().client_by_id(grant.client_id)?;
        Ok::<_, ApiError>(mapping::oauth::map_authorization(&grant, client.as_ref()))
    })?;
    Ok(Reply::contract(list))
}

pub(super) fn revoke_authorization(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let api_key = params.require_str("clientApiKey")?.trim();
    let login_id = ctx.caller.login_id.as_str();

    let result = match ctx.store().client_by_api_key(api_key)? {
        None => ModifyResult::invalid(vec![ModifyValidationResult::new(
            "ClientNotFound",
            "No application uses that key",
        )]),
        Some(client) => match ctx.store().revoke_authorization(login_id, client.client_id) {
            Ok(true) => {
                tracing::info!(client_id = client.client_id, login_id, "oauth.authorization_revoked");
                ModifyResult::success(Some(ctx.links().authorizations()))
            }
            Ok(false) => ModifyResult::invalid(vec![ModifyValidationResult::new(
                "AuthorizationNotFound",
                "The application is not authorized for this login",
            )]),
            Err(err) => {
                tracing::error!(error = %err, client_id = client.client_id, "oauth.revoke_failed");
                ModifyResult::failed("the authorization could not be revoked")
            }
        },
    };

    crate::metrics::observe_modify_result("oauth.revoke", result.outcome());
    Ok(Reply::contract(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ParamSpec;
    use crate::endpoints::testing::{caller, json, params, services};

    const VALIDATE: [ParamSpec; 2] = [
        ParamSpec::str("clientApiKey"),
        ParamSpec::str("clientApiSecret"),
    ];

    #[test]
    fn validate_accepts_only_the_matching_secret() {
        let services = services();
        let ann = caller(&services, 1, "ann");
        let ctx = RequestContext {
            services: &services,
            caller: &ann,
        };

        let ok = json(
            validate_client(
                &ctx,
                &params(
                    &[],
                    &[("clientApiKey", "mobile-key"), ("clientApiSecret", "mobile-secret")],
                    &VALIDATE,
                    None,
                ),
            )
            .unwrap(),
        );
        assert_eq!(ok["Name"], "Mobile App");
        assert!(!ok.to_string().contains("mobile-secret"));

        let err = validate_client(
            &ctx,
            &params(
                &[],
                &[("clientApiKey", "mobile-key"), ("clientApiSecret", "guess")],
                &VALIDATE,
                None,
            ),
        )
        .unwrap_err();
        assert_eq!(err.code, "ERR_ACCESS_DENIED");

        let err = validate_client(
            &ctx,
            &params(&[], &[("clientApiKey", "mobile-key")], &VALIDATE, None),
        )
        .unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_PARAMS");
    }

    #[test]
    fn validate_is_rate_limited_per_key() {
        let services = services();
        let ann = caller(&services, 1, "ann");
        let ctx = RequestContext {
            services: &services,
            caller: &ann,
        };
        let attempt = |key: &str| {
            validate_client(
                &ctx,
                &params(
                    &[],
                    &[("clientApiKey", key), ("clientApiSecret", "wrong")],
                    &VALIDATE,
                    None,
                ),
            )
            .unwrap_err()
            .code
        };

        for _ in 0..services.validate_limit_per_window {
            assert_eq!(attempt("kiosk-key"), "ERR_ACCESS_DENIED");
        }
        assert_eq!(attempt("kiosk-key"), "ERR_RATE_LIMITED");
        assert_eq!(attempt("mobile-key"), "ERR_ACCESS_DENIED");
    }

    #[test]
    fn authorizations_are_scoped_to_the_login_and_revocable() {
        let services = services();
        let ann = caller(&services, 1, "ann");
        let ctx = RequestContext {
            services: &services,
            caller: &ann,
        };
        let list = json(authorizations(&ctx, &params(&[], &[], &[], None)).unwrap());
        assert_eq!(list["Total"], 2);
        assert_eq!(list["Items"][1]["ClientName"], "Check-in Kiosk");

        let specs = [ParamSpec::str("clientApiKey")];
        let revoked = json(
            revoke_authorization(&ctx, &params(&[("clientApiKey", "kiosk-key")], &[], &specs, None))
                .unwrap(),
        );
        assert_eq!(revoked["Successful"], "True");

        let again = json(
            revoke_authorization(&ctx, &params(&[("clientApiKey", "kiosk-key")], &[], &specs, None))
                .unwrap(),
        );
        assert_eq!(again["ValidationResults"][0]["Key"], "AuthorizationNotFound");

        let list = json(authorizations(&ctx, &params(&[], &[], &[], None)).unwrap());
        assert_eq!(list["Total"], 1);
    }

    #[test]
    fn unknown_client_is_not_found() {
        let services = services();
        let ann = caller(&services, 1, "ann");
        let ctx = RequestContext {
            services: &services,
            caller: &ann,
        };
        let specs = [ParamSpec::str("clientApiKey")];
        let err = get_client(&ctx, &params(&[("clientApiKey", "nope")], &[], &specs, None)).unwrap_err();
        assert_eq!(err.code, "ERR_NOT_FOUND");

        let kiosk = json(get_client(&ctx, &params(&[("clientApiKey", "kiosk-key")], &[], &specs, None)).unwrap());
        assert_eq!(kiosk["ClientID"], 2);
    }
}
