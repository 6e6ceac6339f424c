use arena_store::ProfileType;

use super::RequestContext;
use crate::dispatch::{BoundParameters, Reply};
use crate::error::ApiError;
use crate::mapping;

/// Events share the profile id space; non-event profiles are not found here.
pub(super) fn get_event(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let profile = ctx
        .load_profile(params.require_int("eventID")?)
        .map_err(|_| ApiError::not_found("event"))?;
    if profile.profile_type != ProfileType::Event {
        return Err(ApiError::not_found("event"));
    }
    if !ctx.can_view_profile(&profile) {
        return Err(ApiError::access_denied());
    }

    let event = mapping::event::map_event(&profile, ctx.links())
        .ok_or_else(|| ApiError::not_found("event"))?;
    Ok(Reply::contract(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ParamSpec;
    use crate::endpoints::testing::{caller, json, params, services};

    #[test]
    fn event_lookup_only_serves_event_profiles() {
        let services = services();
        let ann = caller(&services, 1, "ann");
        let ctx = RequestContext {
            services: &services,
            caller: &ann,
        };
        let specs = [ParamSpec::int("eventID")];

        let retreat = json(get_event(&ctx, &params(&[("eventID", "12")], &[], &specs, None)).unwrap());
        assert_eq!(retreat["Name"], "Fall Retreat");
        assert_eq!(retreat["Location"], "Lakeside Camp");

        let err = get_event(&ctx, &params(&[("eventID", "10")], &[], &specs, None)).unwrap_err();
        assert_eq!(err.code, "ERR_NOT_FOUND");
    }
}
