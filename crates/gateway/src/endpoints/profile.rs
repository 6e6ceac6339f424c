use arena_contracts::GenericListResult;
use arena_store::Profile;

use super::{RequestContext, page};
use crate::dispatch::{BoundParameters, Reply};
use crate::error::ApiError;
use crate::mapping;

fn viewable_profile(ctx: &RequestContext<'_>, profile_id: i32) -> Result<Profile, ApiError> {
    let profile = ctx.load_profile(profile_id)?;
    if !ctx.can_view_profile(&profile) {
        tracing::debug!(
            profile_id,
            caller = ctx.caller.subject.person_id,
            "profile.view_denied"
        );
        return Err(ApiError::access_denied());
    }
    Ok(profile)
}

pub(super) fn get_profile(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let profile = viewable_profile(ctx, params.require_int("profileID")?)?;
    let member_count = ctx.store().profile_members(profile.profile_id)?.len();
    Ok(Reply::contract(mapping::profile::map_profile(
        &profile,
        i32::try_from(member_count).unwrap_or(i32::MAX),
        ctx.links(),
    )))
}

/// `statusID`, when given, keeps only members whose status lookup matches.
pub(super) fn members(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let profile = viewable_profile(ctx, params.require_int("profileID")?)?;
    let status_id = params.int("statusID");

    let members = ctx
        .store()
        .profile_members(profile.profile_id)?
        .into_iter()
        .filter(|m| status_id.is_none_or(|id| m.status.lookup_id == id))
        .collect::<Vec<_>>();

    let links = ctx.links();
    let list = GenericListResult::try_from_records(page(params), members, |membership| {
        let (full_name, email) = ctx.member_summary(membership.person_id)?;
        Ok::<_, ApiError>(mapping::profile::map_profile_member(
            &membership,
            full_name,
            email,
            links,
        ))
    })?;
    Ok(Reply::contract(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ParamSpec;
    use crate::endpoints::testing::{caller, json, params, services};

    const MEMBER_PARAMS: [ParamSpec; 4] = [
        ParamSpec::int("profileID"),
        ParamSpec::int("statusID"),
        ParamSpec::int("start"),
        ParamSpec::int("max"),
    ];

    #[test]
    fn profile_requires_view_permission() {
        let services = services();
        let frank = caller(&services, 6, "frank");
        let ctx = RequestContext {
            services: &services,
            caller: &frank,
        };
        let specs = [ParamSpec::int("profileID")];

        let worship = json(get_profile(&ctx, &params(&[("profileID", "10")], &[], &specs, None)).unwrap());
        assert_eq!(worship["Name"], "Worship Team");
        assert_eq!(worship["MemberCount"], 3);

        let err = get_profile(&ctx, &params(&[("profileID", "11")], &[], &specs, None)).unwrap_err();
        assert_eq!(err.code, "ERR_ACCESS_DENIED");
        assert_eq!(err.status.as_u16(), 403);

        let err = get_profile(&ctx, &params(&[("profileID", "42")], &[], &specs, None)).unwrap_err();
        assert_eq!(err.code, "ERR_NOT_FOUND");

        // Profile 13 belongs to another organization.
        let err = get_profile(&ctx, &params(&[("profileID", "13")], &[], &specs, None)).unwrap_err();
        assert_eq!(err.code, "ERR_NOT_FOUND");
    }

    #[test]
    fn owner_sees_own_profile_without_a_grant() {
        let services = services();
        let eve = caller(&services, 5, "eve");
        let ctx = RequestContext {
            services: &services,
            caller: &eve,
        };
        let specs = [ParamSpec::int("profileID")];
        let ushers = json(get_profile(&ctx, &params(&[("profileID", "11")], &[], &specs, None)).unwrap());
        assert_eq!(ushers["ParentProfileID"], 10);
    }

    #[test]
    fn members_filter_by_status_and_hide_restricted_fields() {
        let services = services();
        let frank = caller(&services, 6, "frank");
        let ctx = RequestContext {
            services: &services,
            caller: &frank,
        };

        let all = json(members(&ctx, &params(&[("profileID", "10")], &[], &MEMBER_PARAMS, None)).unwrap());
        assert_eq!(all["Total"], 3);
        assert!(all["Items"][0].get("Email").is_none());
        assert!(all["Items"][0]["FullName"].is_string());

        let pending = json(
            members(
                &ctx,
                &params(&[("profileID", "10")], &[("statusID", "72")], &MEMBER_PARAMS, None),
            )
            .unwrap(),
        );
        assert_eq!(pending["Total"], 1);
        assert_eq!(pending["Items"][0]["PersonID"], 2);
    }
}
