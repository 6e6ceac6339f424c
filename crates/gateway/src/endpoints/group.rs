use arena_contracts::{self as contract, GenericListResult};
use arena_policy::{FieldVisibility, IncludeFieldSpec, parse_include_fields};
use arena_store::{NOT_FOUND_ID, SmallGroup};

use super::{RequestContext, group_target, page};
use crate::dispatch::{BoundParameters, Reply};
use crate::error::ApiError;
use crate::mapping;

fn load_group(ctx: &RequestContext<'_>, group_id: i32) -> Result<SmallGroup, ApiError> {
    let group = ctx.store().group(group_id)?;
    if group.group_id == NOT_FOUND_ID {
        return Err(ApiError::not_found("group"));
    }
    Ok(group)
}

/// The group leader and administrators of any enclosing cluster see every
/// field; everyone else goes through the permission table.
pub(super) fn get_group(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let group = load_group(ctx, params.require_int("groupID")?)?;
    let requested = parse_include_fields(params.str("fields"));
    let (projected, hidden) = project_group(ctx, &group, requested.as_ref())?;
    crate::metrics::observe_fields_hidden(mapping::group::policy().entity(), hidden);
    Ok(Reply::contract(projected))
}

/// Returns the projection and how many fields it hid.
fn project_group(
    ctx: &RequestContext<'_>,
    group: &SmallGroup,
    requested: Option<&IncludeFieldSpec>,
) -> Result<(contract::SmallGroup, u32), ApiError> {
    let caller = ctx.relation_to(&group_target(group));
    let vis = FieldVisibility::new(mapping::group::policy(), ctx.oracle(), &caller, requested);

    let show_leader = vis.includes("LeaderName");
    let leader_name = match mapping::id(group.leader_id) {
        Some(leader_id) if show_leader => {
            let leader = ctx.store().person(leader_id)?;
            (leader.person_id != NOT_FOUND_ID)
                .then(|| mapping::text(&leader.full_name()))
                .flatten()
        }
        _ => None,
    };
    let member_count = active_member_count(ctx, group.group_id)?;

    let projected = mapping::group::map_group(group, leader_name, member_count, &vis, ctx.links());
    Ok((projected, vis.hidden_count()))
}

fn active_member_count(ctx: &RequestContext<'_>, group_id: i32) -> Result<i32, ApiError> {
    let active = ctx
        .store()
        .group_members(group_id)?
        .iter()
        .filter(|m| m.active)
        .count();
    Ok(i32::try_from(active).unwrap_or(i32::MAX))
}

pub(super) fn members(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let group = load_group(ctx, params.require_int("groupID")?)?;
    let members = ctx
        .store()
        .group_members(group.group_id)?
        .into_iter()
        .filter(|m| m.active)
        .collect::<Vec<_>>();

    let links = ctx.links();
    let list = GenericListResult::try_from_records(page(params), members, |membership| {
        let (full_name, email) = ctx.member_summary(membership.person_id)?;
        Ok::<_, ApiError>(mapping::group::map_group_member(
            &membership,
            full_name,
            email,
            links,
        ))
    })?;
    Ok(Reply::contract(list))
}

pub(super) fn get_cluster(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let cluster = ctx.store().cluster(params.require_int("clusterID")?)?;
    if cluster.cluster_id == NOT_FOUND_ID {
        return Err(ApiError::not_found("cluster"));
    }
    let group_count = ctx.store().cluster_group_count(cluster.cluster_id)?;
    Ok(Reply::contract(mapping::group::map_cluster(
        &cluster,
        group_count,
        ctx.links(),
    )))
}
