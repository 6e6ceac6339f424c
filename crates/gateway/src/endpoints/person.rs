use arena_contracts::{
    AttributeUpdate, GenericListResult, ModifyResult, ModifyValidationResult, PersonImIn,
};
use arena_policy::{FieldVisibility, Operation, Relation, Securable, parse_include_fields};
use arena_store::{NewPerson, PersonAttributeValue, ProfileType};

use super::{RequestContext, group_target, page, person_target};
use crate::dispatch::{BoundParameters, Reply};
use crate::error::ApiError;
use crate::mapping;

pub(super) fn get_person(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let person = ctx.load_person(params.require_int("id")?)?;
    let requested = parse_include_fields(params.str("fields"));
    Ok(Reply::contract(ctx.project_person(&person, requested.as_ref())?))
}

pub(super) fn family_members(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let person = ctx.load_person(params.require_int("id")?)?;
    let requested = parse_include_fields(params.str("fields"));

    let members = match mapping::id(person.family_id) {
        Some(family_id) => ctx.store().family_members(family_id)?,
        None => vec![person],
    };

    let list = GenericListResult::try_from_records(page(params), members, |member| {
        ctx.project_person(&member, requested.as_ref())
    })?;
    Ok(Reply::contract(list))
}

pub(super) fn groups(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let person = ctx.load_person(params.require_int("id")?)?;
    let memberships = ctx.store().person_groups(person.person_id)?;
    let links = ctx.links();

    let list = GenericListResult::from_records(page(params), memberships, |(group, membership)| {
        let caller = ctx.relation_to(&group_target(&group));
        let vis = FieldVisibility::new(mapping::group::policy(), ctx.oracle(), &caller, None);
        let reference = mapping::group::map_group_reference(&group, &membership, &vis, links);
        crate::metrics::observe_fields_hidden(vis.entity(), vis.hidden_count());
        reference
    });
    Ok(Reply::contract(list))
}

/// Only profiles in the configured organization the caller may view are
/// listed.
pub(super) fn profiles(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let person = ctx.load_person(params.require_int("id")?)?;
    let profile_type = match params.str("profileType").map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(ProfileType::parse(raw).ok_or_else(|| {
            ApiError::invalid_params(format!("unknown profile type `{}`", raw))
        })?),
    };

    let visible = ctx
        .store()
        .person_profiles(person.person_id, ctx.services.organization_id)?
        .into_iter()
        .filter(|(profile, _)| profile_type.is_none_or(|t| profile.profile_type == t))
        .filter(|(profile, _)| ctx.can_view_profile(profile))
        .collect::<Vec<_>>();

    let links = ctx.links();
    let list = GenericListResult::from_records(page(params), visible, |(profile, _)| {
        mapping::profile::map_profile_reference(&profile, links)
    });
    Ok(Reply::contract(list))
}

/// Streams the stored photo when the caller may see the person's `ImageUrl`.
pub(super) fn image(ctx: &RequestContext<'_>, params: &BoundParameters) -> Result<Reply, ApiError> {
    let person = ctx.load_person(params.require_int("id")?)?;
    if !ctx.person_field_visible(&person, "ImageUrl") {
        return Err(ApiError::access_denied());
    }

    let blob_id = mapping::id(person.blob_id).ok_or_else(|| ApiError::not_found("image"))?;
    super::blob::raw_blob(ctx, blob_id, "image")
}

pub(super) fn imin(ctx: &RequestContext<'_>, params: &BoundParameters) -> Result<Reply, ApiError> {
    let submitted: PersonImIn = params.body("person")?.decode()?;

    let result = match validate_imin(&submitted) {
        Ok(new_person) => match ctx.store().create_person(NewPerson {
            organization_id: ctx.services.organization_id,
            ..new_person
        }) {
            Ok(person_id) => {
                tracing::info!(person_id, login_id = %ctx.caller.login_id, "person.created");
                ModifyResult::success(Some(ctx.links().person(person_id)))
            }
            Err(err) => {
                tracing::error!(error = %err, "person.create_failed");
                ModifyResult::failed("the person could not be saved")
            }
        },
        Err(validation) => ModifyResult::invalid(validation),
    };

    crate::metrics::observe_modify_result("person.imin", result.outcome());
    Ok(Reply::contract(result))
}

fn validate_imin(submitted: &PersonImIn) -> Result<NewPerson, Vec<ModifyValidationResult>> {
    let trimmed = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut problems = Vec::new();
    let first_name = trimmed(&submitted.first_name);
    if first_name.is_none() {
        problems.push(ModifyValidationResult::new(
            "FirstNameMissing",
            "First name is required",
        ));
    }
    let last_name = trimmed(&submitted.last_name);
    if last_name.is_none() {
        problems.push(ModifyValidationResult::new(
            "LastNameMissing",
            "Last name is required",
        ));
    }
    let email = trimmed(&submitted.email);
    match email.as_deref() {
        None => problems.push(ModifyValidationResult::new(
            "EmailMissing",
            "Email is required",
        )),
        Some(email) if !looks_like_email(email) => problems.push(ModifyValidationResult::new(
            "EmailInvalid",
            "Email is not a valid address",
        )),
        Some(_) => {}
    }
    if let Some(birth_date) = submitted.birth_date
        && birth_date > chrono::Utc::now().date_naive()
    {
        problems.push(ModifyValidationResult::new(
            "BirthDateInvalid",
            "Birth date cannot be in the future",
        ));
    }

    if !problems.is_empty() {
        return Err(problems);
    }

    Ok(NewPerson {
        organization_id: 0,
        first_name: first_name.unwrap_or_default(),
        last_name: last_name.unwrap_or_default(),
        email: email.unwrap_or_default(),
        phone: trimmed(&submitted.phone),
        birth_date: submitted.birth_date,
        campus_id: submitted.campus_id,
    })
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Self and family may edit any attribute; everyone else needs Edit on each
/// attribute they touch.
pub(super) fn update_attributes(
    ctx: &RequestContext<'_>,
    params: &BoundParameters,
) -> Result<Reply, ApiError> {
    let person = ctx.load_person(params.require_int("id")?)?;
    let update: AttributeUpdate = params.body("update")?.decode()?;

    let caller = ctx.relation_to(&person_target(&person));
    let household = matches!(caller.bypass(), Some(Relation::Owner | Relation::Family));
    if !household
        && !update.attributes.iter().all(|value| {
            ctx.allows(Securable::Attribute(value.attribute_id), Operation::Edit)
        })
    {
        tracing::warn!(
            person_id = person.person_id,
            caller = caller.subject.person_id,
            "person.attribute_update_denied"
        );
        return Err(ApiError::access_denied());
    }

    let known = ctx.store().attributes()?;
    let mut problems = Vec::new();
    if update.attributes.is_empty() {
        problems.push(ModifyValidationResult::new(
            "AttributesMissing",
            "At least one attribute value is required",
        ));
    }
    for value in &update.attributes {
        if !known.iter().any(|a| a.attribute_id == value.attribute_id) {
            problems.push(ModifyValidationResult::new(
                "AttributeNotFound",
                format!("Attribute {} does not exist", value.attribute_id),
            ));
        }
    }

    let result = if !problems.is_empty() {
        ModifyResult::invalid(problems)
    } else {
        let values = update
            .attributes
            .iter()
            .map(|value| PersonAttributeValue {
                attribute_id: value.attribute_id,
                value: value.value.clone().unwrap_or_default(),
            })
            .collect::<Vec<_>>();
        match ctx.store().save_person_attributes(person.person_id, &values) {
            Ok(()) => ModifyResult::success(Some(ctx.links().person(person.person_id))),
            Err(err) => {
                tracing::error!(error = %err, person_id = person.person_id, "person.attribute_update_failed");
                ModifyResult::failed("the attributes could not be saved")
            }
        }
    };

    crate::metrics::observe_modify_result("person.attribute_update", result.outcome());
    Ok(Reply::contract(result))
}
