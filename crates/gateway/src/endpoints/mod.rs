use std::sync::Arc;

use arena_contracts::{self as contract, Page};
use arena_policy::{
    CallerContext, FieldVisibility, GroupGraph, IncludeFieldSpec, Operation, PermissionOracle,
    Securable, Subject, Target,
};
use arena_store::{ArenaStore, NOT_FOUND_ID, Person, Profile, SmallGroup};
use axum::http::Method;

use crate::dispatch::{BoundParameters, Endpoint, ParamSpec};
use crate::error::ApiError;
use crate::mapping::{self, Links};
use crate::rate_limit::RateLimiter;
use crate::routing::{RouteError, RouteTable};

mod blob;
mod event;
mod group;
mod oauth;
mod person;
mod profile;

/// Long-lived collaborators shared by every request.
pub struct Services {
    pub store: Arc<dyn ArenaStore>,
    pub oracle: Arc<dyn PermissionOracle>,
    pub graph: Arc<dyn GroupGraph>,
    pub organization_id: i32,
    pub public_base_url: String,
    pub validate_limiter: RateLimiter,
    pub validate_limit_per_window: u32,
}

/// The authenticated caller as the endpoints see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub login_id: String,
    pub subject: Subject,
    pub family_id: Option<i32>,
}

pub struct RequestContext<'a> {
    pub services: &'a Services,
    pub caller: &'a Caller,
}

impl RequestContext<'_> {
    pub fn store(&self) -> &dyn ArenaStore {
        self.services.store.as_ref()
    }

    pub fn oracle(&self) -> &dyn PermissionOracle {
        self.services.oracle.as_ref()
    }

    pub fn links(&self) -> Links<'_> {
        Links::new(&self.services.public_base_url)
    }

    pub fn relation_to(&self, target: &Target) -> CallerContext {
        CallerContext::resolve(
            self.caller.subject.clone(),
            self.caller.family_id,
            target,
            self.services.graph.as_ref(),
            self.services.oracle.as_ref(),
        )
    }

    pub fn allows(&self, securable: Securable, operation: Operation) -> bool {
        self.oracle()
            .allows(&self.caller.subject, securable, operation)
    }

    /// Profiles are visible to their owner and to anyone granted View.
    pub fn can_view_profile(&self, profile: &Profile) -> bool {
        profile.owner_id == self.caller.subject.person_id
            || self.allows(Securable::Profile(profile.profile_id), Operation::View)
    }

    /// Missing records come back from the store as `-1` ids.
    pub fn load_person(&self, person_id: i32) -> Result<Person, ApiError> {
        let person = self.store().person(person_id)?;
        if person.person_id == NOT_FOUND_ID {
            return Err(ApiError::not_found("person"));
        }
        Ok(person)
    }

    pub fn load_profile(&self, profile_id: i32) -> Result<Profile, ApiError> {
        let profile = self.store().profile(profile_id)?;
        if profile.profile_id == NOT_FOUND_ID
            || profile.organization_id != self.services.organization_id
        {
            return Err(ApiError::not_found("profile"));
        }
        Ok(profile)
    }

    pub fn project_person(
        &self,
        person: &Person,
        requested: Option<&IncludeFieldSpec>,
    ) -> Result<contract::Person, ApiError> {
        let caller = self.relation_to(&person_target(person));
        let vis = FieldVisibility::new(
            mapping::person::policy(),
            self.oracle(),
            &caller,
            requested,
        );
        let attribute_names = self.store().attributes()?;
        let attribute_visible = |attribute_id: i32| {
            self.allows(Securable::Attribute(attribute_id), Operation::View)
        };

        let projected = mapping::person::map_person(
            person,
            &vis,
            self.links(),
            &mapping::person::PersonDetail {
                attribute_names: &attribute_names,
                trusted: caller.bypass().is_some(),
                attribute_visible: &attribute_visible,
            },
        );
        crate::metrics::observe_fields_hidden(vis.entity(), vis.hidden_count());
        Ok(projected)
    }

    /// Whether one person field would survive projection for this caller.
    pub fn person_field_visible(&self, person: &Person, field: &str) -> bool {
        let caller = self.relation_to(&person_target(person));
        FieldVisibility::new(mapping::person::policy(), self.oracle(), &caller, None)
            .includes(field)
    }

    pub fn group_field_visible(&self, group: &SmallGroup, field: &str) -> bool {
        let caller = self.relation_to(&group_target(group));
        FieldVisibility::new(mapping::group::policy(), self.oracle(), &caller, None)
            .includes(field)
    }

    /// Name and email of a listed member, each gated by the member's own
    /// person visibility.
    pub fn member_summary(
        &self,
        person_id: i32,
    ) -> Result<(Option<String>, Option<String>), ApiError> {
        let person = self.store().person(person_id)?;
        if person.person_id == NOT_FOUND_ID {
            return Ok((None, None));
        }

        let caller = self.relation_to(&person_target(&person));
        let vis = FieldVisibility::new(mapping::person::policy(), self.oracle(), &caller, None);
        let full_name = mapping::pick(&vis, "FullName", || mapping::text(&person.full_name()));
        let email = mapping::pick(&vis, "Email", || mapping::text(&person.email));
        crate::metrics::observe_fields_hidden(vis.entity(), vis.hidden_count());
        Ok((full_name, email))
    }
}

pub fn person_target(person: &Person) -> Target {
    Target::person(person.person_id, mapping::id(person.family_id))
}

pub fn group_target(group: &SmallGroup) -> Target {
    Target::group(mapping::id(group.leader_id), mapping::id(group.cluster_id))
}

pub fn page(params: &BoundParameters) -> Page {
    Page::new(
        params.int("start").map(i64::from),
        params.int("max").map(i64::from),
    )
}

const PAGE: [ParamSpec; 2] = [ParamSpec::int("start"), ParamSpec::int("max")];

const IMIN: [ParamSpec; 1] = [ParamSpec::body("person")];
const PERSON: [ParamSpec; 2] = [ParamSpec::int("id"), ParamSpec::str("fields")];
const PERSON_ID: [ParamSpec; 1] = [ParamSpec::int("id")];
const FAMILY_MEMBERS: [ParamSpec; 4] = [
    ParamSpec::int("id"),
    ParamSpec::int("start"),
    ParamSpec::int("max"),
    ParamSpec::str("fields"),
];
const PERSON_GROUPS: [ParamSpec; 3] = [
    ParamSpec::int("id"),
    ParamSpec::int("start"),
    ParamSpec::int("max"),
];
const PERSON_PROFILES: [ParamSpec; 4] = [
    ParamSpec::int("id"),
    ParamSpec::str("profileType"),
    ParamSpec::int("start"),
    ParamSpec::int("max"),
];
const ATTRIBUTE_UPDATE: [ParamSpec; 2] = [ParamSpec::int("id"), ParamSpec::body("update")];
const PROFILE: [ParamSpec; 1] = [ParamSpec::int("profileID")];
const PROFILE_MEMBERS: [ParamSpec; 4] = [
    ParamSpec::int("profileID"),
    ParamSpec::int("statusID"),
    ParamSpec::int("start"),
    ParamSpec::int("max"),
];
const GROUP: [ParamSpec; 2] = [ParamSpec::int("groupID"), ParamSpec::str("fields")];
const GROUP_MEMBERS: [ParamSpec; 3] = [
    ParamSpec::int("groupID"),
    ParamSpec::int("start"),
    ParamSpec::int("max"),
];
const CLUSTER: [ParamSpec; 1] = [ParamSpec::int("clusterID")];
const EVENT: [ParamSpec; 1] = [ParamSpec::int("eventID")];
const CLIENT_VALIDATE: [ParamSpec; 2] = [
    ParamSpec::str("clientApiKey"),
    ParamSpec::str("clientApiSecret"),
];
const CLIENT_KEY: [ParamSpec; 1] = [ParamSpec::str("clientApiKey")];
const BLOB: [ParamSpec; 1] = [ParamSpec::int("blobID")];

/// Registration order matters: literal routes that share a shape with a
/// capture route must come first.
pub fn register(table: &mut RouteTable<Endpoint>) -> Result<(), RouteError> {
    let routes: [(Method, &str, Endpoint); 18] = [
        (
            Method::POST,
            "/person/imin",
            Endpoint {
                params: &IMIN,
                handler: person::imin,
            },
        ),
        (
            Method::GET,
            "/person/{id}?fields={csv}",
            Endpoint {
                params: &PERSON,
                handler: person::get_person,
            },
        ),
        (
            Method::GET,
            "/person/{id}/familymembers?start={start}&max={max}&fields={csv}",
            Endpoint {
                params: &FAMILY_MEMBERS,
                handler: person::family_members,
            },
        ),
        (
            Method::GET,
            "/person/{id}/groups?start={start}&max={max}",
            Endpoint {
                params: &PERSON_GROUPS,
                handler: person::groups,
            },
        ),
        (
            Method::GET,
            "/person/{id}/profiles?profileType={type}&start={start}&max={max}",
            Endpoint {
                params: &PERSON_PROFILES,
                handler: person::profiles,
            },
        ),
        (
            Method::GET,
            "/person/{id}/image",
            Endpoint {
                params: &PERSON_ID,
                handler: person::image,
            },
        ),
        (
            Method::POST,
            "/person/{id}/attribute/update",
            Endpoint {
                params: &ATTRIBUTE_UPDATE,
                handler: person::update_attributes,
            },
        ),
        (
            Method::GET,
            "/profile/{profileID}",
            Endpoint {
                params: &PROFILE,
                handler: profile::get_profile,
            },
        ),
        (
            Method::GET,
            "/profile/{profileID}/members?statusID={statusID}&start={start}&max={max}",
            Endpoint {
                params: &PROFILE_MEMBERS,
                handler: profile::members,
            },
        ),
        (
            Method::GET,
            "/group/{groupID}?fields={csv}",
            Endpoint {
                params: &GROUP,
                handler: group::get_group,
            },
        ),
        (
            Method::GET,
            "/group/{groupID}/members?start={start}&max={max}",
            Endpoint {
                params: &GROUP_MEMBERS,
                handler: group::members,
            },
        ),
        (
            Method::GET,
            "/cluster/{clusterID}",
            Endpoint {
                params: &CLUSTER,
                handler: group::get_cluster,
            },
        ),
        (
            Method::GET,
            "/event/{eventID}",
            Endpoint {
                params: &EVENT,
                handler: event::get_event,
            },
        ),
        (
            Method::GET,
            "/oauth/client/validate?clientApiKey={key}&clientApiSecret={secret}",
            Endpoint {
                params: &CLIENT_VALIDATE,
                handler: oauth::validate_client,
            },
        ),
        (
            Method::GET,
            "/oauth/client/{clientApiKey}",
            Endpoint {
                params: &CLIENT_KEY,
                handler: oauth::get_client,
            },
        ),
        (
            Method::GET,
            "/oauth/authorizations?start={start}&max={max}",
            Endpoint {
                params: &PAGE,
                handler: oauth::authorizations,
            },
        ),
        (
            Method::POST,
            "/oauth/authorization/{clientApiKey}/revoke",
            Endpoint {
                params: &CLIENT_KEY,
                handler: oauth::revoke_authorization,
            },
        ),
        (
            Method::GET,
            "/blob/{blobID}",
            Endpoint {
                params: &BLOB,
                handler: blob::get_blob,
            },
        ),
    ];

    for (method, template, endpoint) in routes {
        table.register(method, template, endpoint)?;
    }
    Ok(())
}
