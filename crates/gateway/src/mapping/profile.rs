use arena_contracts as contract;
use arena_store::{Profile, ProfileMembership};

use super::{Links, date, id, lookup, text};

pub fn map_profile(profile: &Profile, member_count: i32, links: Links<'_>) -> contract::Profile {
    contract::Profile {
        profile_id: profile.profile_id,
        name: profile.name.clone(),
        profile_type: profile.profile_type.as_str().to_string(),
        owner_id: id(profile.owner_id),
        parent_profile_id: id(profile.parent_profile_id),
        active: profile.active,
        member_count,
        summary: text(&profile.summary),
        link: Some(links.profile(profile.profile_id)),
    }
}

pub fn map_profile_reference(profile: &Profile, links: Links<'_>) -> contract::ProfileReference {
    contract::ProfileReference {
        profile_id: profile.profile_id,
        name: profile.name.clone(),
        profile_type: profile.profile_type.as_str().to_string(),
        link: Some(links.profile(profile.profile_id)),
    }
}

pub fn map_profile_member(
    membership: &ProfileMembership,
    full_name: Option<String>,
    email: Option<String>,
    links: Links<'_>,
) -> contract::ProfileMember {
    contract::ProfileMember {
        profile_id: membership.profile_id,
        person_id: membership.person_id,
        full_name,
        email,
        status: lookup(&membership.status),
        date_added: date(membership.date_added),
        link: Some(links.person(membership.person_id)),
    }
}

#[cfg(test)]
mod tests {
    use arena_store::{LookupValue, ProfileType, sentinel_date};

    use super::*;

    #[test]
    fn profile_sentinels_are_omitted() {
        let profile = Profile {
            profile_id: 11,
            organization_id: 1,
            name: "Ushers".to_string(),
            profile_type: ProfileType::Serving,
            owner_id: -1,
            parent_profile_id: 10,
            active: true,
            summary: String::new(),
            event: None,
        };
        let mapped = map_profile(&profile, 4, Links::new("http://arena.test"));
        assert_eq!(mapped.profile_type, "Serving");
        assert_eq!(mapped.owner_id, None);
        assert_eq!(mapped.parent_profile_id, Some(10));
        assert_eq!(mapped.summary, None);
        assert_eq!(mapped.member_count, 4);

        let member = map_profile_member(
            &ProfileMembership {
                profile_id: 11,
                person_id: 1,
                status: LookupValue::default(),
                date_added: sentinel_date(),
            },
            None,
            None,
            Links::new("http://arena.test"),
        );
        assert_eq!(member.status, None);
        assert_eq!(member.date_added, None);
        assert_eq!(member.link.as_deref(), Some("http://arena.test/person/1"));
    }
}
