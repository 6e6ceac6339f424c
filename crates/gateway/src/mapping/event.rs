use arena_contracts as contract;
use arena_store::{Profile, ProfileType};

use super::{Links, text};

/// Events are event-type profiles carrying schedule details. Anything else
/// has no event projection.
pub fn map_event(profile: &Profile, links: Links<'_>) -> Option<contract::Event> {
    if profile.profile_type != ProfileType::Event {
        return None;
    }
    let details = profile.event.as_ref()?;

    Some(contract::Event {
        event_id: profile.profile_id,
        name: profile.name.clone(),
        start: Some(details.start),
        end: Some(details.end),
        location: text(&details.location),
        summary: text(&profile.summary),
        link: Some(links.event(profile.profile_id)),
    })
}

#[cfg(test)]
mod tests {
    use arena_store::EventDetails;
    use chrono::NaiveDate;

    use super::*;

    fn retreat(profile_type: ProfileType) -> Profile {
        let mut profile = Profile::not_found();
        profile.profile_id = 12;
        profile.name = "Fall Retreat".to_string();
        profile.profile_type = profile_type;
        profile.event = Some(EventDetails {
            start: NaiveDate::from_ymd_opt(2026, 10, 23)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 10, 25)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            location: "Lakeside Camp".to_string(),
        });
        profile
    }

    #[test]
    fn only_event_profiles_map_to_events() {
        let links = Links::new("http://arena.test");
        let event = map_event(&retreat(ProfileType::Event), links).expect("event");
        assert_eq!(event.event_id, 12);
        assert_eq!(event.location.as_deref(), Some("Lakeside Camp"));
        assert_eq!(event.link.as_deref(), Some("http://arena.test/event/12"));

        assert!(map_event(&retreat(ProfileType::Ministry), links).is_none());
    }
}
