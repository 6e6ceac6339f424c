use std::sync::OnceLock;

use arena_contracts as contract;
use arena_policy::{FieldVisibility, PermissionKey, VisibilityPolicy};
use arena_store::{Attribute, Person, PersonAddress, PersonPhone};

use super::{Links, date, id, lookup, pick, text};

static POLICY: OnceLock<VisibilityPolicy> = OnceLock::new();

/// `RecordStatus` is deliberately absent: only owner, family, and leaders
/// see it.
pub fn policy() -> &'static VisibilityPolicy {
    POLICY.get_or_init(|| {
        VisibilityPolicy::new(
            "person",
            &[
                ("FamilyID", PermissionKey("person.family")),
                ("FirstName", PermissionKey("person.first_name")),
                ("NickName", PermissionKey("person.nick_name")),
                ("LastName", PermissionKey("person.last_name")),
                ("FullName", PermissionKey("person.full_name")),
                ("Email", PermissionKey("person.email")),
                ("BirthDate", PermissionKey("person.birth_date")),
                ("Gender", PermissionKey("person.gender")),
                ("MaritalStatus", PermissionKey("person.marital_status")),
                ("MemberStatus", PermissionKey("person.member_status")),
                ("CampusID", PermissionKey("person.campus")),
                ("ImageUrl", PermissionKey("person.image")),
                ("Phones", PermissionKey("person.phones")),
                ("Addresses", PermissionKey("person.addresses")),
                ("Attributes", PermissionKey("person.attributes")),
            ],
        )
    })
}

/// How much of a person's nested data the caller may see beyond the field
/// table.
pub struct PersonDetail<'a> {
    pub attribute_names: &'a [Attribute],
    /// Owner, family, or leadership access.
    pub trusted: bool,
    pub attribute_visible: &'a dyn Fn(i32) -> bool,
}

pub fn map_person(
    person: &Person,
    vis: &FieldVisibility<'_>,
    links: Links<'_>,
    detail: &PersonDetail<'_>,
) -> contract::Person {
    contract::Person {
        person_id: person.person_id,
        family_id: pick(vis, "FamilyID", || id(person.family_id)),
        first_name: pick(vis, "FirstName", || text(&person.first_name)),
        nick_name: pick(vis, "NickName", || text(&person.nick_name)),
        last_name: pick(vis, "LastName", || text(&person.last_name)),
        full_name: pick(vis, "FullName", || text(&person.full_name())),
        email: pick(vis, "Email", || text(&person.email)),
        birth_date: pick(vis, "BirthDate", || date(person.birth_date)),
        gender: pick(vis, "Gender", || text(&person.gender)),
        marital_status: pick(vis, "MaritalStatus", || lookup(&person.marital_status)),
        member_status: pick(vis, "MemberStatus", || lookup(&person.member_status)),
        campus_id: pick(vis, "CampusID", || id(person.campus_id)),
        image_url: pick(vis, "ImageUrl", || links.blob(person.blob_id)),
        phones: pick(vis, "Phones", || {
            Some(
                person
                    .phones
                    .iter()
                    .filter(|phone| detail.trusted || !phone.unlisted)
                    .map(map_phone)
                    .collect(),
            )
        }),
        addresses: pick(vis, "Addresses", || {
            Some(person.addresses.iter().map(map_address).collect())
        }),
        attributes: pick(vis, "Attributes", || {
            Some(
                person
                    .attributes
                    .iter()
                    .filter(|value| detail.trusted || (detail.attribute_visible)(value.attribute_id))
                    .map(|value| contract::PersonAttribute {
                        attribute_id: value.attribute_id,
                        attribute_name: detail
                            .attribute_names
                            .iter()
                            .find(|a| a.attribute_id == value.attribute_id)
                            .map(|a| a.name.clone())
                            .unwrap_or_default(),
                        value: text(&value.value),
                    })
                    .collect(),
            )
        }),
        record_status: pick(vis, "RecordStatus", || text(&person.record_status)),
        link: Some(links.person(person.person_id)),
    }
}

fn map_phone(phone: &PersonPhone) -> contract::Phone {
    contract::Phone {
        number: phone.number.clone(),
        extension: text(&phone.extension),
        phone_type: lookup(&phone.phone_type),
        unlisted: phone.unlisted,
    }
}

fn map_address(address: &PersonAddress) -> contract::Address {
    contract::Address {
        street: text(&address.street),
        city: text(&address.city),
        state: text(&address.state),
        postal_code: text(&address.postal_code),
        address_type: lookup(&address.address_type),
        primary: address.primary,
    }
}
