//! Field catalogue for catalog dataset records.
//!
//! Paths are slash-joined, matching the flattened form produced by the
//! structural content filter (`temporal-extent/begin`). Fields that show
//! up in live records but are missing here are picked up by drift
//! detection and registered on first sight.

/// Every field provisioned into a new dataset's `Full` template.
pub const DATASET_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "state",
    "private",
    "owner_org",
    "title",
    "title_translated/en",
    "title_translated/fr",
    "notes/en",
    "notes/fr",
    "notes_translated/en",
    "notes_translated/fr",
    "author",
    "author_email",
    "maintainer",
    "maintainer_email",
    "license_id",
    "license_title",
    "license_url",
    "url",
    "version",
    "creator_user_id",
    "metadata_created",
    "metadata_modified",
    "num_resources",
    "num_tags",
    "tags",
    "groups",
    "extras",
    "resources",
    "keywords/en",
    "keywords/fr",
    "organization/id",
    "organization/name",
    "organization/title",
    "organization/description",
    "organization/image_url",
    "organization/created",
    "organization/is_organization",
    "organization/approval_status",
    "organization/state",
    "organization/type",
    "relationships_as_object",
    "relationships_as_subject",
    "tracking_summary/total",
    "tracking_summary/recent",
    "bbox-north-lat",
    "bbox-south-lat",
    "bbox-east-long",
    "bbox-west-long",
    "vertical-extent-min",
    "vertical-extent-max",
    "vertical-extent-crs",
    "spatial/type",
    "spatial/coordinates",
    "temporal-extent/begin",
    "temporal-extent/end",
    "dataset-reference-date",
    "metadata-reference-date",
    "metadata-language",
    "metadata-point-of-contact/individual-name",
    "metadata-point-of-contact/organisation-name",
    "metadata-point-of-contact/position-name",
    "metadata-point-of-contact/contact-info_email",
    "metadata-point-of-contact/contact-info_online-resource_url",
    "metadata-point-of-contact/role",
    "cited-responsible-party",
    "unique-resource-identifier-full/authority",
    "unique-resource-identifier-full/code",
    "unique-resource-identifier-full/code-space",
    "unique-resource-identifier-full/version",
    "eov",
    "progress-code",
    "frequency-update",
    "resource-type",
    "use-limitations",
    "access-constraints",
    "use-constraints",
    "platform",
    "instruments",
    "parameters",
    "projects",
    "funders",
    "xml_location_url",
];

/// Fields the catalog cannot render a record without. They are marked
/// `required` and belong to every whitelist.
pub const MINIMUM_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "state",
    "private",
    "owner_org",
    "title",
    "title_translated/en",
    "title_translated/fr",
    "organization/id",
    "organization/name",
    "organization/title",
    "metadata_created",
    "metadata_modified",
    "num_resources",
    "num_tags",
];

/// Curated subset exposed by the `Minimal` template, on top of
/// [`MINIMUM_FIELDS`]. Location and temporal fields are not part of it.
pub const PUBLIC_FIELDS: &[&str] = &[
    "notes/en",
    "notes/fr",
    "notes_translated/en",
    "notes_translated/fr",
    "keywords/en",
    "keywords/fr",
    "tags",
    "license_id",
    "license_title",
    "license_url",
    "eov",
    "progress-code",
    "organization/description",
    "organization/image_url",
    "metadata-point-of-contact/organisation-name",
    "metadata-point-of-contact/role",
];

/// Top-level keys whose values are stored as JSON-encoded strings.
pub const STRINGIFIED_KEYS: &[&str] = &[
    "metadata-point-of-contact",
    "spatial",
    "temporal-extent",
    "unique-resource-identifier-full",
    "notes",
    "cited-responsible-party",
    "dataset-reference-date",
];

pub fn is_minimum_field(name: &str) -> bool {
    MINIMUM_FIELDS.contains(&name)
}
