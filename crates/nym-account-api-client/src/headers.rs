// The account service speaks JSON-LD; both values are part of the wire
// contract and must not be dropped.
pub(crate) const ACCEPT_JSON_LD: &str = "application/ld+json, application/json";
pub(crate) const CONTENT_TYPE_JSON_PATCH: &str = "application/json-patch+json";
