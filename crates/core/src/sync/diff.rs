//! Field-diff engine.
//!
//! Decides whether a remote record needs a write and scrubs fields that must
//! not be sent on update.

use erpsync_domain::{DiffPolicy, Record};
use serde_json::{Map, Value};
use tracing::warn;

/// First field of `desired` that differs from `existing`, honouring `policy`.
///
/// Fields are visited in `desired`'s order. Excluded fields are skipped; an
/// exempt field is skipped while its existing value is exempt. Remaining
/// fields are compared as case-insensitive text, and a field missing from
/// `existing` counts as a difference. `None` means no write is needed.
pub fn is_patch_required(
    existing: &Record,
    desired: &Record,
    policy: &DiffPolicy,
) -> Option<String> {
    for (name, desired_value) in desired.iter() {
        if policy.is_excluded(name) {
            continue;
        }

        let Some(existing_value) = existing.get(name) else {
            return Some(name.to_string());
        };

        if policy.is_exempt(name, &existing_value.as_text()) {
            continue;
        }

        if !existing_value.text_eq(desired_value) {
            return Some(name.to_string());
        }
    }

    None
}

/// Drop `fields` (case-insensitive) from a JSON object payload.
///
/// Fails open: a payload that is not a JSON object is returned unchanged and a
/// warning is logged, so a formatting quirk never blocks a write.
pub fn remove_fields<S: AsRef<str>>(payload: &str, fields: &[S]) -> String {
    let object: Map<String, Value> = match serde_json::from_str(payload) {
        Ok(object) => object,
        Err(err) => {
            warn!(error = %err, "payload is not a JSON object; sending it unfiltered");
            return payload.to_string();
        }
    };

    let filtered = remove_fields_from(object, fields);
    match serde_json::to_string(&filtered) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to re-serialize filtered payload; sending it unfiltered");
            payload.to_string()
        }
    }
}

/// In-memory variant of [`remove_fields`].
pub fn remove_fields_from<S: AsRef<str>>(
    mut object: Map<String, Value>,
    fields: &[S],
) -> Map<String, Value> {
    object.retain(|name, _| {
        !fields.iter().any(|field| erpsync_domain::eq_ignore_case(name, field.as_ref()))
    });
    object
}

/// PATCH body for `payload` against the current `existing` record.
///
/// Drops `update_excluded`, every field `policy` excludes, and every exempt
/// field whose existing value is exempt, so a write never touches a field
/// the diff ignored.
pub fn patch_body<S: AsRef<str>>(
    payload: &Map<String, Value>,
    existing: &Record,
    policy: &DiffPolicy,
    update_excluded: &[S],
) -> Map<String, Value> {
    let mut body = remove_fields_from(payload.clone(), update_excluded);
    body.retain(|name, _| {
        !policy.is_excluded(name)
            && !existing.get(name).is_some_and(|value| policy.is_exempt(name, &value.as_text()))
    });
    body
}
