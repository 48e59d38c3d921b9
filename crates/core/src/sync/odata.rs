//! OData collection protocol helpers: filters, entity URLs and page parsing.

use erpsync_domain::constants::{ODATA_NEXT_LINK, ODATA_VALUE};
use serde_json::Value;

/// Quote a string literal for a `$filter` expression (`'` is doubled).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `<field> eq '<value>'`
pub fn key_filter(field: &str, value: &str) -> String {
    format!("{field} eq {}", quote_literal(value))
}

/// `<collection_url>(<system_id>)`
pub fn entity_url(collection_url: &str, system_id: &str) -> String {
    format!("{}({system_id})", collection_url.trim_end_matches('/'))
}

/// One page of a collection read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Value>,
    pub next_link: Option<String>,
}

/// Parse a collection response body.
///
/// Accepts a bare JSON array or an object with a `value` array and an
/// optional `@odata.nextLink`. Any other JSON shape yields an empty last page.
pub fn parse_page(body: &str) -> Result<Page, serde_json::Error> {
    let value: Value = serde_json::from_str(body)?;
    Ok(match value {
        Value::Array(rows) => Page { rows, next_link: None },
        Value::Object(mut object) => {
            let rows = match object.remove(ODATA_VALUE) {
                Some(Value::Array(rows)) => rows,
                _ => Vec::new(),
            };
            let next_link = object
                .get(ODATA_NEXT_LINK)
                .and_then(Value::as_str)
                .filter(|link| !link.is_empty())
                .map(str::to_string);
            Page { rows, next_link }
        }
        _ => Page::default(),
    })
}
