//! Wire-level constants of the OData collection protocol.

/// Concurrency token field carried by every fetched row.
pub const ODATA_ETAG: &str = "@odata.etag";
/// Link to the next page of a paginated collection read.
pub const ODATA_NEXT_LINK: &str = "@odata.nextLink";
/// Array holding the rows of a collection response.
pub const ODATA_VALUE: &str = "value";
/// Remote identifier of a record.
pub const SYSTEM_ID: &str = "systemId";
/// Alternate spelling of the remote identifier used by some endpoints.
pub const ID: &str = "id";

/// `If-Match` value used when no etag is known.
pub const IF_MATCH_ANY: &str = "*";
/// `Prefer` header value requesting the updated row in the response body.
pub const PREFER_REPRESENTATION: &str = "return=representation";

/// Default transient retry bound (409 without marker, 503).
pub const DEFAULT_MAX_TRANSIENT_RETRIES: u32 = 5;
/// Default linear backoff unit in milliseconds.
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1_000;
/// Default bound on stale-etag refresh-and-resubmit rounds.
pub const DEFAULT_MAX_STALE_RETRIES: u32 = 5;
/// Error code the backend puts in a 409 body for a stale `If-Match`.
pub const DEFAULT_STALE_CONFLICT_MARKER: &str = "Request_EntityChanged";
/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 100;
