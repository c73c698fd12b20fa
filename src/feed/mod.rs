//! Feed XML parsing (spec §4.5's fetch collaborator, parse half). HTTP
//! transport, retry/backoff, and conditional GET live in `reloader::fetch`;
//! OPML and feed-autodiscovery are peripheral shells with no module named
//! by the spec and are not carried forward.

pub mod parser;
