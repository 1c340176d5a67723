//! Wire-format models for the webhook sources in spec §6 plus a tolerant
//! decoder for LLM completion output (spec §9 "dynamic/untyped JSON
//! payloads"). The pack's `tandem-wire` crate shipped only a manifest with
//! no source — these DTOs are built fresh, following `tandem-types`' serde
//! convention of `#[serde(alias = "...")]` for field-name variance rather
//! than two parallel struct definitions.
//!
//! Each inbound payload module accepts the permissive shape a provider
//! actually sends (camelCase/snake_case aliases, optional fields the
//! provider omits in some event types) and normalizes it to one canonical,
//! strict shape — the superset resolution spec §9 Open Question #1 calls
//! for, decided per field in `DESIGN.md`.

pub mod fathom;
pub mod llm;
pub mod meeting_recorder;
pub mod sentry_bridge;
pub mod stripe;

pub use llm::extract_json;
