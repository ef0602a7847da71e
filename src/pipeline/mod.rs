//! The processing stages that workflows are assembled from.
//!
//! * [`step`] — the retrying executor every stage runs under.
//! * [`validate`] — untrusted composition JSON into typed deck entities.
//! * [`normalize`] — source-pixel geometry onto the deck canvas and back.
//! * [`analyze`] — bounded-concurrency per-page vision analysis (intolerant).
//! * [`assets`] — illustration generation with identity caching (tolerant).

pub mod analyze;
pub mod assets;
pub mod normalize;
pub mod step;
pub mod validate;
