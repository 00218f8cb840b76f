//! DEA placement — point queries on advertisements and host selection.
//!
//! This crate is pure: it never owns the live advertisement set (that's
//! `dea-pool`). It answers questions about a single advertisement and
//! narrows a snapshot of advertisements down to one placement target.
//!
//! # Components
//!
//! - **`advertisement`** — one DEA's capacity/topology snapshot
//! - **`criteria`** — what a caller needs from a host
//! - **`filter`** — the ordered eligibility filter chain
//! - **`convert`** — wire message → advertisement conversion

pub mod advertisement;
pub mod convert;
pub mod criteria;
pub mod filter;

pub use advertisement::Advertisement;
pub use convert::{advertisement_from_message, expiry_for};
pub use criteria::PlacementCriteria;
pub use filter::{EligibleDeas, select_dea};
