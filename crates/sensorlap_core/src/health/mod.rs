//! Bridge to the platform health-data broker.
//!
//! # Responsibility
//! - Define the health service seam (`HealthService`).
//! - Turn trailing-window reads into displayable heart-rate and step values.
//! - Offer a push-fed buffer the platform shell can back the seam with.
//!
//! # Invariants
//! - Every bridge call fails independently; a failure never clears a value
//!   that is already displayed.

pub mod bridge;
pub mod buffered;
pub mod service;
