//! portalsim — a controllable stand-in for an appointment-booking portal.
//!
//! The interesting part is not the slot table but the simulation engine
//! around it: session lifecycle with randomized expiry, a layered
//! fault-injection pipeline, month-offset behavior profiles, and a
//! background mutation loop that keeps the availability data churning the
//! way real portals do. Automation clients get realistic, reproducible
//! misbehavior to chew on.

pub mod churn;
pub mod engine;
pub mod faults;
pub mod model;
pub mod observability;
pub mod rng;
pub mod session;
pub mod store;
