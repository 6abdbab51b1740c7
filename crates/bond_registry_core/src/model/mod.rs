//! Bond registry domain model.
//!
//! # Responsibility
//! - Define the bond record and its embedded subscribers.
//! - Provide pure transformations over a bond's subscriber mapping.
//!
//! # Invariants
//! - A bond is identified only by its caller-assigned `bond_id`.
//! - Subscribers live only inside one bond's mapping, keyed by `sid`.

pub mod bond;
pub mod subscriber;
