//! Bond use-case services.
//!
//! # Responsibility
//! - Turn record-store primitives into bond-level create/update/delete,
//!   lookup and subscriber operations.
//! - Refine adapter failures into bond-level error kinds.

pub mod bond_service;
