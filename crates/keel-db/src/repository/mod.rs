//! # Repository Module
//!
//! Repository implementations for database access.
//!
//! ## Repository Pattern
//! Each repository wraps the connection pool and owns the SQL for one
//! aggregate. Business rules live in keel-core / keel-checkout; the
//! repositories only move data and enforce storage-level invariants
//! (conditional stock decrements, append-only history inserts).

pub mod cart;
pub mod order;
pub mod product;
