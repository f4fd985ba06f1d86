//! Core business logic for Expensa.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Approval rules, decision evaluation and expense validation live here.
//!
//! # Modules
//!
//! - `approval` - Approval rules, ledgers and the evaluation engine
//! - `expense` - Expense types and validation
//! - `identity` - User roles

pub mod approval;
pub mod expense;
pub mod identity;
