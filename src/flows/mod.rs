//! Decision logic for the buyer and admin flows, kept free of I/O.

pub mod admin;
pub mod submission;
