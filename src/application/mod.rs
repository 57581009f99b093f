//! Application services layer.

pub mod account;
pub mod ads;
pub mod content;
pub mod error;
pub mod form_errors;
pub mod remote;
pub mod session;
pub mod sniff;
pub mod viewer;
