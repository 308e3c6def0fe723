//! Survey Relay: CSV-driven survey invitations and form-submission intake.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod providers;
pub mod roster;
pub mod routes;
pub mod submit;
pub mod survey;
