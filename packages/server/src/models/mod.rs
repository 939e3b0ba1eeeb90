pub mod auth;
pub mod donation;
pub mod event;
pub mod milestone;
pub mod participant;
pub mod shared;
pub mod survey;
pub mod user;
