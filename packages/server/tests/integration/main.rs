mod common;

mod auth;
mod events;
mod milestones;
