pub mod app_user;
pub mod donation;
pub mod event_occurrence;
pub mod event_template;
pub mod milestone;
pub mod nps_bucket;
pub mod nps_rule;
pub mod participant;
pub mod registration;
pub mod registration_status;
pub mod survey;
