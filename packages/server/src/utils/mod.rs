pub mod date_filter;
pub mod event_filter;
pub mod hash;
pub mod jwt;
pub mod listing;
pub mod nps;
pub mod report;
