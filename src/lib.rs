pub mod api;
pub mod config;
pub mod humanize;
pub mod layout;
pub mod observability;
pub mod podlet;
pub mod template;
