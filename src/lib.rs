pub mod client;
pub mod colors;
pub mod config;
pub mod context;
pub mod duration;
pub mod logging;
pub mod metrics;
pub mod metrics_view;
pub mod models;
pub mod page;
pub mod request;
pub mod screenshots;
pub mod selection;
pub mod service;
