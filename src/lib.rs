pub mod config;
pub mod models;
pub mod render;
pub mod session;
pub mod site;
pub mod storage;
pub mod visits;
