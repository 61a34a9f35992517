//! Personal website server: templated pages and a cached WordPress posts reader.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
