//! HTML presentation built on askama templates.

pub mod views;
