//! Core content types shared by the fetch, cache and presentation layers.

pub mod posts;
