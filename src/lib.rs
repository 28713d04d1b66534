//! Item-to-item movie similarity from co-ratings.
//!
//! Ratings are grouped by user, every pair of movies a user rated is folded
//! into per-pair cosine statistics, and the finalised table answers top-N
//! "movies like this one" queries.

pub mod config;
pub mod console;
pub mod error;
pub mod models;
pub mod services;
