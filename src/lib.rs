//! Creamery Library
//!
//! Ice cream batch journal: ingredient lists kept consistent across grams,
//! cups and liters, tasting notes and grades, and AI-suggested variants
//! derived from existing batches.

pub mod build_info;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod measure;
pub mod models;
pub mod suggest;
pub mod tools;
