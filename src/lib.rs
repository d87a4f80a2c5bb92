//! Terminal parcel map: synchronizes a list of geographic entities with a
//! Braille map surface, including camera transitions, hover and selection.

pub mod braille;
pub mod config;
pub mod data;
pub mod engine;
pub mod entity;
pub mod error;
pub mod geo;
pub mod map;
pub mod style;
pub mod surface;
