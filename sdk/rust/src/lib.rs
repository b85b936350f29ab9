//! Client for the palette server.

pub mod client;

pub use client::{Fetched, Palette, PaletteClient};
