//! MaskFE: select regions of an image, gray them out as a placeholder, and
//! hand image, mask and prompt to an image-editing service while keeping a
//! navigable version history.

#![allow(clippy::type_complexity)]

#[macro_use]
pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;
