// ABOUTME: Value types shared across the manifest engine, resolvers and CLI.
// ABOUTME: Image references and the replacement mapping built from them.

mod image_name;
mod replacements;

pub use image_name::{DEFAULT_TAG, FormatOptions, ImageName, ImageNameError};
pub use replacements::Replacements;
