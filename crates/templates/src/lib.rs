//! `jobboard-templates` — HTML page rendering.
//!
//! A [`Templates`] handle owns the parsed template set for one directory.
//! In development it also watches that directory and swaps in a freshly
//! parsed set whenever a template is written.

pub mod helpers;
pub mod markdown;
pub mod renderer;

pub use markdown::markdown_to_html;
pub use renderer::{TemplateError, Templates};
