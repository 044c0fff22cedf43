//! Pipeline stages, one module per stage.
//!
//! ```text
//! input ─▶ text ─┬▶ header ─┐
//!                └▶ classify ─▶ rows ─▶ order ─▶ emit
//! ```

pub mod classify;
pub mod emit;
pub mod header;
pub mod input;
pub mod order;
pub mod rows;
pub mod text;
