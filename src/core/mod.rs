//! Core data structures for the output side:
//! - Cell: one column of one row
//! - OutputBuffer: the 2D grid the application draws into
//! - Geometry: points, sizes and rectangles

pub mod cell;
pub mod geometry;
pub mod output_buffer;

pub use cell::{Attribute, Cell, Color, TextStyle, WIDE_CONTINUATION};
pub use geometry::{Point, Rect, Size};
pub use output_buffer::{rune_width, OutputBuffer, REPLACEMENT};
