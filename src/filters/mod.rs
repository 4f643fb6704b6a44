//! Pixel reconstruction filters.

mod box_filter;
mod tent;

pub use box_filter::BoxFilter;
pub use tent::TentFilter;

pub(crate) use box_filter::create as create_box_plugin;
pub(crate) use tent::create as create_tent_plugin;
