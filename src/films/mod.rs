//! Film implementations.

mod rgb;

pub use rgb::RgbFilm;

pub(crate) use rgb::create as create_rgb_plugin;
