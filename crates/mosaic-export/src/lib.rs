//! mosaic-export: Pure format serializers (sans-IO)
//!
//! Converts pipeline output and cell render results into output
//! formats. Currently supports SVG.

pub mod svg;

pub use svg::{RenderStyle, SvgMetadata, SvgOptions, fraction_to_px, image_data_uri, to_svg};
