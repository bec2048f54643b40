//! SVG export serializer.
//!
//! Converts a [`PipelineOutput`] and its [`CellRenderResult`] into an
//! SVG string using the [`svg`] crate for document construction, XML
//! escaping, and path data formatting.
//!
//! The document always carries four layers, in drawing order:
//!
//! 1. `layer-original`: the source image, when requested
//! 2. `layer-cells`: one `<polygon>` per kept cell, or one even-odd
//!    `<path>` per merged color group when cells were combined
//! 3. `layer-edges`: unfilled outlines of every Voronoi cell
//! 4. `layer-seeds`: one circle per seed
//!
//! Disabled layers are emitted empty so consumers can rely on their ids.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and `<metadata>`
//! elements to help file managers identify exported files.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Image, Path, Title};
use svg::node::{Node, Text, Value};

use mosaic_pipeline::{
    CellColor, CellRenderResult, Dimensions, EncodedImage, PipelineOutput, Point,
};

/// Namespace of the `<mosaic:pipeline>` metadata element.
const METADATA_NAMESPACE: &str = "urn:mosaic:pipeline:1";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. When present, `<title>`, `<desc>` and
/// `<metadata>` elements are emitted immediately after the opening
/// `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized pipeline configuration, emitted inside a `<metadata>`
    /// element wrapped in a namespaced `<mosaic:pipeline>` element so
    /// exported files carry machine-parseable settings.
    pub config_json: Option<&'a str>,
}

/// Stroke and marker styling shared by every render.
///
/// Sizes are fractions of `min(width, height)` of the source image; see
/// [`fraction_to_px`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    /// Stroke color of the Voronoi edges.
    pub voronoi_line_color: String,
    /// Stroke width of the Voronoi edges.
    pub voronoi_line_width: f64,
    /// Fill color of the seed markers.
    pub seed_color: String,
    /// Radius of the seed markers.
    pub seed_radius: f64,
}

impl RenderStyle {
    /// Default edge color.
    pub const DEFAULT_VORONOI_LINE_COLOR: &str = "#000000";
    /// Default edge width fraction.
    pub const DEFAULT_VORONOI_LINE_WIDTH: f64 = 0.002;
    /// Default seed color.
    pub const DEFAULT_SEED_COLOR: &str = "#ff0000";
    /// Default seed radius fraction.
    pub const DEFAULT_SEED_RADIUS: f64 = 0.002;
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            voronoi_line_color: Self::DEFAULT_VORONOI_LINE_COLOR.to_owned(),
            voronoi_line_width: Self::DEFAULT_VORONOI_LINE_WIDTH,
            seed_color: Self::DEFAULT_SEED_COLOR.to_owned(),
            seed_radius: Self::DEFAULT_SEED_RADIUS,
        }
    }
}

/// Convert a size fraction into pixels of an image.
///
/// ```
/// use mosaic_export::fraction_to_px;
/// use mosaic_pipeline::Dimensions;
///
/// assert_eq!(fraction_to_px(0.01, Dimensions::new(800, 600)), 6.0);
/// ```
#[must_use]
pub fn fraction_to_px(fraction: f64, dimensions: Dimensions) -> f64 {
    fraction * f64::from(dimensions.min_side())
}

/// Embed an encoded image as a `data:` URI.
///
/// The SVG then carries the source image itself, so the original layer
/// renders wherever the file is moved.
#[must_use]
pub fn image_data_uri(image: &EncodedImage) -> String {
    format!(
        "data:{};base64,{}",
        image.mime_type(),
        BASE64.encode(image.bytes())
    )
}

/// Which layers to draw and at what size.
#[derive(Debug, Clone)]
pub struct SvgOptions<'a> {
    /// Output size relative to the source image. Non-positive or
    /// non-finite values fall back to `1.0`.
    pub scale: f64,
    /// Draw the source image underneath the cells.
    pub show_original: bool,
    /// Reference used for the source image's `href`, typically from
    /// [`image_data_uri`].
    pub original_href: Option<&'a str>,
    /// Draw filled cells.
    pub show_cells: bool,
    /// Draw cell outlines.
    pub show_voronoi: bool,
    /// Draw seed markers.
    pub show_seeds: bool,
    /// Stroke and marker styling.
    pub style: RenderStyle,
}

impl Default for SvgOptions<'_> {
    fn default() -> Self {
        Self {
            scale: 1.0,
            show_original: false,
            original_href: None,
            show_cells: true,
            show_voronoi: true,
            show_seeds: false,
            style: RenderStyle::default(),
        }
    }
}

/// Maps source pixel coordinates into output coordinates.
#[derive(Debug, Clone, Copy)]
struct Transform {
    sx: f64,
    sy: f64,
}

impl Transform {
    fn new(dimensions: Dimensions, width: f64, height: f64) -> Self {
        let sx = if dimensions.width == 0 {
            1.0
        } else {
            width / f64::from(dimensions.width)
        };
        let sy = if dimensions.height == 0 {
            1.0
        } else {
            height / f64::from(dimensions.height)
        };
        Self { sx, sy }
    }

    fn apply(self, p: Point) -> (f64, f64) {
        (p.x * self.sx, p.y * self.sy)
    }

    fn style_scale(self) -> f64 {
        self.sx.min(self.sy)
    }
}

/// CSS `rgb()` fill for a cell color.
fn fill_color(color: CellColor) -> String {
    format!("rgb({}, {}, {})", color.r, color.g, color.b)
}

fn fill_opacity(color: CellColor) -> f64 {
    f64::from(color.a) / 255.0
}

/// Build a `points` attribute: `x,y` pairs separated by spaces.
fn polygon_points(points: &[Point], transform: Transform) -> String {
    points
        .iter()
        .map(|&p| {
            let (x, y) = transform.apply(p);
            format!("{x},{y}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the `d` attribute for a set of closed rings.
///
/// Each ring becomes `M` to its first vertex, `L` to the rest and a
/// closing `z`. Rings with fewer than three vertices are skipped;
/// returns an empty string if none remain.
fn ring_path_data(rings: &[&[Point]], transform: Transform) -> String {
    let mut data = Data::new();
    let mut any = false;
    for ring in rings.iter().filter(|r| r.len() >= 3) {
        data = data.move_to(transform.apply(ring[0]));
        for &p in &ring[1..] {
            data = data.line_to(transform.apply(p));
        }
        data = data.close();
        any = true;
    }
    if any {
        String::from(Value::from(data))
    } else {
        String::new()
    }
}

fn layer(id: &str) -> Group {
    Group::new().set("id", id)
}

fn cells_layer(render: &CellRenderResult, transform: Transform) -> Group {
    let mut group = layer("layer-cells");
    if let Some(merged) = &render.merged_optimized {
        for boundary in merged {
            let rings: Vec<&[Point]> = boundary.rings.iter().map(|r| r.points()).collect();
            let d = ring_path_data(&rings, transform);
            if d.is_empty() {
                continue;
            }
            group.append(
                Path::new()
                    .set("d", d)
                    .set("fill", fill_color(boundary.color))
                    .set("fill-opacity", fill_opacity(boundary.color))
                    .set("fill-rule", "evenodd")
                    .set("stroke", "none"),
            );
        }
        return group;
    }

    for (polygon, &color) in render.polygons.iter().zip(&render.colors) {
        if polygon.len() < 3 {
            continue;
        }
        group.append(
            svg::node::element::Polygon::new()
                .set("points", polygon_points(polygon.points(), transform))
                .set("fill", fill_color(color))
                .set("fill-opacity", fill_opacity(color))
                .set("stroke", "none"),
        );
    }
    group
}

fn edges_layer(output: &PipelineOutput, style: &RenderStyle, transform: Transform) -> Group {
    let mut group = layer("layer-edges");
    let width =
        fraction_to_px(style.voronoi_line_width, output.dimensions) * transform.style_scale();
    for polygon in &output.cell_polygons {
        if polygon.len() < 3 {
            continue;
        }
        group.append(
            svg::node::element::Polygon::new()
                .set("points", polygon_points(polygon.points(), transform))
                .set("fill", "none")
                .set("stroke", style.voronoi_line_color.as_str())
                .set("stroke-width", width),
        );
    }
    group
}

fn seeds_layer(output: &PipelineOutput, style: &RenderStyle, transform: Transform) -> Group {
    let mut group = layer("layer-seeds");
    let radius = fraction_to_px(style.seed_radius, output.dimensions) * transform.style_scale();
    for &seed in &output.seeds_px {
        let (cx, cy) = transform.apply(seed);
        group.append(
            Circle::new()
                .set("cx", cx)
                .set("cy", cy)
                .set("r", radius)
                .set("fill", style.seed_color.as_str()),
        );
    }
    group
}

/// Serialize a mosaic to an SVG document string.
///
/// The document is `width * scale` by `height * scale` with a matching
/// `viewBox`; every coordinate is scaled per axis and stroke widths and
/// radii by the smaller of the two axis factors.
///
/// With merged boundaries present in `render`, the cells layer draws
/// `render.merged_optimized`; otherwise it draws the kept cells. The
/// edges layer always outlines every cell of `output`, whether or not
/// it was kept.
#[must_use]
pub fn to_svg(
    output: &PipelineOutput,
    render: &CellRenderResult,
    options: &SvgOptions<'_>,
    metadata: &SvgMetadata<'_>,
) -> String {
    let scale = if options.scale.is_finite() && options.scale > 0.0 {
        options.scale
    } else {
        1.0
    };
    let width = f64::from(output.dimensions.width) * scale;
    let height = f64::from(output.dimensions.height) * scale;
    let transform = Transform::new(output.dimensions, width, height);

    let mut doc = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", format!("0 0 {width} {height}"));

    // Optional <title> element
    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    // Optional <desc> element
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    // Optional <metadata> element with structured pipeline config
    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("mosaic:pipeline");
        pipeline_el.assign("xmlns:mosaic", METADATA_NAMESPACE);
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    let mut original = layer("layer-original");
    if options.show_original {
        if let Some(href) = options.original_href {
            original.append(
                Image::new()
                    .set("href", href)
                    .set("x", 0)
                    .set("y", 0)
                    .set("width", width)
                    .set("height", height)
                    .set("preserveAspectRatio", "none"),
            );
        }
    }
    doc = doc.add(original);

    doc = doc.add(if options.show_cells {
        cells_layer(render, transform)
    } else {
        layer("layer-cells")
    });

    doc = doc.add(if options.show_voronoi {
        edges_layer(output, &options.style, transform)
    } else {
        layer("layer-edges")
    });

    doc = doc.add(if options.show_seeds {
        seeds_layer(output, &options.style, transform)
    } else {
        layer("layer-seeds")
    });

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
