//! Choropleth drawn on a ratatui canvas.
//!
//! Every cell of the map area is sampled at its geographic position and
//! painted with the fill of the topmost attached feature there. Pattern
//! fills alternate foreground and background in a checkerboard.

use ahash::AHashMap;
use geo::Rect as GeoRect;
use quality_core::{Fill, LayerManager, Rgb};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Points};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

const BOUNDS_PADDING: f64 = 0.02;
const BORDER_COLOR: Color = Color::DarkGray;
const HOVER_BORDER_COLOR: Color = Color::Yellow;

/// Geographic window shown in the map area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapViewport {
    west: f64,
    east: f64,
    south: f64,
    north: f64,
}

impl MapViewport {
    pub fn from_bounds(bounds: Option<GeoRect<f64>>) -> Self {
        let Some(bounds) = bounds else {
            return Self {
                west: 0.0,
                east: 1.0,
                south: 0.0,
                north: 1.0,
            };
        };
        let pad_x = (bounds.width() * BOUNDS_PADDING).max(1e-6);
        let pad_y = (bounds.height() * BOUNDS_PADDING).max(1e-6);
        Self {
            west: bounds.min().x - pad_x,
            east: bounds.max().x + pad_x,
            south: bounds.min().y - pad_y,
            north: bounds.max().y + pad_y,
        }
    }

    /// Geographic position of a terminal cell inside `area`, using the same
    /// grid the canvas paints on.
    pub fn cell_to_geo(&self, area: Rect, column: u16, row: u16) -> Option<(f64, f64)> {
        if area.width == 0 || area.height == 0 {
            return None;
        }
        if column < area.x
            || row < area.y
            || column >= area.x + area.width
            || row >= area.y + area.height
        {
            return None;
        }
        let x = axis_position(column - area.x, area.width);
        let y = axis_position(row - area.y, area.height);
        Some((
            self.west + x * (self.east - self.west),
            self.north - y * (self.north - self.south),
        ))
    }
}

fn axis_position(offset: u16, extent: u16) -> f64 {
    if extent <= 1 {
        0.5
    } else {
        f64::from(offset) / f64::from(extent - 1)
    }
}

pub fn rgb_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

fn cell_color(fill: Fill, column: u16, row: u16) -> Color {
    match fill {
        Fill::Solid(rgb) => rgb_color(rgb),
        Fill::Pattern(pattern) => {
            if (column + row) % 2 == 0 {
                rgb_color(pattern.foreground)
            } else {
                rgb_color(pattern.background)
            }
        }
    }
}

pub fn draw_map(
    frame: &mut Frame,
    area: Rect,
    layers: &LayerManager,
    viewport: &MapViewport,
    pointer: Option<(u16, u16)>,
    title: &str,
) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = block.inner(area);

    let mut cells: AHashMap<Color, Vec<(f64, f64)>> = AHashMap::new();
    for row in inner.y..inner.y + inner.height {
        for column in inner.x..inner.x + inner.width {
            let Some((lon, lat)) = viewport.cell_to_geo(inner, column, row) else {
                continue;
            };
            let Some(style) = layers
                .feature_at(lon, lat)
                .and_then(|key| layers.style(key))
            else {
                continue;
            };
            cells
                .entry(cell_color(style.fill, column, row))
                .or_default()
                .push((lon, lat));
        }
    }

    let mut borders: Vec<(CanvasLine, bool)> = Vec::new();
    for (feature, style) in layers.paint_order() {
        let Some(shape) = feature.shape() else {
            continue;
        };
        let color = if style.elevated {
            HOVER_BORDER_COLOR
        } else {
            BORDER_COLOR
        };
        for polygon in &shape.0 {
            for pair in polygon.exterior().0.windows(2) {
                borders.push((
                    CanvasLine {
                        x1: pair[0].x,
                        y1: pair[0].y,
                        x2: pair[1].x,
                        y2: pair[1].y,
                        color,
                    },
                    style.elevated,
                ));
            }
        }
    }

    let pointer_geo = pointer.and_then(|(column, row)| viewport.cell_to_geo(inner, column, row));

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Block)
        .x_bounds([viewport.west, viewport.east])
        .y_bounds([viewport.south, viewport.north])
        .paint(move |ctx| {
            for (color, coords) in &cells {
                ctx.draw(&Points {
                    coords,
                    color: *color,
                });
            }
            ctx.layer();
            // Emphasized outlines go last so they stay visible.
            for (line, _) in borders.iter().filter(|(_, elevated)| !elevated) {
                ctx.draw(line);
            }
            for (line, _) in borders.iter().filter(|(_, elevated)| *elevated) {
                ctx.draw(line);
            }
            if let Some((lon, lat)) = pointer_geo {
                ctx.print(
                    lon,
                    lat,
                    Span::styled("+", Style::default().fg(Color::White)),
                );
            }
        });
    frame.render_widget(canvas, area);
}
