// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Polygon scan fill.
//!
//! Pixels are sampled at their centres: pixel `(col, row)` is covered when
//! `(col + 0.5, row + 0.5)` lies inside the polygon under the even-odd rule.
//! Edge crossings use half-open intervals so shared edges between adjacent
//! polygons never cover a pixel twice or leave a gap, and an axis-aligned
//! rectangle with integer corners covers exactly `width × height` pixels.
//!
//! A polygon too thin or too small to contain any pixel centre is drawn by
//! its outline instead: every pixel an edge passes through is covered, so
//! small annotations never vanish from the label.

use super::BinaryMask;

/// Result of rasterizing all polygons of one annotation.
#[derive(Debug, Clone)]
pub struct PolygonRaster {
    /// Union of every accepted polygon.
    pub mask: BinaryMask,
    /// Polygons that were filled.
    pub filled: usize,
    /// Of the filled polygons, those covering no pixel centre that were
    /// drawn by their outline.
    pub outlined: usize,
    /// Polygons skipped for having fewer than 3 points or non-finite
    /// coordinates.
    pub rejected: usize,
    /// At least one vertex lay outside the canvas.
    pub clipped: bool,
}

/// Rasterize one flat `[x0, y0, x1, y1, ...]` polygon.
///
/// Returns `None` when the polygon has fewer than 3 points (6 coordinates)
/// or any non-finite coordinate. An odd trailing coordinate is ignored.
pub fn rasterize_polygon(coords: &[f64], height: u32, width: u32) -> Option<BinaryMask> {
    let points = to_points(coords)?;
    let mut mask = BinaryMask::new(height, width);
    if fill(&mut mask, &points) == 0 {
        outline(&mut mask, &points);
    }
    Some(mask)
}

/// Rasterize and union every polygon of an annotation.
pub fn rasterize_polygons(polygons: &[Vec<f64>], height: u32, width: u32) -> PolygonRaster {
    let mut mask = BinaryMask::new(height, width);
    let mut filled = 0;
    let mut outlined = 0;
    let mut rejected = 0;
    let mut clipped = false;

    for coords in polygons {
        match to_points(coords) {
            Some(points) => {
                clipped |= points.iter().any(|&(x, y)| {
                    x < 0.0 || y < 0.0 || x > width as f64 || y > height as f64
                });
                // Filling into the shared mask is a logical OR.
                if fill(&mut mask, &points) == 0 {
                    outline(&mut mask, &points);
                    outlined += 1;
                }
                filled += 1;
            }
            None => rejected += 1,
        }
    }

    PolygonRaster {
        mask,
        filled,
        outlined,
        rejected,
        clipped,
    }
}

fn to_points(coords: &[f64]) -> Option<Vec<(f64, f64)>> {
    if coords.len() < 6 || coords.iter().any(|c| !c.is_finite()) {
        return None;
    }
    Some(
        coords
            .chunks_exact(2)
            .map(|chunk| (chunk[0], chunk[1]))
            .collect(),
    )
}

/// Scan fill; returns the number of pixel centres inside the polygon.
fn fill(mask: &mut BinaryMask, points: &[(f64, f64)]) -> usize {
    let height = mask.height() as i64;
    let width = mask.width() as f64;
    if height == 0 || mask.width() == 0 {
        return 0;
    }

    let (min_y, max_y) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    // Rows whose centre falls within the vertical extent.
    let first_row = ((min_y - 0.5).ceil() as i64).max(0);
    let last_row = ((max_y - 0.5).floor() as i64).min(height - 1);

    let n = points.len();
    let mut covered = 0;
    let mut crossings = Vec::with_capacity(n);
    for row in first_row..=last_row {
        let yc = row as f64 + 0.5;
        crossings.clear();
        for i in 0..n {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            if (y0 <= yc) != (y1 <= yc) {
                crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks_exact(2) {
            // Columns whose centre lies in [pair[0], pair[1]).
            let start = (pair[0] - 0.5).ceil().clamp(0.0, width) as u32;
            let end = (pair[1] - 0.5).ceil().clamp(0.0, width) as u32;
            if start < end {
                mask.fill_span(row as u32, start, end);
                covered += (end - start) as usize;
            }
        }
    }
    covered
}

/// Cover every in-canvas pixel that some edge of the closed polygon passes
/// through, sampling each edge at quarter-pixel steps.
fn outline(mask: &mut BinaryMask, points: &[(f64, f64)]) {
    let (height, width) = (mask.height() as f64, mask.width() as f64);
    let n = points.len();
    for i in 0..n {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % n];
        let length = (x1 - x0).abs().max((y1 - y0).abs());
        // Clipping bounds the walk for edges that run far off the canvas.
        let steps = (length * 4.0).ceil().min(4.0 * (height + width)) as usize;
        for step in 0..=steps {
            let t = if steps == 0 {
                0.0
            } else {
                step as f64 / steps as f64
            };
            let x = (x0 + t * (x1 - x0)).floor();
            let y = (y0 + t * (y1 - y0)).floor();
            if x >= 0.0 && y >= 0.0 && x < width && y < height {
                mask.fill_span(y as u32, x as u32, x as u32 + 1);
            }
        }
    }
}
