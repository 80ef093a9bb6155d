//! Silhouette extraction from binary images.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use nalgebra::Point2;

/// Boundary points of the outer contour with the most points.
///
/// Only outer borders are considered; hole borders inside a silhouette are
/// ignored. Ties keep the first contour in scan order. Returns `None` for an
/// image without foreground pixels.
pub fn largest_outer_contour(binary: &GrayImage) -> Option<Vec<Point2<f64>>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer))
        .reduce(|best, c| {
            if c.points.len() > best.points.len() {
                c
            } else {
                best
            }
        })
        .map(|c| {
            c.points
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect()
        })
}

/// Area enclosed by a closed polygon (shoelace formula).
pub fn polygon_area(points: &[Point2<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice.abs() / 2.0
}
