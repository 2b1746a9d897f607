// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Planar geometry primitives shared by every coordinate space, plus the
// quadratic stroke smoother used by pen capture and the signature pad.

use serde::{Deserialize, Serialize};

/// A point in whichever space the caller is working in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Approximate equality within `tolerance` on each axis.
    pub fn approx_eq(self, other: Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// Axis-aligned rectangle with a top-left origin (y grows downwards).
///
/// Constructors always normalise so that `left <= right` and
/// `top <= bottom`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    /// Bounding box of two corners given in any order.
    pub fn from_points(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    /// Degenerate rect sitting on a single point.
    pub fn at(p: Point) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    /// Bounding box of a point sequence, or `None` when it is empty.
    pub fn bounding(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Rect::at(first), |r, p| r.including(p)))
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right, self.bottom)
    }

    pub fn center(&self) -> Point {
        self.top_left().midpoint(self.bottom_right())
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    /// Smallest rect containing both `self` and `p`.
    pub fn including(&self, p: Point) -> Rect {
        Rect {
            left: self.left.min(p.x),
            top: self.top.min(p.y),
            right: self.right.max(p.x),
            bottom: self.bottom.max(p.y),
        }
    }

    /// Grow on every side by `amount`.
    pub fn inflate(&self, amount: f64) -> Rect {
        Rect::new(
            self.left - amount,
            self.top - amount,
            self.right + amount,
            self.bottom + amount,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.top_left().is_finite() && self.bottom_right().is_finite()
    }

    pub fn approx_eq(&self, other: &Rect, tolerance: f64) -> bool {
        self.top_left().approx_eq(other.top_left(), tolerance)
            && self.bottom_right().approx_eq(other.bottom_right(), tolerance)
    }
}

// -- Stroke smoothing ---------------------------------------------------------

/// Builds a smoothed polyline from raw pointer samples.
///
/// Each new sample closes a quadratic Bézier segment whose control point is
/// the previous sample and whose end point is the midpoint between the two
/// latest samples. The curve is flattened into `steps` points per segment.
#[derive(Debug, Clone)]
pub struct StrokeSmoother {
    points: Vec<Point>,
    last_sample: Option<Point>,
    samples: usize,
    steps: usize,
}

impl StrokeSmoother {
    pub fn new(steps: usize) -> Self {
        Self {
            points: Vec::new(),
            last_sample: None,
            samples: 0,
            steps: steps.max(1),
        }
    }

    /// Feed one raw sample.
    pub fn push(&mut self, sample: Point) {
        self.samples += 1;
        let Some(control) = self.last_sample else {
            self.points.push(sample);
            self.last_sample = Some(sample);
            return;
        };
        let start = self.points.last().copied().unwrap_or(control);
        let end = control.midpoint(sample);
        for i in 1..=self.steps {
            let t = i as f64 / self.steps as f64;
            self.points.push(quadratic(start, control, end, t));
        }
        self.last_sample = Some(sample);
    }

    /// Number of raw samples pushed so far.
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// Smoothed points so far (without the trailing half-segment).
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Close the stroke by running a straight segment to the final sample.
    pub fn finish(mut self) -> Vec<Point> {
        let tail = self
            .last_sample
            .filter(|last| self.points.last() != Some(last));
        if let Some(last) = tail {
            self.points.push(last);
        }
        self.points
    }
}

fn quadratic(p0: Point, p1: Point, p2: Point, t: f64) -> Point {
    let u = 1.0 - t;
    Point::new(
        u * u * p0.x + 2.0 * u * t * p1.x + t * t * p2.x,
        u * u * p0.y + 2.0 * u * t * p1.y + t * t * p2.y,
    )
}
