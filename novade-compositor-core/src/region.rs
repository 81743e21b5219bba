//! Manages regions, which are collections of rectangles used for defining
//! areas like damage, input, or opaque regions for surfaces.

use std::sync::atomic::{AtomicU64, Ordering};

/// Represents a unique identifier for a protocol-level region object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(u64);

impl RegionId {
    /// Creates a new, unique `RegionId`.
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        RegionId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An axis-aligned rectangle in surface or output coordinates.
///
/// A rectangle with a non-positive width or height is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    /// The plane used for "unbounded" regions. Its edges stay well inside `i32`, so
    /// arithmetic on it never saturates.
    pub const INFINITE: Rectangle =
        Rectangle { x: i32::MIN / 2, y: i32::MIN / 2, width: i32::MAX, height: i32::MAX };

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            i64::from(self.width) * i64::from(self.height)
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        !self.is_empty() && x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    /// The overlapping part of two rectangles, or `None` if they do not overlap.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        (x1 < x2 && y1 < y2).then(|| Self::from_edges(x1, y1, x2, y2))
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy), self.width, self.height)
    }

    fn from_edges(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        let span = |a: i32, b: i32| i32::try_from(i64::from(b) - i64::from(a)).unwrap_or(i32::MAX);
        Self::new(x1, y1, span(x1, x2), span(y1, y2))
    }

    /// `self` minus `cut`, as up to four disjoint pieces.
    fn subtract(&self, cut: &Self, out: &mut Vec<Rectangle>) {
        let Some(hole) = self.intersection(cut) else {
            if !self.is_empty() {
                out.push(*self);
            }
            return;
        };
        let (x1, y1, x2, y2) = (self.x, self.y, self.right(), self.bottom());
        let (hx1, hy1, hx2, hy2) = (hole.x, hole.y, hole.right(), hole.bottom());
        if y1 < hy1 {
            out.push(Self::from_edges(x1, y1, x2, hy1));
        }
        if hy2 < y2 {
            out.push(Self::from_edges(x1, hy2, x2, y2));
        }
        if x1 < hx1 {
            out.push(Self::from_edges(x1, hy1, hx1, hy2));
        }
        if hx2 < x2 {
            out.push(Self::from_edges(hx2, hy1, x2, hy2));
        }
    }

    /// The union of two rectangles if it is itself exactly a rectangle.
    fn merge_adjacent(&self, other: &Self) -> Option<Self> {
        if self.x == other.x && self.width == other.width {
            if self.bottom() == other.y {
                return Some(Self::from_edges(self.x, self.y, self.right(), other.bottom()));
            }
            if other.bottom() == self.y {
                return Some(Self::from_edges(self.x, other.y, self.right(), self.bottom()));
            }
        }
        if self.y == other.y && self.height == other.height {
            if self.right() == other.x {
                return Some(Self::from_edges(self.x, self.y, other.right(), self.bottom()));
            }
            if other.right() == self.x {
                return Some(Self::from_edges(other.x, self.y, self.right(), self.bottom()));
            }
        }
        None
    }
}

/// Represents a region as a collection of non-overlapping rectangles.
///
/// Every operation keeps the rectangles disjoint and coalesces neighbours that form a
/// single larger rectangle, so boolean operations stay correct for arbitrary input
/// sequences. Equality compares covered area, not the particular decomposition.
#[derive(Debug, Clone, Default)]
pub struct Region {
    rectangles: Vec<Rectangle>,
}

impl Region {
    /// Creates a new, empty `Region`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A region covering the whole plane.
    pub fn infinite() -> Self {
        Self { rectangles: vec![Rectangle::INFINITE] }
    }

    pub fn from_rect(x: i32, y: i32, width: i32, height: i32) -> Self {
        let mut region = Self::new();
        region.union_rect(x, y, width, height);
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rectangles.is_empty()
    }

    /// The disjoint rectangles making up this region.
    pub fn rects(&self) -> &[Rectangle] {
        &self.rectangles
    }

    /// Total covered area.
    pub fn area(&self) -> i64 {
        self.rectangles.iter().map(Rectangle::area).sum()
    }

    /// Smallest rectangle containing the region; empty for an empty region.
    pub fn extents(&self) -> Rectangle {
        let mut iter = self.rectangles.iter();
        let Some(first) = iter.next() else {
            return Rectangle::default();
        };
        let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.right(), first.bottom());
        for rect in iter {
            x1 = x1.min(rect.x);
            y1 = y1.min(rect.y);
            x2 = x2.max(rect.right());
            y2 = y2.max(rect.bottom());
        }
        Rectangle::from_edges(x1, y1, x2, y2)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.rectangles.iter().any(|rect| rect.contains(x, y))
    }

    /// Clears all rectangles from the region, making it empty.
    pub fn clear(&mut self) {
        self.rectangles.clear();
    }

    /// Replaces the contents of this region with a copy of `src`.
    pub fn copy_from(&mut self, src: &Region) {
        self.rectangles.clone_from(&src.rectangles);
    }

    /// Adds a rectangle to the region. Empty rectangles are ignored.
    pub fn union_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let rect = Rectangle::new(x, y, width, height);
        if rect.is_empty() {
            return;
        }
        self.add_uncovered(rect);
        self.normalize();
    }

    /// Removes a rectangle from the region. Empty rectangles are ignored.
    pub fn subtract_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let cut = Rectangle::new(x, y, width, height);
        if cut.is_empty() || self.rectangles.is_empty() {
            return;
        }
        let mut pieces = Vec::with_capacity(self.rectangles.len() + 3);
        for rect in &self.rectangles {
            rect.subtract(&cut, &mut pieces);
        }
        self.rectangles = pieces;
        self.normalize();
    }

    /// Keeps only the part of the region inside the rectangle. Intersecting with an
    /// empty rectangle clears the region.
    pub fn intersect_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let clip = Rectangle::new(x, y, width, height);
        self.rectangles = self.rectangles.iter().filter_map(|rect| rect.intersection(&clip)).collect();
        self.normalize();
    }

    pub fn union(&mut self, other: &Region) {
        for rect in &other.rectangles {
            self.add_uncovered(*rect);
        }
        self.normalize();
    }

    pub fn subtract(&mut self, other: &Region) {
        for rect in &other.rectangles {
            self.subtract_rect(rect.x, rect.y, rect.width, rect.height);
        }
    }

    pub fn intersect(&mut self, other: &Region) {
        let mut pieces = Vec::new();
        for rect in &self.rectangles {
            pieces.extend(other.rectangles.iter().filter_map(|o| rect.intersection(o)));
        }
        self.rectangles = pieces;
        self.normalize();
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        for rect in &mut self.rectangles {
            *rect = rect.translate(dx, dy);
        }
    }

    /// Appends the parts of `rect` not already covered.
    fn add_uncovered(&mut self, rect: Rectangle) {
        let mut pieces = vec![rect];
        for existing in &self.rectangles {
            if pieces.is_empty() {
                return;
            }
            let mut remaining = Vec::with_capacity(pieces.len());
            for piece in &pieces {
                piece.subtract(existing, &mut remaining);
            }
            pieces = remaining;
        }
        self.rectangles.extend(pieces);
    }

    fn normalize(&mut self) {
        self.rectangles.retain(|rect| !rect.is_empty());
        'scan: loop {
            for i in 0..self.rectangles.len() {
                for j in (i + 1)..self.rectangles.len() {
                    if let Some(merged) = self.rectangles[i].merge_adjacent(&self.rectangles[j]) {
                        self.rectangles[i] = merged;
                        self.rectangles.swap_remove(j);
                        continue 'scan;
                    }
                }
            }
            break;
        }
        self.rectangles.sort_by_key(|rect| (rect.y, rect.x));
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        let area = self.area();
        if area != other.area() {
            return false;
        }
        // Both decompositions are disjoint, so pairwise overlaps never double count.
        let shared: i64 = self
            .rectangles
            .iter()
            .flat_map(|a| other.rectangles.iter().filter_map(move |b| a.intersection(b)))
            .map(|rect| rect.area())
            .sum();
        shared == area
    }
}

impl Eq for Region {}
