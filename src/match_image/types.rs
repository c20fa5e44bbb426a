//! Match result value types

use serde::Serialize;

/// Axis-aligned pixel rectangle in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

/// One template-matching hit. Immutable once produced.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MatchResult {
    /// Normalized correlation score at this location.
    pub confidence: f32,
    /// Top-left corner in source coordinates.
    pub x: u32,
    pub y: u32,
    /// Template dimensions.
    pub w: u32,
    pub h: u32,
}

impl MatchResult {
    pub fn new(confidence: f32, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            confidence,
            x,
            y,
            w,
            h,
        }
    }

    /// Center of the matched rectangle.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

/// Ordered collection of matching hits, insertion order = discovery order.
///
/// Overlapping hits are legal; callers needing a single best hit reduce
/// explicitly via [`MatchResultList::max`].
#[derive(Debug, Clone, Default)]
pub struct MatchResultList {
    results: Vec<MatchResult>,
}

impl MatchResultList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: MatchResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchResult> {
        self.results.iter()
    }

    /// The maximum-confidence entry, if any.
    pub fn max(&self) -> Option<&MatchResult> {
        self.results.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Results whose center falls inside `rect`.
    pub fn in_rect(&self, rect: &Rect) -> MatchResultList {
        let results = self
            .results
            .iter()
            .filter(|r| {
                let (cx, cy) = r.center();
                rect.contains(cx, cy)
            })
            .copied()
            .collect();
        Self { results }
    }
}

impl<'a> IntoIterator for &'a MatchResultList {
    type Item = &'a MatchResult;
    type IntoIter = std::slice::Iter<'a, MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

impl FromIterator<MatchResult> for MatchResultList {
    fn from_iter<T: IntoIterator<Item = MatchResult>>(iter: T) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}
