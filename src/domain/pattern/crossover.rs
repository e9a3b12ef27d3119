//! Crossover detection between two aligned series, or a series and a level.
//!
//! The sign of `a − b` is tracked bar by bar. A cross is reported on the bar
//! where the sign differs from the last established sign. A zero difference
//! keeps the previous sign, so touching and backing off is not a cross. A NaN
//! on either side breaks continuity: the next defined bar establishes a fresh
//! sign without reporting.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CrossDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CrossKind {
    /// `a` moved over `b`.
    Golden,
    /// `a` moved under `b`.
    Death,
    /// A series crossed a fixed level.
    Custom(CrossDirection),
}

impl CrossKind {
    pub fn direction(self) -> CrossDirection {
        match self {
            CrossKind::Golden => CrossDirection::Up,
            CrossKind::Death => CrossDirection::Down,
            CrossKind::Custom(direction) => direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CrossEvent {
    pub index: usize,
    pub kind: CrossKind,
}

/// Per-bar cross direction of `a` against `b`, aligned with the inputs.
///
/// Only the overlapping prefix is compared when lengths differ.
pub fn cross_directions(a: &[f64], b: &[f64]) -> Vec<Option<CrossDirection>> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let mut sign: Option<bool> = None;

    for (&x, &y) in a.iter().zip(b) {
        let diff = x - y;
        if diff.is_nan() {
            sign = None;
            out.push(None);
            continue;
        }

        let current = if diff > 0.0 {
            Some(true)
        } else if diff < 0.0 {
            Some(false)
        } else {
            sign
        };

        let event = match (sign, current) {
            (Some(false), Some(true)) => Some(CrossDirection::Up),
            (Some(true), Some(false)) => Some(CrossDirection::Down),
            _ => None,
        };
        sign = current;
        out.push(event);
    }

    out
}

/// Golden and death crosses of `a` over/under `b`.
pub fn detect_crossovers(a: &[f64], b: &[f64]) -> Vec<CrossEvent> {
    cross_directions(a, b)
        .into_iter()
        .enumerate()
        .filter_map(|(index, direction)| {
            direction.map(|d| CrossEvent {
                index,
                kind: match d {
                    CrossDirection::Up => CrossKind::Golden,
                    CrossDirection::Down => CrossKind::Death,
                },
            })
        })
        .collect()
}

/// Crossings of `values` through a constant `level`, as `Custom` events.
pub fn detect_threshold_crossings(values: &[f64], level: f64) -> Vec<CrossEvent> {
    let levels = vec![level; values.len()];
    cross_directions(values, &levels)
        .into_iter()
        .enumerate()
        .filter_map(|(index, direction)| {
            direction.map(|d| CrossEvent {
                index,
                kind: CrossKind::Custom(d),
            })
        })
        .collect()
}
