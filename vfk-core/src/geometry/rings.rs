//! Polygon ring assembly from an unordered pool of boundary lines.
//!
//! Lines are joined end to end by exact vertex equality. Each ring grows at
//! its end first and at its start second until it closes. The largest closed
//! ring becomes the exterior and the remaining ones become holes.

use std::collections::{HashMap, VecDeque};

use geo::{Area, Coord, LineString, Polygon};
use thiserror::Error;

/// Why a pool of lines did not form a polygon.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// The pool was empty.
    #[error("no lines to assemble")]
    NoLines,
    /// At least one ring could not be closed, or none was built.
    #[error("lines do not form closed rings ({open} left open)")]
    NoRings {
        /// Rings that could not be closed.
        open: usize,
    },
    /// The polygon does not account for every closed ring.
    #[error("polygon uses {built} rings but {expected} were assembled")]
    Inconsistent {
        /// Closed rings excluding bridges.
        expected: usize,
        /// Exterior plus holes of the built polygon.
        built: usize,
    },
}

/// Rings found in a pool of lines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RingAssembly {
    /// Closed rings with at least three distinct vertices, in build order.
    pub closed: Vec<LineString<f64>>,
    /// Closed rings dropped for having at most two distinct vertices.
    pub bridges: usize,
    /// Rings nothing could extend, as far as they grew.
    pub open: Vec<LineString<f64>>,
}

/// Exact vertex identity; `-0.0` and `0.0` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey(u64, u64);

impl From<Coord<f64>> for VertexKey {
    fn from(coord: Coord<f64>) -> Self {
        Self(normalise(coord.x), normalise(coord.y))
    }
}

fn normalise(value: f64) -> u64 {
    if value == 0.0 { 0.0_f64.to_bits() } else { value.to_bits() }
}

/// Both endpoints of every line, mapped to the lines that touch them.
struct EndpointIndex {
    by_vertex: HashMap<VertexKey, Vec<usize>>,
}

impl EndpointIndex {
    fn new(lines: &[&[Coord<f64>]]) -> Self {
        let mut by_vertex: HashMap<VertexKey, Vec<usize>> = HashMap::new();
        for (index, coords) in lines.iter().enumerate() {
            if let (Some(first), Some(last)) = (coords.first(), coords.last()) {
                by_vertex.entry((*first).into()).or_default().push(index);
                if first != last {
                    by_vertex.entry((*last).into()).or_default().push(index);
                }
            }
        }
        Self { by_vertex }
    }

    /// Lowest-index unused line touching `vertex`.
    fn take(&mut self, vertex: Coord<f64>, used: &mut [bool]) -> Option<usize> {
        let candidates = self.by_vertex.get_mut(&vertex.into())?;
        candidates.retain(|index| !used.get(*index).copied().unwrap_or(true));
        let found = *candidates.first()?;
        if let Some(flag) = used.get_mut(found) {
            *flag = true;
        }
        Some(found)
    }
}

/// Join `lines` into rings.
#[must_use]
pub fn assemble_rings(lines: &[LineString<f64>]) -> RingAssembly {
    let pool: Vec<&[Coord<f64>]> = lines
        .iter()
        .map(|line| line.0.as_slice())
        .filter(|coords| coords.len() >= 2)
        .collect();
    let mut used = vec![false; pool.len()];
    let mut index = EndpointIndex::new(&pool);
    let mut assembly = RingAssembly::default();

    for (seed, coords) in pool.iter().enumerate() {
        if used.get(seed).copied().unwrap_or(true) {
            continue;
        }
        if let Some(flag) = used.get_mut(seed) {
            *flag = true;
        }
        let mut ring: VecDeque<Coord<f64>> = coords.iter().copied().collect();

        while !is_closed(&ring) {
            let (Some(&start), Some(&end)) = (ring.front(), ring.back()) else {
                break;
            };
            if let Some(next) = index.take(end, &mut used) {
                append(&mut ring, pool.get(next).copied().unwrap_or_default(), end);
            } else if let Some(next) = index.take(start, &mut used) {
                prepend(&mut ring, pool.get(next).copied().unwrap_or_default(), start);
            } else {
                break;
            }
        }

        if !is_closed(&ring) {
            assembly.open.push(LineString::from(Vec::from(ring)));
        } else if distinct_vertices(&ring) <= 2 {
            assembly.bridges += 1;
        } else {
            assembly.closed.push(LineString::from(Vec::from(ring)));
        }
    }
    assembly
}

/// Join `lines` into a polygon; the largest ring is the exterior.
///
/// ```
/// use geo::{Area, LineString};
/// use vfk_core::assemble_polygon;
///
/// let square = [
///     LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
///     LineString::from(vec![(1.0, 1.0), (1.0, 0.0)]),
///     LineString::from(vec![(1.0, 1.0), (0.0, 1.0)]),
///     LineString::from(vec![(0.0, 1.0), (0.0, 0.0)]),
/// ];
/// let polygon = assemble_polygon(&square).expect("closed ring");
/// assert_eq!(polygon.unsigned_area(), 1.0);
/// assert!(polygon.interiors().is_empty());
/// ```
pub fn assemble_polygon(lines: &[LineString<f64>]) -> Result<Polygon<f64>, RingError> {
    if lines.is_empty() {
        return Err(RingError::NoLines);
    }
    let assembly = assemble_rings(lines);
    if !assembly.open.is_empty() || assembly.closed.is_empty() {
        return Err(RingError::NoRings {
            open: assembly.open.len(),
        });
    }

    let expected = assembly.closed.len();
    let mut exterior_at = 0;
    let mut largest = f64::NEG_INFINITY;
    for (position, ring) in assembly.closed.iter().enumerate() {
        let area = Polygon::new(ring.clone(), Vec::new()).unsigned_area();
        // Strictly greater keeps the first ring on ties.
        if area > largest {
            largest = area;
            exterior_at = position;
        }
    }

    let mut rings = assembly.closed;
    let exterior = rings.remove(exterior_at);
    let polygon = Polygon::new(exterior, rings);
    let built = 1 + polygon.interiors().len();
    if built == expected {
        Ok(polygon)
    } else {
        Err(RingError::Inconsistent { expected, built })
    }
}

fn is_closed(ring: &VecDeque<Coord<f64>>) -> bool {
    ring.len() > 1 && ring.front() == ring.back()
}

fn distinct_vertices(ring: &VecDeque<Coord<f64>>) -> usize {
    let mut seen: Vec<VertexKey> = Vec::new();
    for coord in ring {
        let key = VertexKey::from(*coord);
        if !seen.contains(&key) {
            seen.push(key);
            if seen.len() > 2 {
                break;
            }
        }
    }
    seen.len()
}

/// Extend the ring's end with `line`, which touches `end`.
fn append(ring: &mut VecDeque<Coord<f64>>, line: &[Coord<f64>], end: Coord<f64>) {
    if line.first().map(|c| VertexKey::from(*c)) == Some(end.into()) {
        ring.extend(line.iter().skip(1).copied());
    } else {
        ring.extend(line.iter().rev().skip(1).copied());
    }
}

/// Extend the ring's start with `line`, which touches `start`.
fn prepend(ring: &mut VecDeque<Coord<f64>>, line: &[Coord<f64>], start: Coord<f64>) {
    if line.last().map(|c| VertexKey::from(*c)) == Some(start.into()) {
        for coord in line.iter().rev().skip(1) {
            ring.push_front(*coord);
        }
    } else {
        for coord in line.iter().skip(1) {
            ring.push_front(*coord);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn line(points: &[(f64, f64)]) -> LineString<f64> {
        LineString::from(points.to_vec())
    }

    fn square(min: f64, max: f64) -> Vec<LineString<f64>> {
        vec![
            line(&[(min, min), (max, min)]),
            line(&[(max, max), (max, min)]),
            line(&[(max, max), (min, max)]),
            line(&[(min, max), (min, min)]),
        ]
    }

    #[rstest]
    fn unit_square_forms_one_ring() {
        let polygon = assemble_polygon(&square(0.0, 1.0)).expect("closed square");
        assert_eq!(polygon.exterior().0.len(), 5);
        assert!((polygon.unsigned_area() - 1.0).abs() < 1e-12);
        assert!(polygon.interiors().is_empty());
    }

    #[rstest]
    fn smaller_ring_becomes_a_hole() {
        let mut lines = square(4.5, 5.5);
        lines.extend(square(0.0, 10.0));
        let polygon = assemble_polygon(&lines).expect("outer and inner rings");
        assert!((Polygon::new(polygon.exterior().clone(), vec![]).unsigned_area() - 100.0).abs() < 1e-9);
        assert_eq!(polygon.interiors().len(), 1);
        let hole = polygon.interiors().first().expect("one hole");
        assert!((Polygon::new(hole.clone(), vec![]).unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[rstest]
    fn ring_grows_at_its_start_when_the_end_is_stuck() {
        // Seed line sits in the middle of an open chain.
        let lines = vec![
            line(&[(1.0, 0.0), (2.0, 0.0)]),
            line(&[(0.0, 0.0), (1.0, 0.0)]),
            line(&[(2.0, 0.0), (3.0, 0.0)]),
        ];
        let assembly = assemble_rings(&lines);
        assert!(assembly.closed.is_empty());
        assert_eq!(
            assembly.open,
            vec![line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)])]
        );
    }

    #[rstest]
    fn doubled_line_is_a_bridge() {
        let mut lines = square(0.0, 1.0);
        lines.push(line(&[(2.0, 2.0), (3.0, 3.0)]));
        lines.push(line(&[(3.0, 3.0), (2.0, 2.0)]));
        let assembly = assemble_rings(&lines);
        assert_eq!(assembly.bridges, 1);
        assert_eq!(assembly.closed.len(), 1);
        assert!(assemble_polygon(&lines).is_ok());
    }

    #[rstest]
    fn gap_fails_the_polygon() {
        let mut lines = square(0.0, 1.0);
        lines.pop();
        assert_eq!(assemble_polygon(&lines), Err(RingError::NoRings { open: 1 }));
    }

    #[rstest]
    fn empty_pool_has_no_lines() {
        assert_eq!(assemble_polygon(&[]), Err(RingError::NoLines));
    }

    #[rstest]
    fn equal_areas_keep_the_first_ring_as_exterior() {
        let mut lines = square(0.0, 1.0);
        lines.extend(square(5.0, 6.0));
        let polygon = assemble_polygon(&lines).expect("two rings");
        assert!(polygon.exterior().0.iter().all(|coord| coord.x <= 1.0));
    }

    #[rstest]
    fn closed_line_is_a_ring_on_its_own() {
        let ring = line(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 0.0)]);
        let polygon = assemble_polygon(&[ring]).expect("closed input");
        assert!((polygon.unsigned_area() - 2.0).abs() < 1e-12);
    }

    #[rstest]
    fn negative_zero_matches_zero() {
        let lines = vec![
            line(&[(-0.0, 0.0), (1.0, 0.0)]),
            line(&[(1.0, 0.0), (1.0, 1.0)]),
            line(&[(1.0, 1.0), (0.0, -0.0)]),
        ];
        assert_eq!(assemble_rings(&lines).closed.len(), 1);
    }
}
