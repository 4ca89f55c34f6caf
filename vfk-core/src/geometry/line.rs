//! Line construction for point chains.
//!
//! `PARAMETRY_SPOJENI` decides how the chain's points become a line:
//! straight segments, a curve drawn through the points, or a circle or arc
//! that is stroked into segments no wider than [`MAX_STROKE_STEP_DEGREES`].

use std::f64::consts::TAU;

use geo::{Coord, LineString};
use log::debug;
use thiserror::Error;

/// Largest angular step used when stroking arcs and circles.
pub const MAX_STROKE_STEP_DEGREES: f64 = 2.0;

/// Shape of a chain, read from `PARAMETRY_SPOJENI`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSubKind {
    /// Straight segments between consecutive points.
    Straight,
    /// Curve through the points, kept as a polyline (`11`).
    Curve,
    /// Full circle through three points (`15`).
    CircleThroughPoints,
    /// Arc from the first to the third point via the second (`16`).
    ArcThroughPoints,
    /// Circle around a single centre point (`15 <radius>`).
    CircleWithRadius(f64),
}

/// Reasons a chain cannot become a line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineError {
    /// Fewer points than the shape needs.
    #[error("{kind} needs at least {needed} points, found {found}")]
    TooFewPoints {
        /// Shape label.
        kind: &'static str,
        /// Minimum point count.
        needed: usize,
        /// Supplied point count.
        found: usize,
    },
    /// Point count does not match a fixed-size shape.
    #[error("{kind} needs exactly {needed} points, found {found}")]
    WrongPointCount {
        /// Shape label.
        kind: &'static str,
        /// Required point count.
        needed: usize,
        /// Supplied point count.
        found: usize,
    },
    /// The three points of a circle or arc lie on one line.
    #[error("points of {kind} are collinear")]
    Collinear {
        /// Shape label.
        kind: &'static str,
    },
    /// The radius is missing, zero, negative or not a number.
    #[error("invalid circle radius {text:?}")]
    InvalidRadius {
        /// Radius text as found in the source.
        text: String,
    },
}

impl LineSubKind {
    /// Interpret a `PARAMETRY_SPOJENI` value; absent or unknown codes mean a
    /// straight line.
    pub fn parse(parameters: Option<&str>) -> Result<Self, LineError> {
        let Some(text) = parameters.map(str::trim).filter(|text| !text.is_empty()) else {
            return Ok(Self::Straight);
        };
        let mut parts = text.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("11"), None) => Ok(Self::Curve),
            (Some("15"), None) => Ok(Self::CircleThroughPoints),
            (Some("16"), None) => Ok(Self::ArcThroughPoints),
            (Some("15"), Some(radius)) => radius
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value > 0.0)
                .map(Self::CircleWithRadius)
                .ok_or_else(|| LineError::InvalidRadius {
                    text: radius.to_owned(),
                }),
            _ => {
                debug!("unknown line parameters {text:?}; treating chain as straight");
                Ok(Self::Straight)
            }
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Straight => "straight line",
            Self::Curve => "curve",
            Self::CircleThroughPoints => "circle",
            Self::ArcThroughPoints => "arc",
            Self::CircleWithRadius(_) => "circle by radius",
        }
    }
}

/// Build the line for a chain of points.
pub fn build_line(kind: LineSubKind, points: &[Coord<f64>]) -> Result<LineString<f64>, LineError> {
    match kind {
        LineSubKind::Straight | LineSubKind::Curve => {
            if points.len() < 2 {
                return Err(LineError::TooFewPoints {
                    kind: kind.label(),
                    needed: 2,
                    found: points.len(),
                });
            }
            if kind == LineSubKind::Straight && points.len() > 2 {
                debug!("straight chain has {} points", points.len());
            }
            Ok(LineString::from(points.to_vec()))
        }
        LineSubKind::CircleThroughPoints | LineSubKind::ArcThroughPoints => {
            let [start, middle, end] = points else {
                return Err(LineError::WrongPointCount {
                    kind: kind.label(),
                    needed: 3,
                    found: points.len(),
                });
            };
            let centre = circumcentre(*start, *middle, *end).ok_or(LineError::Collinear {
                kind: kind.label(),
            })?;
            if kind == LineSubKind::CircleThroughPoints {
                Ok(stroke_circle(centre, *start))
            } else {
                Ok(stroke_arc(centre, *start, *middle, *end))
            }
        }
        LineSubKind::CircleWithRadius(radius) => {
            let [centre] = points else {
                return Err(LineError::WrongPointCount {
                    kind: kind.label(),
                    needed: 1,
                    found: points.len(),
                });
            };
            let start = Coord {
                x: centre.x + radius,
                y: centre.y,
            };
            Ok(stroke_circle(*centre, start))
        }
    }
}

fn circumcentre(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Option<Coord<f64>> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() <= f64::EPSILON {
        return None;
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let centre = Coord {
        x: (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        y: (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    };
    (centre.x.is_finite() && centre.y.is_finite()).then_some(centre)
}

fn angle_of(centre: Coord<f64>, point: Coord<f64>) -> f64 {
    (point.y - centre.y).atan2(point.x - centre.x)
}

fn segment_count(sweep: f64) -> usize {
    let step = MAX_STROKE_STEP_DEGREES.to_radians();
    // Absorb rounding so a half circle is exactly 90 steps, not 91.
    ((sweep.abs() / step - 1e-9).ceil() as usize).max(2)
}

/// Points strictly between `start_angle` and `start_angle + sweep`.
fn interior_points(centre: Coord<f64>, radius: f64, start_angle: f64, sweep: f64) -> Vec<Coord<f64>> {
    let segments = segment_count(sweep);
    (1..segments)
        .map(|step| {
            let angle = start_angle + sweep * (step as f64) / (segments as f64);
            Coord {
                x: centre.x + radius * angle.cos(),
                y: centre.y + radius * angle.sin(),
            }
        })
        .collect()
}

fn stroke_circle(centre: Coord<f64>, start: Coord<f64>) -> LineString<f64> {
    let radius = (start.x - centre.x).hypot(start.y - centre.y);
    let mut coords = vec![start];
    coords.extend(interior_points(centre, radius, angle_of(centre, start), TAU));
    coords.push(start);
    LineString::from(coords)
}

fn stroke_arc(centre: Coord<f64>, start: Coord<f64>, middle: Coord<f64>, end: Coord<f64>) -> LineString<f64> {
    let radius = (start.x - centre.x).hypot(start.y - centre.y);
    let start_angle = angle_of(centre, start);
    let to_end = (angle_of(centre, end) - start_angle).rem_euclid(TAU);
    let to_middle = (angle_of(centre, middle) - start_angle).rem_euclid(TAU);
    // Counter-clockwise when the middle point is met before the end.
    let sweep = if to_middle <= to_end { to_end } else { to_end - TAU };
    let mut coords = vec![start];
    coords.extend(interior_points(centre, radius, start_angle, sweep));
    coords.push(end);
    LineString::from(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn coords(points: &[(f64, f64)]) -> Vec<Coord<f64>> {
        points.iter().map(|&(x, y)| Coord { x, y }).collect()
    }

    #[rstest]
    #[case(None, LineSubKind::Straight)]
    #[case(Some(""), LineSubKind::Straight)]
    #[case(Some("11"), LineSubKind::Curve)]
    #[case(Some("15"), LineSubKind::CircleThroughPoints)]
    #[case(Some("16"), LineSubKind::ArcThroughPoints)]
    #[case(Some("15 2.5"), LineSubKind::CircleWithRadius(2.5))]
    #[case(Some("99"), LineSubKind::Straight)]
    fn parses_parameters(#[case] text: Option<&str>, #[case] expected: LineSubKind) {
        assert_eq!(LineSubKind::parse(text), Ok(expected));
    }

    #[rstest]
    #[case("15 abc")]
    #[case("15 -1")]
    fn rejects_bad_radius(#[case] text: &str) {
        assert!(matches!(
            LineSubKind::parse(Some(text)),
            Err(LineError::InvalidRadius { .. })
        ));
    }

    #[rstest]
    fn straight_line_keeps_points_in_order() {
        let points = coords(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let line = build_line(LineSubKind::Straight, &points).expect("valid line");
        assert_eq!(line.0, points);
    }

    #[rstest]
    #[case(LineSubKind::Straight, 1)]
    #[case(LineSubKind::Curve, 0)]
    fn short_chains_are_rejected(#[case] kind: LineSubKind, #[case] count: usize) {
        let points = coords(&[(0.0, 0.0)]);
        let result = build_line(kind, points.get(..count).unwrap_or_default());
        assert!(matches!(result, Err(LineError::TooFewPoints { .. })));
    }

    #[rstest]
    fn arc_keeps_exact_endpoints_and_passes_the_middle_side() {
        let points = coords(&[(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0)]);
        let line = build_line(LineSubKind::ArcThroughPoints, &points).expect("valid arc");
        assert_eq!(line.0.first(), points.first());
        assert_eq!(line.0.last(), points.last());
        assert!(line.0.iter().all(|coord| coord.y >= -1e-9));
        // A half circle at two degrees per step.
        assert_eq!(line.0.len(), 91);
    }

    #[rstest]
    fn clockwise_arc_sweeps_the_other_way() {
        let points = coords(&[(-1.0, 0.0), (0.0, 1.0), (1.0, 0.0)]);
        let line = build_line(LineSubKind::ArcThroughPoints, &points).expect("valid arc");
        assert!(line.0.iter().all(|coord| coord.y >= -1e-9));
    }

    #[rstest]
    fn circle_is_closed() {
        let points = coords(&[(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0)]);
        let line = build_line(LineSubKind::CircleThroughPoints, &points).expect("valid circle");
        assert!(line.is_closed());
        assert_eq!(line.0.len(), 181);
    }

    #[rstest]
    fn radius_circle_needs_one_point() {
        let points = coords(&[(0.0, 0.0), (1.0, 1.0)]);
        assert!(matches!(
            build_line(LineSubKind::CircleWithRadius(1.0), &points),
            Err(LineError::WrongPointCount { needed: 1, .. })
        ));
        let centre = coords(&[(5.0, 5.0)]);
        let circle = build_line(LineSubKind::CircleWithRadius(2.0), &centre).expect("valid");
        assert!(circle.is_closed());
        assert_eq!(circle.0.first(), Some(&Coord { x: 7.0, y: 5.0 }));
    }

    #[rstest]
    fn collinear_arc_is_rejected() {
        let points = coords(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(
            build_line(LineSubKind::ArcThroughPoints, &points),
            Err(LineError::Collinear { kind: "arc" })
        );
    }
}
