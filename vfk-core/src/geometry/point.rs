//! Point construction from coordinate columns.

use geo::{Point, point};

use crate::value::PropertyValue;

/// Build a point from the raw `SOURADNICE_X` and `SOURADNICE_Y` values.
///
/// The source stores both axes negated and swapped, so the result is
/// `(-SOURADNICE_Y, -SOURADNICE_X)`. Missing or non-finite values yield
/// `None`.
///
/// ```
/// use geo::point;
/// use vfk_core::PropertyValue;
/// use vfk_core::geometry::point_from_columns;
///
/// let point = point_from_columns(
///     &PropertyValue::Real(500_000.0),
///     &PropertyValue::Real(-1_000_000.0),
/// );
/// assert_eq!(point, Some(point! { x: 1_000_000.0, y: -500_000.0 }));
/// ```
#[must_use]
pub fn point_from_columns(souradnice_x: &PropertyValue, souradnice_y: &PropertyValue) -> Option<Point<f64>> {
    let x = souradnice_x.as_f64().filter(|value| value.is_finite())?;
    let y = souradnice_y.as_f64().filter(|value| value.is_finite())?;
    Some(point! { x: -y, y: -x })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PropertyValue::Null, PropertyValue::Real(1.0))]
    #[case(PropertyValue::Real(1.0), PropertyValue::Null)]
    #[case(PropertyValue::Real(f64::NAN), PropertyValue::Real(1.0))]
    #[case(PropertyValue::Real(1.0), PropertyValue::Real(f64::INFINITY))]
    fn rejects_missing_or_non_finite(#[case] x: PropertyValue, #[case] y: PropertyValue) {
        assert_eq!(point_from_columns(&x, &y), None);
    }

    #[rstest]
    fn accepts_integer_columns() {
        let point = point_from_columns(&PropertyValue::Integer(2), &PropertyValue::Integer(3));
        assert_eq!(point, Some(point! { x: -3.0, y: -2.0 }));
    }
}
