use kurbo::Vec2;
use penplot_geom::{to_kurbo, Angle, FromKurbo as _, Point, Rotation};

/// A circular arc from the current position towards `target`.
///
/// The arc is given by its radius and the angle it sweeps out, rather than
/// by its center. The center sits at `radius` from the start point, in the
/// direction of half the included angle (on one side for clockwise arcs and
/// on the other side for counter-clockwise ones).
///
/// Nothing forces `target` to lie on that circle. We follow the circle for
/// the requested sweep and then move straight to `target`, which also mops
/// up the discretization error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arc {
    pub target: Point,
    pub radius: f32,
    pub angle: Angle,
    pub rotation: Rotation,
}

impl Arc {
    /// Zero (or nonsense) radii and angles have no circle to follow.
    pub fn is_degenerate(&self) -> bool {
        !(self.radius.is_finite() && self.radius > 0.0)
            || !self.angle.radians.is_finite()
            || self.angle.radians == 0.0
    }

    fn sweep(&self) -> f64 {
        f64::from(self.angle.radians).abs()
    }

    /// How many pieces to cut the arc into: about one per step of arc length
    /// along the X axis, and at least one.
    pub fn segment_count(&self, steps_per_mm: f32) -> u32 {
        if self.is_degenerate() {
            return 1;
        }
        let len_steps = self.sweep() * f64::from(self.radius) * f64::from(steps_per_mm);
        // `as` saturates, so absurdly long arcs just get u32::MAX pieces.
        (libm::round(len_steps) as u32).max(1)
    }

    pub fn center(&self, from: &Point) -> kurbo::Point {
        let side = match self.rotation {
            Rotation::Clockwise => 1.0,
            Rotation::CounterClockwise => -1.0,
        };
        let half = self.sweep() / 2.0;
        to_kurbo(from) + Vec2::from_angle(half) * (side * f64::from(self.radius))
    }

    /// The points to visit, in order, when drawing this arc from `from`.
    ///
    /// The start point itself is not included, but the final target is.
    pub fn waypoints(&self, from: &Point, steps_per_mm: f32) -> ArcWaypoints {
        let count = self.segment_count(steps_per_mm);
        let center = self.center(from);
        let direction = match self.rotation {
            Rotation::Clockwise => -1.0,
            Rotation::CounterClockwise => 1.0,
        };
        ArcWaypoints {
            center,
            radius: f64::from(self.radius),
            start_angle: (to_kurbo(from) - center).atan2(),
            angle_per_piece: direction * self.sweep() / f64::from(count),
            // Index 0 is the start point.
            next: 1,
            count: if self.is_degenerate() { 1 } else { count },
            target: Some(self.target),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArcWaypoints {
    center: kurbo::Point,
    radius: f64,
    start_angle: f64,
    angle_per_piece: f64,
    next: u32,
    count: u32,
    target: Option<Point>,
}

impl Iterator for ArcWaypoints {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.next < self.count {
            let theta = self.start_angle + self.angle_per_piece * f64::from(self.next);
            self.next += 1;
            Some(Point::from_kurbo(
                self.center + Vec2::from_angle(theta) * self.radius,
            ))
        } else {
            self.target.take()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(x: f32, y: f32, radius: f32, degrees: f32, rotation: Rotation) -> Arc {
        Arc {
            target: Point::new(x, y),
            radius,
            angle: Angle::degrees(degrees),
            rotation,
        }
    }

    #[test]
    fn segment_count() {
        // A quarter circle of radius 10 is about 15.7mm long.
        let a = arc(0.0, 0.0, 10.0, 90.0, Rotation::Clockwise);
        assert_eq!(a.segment_count(20.0), 314);
        assert_eq!(a.segment_count(1.0), 16);

        let tiny = arc(0.0, 0.0, 0.001, 1.0, Rotation::Clockwise);
        assert_eq!(tiny.segment_count(20.0), 1);
    }

    #[test]
    fn degenerate_goes_straight_to_target() {
        for a in [
            arc(3.0, 4.0, 0.0, 90.0, Rotation::Clockwise),
            arc(3.0, 4.0, 10.0, 0.0, Rotation::CounterClockwise),
            arc(3.0, 4.0, -1.0, 90.0, Rotation::Clockwise),
            arc(3.0, 4.0, f32::NAN, 90.0, Rotation::Clockwise),
        ] {
            assert!(a.is_degenerate());
            let pts: Vec<_> = a.waypoints(&Point::new(1.0, 1.0), 20.0).collect();
            assert_eq!(pts, vec![Point::new(3.0, 4.0)]);
        }
    }

    #[test]
    fn waypoints_lie_on_the_circle() {
        let from = Point::new(5.0, -2.0);
        for rotation in [Rotation::Clockwise, Rotation::CounterClockwise] {
            let a = arc(0.0, 0.0, 7.0, 120.0, rotation);
            let center = a.center(&from);
            assert!(((to_kurbo(&from) - center).hypot() - 7.0).abs() < 1e-4);

            let pts: Vec<_> = a.waypoints(&from, 20.0).collect();
            assert_eq!(pts.len() as u32, a.segment_count(20.0));
            for p in &pts[..pts.len() - 1] {
                assert!(((to_kurbo(p) - center).hypot() - 7.0).abs() < 1e-3);
            }
            assert_eq!(*pts.last().unwrap(), a.target);
        }
    }

    #[test]
    fn half_circles() {
        // Starting at the origin with a 180 degree sweep, the center is
        // straight up (clockwise) or straight down (counter-clockwise).
        let from = Point::new(0.0, 0.0);
        let cw = arc(0.0, 20.0, 10.0, 180.0, Rotation::Clockwise);
        let c = cw.center(&from);
        assert!(c.x.abs() < 1e-6 && (c.y - 10.0).abs() < 1e-6);

        // Clockwise from the bottom of a circle means heading left first.
        let first = cw.waypoints(&from, 20.0).next().unwrap();
        assert!(first.x < 0.0);

        // Just before the end, we're near the top of the circle.
        let pts: Vec<_> = cw.waypoints(&from, 20.0).collect();
        let last_on_circle = pts[pts.len() - 2];
        assert!(last_on_circle.x.abs() < 0.1 && (last_on_circle.y - 20.0).abs() < 0.1);

        // The mirror image: counter-clockwise from the top of a circle also
        // heads left, but downwards.
        let ccw = arc(0.0, -20.0, 10.0, 180.0, Rotation::CounterClockwise);
        let c = ccw.center(&from);
        assert!(c.x.abs() < 1e-6 && (c.y + 10.0).abs() < 1e-6);
        let first = ccw.waypoints(&from, 20.0).next().unwrap();
        assert!(first.x < 0.0 && first.y < 0.0);
    }
}
