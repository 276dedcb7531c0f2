use serde::{Deserialize, Serialize};


/// A planar position, in kilometres.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Point2d {
    pub x_coord: f64,
    pub y_coord: f64,
}

impl Point2d {
    pub fn new(x_coord: f64, y_coord: f64) -> Point2d {
        Point2d{x_coord, y_coord}
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.x_coord, self.y_coord]
    }

    pub fn from_array(coords: [f64; 2]) -> Point2d {
        Point2d::new(coords[0], coords[1])
    }

    pub fn plus(&self, other: &Point2d) -> Point2d {
        Point2d::new(self.x_coord + other.x_coord, self.y_coord + other.y_coord)
    }

    pub fn minus(&self, other: &Point2d) -> Point2d {
        Point2d::new(self.x_coord - other.x_coord, self.y_coord - other.y_coord)
    }

    pub fn times(&self, factor: f64) -> Point2d {
        Point2d::new(self.x_coord * factor, self.y_coord * factor)
    }

    pub fn euclidean_distance(&self, other: &Point2d) -> f64 {
        let diff = self.minus(other);
        (diff.x_coord.powi(2) + diff.y_coord.powi(2)).sqrt()
    }

    /// The point a fraction `tt` of the way from self to `other`.  `tt` is clamped to [0, 1].
    pub fn interpolate(&self, other: &Point2d, tt: f64) -> Point2d {
        let tt = tt.max(0.0).min(1.0);
        let i_part = self.times(1.0 - tt);
        let j_part = other.times(tt);
        return i_part.plus(&j_part);
    }
}
