use serde::{Deserialize, Serialize};

/// An axis-aligned 2D rectangle represented by minimum and maximum coordinates.
///
/// `Rectangle` is the key type of the index: every entry carries one, every
/// node caches the union of its entries' rectangles, and queries are
/// rectangles tested for intersection. Intervals are closed, so rectangles
/// that only touch along an edge or at a corner intersect.
///
/// A rectangle is *valid* when its interval is non-empty in every dimension.
/// [`Rectangle::intersection`] of two disjoint rectangles is invalid, and
/// [`Rectangle::empty`] is the invalid identity element of [`Rectangle::union`].
///
/// # Examples
///
/// ```rust
/// use paged_rtree::Rectangle;
///
/// let a = Rectangle::new(0.0, 0.0, 10.0, 10.0);
/// let b = Rectangle::new(5.0, 5.0, 15.0, 15.0);
/// assert!(a.intersection(&b).is_valid());
/// assert_eq!(a.union(&b), Rectangle::new(0.0, 0.0, 15.0, 15.0));
/// ```
#[derive(Clone, Copy, PartialEq, Default, Debug, Serialize, Deserialize)]
pub struct Rectangle {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rectangle({}, {}, {}, {})", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl Rectangle {
    /// Creates a new rectangle with the specified coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Rectangle {
        Rectangle {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The empty rectangle: invalid, and `empty().union(r) == r` for any `r`.
    pub fn empty() -> Rectangle {
        Rectangle::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// Bounding rectangle of a sequence of rectangles, `empty()` if there are none.
    pub fn bounding<'a, I>(rects: I) -> Rectangle
    where
        I: IntoIterator<Item = &'a Rectangle>,
    {
        rects
            .into_iter()
            .fold(Rectangle::empty(), |acc, rect| acc.union(rect))
    }

    /// Returns the width of the rectangle.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Returns the height of the rectangle.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns the area of the rectangle, 0 for an invalid rectangle.
    pub fn area(&self) -> f64 {
        if self.is_valid() {
            self.width() * self.height()
        } else {
            0.0
        }
    }

    /// Area growth needed for this rectangle to also cover `other`.
    pub fn enlargement(&self, other: &Rectangle) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Returns the center point of the rectangle.
    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// Checks if this rectangle contains another rectangle.
    pub fn contains(&self, other: &Rectangle) -> bool {
        other.min_x >= self.min_x && other.max_x <= self.max_x
            && other.min_y >= self.min_y && other.max_y <= self.max_y
    }

    /// Checks if this rectangle and `other` share at least one point.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.intersection(other).is_valid()
    }

    /// Returns the union (bounding rectangle) of this rectangle with another.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Returns the overlap of this rectangle with another. The result is
    /// invalid when the two do not intersect.
    pub fn intersection(&self, other: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        )
    }

    /// Checks if every dimension's interval is non-empty (min <= max).
    /// Rectangles with NaN bounds are never valid.
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let rect = Rectangle::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(rect.min_x, 1.0);
        assert_eq!(rect.min_y, 2.0);
        assert_eq!(rect.max_x, 3.0);
        assert_eq!(rect.max_y, 4.0);
    }

    #[test]
    fn test_equality() {
        let rect1 = Rectangle::new(1.0, 2.0, 3.0, 4.0);
        let rect2 = Rectangle::new(1.0, 2.0, 3.0, 4.0);
        let rect3 = Rectangle::new(1.0, 2.0, 3.0, 5.0);

        assert_eq!(rect1, rect2);
        assert_ne!(rect1, rect3);
    }

    #[test]
    fn test_width_height_area() {
        let rect = Rectangle::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(rect.width(), 10.0);
        assert_eq!(rect.height(), 5.0);
        assert_eq!(rect.area(), 50.0);
        assert_eq!(Rectangle::empty().area(), 0.0);
    }

    #[test]
    fn test_center() {
        let rect = Rectangle::new(-10.0, -5.0, 10.0, 5.0);
        assert_eq!(rect.center(), (0.0, 0.0));
    }

    #[test]
    fn test_contains() {
        let outer = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let inner = Rectangle::new(2.0, 2.0, 8.0, 8.0);
        let partial = Rectangle::new(5.0, 5.0, 15.0, 15.0);

        assert!(outer.contains(&inner));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&partial));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_intersects() {
        let rect1 = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let rect2 = Rectangle::new(5.0, 5.0, 15.0, 15.0);
        let rect3 = Rectangle::new(20.0, 20.0, 30.0, 30.0);
        let rect4 = Rectangle::new(10.0, 10.0, 20.0, 20.0); // Touches corner

        assert!(rect1.intersects(&rect2));
        assert!(rect2.intersects(&rect1));
        assert!(!rect1.intersects(&rect3));
        assert!(rect1.intersects(&rect4));
    }

    #[test]
    fn test_intersection() {
        let rect1 = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let rect2 = Rectangle::new(5.0, 5.0, 15.0, 15.0);
        let rect3 = Rectangle::new(20.0, 20.0, 30.0, 30.0);

        let inter = rect1.intersection(&rect2);
        assert!(inter.is_valid());
        assert_eq!(inter, Rectangle::new(5.0, 5.0, 10.0, 10.0));

        assert!(!rect1.intersection(&rect3).is_valid());
    }

    #[test]
    fn test_union_and_empty() {
        let rect1 = Rectangle::new(0.0, 0.0, 5.0, 5.0);
        let rect2 = Rectangle::new(3.0, 3.0, 10.0, 10.0);

        assert_eq!(rect1.union(&rect2), Rectangle::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(Rectangle::empty().union(&rect1), rect1);
        assert!(!Rectangle::empty().is_valid());
    }

    #[test]
    fn test_bounding() {
        let rects = [
            Rectangle::new(0.0, 0.0, 1.0, 1.0),
            Rectangle::new(4.0, -2.0, 5.0, 0.0),
            Rectangle::new(2.0, 2.0, 3.0, 3.0),
        ];
        assert_eq!(Rectangle::bounding(&rects), Rectangle::new(0.0, -2.0, 5.0, 3.0));
        assert_eq!(Rectangle::bounding(&Vec::<Rectangle>::new()), Rectangle::empty());
    }

    #[test]
    fn test_enlargement() {
        let rect = Rectangle::new(0.0, 0.0, 2.0, 2.0);
        assert_eq!(rect.enlargement(&Rectangle::new(1.0, 1.0, 2.0, 2.0)), 0.0);
        assert_eq!(rect.enlargement(&Rectangle::new(0.0, 0.0, 4.0, 2.0)), 4.0);
        assert_eq!(Rectangle::empty().enlargement(&rect), 4.0);
    }

    #[test]
    fn test_is_valid() {
        assert!(Rectangle::new(0.0, 0.0, 10.0, 10.0).is_valid());
        assert!(Rectangle::new(5.0, 5.0, 5.0, 5.0).is_valid());
        assert!(!Rectangle::new(10.0, 10.0, 0.0, 0.0).is_valid());
        assert!(!Rectangle::new(f64::NAN, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn test_serialization() {
        let rect = Rectangle::new(1.5, 2.5, 3.5, 4.5);
        let json = serde_json::to_string(&rect).unwrap();
        let deserialized: Rectangle = serde_json::from_str(&json).unwrap();
        assert_eq!(rect, deserialized);
    }

    #[test]
    fn test_display() {
        let rect = Rectangle::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(format!("{}", rect), "Rectangle(1, 2, 3, 4)");
    }
}
