//! Layout-space geometry
//!
//! Integer points, sizes and boxes in the global layout coordinate space,
//! plus the handful of operations window management needs on them.

/// A point in layout coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Round a fractional cursor position down onto the integer grid
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self {
            x: x.floor() as i32,
            y: y.floor() as i32,
        }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// An axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_parts(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Half-open containment: the right and bottom edges are outside
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Fractional containment test used by cursor hit testing
    pub fn contains_f64(&self, x: f64, y: f64) -> bool {
        x >= self.x as f64
            && x < self.right() as f64
            && y >= self.y as f64
            && y < self.bottom() as f64
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        Some(Rect::new(
            x,
            y,
            self.right().min(other.right()) - x,
            self.bottom().min(other.bottom()) - y,
        ))
    }

    /// Place a box of `size` centered inside `self`, never letting its top
    /// edge rise above `self.y`.
    pub fn center_child(&self, size: Size) -> Rect {
        let x = self.x + (self.width - size.width) / 2;
        let y = (self.y + (self.height - size.height) / 2).max(self.y);
        Rect::new(x, y, size.width, size.height)
    }

    /// Slide `self` so that it lies inside `bounds` on each axis where it
    /// fits. Where it does not fit, its leading edge is aligned with the
    /// leading edge of `bounds`.
    pub fn constrain_within(&self, bounds: &Rect) -> Rect {
        fn slide(pos: i32, len: i32, lo: i32, hi: i32) -> i32 {
            if len >= hi - lo {
                lo
            } else if pos < lo {
                lo
            } else if pos + len > hi {
                hi - len
            } else {
                pos
            }
        }

        Rect::new(
            slide(self.x, self.width, bounds.x, bounds.right()),
            slide(self.y, self.height, bounds.y, bounds.bottom()),
            self.width,
            self.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let rect = Rect::new(0, 0, 10, 10);
        assert!(rect.contains(Point::new(0, 0)));
        assert!(rect.contains(Point::new(9, 9)));
        assert!(!rect.contains(Point::new(10, 5)));
        assert!(rect.contains_f64(9.5, 0.1));
        assert!(!rect.contains_f64(-0.1, 0.0));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0, 0, 100, 50);
        assert_eq!(a.intersection(&Rect::new(20, -10, 200, 30)), Some(Rect::new(20, 0, 80, 20)));
        assert_eq!(a.intersection(&Rect::new(100, 0, 10, 10)), None);
    }

    #[test]
    fn test_center_child() {
        let area = Rect::new(0, 30, 1920, 1050);
        let placed = area.center_child(Size::new(800, 600));
        assert_eq!(placed, Rect::new(560, 255, 800, 600));
    }

    #[test]
    fn test_center_child_clamps_top_edge() {
        // Taller than the usable area: the natural centered top would sit
        // above the bar, so it is pinned to the area's top instead.
        let area = Rect::new(0, 30, 1920, 1050);
        let placed = area.center_child(Size::new(800, 1200));
        assert_eq!(placed.y, 30);
        assert_eq!(placed.x, 560);
    }

    #[test]
    fn test_constrain_within_slides() {
        let bounds = Rect::new(0, 0, 100, 100);
        let popup = Rect::new(80, -10, 40, 30);
        assert_eq!(popup.constrain_within(&bounds), Rect::new(60, 0, 40, 30));

        let inside = Rect::new(10, 10, 20, 20);
        assert_eq!(inside.constrain_within(&bounds), inside);
    }

    #[test]
    fn test_constrain_within_oversized() {
        let bounds = Rect::new(50, 50, 100, 100);
        let popup = Rect::new(0, 70, 300, 20);
        assert_eq!(popup.constrain_within(&bounds), Rect::new(50, 70, 300, 20));
    }

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(5, 7);
        let b = Point::new(2, 3);
        assert_eq!(a - b, Point::new(3, 4));
        assert_eq!(a + b, Point::new(7, 10));
        assert_eq!(Point::from_f64(-0.5, 3.9), Point::new(-1, 3));
    }
}
