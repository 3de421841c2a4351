/// 文档坐标系中的矩形区域
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// 由原点和尺寸构造
    pub fn from_origin(origin: Offset, dimensions: Dimensions) -> Self {
        Self::new(
            origin.left,
            origin.top,
            origin.left + dimensions.width,
            origin.top + dimensions.height,
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn origin(&self) -> Offset {
        Offset::new(self.top, self.left)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// 两个区域是否相交（边界相接不算相交）
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

/// 偏移量（top, left）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub top: f64,
    pub left: f64,
}

impl Offset {
    pub fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }
}

impl std::ops::Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        Offset::new(self.top + rhs.top, self.left + rhs.left)
    }
}

/// 尺寸
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(100.0, 0.0, 200.0, 100.0);
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));
    }

    #[test]
    fn overlapping_regions_intersect() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 99.0, 60.0, 300.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn from_origin_adds_dimensions() {
        let r = Rect::from_origin(Offset::new(10.0, 20.0), Dimensions::new(5.0, 7.0));
        assert_eq!(r, Rect::new(20.0, 10.0, 25.0, 17.0));
        assert_eq!(r.dimensions(), Dimensions::new(5.0, 7.0));
    }
}
