use crate::geometry::Rect;

/// 滚动方向，仅作为提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

/// 文档坐标系上的可视窗口
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            top: 0.0,
            left: 0.0,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn region(&self) -> Rect {
        Rect::new(self.left, self.top, self.right(), self.bottom())
    }

    pub fn intersects_region(&self, region: &Rect) -> bool {
        self.region().intersects(region)
    }

    /// 画布像素尺寸
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.max(0.0).round() as u32,
            self.height.max(0.0).round() as u32,
        )
    }
}
