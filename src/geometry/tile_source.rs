use std::fmt;
use std::sync::Arc;

use super::{Dimensions, Offset};

/// 瓦片标识
///
/// 同时作为缓存键、请求表键和反向索引键。克隆只增加引用计数。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(Arc<str>);

impl TileId {
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 日志里只显示末尾一段，避免刷屏
    pub(crate) fn short(&self) -> &str {
        let s = self.as_str();
        let mut start = s.len().saturating_sub(20);
        while !s.is_char_boundary(start) {
            start += 1;
        }
        &s[start..]
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TileId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TileId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// 单个瓦片的来源描述
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub url: TileId,
    pub row: usize,
    pub col: usize,
    /// 瓦片在页面上的显示尺寸
    pub dimensions: Dimensions,
    /// 瓦片相对于页面图像原点的偏移
    pub offset: Offset,
    /// 显示像素 / 图像像素
    pub scale_ratio: f64,
}

/// 一个分辨率层级
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomLevel {
    pub rows: usize,
    pub cols: usize,
    pub tiles: Vec<TileSource>,
}

impl ZoomLevel {
    pub fn new(rows: usize, cols: usize, tiles: Vec<TileSource>) -> Self {
        Self { rows, cols, tiles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_by_value() {
        let a = TileId::new("doc/0/3/1_2.jpg");
        let b = TileId::from(String::from("doc/0/3/1_2.jpg"));
        assert_eq!(a, b);
        assert_ne!(a, TileId::from("doc/0/3/1_3.jpg"));
    }

    #[test]
    fn short_form_keeps_tail() {
        let id = TileId::new("https://example.org/iiif/page-0001/full/512,/0/default.jpg");
        assert_eq!(id.short().len(), 20);
        assert!(id.as_str().ends_with(id.short()));
        assert_eq!(TileId::new("a/b").short(), "a/b");
    }
}
