use super::{DocumentLayout, PageEntry, ZoomLevel};

/// 初始定位：锚定页面以及页面内的中心点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnchorPosition {
    pub anchor_page: usize,
    pub vertical_offset: f64,
    pub horizontal_offset: f64,
}

/// 布局配置
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutConfig {
    pub zoom_level: u32,
    pub position: AnchorPosition,
}

/// 页面几何信息提供者
pub trait GeometryProvider {
    /// 根据布局配置计算页面分组和文档总尺寸
    /// - 之后的 `zoom_levels` 调用以这次布局为准
    fn layout(&mut self, config: &LayoutConfig) -> anyhow::Result<DocumentLayout>;

    /// 页面的所有分辨率层级，从最高分辨率（索引 0）到最低
    /// - 相邻层级满足 2x2 四叉关系（行列数为上一层的 ceil(n/2)）
    fn zoom_levels(&self, page: &PageEntry) -> Vec<ZoomLevel>;
}
