use std::collections::HashMap;

use super::{Dimensions, Offset, Rect};

/// 分组内的页面
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPage {
    pub index: usize,
    pub dimensions: Dimensions,
    /// 页面相对于分组区域的偏移
    pub group_offset: Offset,
}

/// 页面分组（单页、对开页等）
#[derive(Debug, Clone, PartialEq)]
pub struct PageGroup {
    /// 分组在文档中的区域
    pub region: Rect,
    /// 分组区域到页面图像的内边距
    pub padding: Offset,
    pub pages: Vec<GroupPage>,
}

/// 文档整体布局
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub page_groups: Vec<PageGroup>,
    pub dimensions: Dimensions,
}

/// 页面查找表中的一项
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    pub index: usize,
    pub group_index: usize,
    pub dimensions: Dimensions,
    pub group_offset: Offset,
    pub group_region: Rect,
    pub group_padding: Offset,
}

impl PageEntry {
    /// 页面在文档中的区域
    pub fn region(&self) -> Rect {
        let origin = Offset::new(self.group_region.top, self.group_region.left) + self.group_offset;
        Rect::from_origin(origin, self.dimensions)
    }

    /// 页面图像原点（页面区域原点 + 分组内边距）
    pub fn image_offset(&self) -> Offset {
        self.region().origin() + self.group_padding
    }
}

/// 页面索引 -> 页面信息
#[derive(Debug, Clone, Default)]
pub struct PageLookup {
    pages: HashMap<usize, PageEntry>,
}

impl PageLookup {
    pub fn from_groups(groups: &[PageGroup]) -> Self {
        let mut pages = HashMap::new();
        for (group_index, group) in groups.iter().enumerate() {
            for page in &group.pages {
                pages.insert(
                    page.index,
                    PageEntry {
                        index: page.index,
                        group_index,
                        dimensions: page.dimensions,
                        group_offset: page.group_offset,
                        group_region: group.region,
                        group_padding: group.padding,
                    },
                );
            }
        }
        Self { pages }
    }

    pub fn get(&self, index: usize) -> Option<&PageEntry> {
        self.pages.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.pages.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread() -> Vec<PageGroup> {
        vec![PageGroup {
            region: Rect::new(50.0, 1000.0, 450.0, 1300.0),
            padding: Offset::new(10.0, 5.0),
            pages: vec![
                GroupPage {
                    index: 4,
                    dimensions: Dimensions::new(200.0, 300.0),
                    group_offset: Offset::new(0.0, 0.0),
                },
                GroupPage {
                    index: 5,
                    dimensions: Dimensions::new(200.0, 300.0),
                    group_offset: Offset::new(0.0, 200.0),
                },
            ],
        }]
    }

    #[test]
    fn region_is_group_origin_plus_offset() {
        let lookup = PageLookup::from_groups(&spread());
        assert_eq!(lookup.len(), 2);
        let right = lookup.get(5).unwrap();
        assert_eq!(right.group_index, 0);
        assert_eq!(right.region(), Rect::new(250.0, 1000.0, 450.0, 1300.0));
    }

    #[test]
    fn image_offset_adds_padding() {
        let lookup = PageLookup::from_groups(&spread());
        let left = lookup.get(4).unwrap();
        assert_eq!(left.image_offset(), Offset::new(1010.0, 55.0));
    }

    #[test]
    fn unknown_page_is_absent() {
        let lookup = PageLookup::from_groups(&spread());
        assert!(lookup.get(0).is_none());
        assert!(!lookup.contains(6));
    }
}
