/// 单个分辨率层级的瓦片加载状态表
///
/// 表外的坐标一律视为已加载：越界的瓦片不会阻止更粗一级瓦片的绘制。
#[derive(Debug, Clone, PartialEq)]
pub struct TileLoadMap {
    rows: usize,
    cols: usize,
    loaded: Vec<bool>,
}

impl TileLoadMap {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            loaded: vec![false; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_loaded(&self, row: usize, col: usize) -> bool {
        if row >= self.rows || col >= self.cols {
            return true;
        }
        self.loaded[row * self.cols + col]
    }

    /// 越界坐标被忽略
    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        if row < self.rows && col < self.cols {
            self.loaded[row * self.cols + col] = value;
        }
    }

    pub fn clear(&mut self) {
        self.loaded.fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unloaded() {
        let map = TileLoadMap::new(2, 3);
        for row in 0..2 {
            for col in 0..3 {
                assert!(!map.is_loaded(row, col));
            }
        }
    }

    #[test]
    fn out_of_bounds_is_always_loaded() {
        let mut map = TileLoadMap::new(2, 3);
        map.set(2, 0, false);
        map.set(0, 3, false);
        assert!(map.is_loaded(2, 0));
        assert!(map.is_loaded(0, 3));
        assert!(map.is_loaded(usize::MAX, usize::MAX));

        let empty = TileLoadMap::new(0, 0);
        assert!(empty.is_loaded(0, 0));
    }

    #[test]
    fn set_marks_single_cell() {
        let mut map = TileLoadMap::new(2, 2);
        map.set(1, 0, true);
        assert!(map.is_loaded(1, 0));
        assert!(!map.is_loaded(0, 1));
        assert!(!map.is_loaded(1, 1));

        map.set(1, 0, false);
        assert!(!map.is_loaded(1, 0));
    }

    #[test]
    fn clear_resets_every_cell() {
        let mut map = TileLoadMap::new(1, 2);
        map.set(0, 0, true);
        map.set(0, 1, true);
        map.clear();
        assert!(!map.is_loaded(0, 0));
        assert!(!map.is_loaded(0, 1));
    }
}
