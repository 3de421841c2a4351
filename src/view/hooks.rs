use crate::geometry::{Dimensions, Offset};

/// 视图更新时提供给外部的页面信息
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPageInfo {
    pub index: usize,
    pub dimensions: Dimensions,
    pub group_index: usize,
    /// 含内边距的页面区域原点
    pub padding_region_offset: Offset,
    /// 页面图像原点
    pub image_offset: Offset,
}

type LoadHook = Box<dyn FnMut()>;
type UpdateHook = Box<dyn FnMut(&[RenderedPageInfo], Option<usize>)>;

/// 视图生命周期回调，构造渲染器时传入
#[derive(Default)]
pub struct ViewHooks {
    pub on_view_will_load: Option<LoadHook>,
    pub on_view_did_load: Option<LoadHook>,
    /// 参数：当前渲染的页面，以及 goto 的目标页（adjust 时为 None）
    pub on_view_did_update: Option<UpdateHook>,
}

impl ViewHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_view_will_load(mut self, hook: impl FnMut() + 'static) -> Self {
        self.on_view_will_load = Some(Box::new(hook));
        self
    }

    pub fn on_view_did_load(mut self, hook: impl FnMut() + 'static) -> Self {
        self.on_view_did_load = Some(Box::new(hook));
        self
    }

    pub fn on_view_did_update(
        mut self,
        hook: impl FnMut(&[RenderedPageInfo], Option<usize>) + 'static,
    ) -> Self {
        self.on_view_did_update = Some(Box::new(hook));
        self
    }

    pub(crate) fn view_will_load(&mut self) {
        if let Some(hook) = self.on_view_will_load.as_mut() {
            hook();
        }
    }

    pub(crate) fn view_did_load(&mut self) {
        if let Some(hook) = self.on_view_did_load.as_mut() {
            hook();
        }
    }

    pub(crate) fn wants_update(&self) -> bool {
        self.on_view_did_update.is_some()
    }

    pub(crate) fn view_did_update(&mut self, pages: &[RenderedPageInfo], target: Option<usize>) {
        if let Some(hook) = self.on_view_did_update.as_mut() {
            hook(pages, target);
        }
    }
}
