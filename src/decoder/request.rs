use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::geometry::{TileId, TileSource};

/// 进行中的瓦片请求
#[derive(Debug, Clone)]
pub struct RequestHandle {
    ticket: u64,
    aborted: Arc<AtomicBool>,
}

impl RequestHandle {
    pub fn new(ticket: u64) -> Self {
        Self {
            ticket,
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// 取消后不再保证回调结果
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

/// 请求结果，成功或失败恰好其一
pub struct RequestCompletion {
    pub ticket: u64,
    pub id: TileId,
    pub outcome: anyhow::Result<DynamicImage>,
}

/// 异步瓦片请求
///
/// 请求在后台执行，结果通过 `poll_completed` 非阻塞地取回，
/// 由渲染循环在单线程中逐个处理。已取消的请求不会出现在结果中。
/// 无法受理的请求返回已取消的句柄，调用方按失败处理。
pub trait TileRequester {
    fn request(&mut self, source: &TileSource) -> RequestHandle;

    fn poll_completed(&mut self) -> Vec<RequestCompletion>;
}
