use anyhow::anyhow;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::{RequestCompletion, RequestHandle, TileDecoder, TileRequester};
use crate::geometry::{TileId, TileSource};

/// 解码任务
pub enum DecodeTask {
    /// 解码瓦片
    DecodeTile {
        ticket: u64,
        id: TileId,
        handle: RequestHandle,
    },
    /// 关闭工作线程
    Shutdown,
}

/// 解码服务 - 固定数量的工作线程，通过channel通信
pub struct DecodeService {
    task_sender: Sender<DecodeTask>,
    result_receiver: Receiver<RequestCompletion>,
    decode_threads: Vec<JoinHandle<()>>,
    /// 尚未取回结果的请求
    outstanding: HashMap<u64, RequestHandle>,
    next_ticket: u64,
}

impl DecodeService {
    pub fn new(decoder: Arc<dyn TileDecoder>, workers: usize) -> Self {
        let (task_tx, task_rx) = unbounded::<DecodeTask>();
        let (result_tx, result_rx) = unbounded::<RequestCompletion>();

        // 启动解码线程
        let decode_threads = (0..workers.max(1))
            .map(|worker| {
                let decoder = Arc::clone(&decoder);
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                thread::spawn(move || {
                    Self::decode_loop(worker, decoder, task_rx, result_tx);
                })
            })
            .collect::<Vec<_>>();
        info!("[DecodeService] started {} workers", decode_threads.len());

        Self {
            task_sender: task_tx,
            result_receiver: result_rx,
            decode_threads,
            outstanding: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// 解码线程主循环
    fn decode_loop(
        worker: usize,
        decoder: Arc<dyn TileDecoder>,
        task_rx: Receiver<DecodeTask>,
        result_tx: Sender<RequestCompletion>,
    ) {
        loop {
            match task_rx.recv() {
                Ok(DecodeTask::DecodeTile { ticket, id, handle }) => {
                    if handle.is_aborted() {
                        debug!("[DecodeService] skip aborted tile ...{}", id.short());
                        continue;
                    }

                    let start_time = Instant::now();
                    // 解码器 panic 时也要交回结果，否则请求永远挂起
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&id)))
                        .unwrap_or_else(|payload| {
                            warn!(
                                "[DecodeService] worker {} decoder panicked on {}",
                                worker, id
                            );
                            Err(anyhow!("decoder panicked: {}", panic_message(&*payload)))
                        });
                    debug!(
                        "[DecodeService] worker {} tile ...{} done in {:?}, ok: {}",
                        worker,
                        id.short(),
                        start_time.elapsed(),
                        outcome.is_ok()
                    );

                    if handle.is_aborted() {
                        continue;
                    }
                    if result_tx
                        .send(RequestCompletion {
                            ticket,
                            id,
                            outcome,
                        })
                        .is_err()
                    {
                        info!("[DecodeService] Result channel closed");
                        break;
                    }
                }
                Ok(DecodeTask::Shutdown) => {
                    info!("[DecodeService] worker {} shutting down", worker);
                    break;
                }
                Err(_) => {
                    info!("[DecodeService] Task channel closed");
                    break;
                }
            }
        }
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// 关闭服务并等待工作线程退出
    pub fn destroy(&mut self) {
        if self.decode_threads.is_empty() {
            return;
        }
        info!("[DecodeService] Destroying decode service");

        for handle in self.outstanding.values() {
            handle.abort();
        }
        for _ in &self.decode_threads {
            let _ = self.task_sender.send(DecodeTask::Shutdown);
        }
        for thread in self.decode_threads.drain(..) {
            if thread.join().is_err() {
                warn!("[DecodeService] worker panicked");
            }
        }
    }
}

impl TileRequester for DecodeService {
    fn request(&mut self, source: &TileSource) -> RequestHandle {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let handle = RequestHandle::new(ticket);

        let task = DecodeTask::DecodeTile {
            ticket,
            id: source.url.clone(),
            handle: handle.clone(),
        };
        if self.task_sender.send(task).is_err() {
            // 工作线程已退出，结果永远不会到达
            warn!("[DecodeService] no workers for tile {}", source.url);
            handle.abort();
            return handle;
        }

        self.outstanding.insert(ticket, handle.clone());
        handle
    }

    fn poll_completed(&mut self) -> Vec<RequestCompletion> {
        let mut completed = Vec::new();
        for completion in self.result_receiver.try_iter() {
            match self.outstanding.remove(&completion.ticket) {
                Some(handle) if !handle.is_aborted() => completed.push(completion),
                _ => {}
            }
        }
        // 丢掉已取消但不会再有结果的记录
        self.outstanding.retain(|_, handle| !handle.is_aborted());
        completed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown"
    }
}

impl Drop for DecodeService {
    fn drop(&mut self) {
        self.destroy();
    }
}
