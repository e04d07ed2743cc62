//! 单个 sink 的隔离队列与后台写入任务。
//!
//! 每个 sink 拥有独立的有界队列；慢 sink 只会丢弃自己的扫描帧，
//! 不会拖慢其他 sink 或扫描循环。

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ScanFrame, ScanSink};

use crate::metrics::SinkMetrics;

/// Owning side of one sink's queue
pub struct SinkHandle {
    name: String,
    queue: mpsc::Sender<ScanFrame>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Start a worker task draining a queue of `queue_capacity` frames into `sink`
    pub fn spawn<S: ScanSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            sink,
            rx,
            metrics: Arc::clone(&metrics),
            name: name.clone(),
        };

        Self {
            name,
            queue,
            metrics,
            worker: tokio::spawn(worker.run()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Enqueue without waiting. `false` means the scan was not accepted.
    pub fn try_send(&self, frame: ScanFrame) -> bool {
        match self.queue.try_send(frame) {
            Ok(()) => {
                let pending = self.queue.max_capacity() - self.queue.capacity();
                self.metrics.set_queue_len(pending);
                true
            }
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    sensor_id = %frame.sensor_id,
                    sequence = frame.sequence,
                    "Sink queue saturated, scan discarded"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker is gone, scan discarded");
                false
            }
        }
    }

    /// Close the queue and wait until the worker has drained, flushed and closed its sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        let Self {
            name, queue, worker, ..
        } = self;
        drop(queue);
        if let Err(e) = worker.await {
            error!(sink = %name, error = ?e, "Sink worker panicked");
        }
        debug!(sink = %name, "Sink drained");
    }
}

struct SinkWorker<S> {
    sink: S,
    rx: mpsc::Receiver<ScanFrame>,
    metrics: Arc<SinkMetrics>,
    name: String,
}

impl<S: ScanSink> SinkWorker<S> {
    #[instrument(name = "sink_worker_loop", skip(self), fields(sink = %self.name))]
    async fn run(mut self) {
        debug!("Sink worker running");

        while let Some(frame) = self.rx.recv().await {
            self.metrics.set_queue_len(self.rx.len());
            self.deliver(&frame).await;
        }

        self.finish().await;
        debug!("Sink worker exited");
    }

    async fn deliver(&mut self, frame: &ScanFrame) {
        if let Err(e) = self.sink.write(frame).await {
            self.metrics.inc_failure_count();
            error!(
                sink = %self.name,
                sensor_id = %frame.sensor_id,
                sequence = frame.sequence,
                error = %e,
                "Scan write rejected by sink"
            );
            return;
        }
        self.metrics.record_write(frame.point_count());
    }

    async fn finish(&mut self) {
        if let Err(e) = self.sink.flush().await {
            error!(sink = %self.name, error = %e, "Final flush failed");
        }
        if let Err(e) = self.sink.close().await {
            error!(sink = %self.name, error = %e, "Sink close failed");
        }
    }
}
