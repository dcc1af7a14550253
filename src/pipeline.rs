//! 后台识别流水线
//!
//! 帧 -> 检测（阻塞线程）-> 识别（每帧一个异步任务）-> 结果。
//! 识别任务之间互不等待，结果可能乱序到达，消费方使用 [`LatestFrame`] 丢弃过期结果。
//! 同时进行的识别任务数量有上限，达到上限后新帧在有界通道中排队，反压到检测与输入端。

use std::sync::Arc;

use image::RgbImage;
use log::warn;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::task::{JoinHandle, spawn_blocking};

use crate::detection::{Detection, Detector};
use crate::recognizer::{Recognition, Recognizer};
use crate::store::LabelStore;

/// 一帧输入图片
#[derive(Debug, Clone)]
pub struct Frame {
    /// 帧序号，单调递增
    pub seq: u64,
    pub image: Arc<RgbImage>,
}

/// 一帧的检测结果
pub struct DetectedFrame {
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
}

/// 一帧的识别结果
#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub recognitions: Vec<Recognition>,
}

/// 在阻塞线程中逐帧运行检测器，检测失败的帧输出空结果
pub fn task_detect<D: Detector>(
    mut detector: D,
    mut lrx: Receiver<Frame>,
) -> (JoinHandle<()>, Receiver<DetectedFrame>) {
    let (tx, rx) = channel(num_cpus::get());
    let t = spawn_blocking(move || {
        while let Some(frame) = lrx.blocking_recv() {
            let detections = detector.detect(&frame.image).unwrap_or_else(|e| {
                warn!("第 {} 帧检测失败: {}", frame.seq, e);
                vec![]
            });
            let detected = DetectedFrame {
                seq: frame.seq,
                width: frame.image.width(),
                height: frame.image.height(),
                detections,
            };
            if tx.blocking_send(detected).is_err() {
                break;
            }
        }
    });
    (t, rx)
}

/// 为每一帧启动一个识别任务，新帧不会等待旧帧的匹配完成
///
/// 最多同时运行 `max_in_flight` 个识别任务，没有空闲名额时等待已有任务结束。
pub fn task_recognize<S: LabelStore + 'static>(
    mut lrx: Receiver<DetectedFrame>,
    recognizer: Arc<Recognizer<S>>,
    max_in_flight: usize,
) -> (JoinHandle<()>, Receiver<FrameResult>) {
    let (tx, rx) = channel(num_cpus::get());
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let t = tokio::spawn(async move {
        while let Some(frame) = lrx.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let tx = tx.clone();
            let recognizer = recognizer.clone();
            tokio::spawn(async move {
                let recognitions = recognizer.recognize_frame(&frame.detections).await;
                let result = FrameResult {
                    seq: frame.seq,
                    width: frame.width,
                    height: frame.height,
                    recognitions,
                };
                // 接收方已关闭时直接丢弃
                let _ = tx.send(result).await;
                drop(permit);
            });
        }
    });
    (t, rx)
}

/// 组合检测与识别任务，返回帧输入端和结果接收端
pub fn spawn_pipeline<D, S>(
    detector: D,
    recognizer: Arc<Recognizer<S>>,
) -> (Sender<Frame>, Receiver<FrameResult>, [JoinHandle<()>; 2])
where
    D: Detector,
    S: LabelStore + 'static,
{
    let (tx, rx) = channel(num_cpus::get());
    let (t1, rx) = task_detect(detector, rx);
    let (t2, rx) = task_recognize(rx, recognizer, num_cpus::get());
    (tx, rx, [t1, t2])
}

/// 只接受比上一次更新的帧结果
#[derive(Debug, Default)]
pub struct LatestFrame {
    last_seq: Option<u64>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// 结果比已显示的帧更新时返回 true 并记录其序号
    pub fn accept(&mut self, result: &FrameResult) -> bool {
        if self.last_seq.is_some_and(|seq| result.seq <= seq) {
            return false;
        }
        self.last_seq = Some(result.seq);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use image::Rgb;

    use super::*;
    use crate::db::{LabelRecord, NewLabel};
    use crate::detection::BoundingBox;
    use crate::error::Result;
    use crate::store::MemoryLabelStore;

    /// 按类别查询时变慢，并记录同时进行的查询数量
    #[derive(Default)]
    struct SlowStore {
        inner: MemoryLabelStore,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl LabelStore for SlowStore {
        async fn get_by_category(&self, category: &str) -> Result<Vec<LabelRecord>> {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.inner.get_by_category(category).await
        }

        async fn get_by_id(&self, id: i64) -> Result<Option<LabelRecord>> {
            self.inner.get_by_id(id).await
        }

        async fn get_all(&self) -> Result<Vec<LabelRecord>> {
            self.inner.get_all().await
        }

        async fn upsert(&self, label: NewLabel) -> Result<i64> {
            self.inner.upsert(label).await
        }

        async fn delete_by_id(&self, id: i64) -> Result<()> {
            self.inner.delete_by_id(id).await
        }

        async fn count(&self) -> Result<usize> {
            self.inner.count().await
        }
    }

    /// 把整帧作为一个检测结果
    struct WholeFrame;

    impl Detector for WholeFrame {
        type Error = Infallible;

        fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
            let det = Detection {
                bounding_box: BoundingBox::full(frame.width(), frame.height()),
                labels: vec!["cup".into()],
                tracking_id: Some(1),
                crop: None,
            };
            Ok(vec![det.with_crop_from(frame)])
        }
    }

    struct Broken;

    impl Detector for Broken {
        type Error = String;

        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
            Err("camera unplugged".into())
        }
    }

    fn frame(seq: u64, color: [u8; 3]) -> Frame {
        Frame { seq, image: Arc::new(RgbImage::from_pixel(8, 8, Rgb(color))) }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_recognizes_saved_label() {
        let recognizer = Arc::new(Recognizer::new(Arc::new(MemoryLabelStore::new()), 4, 0.85));
        let template = WholeFrame.detect(&frame(0, [0, 255, 0]).image).unwrap();
        let id = recognizer.save_label(&template[0], "Plant", None).await.unwrap();
        recognizer.start_session();

        let (tx, mut rx, _tasks) = spawn_pipeline(WholeFrame, recognizer.clone());
        tx.send(frame(1, [0, 255, 0])).await.unwrap();
        drop(tx);

        let result = rx.recv().await.unwrap();
        assert_eq!(result.seq, 1);
        assert_eq!((result.width, result.height), (8, 8));
        assert_eq!(result.recognitions.len(), 1);
        assert_eq!(result.recognitions[0].label.record_id(), Some(id));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_detection_failure() {
        let recognizer = Arc::new(Recognizer::new(Arc::new(MemoryLabelStore::new()), 4, 0.85));
        let (tx, mut rx, _tasks) = spawn_pipeline(Broken, recognizer);
        tx.send(frame(1, [0, 0, 0])).await.unwrap();
        drop(tx);
        let result = rx.recv().await.unwrap();
        assert!(result.recognitions.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_recognize_in_flight_limit() {
        let store = Arc::new(SlowStore::default());
        let recognizer = Arc::new(Recognizer::new(store.clone(), 4, 0.85));
        let (tx, lrx) = channel(4);
        let (task, mut rx) = task_recognize(lrx, recognizer, 3);

        let feeder = tokio::spawn(async move {
            for seq in 0..40 {
                let detections = WholeFrame.detect(&frame(seq, [10, 20, 30]).image).unwrap();
                let detected = DetectedFrame { seq, width: 8, height: 8, detections };
                tx.send(detected).await.unwrap();
            }
        });

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        feeder.await.unwrap();
        task.await.unwrap();

        assert_eq!(received, 40);
        let peak = store.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak = {peak}");
    }

    #[test]
    fn test_latest_frame() {
        let result = |seq| FrameResult { seq, width: 1, height: 1, recognitions: vec![] };
        let mut latest = LatestFrame::new();
        assert!(latest.accept(&result(2)));
        assert!(!latest.accept(&result(1)));
        assert!(!latest.accept(&result(2)));
        assert!(latest.accept(&result(3)));
    }
}
