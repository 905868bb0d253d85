/// 可见性跟踪（每个参赛者一份）
///
/// 每个兴趣点对应一个 25 格的环形缓冲区，按 200ms 节拍约覆盖 5 秒：
/// - 平滑 RSSI 噪声
/// - 信标短暂停止广播时逐格淡出，而不是瞬间消失
/// - 在完全淡出前重新出现时无缝衔接

use std::collections::HashMap;

/// 环形缓冲区深度
pub const BUFFER_DEPTH: usize = 25;

/// 单个兴趣点的距离样本缓冲区
#[derive(Clone, Debug)]
struct SampleBuffer {
    samples: [Option<f64>; BUFFER_DEPTH],
    /// 下一次写入的位置
    next: usize,
}

impl SampleBuffer {
    fn with_first(distance: f64) -> Self {
        let mut samples = [None; BUFFER_DEPTH];
        samples[0] = Some(distance);
        SampleBuffer { samples, next: 1 }
    }

    fn push(&mut self, distance: f64) {
        self.samples[self.next] = Some(distance);
        self.next = (self.next + 1) % BUFFER_DEPTH;
    }

    /// 清除写入位置的样本并推进写入位置
    ///
    /// 新的写入位置为空时返回 `false`，兴趣点随即不再跟踪。
    /// 缓冲区写满后写入位置总是最旧的样本，连续缺失时逐格淡出；
    /// 未写满的缓冲区在写入位置后方为空，一次缺失即被移除。
    fn drain_one(&mut self) -> bool {
        self.samples[self.next] = None;
        self.next = (self.next + 1) % BUFFER_DEPTH;
        self.samples[self.next].is_some()
    }

    fn average(&self) -> Option<f64> {
        let (sum, count) = self
            .samples
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(sum, count), d| (sum + d, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    fn live_samples(&self) -> usize {
        self.samples.iter().flatten().count()
    }
}

/// 可见性跟踪器
#[derive(Clone, Debug, Default)]
pub struct VisibilityTracker {
    /// 兴趣点 ID -> 样本缓冲区
    buffers: HashMap<String, SampleBuffer>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记本节拍看到的全部 (ID, 距离)
    ///
    /// 未出现的兴趣点每节拍淡出一个样本，样本耗尽后不再跟踪。
    pub fn register_current(&mut self, points: &[(String, f64)]) {
        for (id, distance) in points {
            match self.buffers.get_mut(id) {
                Some(buffer) => buffer.push(*distance),
                None => {
                    self.buffers.insert(id.clone(), SampleBuffer::with_first(*distance));
                }
            }
        }

        self.buffers.retain(|id, buffer| {
            if points.iter().any(|(seen, _)| seen == id) {
                return true;
            }
            buffer.drain_one()
        });
    }

    /// 当前可见的兴趣点及其平均距离，按距离升序
    pub fn visible_points(&self) -> Vec<(String, f64)> {
        let mut visible: Vec<(String, f64)> = self
            .buffers
            .iter()
            .filter_map(|(id, buffer)| buffer.average().map(|avg| (id.clone(), avg)))
            .collect();
        visible.sort_by(|a, b| a.1.total_cmp(&b.1));
        visible
    }

    /// 某兴趣点的平均距离
    pub fn average_distance(&self, id: &str) -> Option<f64> {
        self.buffers.get(id).and_then(SampleBuffer::average)
    }

    /// 某兴趣点缓冲区中的有效样本数
    pub fn live_samples(&self, id: &str) -> usize {
        self.buffers.get(id).map_or(0, SampleBuffer::live_samples)
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.buffers.contains_key(id)
    }

    /// 跟踪中的兴趣点数量
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
