//! 渲染循环指标收集模块
//!
//! Prometheus 指标（经 `metrics` facade）与内存聚合统计。

use std::collections::BTreeMap;

use contracts::FrameId;
use metrics::{counter, gauge, histogram};

/// 记录引擎连接结果
pub fn record_connect(ready: bool) {
    counter!(
        "flightsync_connect_total",
        "ready" => if ready { "true" } else { "false" }
    )
    .increment(1);
}

/// 记录一帧渲染完成
///
/// `latency_ms` 为 request_frame 到 collect_outputs 完成的耗时。
pub fn record_frame_rendered(frame_id: FrameId, latency_ms: f64, channels: usize) {
    counter!("flightsync_frames_rendered_total").increment(1);
    // 帧 ID (用于检测跳帧)
    gauge!("flightsync_last_frame_id").set(frame_id as f64);
    histogram!("flightsync_render_latency_ms").record(latency_ms);
    histogram!("flightsync_channels_per_frame").record(channels as f64);
}

/// 记录渲染失败
pub fn record_render_failure(fatal: bool) {
    counter!(
        "flightsync_render_failures_total",
        "fatal" => if fatal { "true" } else { "false" }
    )
    .increment(1);
}

/// 记录同一帧的重试
pub fn record_render_retry() {
    counter!("flightsync_render_retries_total").increment(1);
}

/// 记录一次流投递
///
/// `status`: "ok", "queue_full", "closed", "malformed", "write_error"
pub fn record_stream_delivery(stream: &str, status: &'static str) {
    counter!(
        "flightsync_stream_deliveries_total",
        "stream" => stream.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录流队列深度
pub fn record_stream_queue_depth(stream: &str, depth: usize) {
    gauge!(
        "flightsync_stream_queue_depth",
        "stream" => stream.to_string()
    )
    .set(depth as f64);
}

/// 记录单个 tick 总耗时 (姿态推送 → 发布完成)
pub fn record_tick_duration_ms(duration_ms: f64) {
    histogram!("flightsync_tick_duration_ms").record(duration_ms);
}

/// 渲染循环指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct LoopMetricsAggregator {
    /// 成功渲染并收集的帧数
    pub frames_rendered: u64,

    /// 渲染失败次数（含重试前的失败）
    pub render_failures: u64,

    /// 重试次数
    pub retries: u64,

    /// 成功投递数
    pub deliveries_ok: u64,

    /// 各流投递失败次数
    pub delivery_failures: BTreeMap<String, u64>,

    /// 渲染耗时统计 (ms)
    pub render_latency: RunningStats,

    /// tick 耗时统计 (ms)
    pub tick_duration: RunningStats,

    /// 最后一帧 ID
    pub last_frame_id: Option<FrameId>,
}

impl LoopMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一帧
    pub fn record_frame(&mut self, frame_id: FrameId, render_latency_ms: f64) {
        self.frames_rendered += 1;
        self.last_frame_id = Some(frame_id);
        self.render_latency.push(render_latency_ms);
    }

    pub fn record_tick(&mut self, duration_ms: f64) {
        self.tick_duration.push(duration_ms);
    }

    pub fn record_failure(&mut self) {
        self.render_failures += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// 记录一次流投递结果
    pub fn record_delivery(&mut self, stream: &str, ok: bool) {
        if ok {
            self.deliveries_ok += 1;
        } else {
            *self.delivery_failures.entry(stream.to_string()).or_insert(0) += 1;
        }
    }

    pub fn total_delivery_failures(&self) -> u64 {
        self.delivery_failures.values().sum()
    }

    /// 生成摘要报告
    pub fn summary(&self) -> LoopMetricsSummary {
        let attempted = self.deliveries_ok + self.total_delivery_failures();
        LoopMetricsSummary {
            frames_rendered: self.frames_rendered,
            render_failures: self.render_failures,
            retries: self.retries,
            deliveries_ok: self.deliveries_ok,
            delivery_failure_rate: if attempted > 0 {
                self.total_delivery_failures() as f64 / attempted as f64 * 100.0
            } else {
                0.0
            },
            last_frame_id: self.last_frame_id,
            render_latency_ms: StatsSummary::from(&self.render_latency),
            tick_duration_ms: StatsSummary::from(&self.tick_duration),
            delivery_failures: self.delivery_failures.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct LoopMetricsSummary {
    pub frames_rendered: u64,
    pub render_failures: u64,
    pub retries: u64,
    pub deliveries_ok: u64,
    pub delivery_failure_rate: f64,
    pub last_frame_id: Option<FrameId>,
    pub render_latency_ms: StatsSummary,
    pub tick_duration_ms: StatsSummary,
    pub delivery_failures: BTreeMap<String, u64>,
}

impl std::fmt::Display for LoopMetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Render Loop Summary ===")?;
        writeln!(f, "Frames rendered: {}", self.frames_rendered)?;
        match self.last_frame_id {
            Some(id) => writeln!(f, "Last frame id: {}", id)?,
            None => writeln!(f, "Last frame id: none")?,
        }
        writeln!(
            f,
            "Render failures: {} (retries: {})",
            self.render_failures, self.retries
        )?;
        writeln!(
            f,
            "Deliveries: {} ok, {:.2}% failed",
            self.deliveries_ok, self.delivery_failure_rate
        )?;
        writeln!(f, "Render latency (ms): {}", self.render_latency_ms)?;
        writeln!(f, "Tick duration (ms): {}", self.tick_duration_ms)?;

        if !self.delivery_failures.is_empty() {
            writeln!(f, "Delivery failures per stream:")?;
            for (stream, count) in &self.delivery_failures {
                writeln!(f, "  {}: {}", stream, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = LoopMetricsAggregator::new();

        aggregator.record_frame(0, 4.0);
        aggregator.record_frame(1, 6.0);
        aggregator.record_failure();
        aggregator.record_retry();
        aggregator.record_delivery("/rgb", true);
        aggregator.record_delivery("/rgb", true);
        aggregator.record_delivery("/depth", false);

        assert_eq!(aggregator.frames_rendered, 2);
        assert_eq!(aggregator.last_frame_id, Some(1));
        assert_eq!(aggregator.total_delivery_failures(), 1);
        assert_eq!(aggregator.delivery_failures.get("/depth"), Some(&1));
        assert!((aggregator.render_latency.mean() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = LoopMetricsAggregator::new();
        aggregator.record_frame(41, 2.5);
        aggregator.record_delivery("/rgb", true);
        aggregator.record_delivery("/depth", false);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Frames rendered: 1"));
        assert!(output.contains("Last frame id: 41"));
        assert!(output.contains("50.00%"));
        assert!(output.contains("/depth: 1"));
    }

    #[test]
    fn test_empty_stats_display() {
        assert_eq!(StatsSummary::default().to_string(), "N/A");
    }
}
