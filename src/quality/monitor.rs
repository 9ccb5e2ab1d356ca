//! Continuous quality feedback while a capture session is live.
//!
//! Ticks on a fixed interval. Most ticks run the cheap quick assessment;
//! every Nth tick runs the full six-check analysis. Analyses never overlap:
//! each one is awaited before the next tick is taken, and ticks that fire
//! while an analysis is still running are skipped.
//!
//! Frame acquisition and analysis both run on the blocking pool, so a
//! [`FrameSource`] may block in `next_frame` without stalling the runtime.

use super::analyzer::QualityAnalyzer;
use super::report::{QualityCheckResult, QuickAssessment};
use crate::capture::FrameSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Loop cadence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between ticks, in milliseconds.
    pub tick_interval_ms: u64,
    /// Run the full analysis on every Nth tick.
    pub full_analysis_every: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            full_analysis_every: 3,
        }
    }
}

/// Monitor configuration errors.
#[derive(Debug, Clone, Error)]
pub enum MonitorConfigError {
    /// `tick_interval_ms` is zero.
    #[error("tick interval must be non-zero")]
    ZeroInterval,
    /// `full_analysis_every` is zero.
    #[error("full analysis cadence must be at least 1")]
    ZeroCadence,
}

impl MonitorConfig {
    /// Rejects a zero interval or cadence.
    pub fn validate(&self) -> Result<(), MonitorConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(MonitorConfigError::ZeroInterval);
        }
        if self.full_analysis_every == 0 {
            return Err(MonitorConfigError::ZeroCadence);
        }
        Ok(())
    }

    /// Tick interval as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// True when tick number `tick` (1-based) runs the full analysis.
    pub fn is_full_tick(&self, tick: u64) -> bool {
        tick % u64::from(self.full_analysis_every.max(1)) == 0
    }
}

/// Feedback delivered to the monitor callback.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Quick assessment on a regular tick.
    Quick {
        /// 1-based tick number.
        tick: u64,
        /// Brightness, sharpness and glare verdict.
        assessment: QuickAssessment,
    },
    /// Full analysis on every Nth tick.
    Full {
        /// 1-based tick number.
        tick: u64,
        /// Six-check result.
        result: Box<QualityCheckResult>,
    },
    /// The frame source failed to produce a frame on this tick.
    SourceError {
        /// 1-based tick number.
        tick: u64,
        /// Source error text.
        message: String,
    },
}

impl MonitorEvent {
    /// Tick the event belongs to.
    pub fn tick(&self) -> u64 {
        match self {
            Self::Quick { tick, .. } | Self::Full { tick, .. } | Self::SourceError { tick, .. } => {
                *tick
            }
        }
    }
}

/// Handle to a running quality loop.
///
/// [`QualityMonitor::stop`] guarantees that no callback fires after it
/// returns. Dropping the handle aborts the loop.
pub struct QualityMonitor {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<u64>>,
}

impl QualityMonitor {
    /// Starts the loop on the current tokio runtime.
    ///
    /// `on_event` is called from the loop task, one event at a time.
    pub fn spawn<S, F>(
        config: MonitorConfig,
        analyzer: QualityAnalyzer,
        mut source: S,
        mut on_event: F,
    ) -> Self
    where
        S: FrameSource + 'static,
        F: FnMut(MonitorEvent) + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        let analyzer = Arc::new(analyzer);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.tick_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tick = 0u64;

            tracing::info!(
                interval_ms = config.tick_interval_ms,
                full_every = config.full_analysis_every,
                "Quality monitor started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.changed() => break,
                    _ = interval.tick() => {}
                }
                tick += 1;

                let analyzer = Arc::clone(&analyzer);
                let full = config.is_full_tick(tick);
                let job = tokio::task::spawn_blocking(move || {
                    let event = assess_next(&mut source, &analyzer, tick, full);
                    (source, event)
                });
                let event = match job.await {
                    Ok((returned, event)) => {
                        source = returned;
                        event
                    }
                    Err(e) => {
                        // The source went down with the task.
                        tracing::error!(tick, error = %e, "Frame task failed, stopping monitor");
                        return tick;
                    }
                };

                if *cancelled.borrow() {
                    break;
                }
                on_event(event);
            }

            source.close();
            tracing::info!(ticks = tick, "Quality monitor stopped");
            tick
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Cancels the loop and waits for it to finish.
    ///
    /// Returns the number of ticks taken.
    pub async fn stop(mut self) -> u64 {
        let _ = self.cancel.send(true);
        match self.task.take() {
            Some(task) => task.await.unwrap_or(0),
            None => 0,
        }
    }

    /// True once the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for QualityMonitor {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Pulls one frame and runs the analysis this tick calls for.
fn assess_next<S: FrameSource>(
    source: &mut S,
    analyzer: &QualityAnalyzer,
    tick: u64,
    full: bool,
) -> MonitorEvent {
    let frame = match source.next_frame() {
        Ok(frame) => frame,
        Err(e) => {
            return MonitorEvent::SourceError {
                tick,
                message: e.to_string(),
            }
        }
    };
    if full {
        MonitorEvent::Full {
            tick,
            result: Box::new(analyzer.analyze(&frame)),
        }
    } else {
        MonitorEvent::Quick {
            tick,
            assessment: analyzer.quick_assess(&frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MockFrameSource, MockPattern};
    use crate::capture::{ImageFrame, SourceError};
    use crate::quality::QualityThresholds;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Blocks the calling thread on every frame, like a camera read.
    struct SlowSource {
        delay: Duration,
        entered: Arc<AtomicBool>,
    }

    impl FrameSource for SlowSource {
        fn open(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<ImageFrame, SourceError> {
            self.entered.store(true, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(ImageFrame::filled(32, 32, [128, 128, 128, 255]))
        }

        fn is_open(&self) -> bool {
            true
        }

        fn close(&mut self) {}
    }

    fn analyzer() -> QualityAnalyzer {
        QualityAnalyzer::new(QualityThresholds::preview())
    }

    fn source() -> MockFrameSource {
        let mut source = MockFrameSource::new(64, 64, MockPattern::Checkerboard);
        source.open().unwrap();
        source
    }

    #[test]
    fn test_config_validation() {
        assert!(MonitorConfig::default().validate().is_ok());
        let config = MonitorConfig {
            full_analysis_every: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MonitorConfigError::ZeroCadence)));
    }

    #[test]
    fn test_full_tick_cadence() {
        let config = MonitorConfig::default();
        let full: Vec<u64> = (1..=9).filter(|&t| config.is_full_tick(t)).collect();
        assert_eq!(full, vec![3, 6, 9]);
    }

    #[tokio::test]
    async fn test_alternates_quick_and_full() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let config = MonitorConfig {
            tick_interval_ms: 5,
            full_analysis_every: 3,
        };

        let monitor = QualityMonitor::spawn(config, analyzer(), source(), move |event| {
            sink.lock().unwrap().push(event);
        });

        while events.lock().unwrap().len() < 6 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        monitor.stop().await;

        let events = events.lock().unwrap();
        for event in events.iter() {
            let full = matches!(event, MonitorEvent::Full { .. });
            assert_eq!(full, event.tick() % 3 == 0, "tick {}", event.tick());
        }
        // Ticks are delivered strictly in order, one at a time.
        let ticks: Vec<u64> = events.iter().map(MonitorEvent::tick).collect();
        assert!(ticks.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[tokio::test]
    async fn test_no_callbacks_after_stop() {
        let count = Arc::new(Mutex::new(0u64));
        let sink = Arc::clone(&count);
        let config = MonitorConfig {
            tick_interval_ms: 1,
            full_analysis_every: 2,
        };

        let monitor = QualityMonitor::spawn(config, analyzer(), source(), move |_| {
            *sink.lock().unwrap() += 1;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.stop().await;
        let after_stop = *count.lock().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*count.lock().unwrap(), after_stop);
    }

    #[tokio::test]
    async fn test_blocking_source_does_not_stall_runtime() {
        let entered = Arc::new(AtomicBool::new(false));
        let source = SlowSource {
            delay: Duration::from_millis(250),
            entered: Arc::clone(&entered),
        };
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let config = MonitorConfig {
            tick_interval_ms: 1,
            full_analysis_every: 1,
        };

        let monitor = QualityMonitor::spawn(config, analyzer(), source, move |event| {
            sink.lock().unwrap().push(event);
        });
        while !entered.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Single-threaded runtime: this only wakes on time if the read is
        // off the runtime thread.
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(started.elapsed() < Duration::from_millis(150));

        while events.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        monitor.stop().await;
        assert!(matches!(events.lock().unwrap()[0], MonitorEvent::Full { tick: 1, .. }));
    }

    #[tokio::test]
    async fn test_source_errors_reported() {
        // Never opened: every tick reports a source error.
        let closed = MockFrameSource::new(16, 16, MockPattern::Uniform);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let config = MonitorConfig {
            tick_interval_ms: 2,
            full_analysis_every: 3,
        };

        let monitor = QualityMonitor::spawn(config, analyzer(), closed, move |event| {
            sink.lock().unwrap().push(event);
        });
        while events.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        monitor.stop().await;

        let events = events.lock().unwrap();
        assert!(matches!(events[0], MonitorEvent::SourceError { tick: 1, .. }));
    }
}
