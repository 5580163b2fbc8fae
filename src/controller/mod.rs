//! The dispatch loop.
//!
//! ```text
//! WaitingForDevice -> Streaming <-> TransientError
//!        |                |               |
//!        +----------------+---------------+--> Fatal
//! ```
//!
//! Every tick polls the TV once, rebuilds the zone model and sends one color
//! per fixture. Failed polls are counted and the loop gives up once more
//! than [`MAX_FAILURES`] happen in a row.

use std::future::Future;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::{sleep, Instant};

use crate::color::zones::ZoneModel;
use crate::config::Fixture;
use crate::error::AmbiError;
use crate::lights::LightSink;
use crate::tv::AmbilightSource;

/// Pause before every poll so neither the CPU nor the TV is saturated
pub const TICK: Duration = Duration::from_millis(10);
/// Consecutive failed polls that are still tolerated
pub const MAX_FAILURES: u32 = 10;

const REPORT_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Stopped by the operator
    Interrupted,
    /// Too many failed polls in a row
    Exhausted,
    /// The TV never came up
    Unreachable,
    /// A bug or a dead lighting session
    Fault,
}

impl ExitReason {
    pub fn code(self) -> i32 {
        match self {
            ExitReason::Interrupted => 0,
            ExitReason::Exhausted => 10,
            ExitReason::Unreachable | ExitReason::Fault => 1,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    WaitingForDevice,
    Streaming,
    TransientError,
    Fatal(ExitReason),
}

#[derive(Debug)]
pub struct FailureCounter {
    count: u32,
    threshold: u32,
}

impl FailureCounter {
    pub fn new(threshold: u32) -> FailureCounter {
        FailureCounter { count: 0, threshold }
    }

    /// Counts one more failure and returns the streak length.
    pub fn record(&mut self) -> u32 {
        self.count += 1;
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn exhausted(&self) -> bool {
        self.count > self.threshold
    }
}

#[derive(Debug)]
struct FrameStats {
    start: Instant,
    sum: Duration,
    frames: u32,
    failed: u32,
}

impl FrameStats {
    fn new() -> FrameStats {
        FrameStats {
            start: Instant::now(),
            sum: Duration::ZERO,
            frames: 0,
            failed: 0,
        }
    }

    fn record(&mut self, elapsed: Duration, ok: bool) {
        self.sum += elapsed;
        self.frames += 1;
        if !ok {
            self.failed += 1;
        }

        if self.start.elapsed() > REPORT_PERIOD {
            log::info!(
                "Ambilight stats [num frames in report: {}, failed: {}, avg frame time in ms: {:.3}]",
                self.frames,
                self.failed,
                self.sum.as_secs_f64() * 1000.0 / self.frames as f64
            );
            *self = FrameStats::new();
        }
    }
}

pub struct Controller<S, L> {
    source: S,
    lights: L,
    fixtures: IndexMap<String, Fixture>,
    failures: FailureCounter,
    stats: FrameStats,
}

impl<S: AmbilightSource, L: LightSink> Controller<S, L> {
    pub fn new(source: S, lights: L, fixtures: IndexMap<String, Fixture>) -> Controller<S, L> {
        Controller {
            source,
            lights,
            fixtures,
            failures: FailureCounter::new(MAX_FAILURES),
            stats: FrameStats::new(),
        }
    }

    /// Streams until a fatal error or until `shutdown` resolves, then
    /// releases the lights and the TV connection, in that order.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) -> ExitReason {
        let reason = tokio::select! {
            reason = self.drive() => reason,
            () = shutdown => {
                log::warn!("Gracefully stopping");
                ExitReason::Interrupted
            }
        };

        self.lights.close().await;
        self.source.close();

        reason
    }

    async fn drive(&mut self) -> ExitReason {
        let mut state = State::WaitingForDevice;

        loop {
            state = match state {
                State::WaitingForDevice => match self.source.wait_for_startup().await {
                    Ok(()) => {
                        log::info!("Starting ambilight streaming");
                        State::Streaming
                    }
                    Err(e) => {
                        log::error!("{}", e);
                        State::Fatal(ExitReason::Unreachable)
                    }
                },
                State::Streaming => {
                    sleep(TICK).await;

                    match self.tick().await {
                        Ok(()) => State::Streaming,
                        Err(e) if e.is_retryable() => State::TransientError,
                        Err(e) => {
                            log::error!("Stopping: {}", e);
                            State::Fatal(ExitReason::Fault)
                        }
                    }
                }
                State::TransientError => {
                    if self.failures.exhausted() {
                        log::error!(
                            "TV failed {} requests in a row, giving up",
                            self.failures.count()
                        );
                        State::Fatal(ExitReason::Exhausted)
                    } else {
                        State::Streaming
                    }
                }
                State::Fatal(reason) => return reason,
            };
        }
    }

    async fn tick(&mut self) -> Result<(), AmbiError> {
        let started = Instant::now();

        let model = match self.source.poll().await {
            Ok(model) => {
                self.failures.reset();
                model
            }
            Err(e) => {
                let streak = self.failures.record();
                log::error!("Failed to read ambilight ({} in a row): {}", streak, e);
                self.stats.record(started.elapsed(), false);
                return Err(e);
            }
        };

        if log::log_enabled!(log::Level::Debug) {
            log_model(&model);
        }

        for (name, fixture) in &self.fixtures {
            let color = model.average(&fixture.positions)?;
            self.lights.set_color(fixture.id, color).await?;

            log::info!("Light: {} - {} {} - {}", name, color, color.swatch(), fixture);
        }

        self.stats.record(started.elapsed(), true);

        Ok(())
    }
}

fn log_model(model: &ZoneModel) {
    for line in model.render() {
        log::debug!("{}", line);
    }
}
