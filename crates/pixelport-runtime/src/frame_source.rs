//! Frame-presentation facilities.
//!
//! A [`FrameSource`] hands out one-shot frame requests and later signals them,
//! one at a time. `wait_for_frame` is the only place a session ever suspends.

use std::fmt;
use std::time::{Duration, Instant};

use pixelport_core::{PortError, PortResult, MIN_FPS};

/// Identifies one outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationHandle(u64);

impl AnimationHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnimationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A frame request coming due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSignal {
    pub handle: AnimationHandle,
    /// Milliseconds since the source was created.
    pub timestamp_ms: f64,
}

pub trait FrameSource {
    /// Ask for one upcoming frame.
    fn request_frame(&mut self) -> AnimationHandle;

    /// Withdraw a request that has not fired yet. Unknown handles are ignored.
    fn cancel_frame(&mut self, handle: AnimationHandle);

    /// Suspend until the pending request is due and return it.
    /// Returns `None` when no request is pending.
    fn wait_for_frame(&mut self) -> Option<FrameSignal>;
}

/// Fires frame requests at a fixed rate on the wall clock.
///
/// After a slow frame the next one fires immediately, then the cadence resumes;
/// missed frames are dropped rather than replayed in a burst.
pub struct IntervalFrameSource {
    interval: Duration,
    origin: Instant,
    next_due: Instant,
    pending: Option<AnimationHandle>,
    next_id: u64,
}

impl IntervalFrameSource {
    pub fn new(fps: f64) -> PortResult<Self> {
        if !(fps.is_finite() && fps >= MIN_FPS) {
            return Err(PortError::InvalidState(format!(
                "frame rate must be a finite number of at least {}, got {}",
                MIN_FPS, fps
            )));
        }
        let interval = Duration::try_from_secs_f64(1.0 / fps).map_err(|e| {
            PortError::InvalidState(format!("frame rate {} has no usable interval: {}", fps, e))
        })?;
        let origin = Instant::now();
        let next_due = origin.checked_add(interval).ok_or_else(|| {
            PortError::InvalidState(format!("frame interval {:?} is too long", interval))
        })?;
        Ok(Self {
            interval,
            origin,
            next_due,
            pending: None,
            next_id: 1,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left until the pending request is due; `None` when nothing is pending.
    pub fn until_due(&self) -> Option<Duration> {
        self.pending?;
        Some(self.next_due.saturating_duration_since(Instant::now()))
    }

    /// Fire the pending request now, whether or not it is due yet.
    pub fn fire(&mut self) -> Option<FrameSignal> {
        let handle = self.pending.take()?;
        let fired = Instant::now();

        self.next_due += self.interval;
        if self.next_due < fired {
            self.next_due = fired;
        }

        Some(FrameSignal {
            handle,
            timestamp_ms: fired.duration_since(self.origin).as_secs_f64() * 1000.0,
        })
    }
}

impl FrameSource for IntervalFrameSource {
    fn request_frame(&mut self) -> AnimationHandle {
        let handle = AnimationHandle::new(self.next_id);
        self.next_id += 1;
        if let Some(previous) = self.pending.replace(handle) {
            tracing::warn!("Frame request {} replaced pending request {}", handle, previous);
        }
        handle
    }

    fn cancel_frame(&mut self, handle: AnimationHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }

    fn wait_for_frame(&mut self) -> Option<FrameSignal> {
        let wait = self.until_due()?;
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        self.fire()
    }
}

/// Fires frame requests immediately on a virtual clock advancing by a fixed step.
///
/// For headless runs that must be reproducible: timestamps depend only on the
/// number of frames fired, never on wall-clock time.
pub struct SteppedFrameSource {
    step_ms: f64,
    now_ms: f64,
    pending: Option<AnimationHandle>,
    next_id: u64,
    requests: u64,
    max_outstanding: usize,
}

impl SteppedFrameSource {
    pub fn new(step_ms: f64) -> Self {
        Self {
            step_ms,
            now_ms: 0.0,
            pending: None,
            next_id: 1,
            requests: 0,
            max_outstanding: 0,
        }
    }

    /// Virtual clock at `fps` frames per second.
    pub fn at_fps(fps: f64) -> Self {
        Self::new(1000.0 / fps)
    }

    pub fn pending(&self) -> Option<AnimationHandle> {
        self.pending
    }

    /// Total number of requests ever made.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Most requests that were ever outstanding at once.
    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding
    }
}

impl FrameSource for SteppedFrameSource {
    fn request_frame(&mut self) -> AnimationHandle {
        let handle = AnimationHandle::new(self.next_id);
        self.next_id += 1;
        self.requests += 1;
        let outstanding = if self.pending.is_some() { 2 } else { 1 };
        self.max_outstanding = self.max_outstanding.max(outstanding);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: AnimationHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }

    fn wait_for_frame(&mut self) -> Option<FrameSignal> {
        let handle = self.pending.take()?;
        self.now_ms += self.step_ms;
        Some(FrameSignal {
            handle,
            timestamp_ms: self.now_ms,
        })
    }
}
