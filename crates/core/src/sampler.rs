//! Rate-adaptive sampling over an unbounded video frame stream.
//!
//! Screen-share tracks deliver far more frames than the agent can afford to
//! look at. The sampler accepts at most one frame per interval, where the
//! interval is the reciprocal of a rate that depends on whether the remote
//! user is currently speaking, and flags a subset of accepted frames as
//! candidates for analysis. Frames between samples are dropped, never
//! buffered; the stream is pull-based so a dropped frame costs nothing.

use std::time::{Duration, Instant};

/// Sampling rate (frames per second) while the remote user is speaking.
pub const DEFAULT_SPEAKING_FRAME_RATE: f64 = 1.0;
/// Sampling rate (frames per second) while the remote user is quiet.
pub const DEFAULT_IDLE_FRAME_RATE: f64 = 0.5;

/// Every Nth accepted frame becomes a candidate for analysis.
const CANDIDATE_EVERY: u64 = 30;
/// Every Nth accepted frame is analyzed even with no pending question.
const FORCED_CANDIDATE_EVERY: u64 = 120;

/// Sampling rates, overridable from configuration.
///
/// The minimum gap between accepted frames is the reciprocal of the active
/// rate. The speaking rate should be at least the idle rate.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub speaking_rate: f64,
    pub idle_rate: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            speaking_rate: DEFAULT_SPEAKING_FRAME_RATE,
            idle_rate: DEFAULT_IDLE_FRAME_RATE,
        }
    }
}

/// Outcome of observing one incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// Not enough time has passed since the last accepted frame.
    Discard,
    /// Accepted into the sample sequence, nothing further to do.
    Accepted,
    /// Accepted, and worth considering for analysis. A forced candidate is
    /// analyzed even when the user has not asked anything.
    Candidate { forced: bool },
}

/// Decides which frames of a video stream are worth acting on.
///
/// The sampler is owned by the single task that pumps one video track, so
/// the accept-and-update step needs no synchronization: a decision and the
/// matching state update happen behind one `&mut self` call and no two
/// frames can pass the time check for the same interval.
#[derive(Debug)]
pub struct FrameSampler {
    config: SamplerConfig,
    last_sample: Option<Instant>,
    frame_count: u64,
    remote_speaking: bool,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            last_sample: None,
            frame_count: 0,
            remote_speaking: false,
        }
    }

    /// Updates the speaking state used to pick the sampling interval.
    pub fn set_speaking(&mut self, speaking: bool) {
        self.remote_speaking = speaking;
    }

    /// Number of frames accepted so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Minimum wall-clock gap between accepted frames for the current
    /// speaking state.
    pub fn interval(&self) -> Duration {
        let rate = if self.remote_speaking {
            self.config.speaking_rate
        } else {
            self.config.idle_rate
        };
        Duration::from_secs_f64(1.0 / rate)
    }

    /// Observes a frame arriving at `now` and decides what to do with it.
    ///
    /// The first frame is always accepted. Later frames are accepted only
    /// once the interval for the speaking state at call time has elapsed
    /// since the previously accepted frame.
    pub fn observe(&mut self, now: Instant) -> FrameDecision {
        if let Some(last) = self.last_sample {
            if now.duration_since(last) < self.interval() {
                return FrameDecision::Discard;
            }
        }
        self.last_sample = Some(now);
        self.frame_count += 1;

        if self.frame_count % CANDIDATE_EVERY == 0 {
            FrameDecision::Candidate {
                forced: self.frame_count % FORCED_CANDIDATE_EVERY == 0,
            }
        } else {
            FrameDecision::Accepted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sampler() -> FrameSampler {
        FrameSampler::new(SamplerConfig::default())
    }

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    #[test]
    fn interval_follows_speaking_state() {
        let mut sampler = sampler();
        assert_relative_eq!(sampler.interval().as_secs_f64(), 2.0);
        sampler.set_speaking(true);
        assert_relative_eq!(sampler.interval().as_secs_f64(), 1.0);
    }

    #[test]
    fn one_hz_stream_while_idle_samples_every_other_frame() {
        // Rates 1.0 / 0.5 and nobody speaking: frames at t=0,1,2,3 must be
        // accepted at t=0 and t=2 only.
        let base = Instant::now();
        let mut sampler = sampler();

        assert_ne!(sampler.observe(at(base, 0.0)), FrameDecision::Discard);
        assert_eq!(sampler.observe(at(base, 1.0)), FrameDecision::Discard);
        assert_ne!(sampler.observe(at(base, 2.0)), FrameDecision::Discard);
        assert_eq!(sampler.observe(at(base, 3.0)), FrameDecision::Discard);
        assert_eq!(sampler.frame_count(), 2);
    }

    #[test]
    fn accepted_frames_never_closer_than_the_active_interval() {
        let base = Instant::now();
        let mut sampler = sampler();
        let mut last_accept: Option<f64> = None;

        for tick in 0..400 {
            let t = tick as f64 * 0.1;
            // Toggle the speaking state partway through the stream.
            sampler.set_speaking(t >= 20.0);
            let min_gap = sampler.interval().as_secs_f64();
            if sampler.observe(at(base, t)) != FrameDecision::Discard {
                if let Some(prev) = last_accept {
                    assert!(
                        t - prev >= min_gap - 1e-9,
                        "accepted frames {prev}s and {t}s violate the {min_gap}s interval"
                    );
                }
                last_accept = Some(t);
            }
        }
    }

    #[test]
    fn speaking_slows_sampling_down() {
        let base = Instant::now();
        let mut sampler = sampler();
        sampler.set_speaking(true);

        assert_ne!(sampler.observe(at(base, 0.0)), FrameDecision::Discard);
        // One second is enough at the speaking rate but the idle rate would
        // also have allowed it at two; check the boundary just below.
        assert_eq!(sampler.observe(at(base, 0.9)), FrameDecision::Discard);
        assert_ne!(sampler.observe(at(base, 1.0)), FrameDecision::Discard);
    }

    #[test]
    fn every_thirtieth_accepted_frame_is_a_candidate() {
        let base = Instant::now();
        let mut sampler = sampler();

        for n in 1..=240u64 {
            let decision = sampler.observe(at(base, n as f64 * 2.0));
            match decision {
                FrameDecision::Discard => panic!("frame {n} unexpectedly discarded"),
                FrameDecision::Accepted => {
                    assert_ne!(n % 30, 0, "frame {n} should have been a candidate")
                }
                FrameDecision::Candidate { forced } => {
                    assert_eq!(n % 30, 0, "frame {n} should not be a candidate");
                    assert_eq!(forced, n % 120 == 0, "wrong forced flag at frame {n}");
                }
            }
        }
        assert_eq!(sampler.frame_count(), 240);
    }
}
