//! Per-arc animation state machine.
//!
//! ```text
//!   Traveling ──(travel ≥ 1 or retire)──► Fading ──(fade ≤ 0)──► Done
//! ```
//!
//! Linear, no branching, no re-entry. The owner drives it with
//! [`ArcAnimator::advance`] from whatever loop it runs and reacts to the
//! returned [`ArcSignal`]; there is no completion callback.

use crate::arc_path::ArcPath;
use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Opacity multipliers applied on top of the fade progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpacityProfile {
    /// Arc tube opacity when not dimmed (default: 0.55)
    pub arc_normal: f64,
    /// Arc tube opacity when another event is selected (default: 0.1)
    pub arc_dimmed: f64,
    /// Packet opacity while fading, not dimmed (default: 0.6)
    pub packet_fading: f64,
    /// Packet opacity while traveling and dimmed (default: 0.2)
    pub packet_dimmed: f64,
}

impl Default for OpacityProfile {
    fn default() -> Self {
        Self {
            arc_normal: 0.55,
            arc_dimmed: 0.1,
            packet_fading: 0.6,
            packet_dimmed: 0.2,
        }
    }
}

/// Timing configuration shared by every animator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Lower bound of the per-arc travel speed, progress/s (default: 0.15)
    pub speed_min: f64,
    /// Upper bound of the per-arc travel speed, progress/s (default: 0.30)
    pub speed_max: f64,
    /// Fade decay, progress/s (default: 0.4)
    pub fade_rate: f64,
    /// Polyline resolution handed to renderers (default: 50)
    pub path_segments: usize,
    pub opacity: OpacityProfile,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            speed_min: 0.15,
            speed_max: 0.30,
            fade_rate: 0.4,
            path_segments: 50,
            opacity: OpacityProfile::default(),
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArcPhase {
    Traveling,
    Fading,
    Done,
}

/// Mutable animation state, owned by exactly one animator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcAnimationState {
    /// [0, 1], 1 = packet reached the target
    pub travel_progress: f64,
    /// [0, 1], starts at 1 and decays to 0 while fading
    pub fade_progress: f64,
    pub phase: ArcPhase,
}

impl ArcAnimationState {
    fn new() -> Self {
        Self {
            travel_progress: 0.0,
            fade_progress: 1.0,
            phase: ArcPhase::Traveling,
        }
    }
}

/// Outcome of one [`ArcAnimator::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcSignal {
    /// Still animating, in the given phase
    Active(ArcPhase),
    /// Reached `Done` on this very call; the owner must drop the animator
    Completed,
    /// Already `Done` before this call; nothing changed
    Inert,
}

// ============================================================================
// ANIMATOR
// ============================================================================

/// Drives one in-flight attack arc.
#[derive(Debug, Clone)]
pub struct ArcAnimator {
    path: ArcPath,
    state: ArcAnimationState,

    /// Travel speed, fixed at creation
    speed: f64,
    fade_rate: f64,
    opacity: OpacityProfile,

    /// Curve parameter the packet stopped at when fading began
    rest_at: f64,
}

impl ArcAnimator {
    /// Creates an animator with an explicit speed.
    ///
    /// Non-positive rates are not rejected here; configuration validation
    /// guarantees positive values for every animator the runtime builds.
    pub fn new(path: ArcPath, speed: f64, fade_rate: f64, opacity: OpacityProfile) -> Self {
        Self {
            path,
            state: ArcAnimationState::new(),
            speed,
            fade_rate,
            opacity,
            rest_at: 1.0,
        }
    }

    /// Creates an animator whose speed is drawn uniformly from
    /// `[speed_min, speed_max]` using the injected RNG.
    pub fn with_rng<R: Rng + ?Sized>(path: ArcPath, config: &AnimationConfig, rng: &mut R) -> Self {
        let speed = if config.speed_max > config.speed_min {
            rng.gen_range(config.speed_min..=config.speed_max)
        } else {
            config.speed_min
        };
        Self::new(path, speed, config.fade_rate, config.opacity)
    }

    /// Advances the timers by `dt` seconds.
    ///
    /// Negative or non-finite deltas count as zero. The `Traveling ->
    /// Fading` transition happens in the same call that reaches the target,
    /// so no frame is lost.
    pub fn advance(&mut self, dt: f64) -> ArcSignal {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        match self.state.phase {
            ArcPhase::Done => return ArcSignal::Inert,
            ArcPhase::Traveling => {
                self.state.travel_progress += dt * self.speed;
                if self.state.travel_progress >= 1.0 {
                    self.state.travel_progress = 1.0;
                    self.rest_at = 1.0;
                    self.state.phase = ArcPhase::Fading;
                }
            }
            ArcPhase::Fading => {
                self.state.fade_progress -= dt * self.fade_rate;
                if self.state.fade_progress <= 0.0 {
                    self.state.fade_progress = 0.0;
                    self.state.phase = ArcPhase::Done;
                    return ArcSignal::Completed;
                }
            }
        }

        ArcSignal::Active(self.state.phase)
    }

    /// Cuts the flight short: a traveling arc starts fading where its packet
    /// currently is. No effect once fading or done.
    pub fn retire(&mut self) {
        if self.state.phase == ArcPhase::Traveling {
            self.rest_at = self.state.travel_progress;
            self.state.phase = ArcPhase::Fading;
        }
    }

    /// Packet position: on the curve while traveling, parked afterwards.
    pub fn position(&self) -> Vector3<f64> {
        match self.state.phase {
            ArcPhase::Traveling => self.path.point_at(self.state.travel_progress),
            ArcPhase::Fading | ArcPhase::Done => self.path.point_at(self.rest_at),
        }
    }

    /// Arc tube opacity. Dimming scales the output only, never the timers.
    pub fn opacity(&self, dimmed: bool) -> f64 {
        let factor = if dimmed {
            self.opacity.arc_dimmed
        } else {
            self.opacity.arc_normal
        };
        self.state.fade_progress * factor
    }

    /// Traveling packet marker opacity.
    pub fn packet_opacity(&self, dimmed: bool) -> f64 {
        match self.state.phase {
            ArcPhase::Traveling => {
                if dimmed {
                    self.opacity.packet_dimmed
                } else {
                    1.0
                }
            }
            ArcPhase::Fading | ArcPhase::Done => {
                let factor = if dimmed {
                    self.opacity.arc_dimmed
                } else {
                    self.opacity.packet_fading
                };
                self.state.fade_progress * factor
            }
        }
    }

    pub fn phase(&self) -> ArcPhase {
        self.state.phase
    }

    pub fn state(&self) -> &ArcAnimationState {
        &self.state
    }

    pub fn path(&self) -> &ArcPath {
        &self.path
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_done(&self) -> bool {
        self.state.phase == ArcPhase::Done
    }
}
