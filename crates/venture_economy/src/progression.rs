//! # Progression Curve
//!
//! Pure, zone-parameterized conversion between cumulative experience and level.
//!
//! ```text
//! xp_for_level(L)   = floor(100 * L^1.5 * zone_xp_multiplier)
//! cumulative_xp(L)  = sum of xp_for_level(1..=L)
//! level_from_xp(x)  = largest L <= 100 with cumulative_xp(L) <= x, at least 1
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Zone;

/// Base XP of the curve.
pub const XP_CURVE_BASE: f64 = 100.0;
/// Curve exponent.
pub const XP_CURVE_EXPONENT: f64 = 1.5;
/// Level cap.
pub const MAX_LEVEL: u32 = 100;

/// Flat part of an exploration XP reward.
const EXPLORATION_XP_BASE: f64 = 8.0;
/// Per-level part of an exploration XP reward.
const EXPLORATION_XP_PER_LEVEL: f64 = 0.8;
/// Upper bound of the random part of an exploration XP reward.
const EXPLORATION_XP_SPREAD: f64 = 8.0;

/// Where a player stands inside their current level band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Current level.
    pub level: u32,
    /// XP earned since the band started.
    pub xp_into_level: u64,
    /// Width of the band, zero at the level cap.
    pub xp_for_next: u64,
    /// `xp_into_level / xp_for_next` as a percentage, 100 at the cap.
    pub percent: f64,
}

/// The leveling curve of one zone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressionCurve {
    xp_multiplier: f64,
}

impl ProgressionCurve {
    /// Creates a curve with an explicit XP multiplier.
    #[must_use]
    pub const fn new(xp_multiplier: f64) -> Self {
        Self { xp_multiplier }
    }

    /// The curve of a zone.
    #[must_use]
    pub const fn for_zone(zone: &Zone) -> Self {
        Self::new(zone.xp_multiplier)
    }

    /// XP multiplier of this curve.
    #[must_use]
    pub const fn xp_multiplier(&self) -> f64 {
        self.xp_multiplier
    }

    /// XP needed to complete `level`.
    #[inline]
    #[must_use]
    pub fn xp_for_level(&self, level: u32) -> u64 {
        (XP_CURVE_BASE * f64::from(level).powf(XP_CURVE_EXPONENT) * self.xp_multiplier).floor()
            as u64
    }

    /// Total XP needed to complete levels `1..=level`.
    #[must_use]
    pub fn cumulative_xp(&self, level: u32) -> u64 {
        (1..=level.min(MAX_LEVEL))
            .map(|l| self.xp_for_level(l))
            .fold(0u64, u64::saturating_add)
    }

    /// Level reached with `total_xp` experience.
    #[must_use]
    pub fn level_from_xp(&self, total_xp: u64) -> u32 {
        let mut cumulative = 0u64;
        let mut level = 1;
        for candidate in 1..=MAX_LEVEL {
            cumulative = cumulative.saturating_add(self.xp_for_level(candidate));
            if cumulative > total_xp {
                break;
            }
            level = candidate;
        }
        level
    }

    /// Progress through the current level band.
    #[must_use]
    pub fn level_progress(&self, total_xp: u64) -> LevelProgress {
        let level = self.level_from_xp(total_xp);
        let band_start = if level == 1 { 0 } else { self.cumulative_xp(level) };
        let xp_into_level = total_xp.saturating_sub(band_start);

        if level >= MAX_LEVEL {
            return LevelProgress {
                level,
                xp_into_level,
                xp_for_next: 0,
                percent: 100.0,
            };
        }

        let xp_for_next = self.cumulative_xp(level + 1) - band_start;
        let percent = if xp_for_next == 0 {
            100.0
        } else {
            (xp_into_level as f64 / xp_for_next as f64 * 100.0).min(100.0)
        };

        LevelProgress {
            level,
            xp_into_level,
            xp_for_next,
            percent,
        }
    }

    /// XP granted for one exploration at `player_level`.
    pub fn exploration_xp_reward<R: Rng + ?Sized>(&self, player_level: u32, rng: &mut R) -> u64 {
        let spread = rng.gen_range(0.0..=EXPLORATION_XP_SPREAD);
        let raw = EXPLORATION_XP_BASE
            + f64::from(player_level) * EXPLORATION_XP_PER_LEVEL
            + spread;
        (raw * self.xp_multiplier).floor() as u64
    }
}
