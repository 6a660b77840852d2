//! # Session Registry
//!
//! One live session per player, serialized per key.
//!
//! ## Concurrency
//!
//! ```text
//! RwLock<HashMap<PlayerId, Arc<Slot>>>
//!                              │
//!                              └── Mutex<SlotState> (all session work)
//! ```
//!
//! The map lock is only held to find, insert or remove a slot. Work on a
//! session happens under that player's slot mutex, so different players never
//! contend. Lock order is always slot before map.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use venture_economy::PlayerId;

use crate::error::{CombatError, CombatResult};
use crate::outcome::IdleOutcome;
use crate::session::CombatSession;

/// Idle expiry settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Seconds without activity before a session is expired.
    pub idle_timeout_secs: u64,
    /// How expired sessions are settled.
    pub idle_outcome: IdleOutcome,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            idle_outcome: IdleOutcome::AutoFlee,
        }
    }
}

impl SessionPolicy {
    /// Idle timeout as a duration.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

struct SlotState {
    session: CombatSession,
    last_activity: Instant,
}

struct Slot {
    retired: AtomicBool,
    state: Mutex<SlotState>,
}

/// Live sessions keyed by player.
pub struct SessionRegistry {
    slots: RwLock<HashMap<PlayerId, Arc<Slot>>>,
    policy: SessionPolicy,
}

impl SessionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Expiry settings.
    #[must_use]
    pub const fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Registers a new session for its player.
    ///
    /// # Errors
    ///
    /// Returns `StateConflict` if the player already has a live session.
    pub fn open(&self, session: CombatSession) -> CombatResult<()> {
        self.open_at(session, Instant::now())
    }

    /// Registers a new session, stamping `now` as its last activity.
    ///
    /// # Errors
    ///
    /// Returns `StateConflict` if the player already has a live session.
    pub fn open_at(&self, session: CombatSession, now: Instant) -> CombatResult<()> {
        let player_id = session.player_id();
        let mut slots = self.slots.write();
        if let Some(existing) = slots.get(&player_id) {
            if !existing.retired.load(Ordering::Acquire) {
                return Err(CombatError::StateConflict(format!(
                    "player {player_id} is already in combat"
                )));
            }
        }
        slots.insert(
            player_id,
            Arc::new(Slot {
                retired: AtomicBool::new(false),
                state: Mutex::new(SlotState {
                    session,
                    last_activity: now,
                }),
            }),
        );
        tracing::debug!("Session opened for player {}", player_id);
        Ok(())
    }

    /// Runs `f` on the player's session under its lock.
    ///
    /// If the session is retired when `f` returns, it leaves the registry.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveSession` if the player has no live session, otherwise
    /// whatever `f` returns.
    pub fn with_session<T>(
        &self,
        player_id: PlayerId,
        f: impl FnOnce(&mut CombatSession) -> CombatResult<T>,
    ) -> CombatResult<T> {
        self.with_session_at(player_id, Instant::now(), f)
    }

    /// [`SessionRegistry::with_session`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`SessionRegistry::with_session`].
    pub fn with_session_at<T>(
        &self,
        player_id: PlayerId,
        now: Instant,
        f: impl FnOnce(&mut CombatSession) -> CombatResult<T>,
    ) -> CombatResult<T> {
        let slot = self
            .slots
            .read()
            .get(&player_id)
            .cloned()
            .ok_or(CombatError::NoActiveSession(player_id))?;

        let mut state = slot.state.lock();
        if slot.retired.load(Ordering::Acquire) {
            return Err(CombatError::NoActiveSession(player_id));
        }
        state.last_activity = now;
        let result = f(&mut state.session);

        if state.session.is_retired() {
            slot.retired.store(true, Ordering::Release);
            self.remove_slot(player_id, &slot);
        }
        result
    }

    /// A copy of the player's live session.
    #[must_use]
    pub fn snapshot(&self, player_id: PlayerId) -> Option<CombatSession> {
        let slot = self.slots.read().get(&player_id).cloned()?;
        let state = slot.state.lock();
        if slot.retired.load(Ordering::Acquire) {
            return None;
        }
        Some(state.session.clone())
    }

    /// True if the player has a live session.
    #[must_use]
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.slots
            .read()
            .get(&player_id)
            .is_some_and(|slot| !slot.retired.load(Ordering::Acquire))
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| !slot.retired.load(Ordering::Acquire))
            .count()
    }

    /// True if no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `settle` on every session idle past the policy timeout, under
    /// that session's lock.
    ///
    /// A session leaves the registry only if it is retired when `settle`
    /// returns. One that `settle` left live stays put, keeps its last
    /// activity, and is offered again on the next sweep.
    pub fn sweep_idle<T>(
        &self,
        now: Instant,
        mut settle: impl FnMut(&mut CombatSession) -> CombatResult<T>,
    ) -> Vec<(PlayerId, CombatResult<T>)> {
        let timeout = self.policy.idle_timeout();
        let candidates: Vec<(PlayerId, Arc<Slot>)> = self
            .slots
            .read()
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();

        let mut swept = Vec::new();
        for (player_id, slot) in candidates {
            let mut state = slot.state.lock();
            if slot.retired.load(Ordering::Acquire) {
                continue;
            }
            if now.saturating_duration_since(state.last_activity) < timeout {
                continue;
            }
            let result = settle(&mut state.session);
            if state.session.is_retired() {
                slot.retired.store(true, Ordering::Release);
                self.remove_slot(player_id, &slot);
            }
            swept.push((player_id, result));
        }

        if !swept.is_empty() {
            tracing::info!("Swept {} idle combat sessions", swept.len());
        }
        swept
    }

    fn remove_slot(&self, player_id: PlayerId, slot: &Arc<Slot>) {
        let mut slots = self.slots.write();
        if slots
            .get(&player_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            slots.remove(&player_id);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionPolicy::default())
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("live", &self.len())
            .field("policy", &self.policy)
            .finish()
    }
}
