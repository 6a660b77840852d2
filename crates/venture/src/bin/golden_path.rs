//! # Golden Path
//!
//! Explore → encounter → fight → settle → craft, end to end against an
//! in-memory store.
//!
//! Run with: `cargo run --package venture --bin golden_path [config.toml]`
//!
//! `RUST_LOG=debug` shows every roll.

use std::sync::Arc;

use venture::{
    CombatAction, CombatSession, Expedition, Persistence, PlayerRecord, SeedDeriver, VentureConfig,
    VentureError,
};
use venture_combat::CooldownKey;
use venture_economy::RecipeId;

const PLAYER_ID: u64 = 1;
const EXPLORATIONS: usize = 25;
const MAX_ROUNDS: u32 = 60;
const ROPE_RECIPE: RecipeId = 1;

fn main() -> Result<(), VentureError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/config/venture.toml").to_string());
    let config = VentureConfig::load(&config_path)?;
    let catalog = Arc::new(config.load_catalog()?);

    // The ledger replays on top of the starting roster, so a rerun resumes.
    let class = catalog.class(1)?;
    let roster = [PlayerRecord::new(PLAYER_ID, "Wanderer", class, 1).with_currency(100)];
    let store = Arc::new(config.open_store(roster)?);

    // Demo secret. A deployment supplies its own via SeedDeriver::new.
    let expedition = Expedition::new(&config, catalog, store, SeedDeriver::test_seed())?;

    let mut battles = 0u32;
    for _ in 0..EXPLORATIONS {
        let report = expedition.explore(PLAYER_ID, None)?;
        let Some(encounter) = report.encounter else {
            continue;
        };

        // Walk away from anything above uncommon.
        if encounter.rarity.index() > 1 {
            expedition.decline(PLAYER_ID)?;
            continue;
        }

        battles += 1;
        let mut session = expedition.fight(PLAYER_ID)?;
        loop {
            if session.round() > MAX_ROUNDS {
                let settlement = expedition.flee(PLAYER_ID)?;
                tracing::info!("Fled, balance now {}", settlement.record.currency);
                break;
            }
            let step = expedition.act(PLAYER_ID, choose_action(&session))?;
            if let Some(settlement) = step.settlement {
                tracing::info!(
                    "{:?} after {} rounds: {} coins, {} xp, level {} -> {}",
                    settlement.reward.outcome,
                    settlement.reward.rounds,
                    settlement.reward.currency_delta,
                    settlement.reward.xp_gained,
                    settlement.reward.level_before,
                    settlement.reward.level_after
                );
                break;
            }
            match expedition.active_session(PLAYER_ID) {
                Some(next) => session = next,
                None => break,
            }
        }
    }

    if expedition.can_craft(PLAYER_ID, ROPE_RECIPE)? {
        let crafted = expedition.craft(PLAYER_ID, ROPE_RECIPE)?;
        tracing::info!(
            "Crafted recipe {} ({} total)",
            crafted.recipe_id,
            crafted.crafted_count
        );
    }

    let record = expedition.store().get_player(PLAYER_ID)?;
    let progress = expedition.level_progress(PLAYER_ID)?;
    tracing::info!(
        "Done: {} battles, level {}, {} xp, {} coins, {} item rows, {:.0}% to next level",
        battles,
        record.level,
        record.total_xp,
        record.currency,
        record.inventory.row_count(),
        progress.percent
    );
    Ok(())
}

/// Ultimate when full, else the first ready affordable ability, else attack.
fn choose_action(session: &CombatSession) -> CombatAction {
    if session.resources().ultimate_ready() && session.loadout().ultimate().is_some() {
        return CombatAction::Ultimate;
    }
    session
        .loadout()
        .abilities()
        .iter()
        .find(|ability| {
            session.resources().can_afford(ability.energy_cost)
                && session.cooldowns().is_ready(CooldownKey::Ability(ability.id))
        })
        .map_or(CombatAction::Attack, |ability| CombatAction::Ability(ability.id))
}
