//! End-to-end flows through the expedition facade.
//!
//! Run with: cargo test --package venture --test expedition_flow_test

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use venture::{
    BattleOutcome, Catalog, CombatAction, ErrorKind, Expedition, IdleOutcome, MemoryStore,
    Persistence, PlayerRecord, SeedDeriver, VentureConfig,
};
use venture_economy::ProgressionCurve;

const START_COINS: u64 = 100;

fn setup(config: &VentureConfig, players: u64) -> (Expedition<MemoryStore>, Arc<MemoryStore>) {
    let catalog = Arc::new(Catalog::builtin().unwrap());
    let store = Arc::new(MemoryStore::new());
    for id in 1..=players {
        let class = catalog.class(1).unwrap();
        store.insert_player(PlayerRecord::new(id, format!("p{id}"), class, 1).with_currency(START_COINS));
    }
    let expedition =
        Expedition::new(config, catalog, Arc::clone(&store), SeedDeriver::test_seed()).unwrap();
    (expedition, store)
}

fn temp_ledger_path(tag: &str) -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("test_expedition_{tag}_{id}.vldg"))
}

fn roster(catalog: &Catalog) -> Vec<PlayerRecord> {
    let class = catalog.class(1).unwrap();
    vec![PlayerRecord::new(1, "p1", class, 1).with_currency(START_COINS)]
}

fn explore_quietly(expedition: &Expedition<MemoryStore>, id: u64, times: usize) {
    for _ in 0..times {
        if expedition.explore(id, None).unwrap().encounter.is_some() {
            expedition.decline(id).unwrap();
        }
    }
}

fn start_battle(expedition: &Expedition<MemoryStore>, id: u64) {
    for _ in 0..200 {
        if expedition.explore(id, None).unwrap().encounter.is_some() {
            expedition.fight(id).unwrap();
            return;
        }
    }
    panic!("player {id} met no creature in 200 explorations");
}

#[test]
fn test_battle_to_completion_settles_once() {
    let (expedition, store) = setup(&VentureConfig::default(), 1);
    start_battle(&expedition, 1);
    let before = store.get_player(1).unwrap();

    let mut settlement = None;
    for _ in 0..500 {
        let step = expedition.act(1, CombatAction::Attack).unwrap();
        if step.settlement.is_some() {
            assert!(step.round.player_hp == 0 || step.round.creature_hp == 0);
            settlement = step.settlement;
            break;
        }
    }
    let settlement = settlement.expect("battle never ended");

    let expected = i64::try_from(before.currency).unwrap() + settlement.reward.currency_delta;
    assert_eq!(settlement.record.currency, u64::try_from(expected.max(0)).unwrap());
    assert_eq!(store.get_player(1).unwrap(), settlement.record);
    match settlement.reward.outcome {
        BattleOutcome::Victory => {
            assert!(settlement.reward.currency_delta > 0);
            assert!(settlement.reward.xp_gained > 0);
        }
        BattleOutcome::Defeat => assert_eq!(settlement.reward.currency_delta, -25),
        BattleOutcome::Fled => panic!("nobody fled"),
    }
    assert!(settlement.record.level >= before.level);
    assert_eq!(settlement.reward.level_after, settlement.record.level);
    assert_eq!(settlement.reward.levelled_up(), settlement.record.level > before.level);

    assert!(expedition.active_session(1).is_none());
    let err = expedition.act(1, CombatAction::Attack).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveSession);
    assert_eq!(expedition.settle(1).unwrap_err().kind(), ErrorKind::NoActiveSession);
}

#[test]
fn test_flee_applies_exactly_one_penalty() {
    let (expedition, store) = setup(&VentureConfig::default(), 1);
    start_battle(&expedition, 1);
    expedition.act(1, CombatAction::Defend).unwrap();
    let before = store.get_player(1).unwrap().currency;

    let settlement = expedition.flee(1).unwrap();
    assert_eq!(settlement.reward.outcome, BattleOutcome::Fled);
    assert_eq!(settlement.reward.currency_delta, -12);
    assert_eq!(settlement.record.currency, before - 12);

    assert_eq!(expedition.flee(1).unwrap_err().kind(), ErrorKind::NoActiveSession);
    assert!(expedition.sweep_idle(Instant::now() + Duration::from_secs(3_600)).is_empty());
    assert_eq!(store.get_player(1).unwrap().currency, before - 12);
}

#[test]
fn test_rejected_action_changes_nothing() {
    let (expedition, _store) = setup(&VentureConfig::default(), 1);
    start_battle(&expedition, 1);
    let before = expedition.active_session(1).unwrap();

    let err = expedition.act(1, CombatAction::Ultimate).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAction);
    let err = expedition.act_str(1, "dance").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAction);

    let after = expedition.active_session(1).unwrap();
    assert_eq!(after.round(), before.round());
    assert_eq!(after.player().hp(), before.player().hp());
    assert_eq!(after.creature().hp(), before.creature().hp());
    assert_eq!(after.resources(), before.resources());
    assert!(after.log().is_empty());
}

#[test]
fn test_second_fight_conflicts() {
    let (expedition, _store) = setup(&VentureConfig::default(), 1);
    start_battle(&expedition, 1);

    assert_eq!(expedition.fight(1).unwrap_err().kind(), ErrorKind::StateConflict);
    assert_eq!(
        expedition.explore(1, None).unwrap_err().kind(),
        ErrorKind::StateConflict
    );
}

#[test]
fn test_idle_sweep_auto_flee() {
    let mut config = VentureConfig::default();
    config.sessions.idle_timeout_secs = 60;
    let (expedition, store) = setup(&config, 1);
    start_battle(&expedition, 1);
    let before = store.get_player(1).unwrap().currency;

    assert!(expedition.sweep_idle(Instant::now()).is_empty());
    let swept = expedition.sweep_idle(Instant::now() + Duration::from_secs(120));
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].reward.outcome, BattleOutcome::Fled);
    assert_eq!(store.get_player(1).unwrap().currency, before - 12);

    assert!(expedition.active_session(1).is_none());
    assert!(expedition.sweep_idle(Instant::now() + Duration::from_secs(240)).is_empty());
    assert_eq!(expedition.act(1, CombatAction::Attack).unwrap_err().kind(), ErrorKind::NoActiveSession);
}

#[test]
fn test_idle_sweep_auto_forfeit() {
    let mut config = VentureConfig::default();
    config.sessions.idle_timeout_secs = 60;
    config.sessions.idle_outcome = IdleOutcome::AutoForfeit;
    let (expedition, store) = setup(&config, 1);
    start_battle(&expedition, 1);
    let before = store.get_player(1).unwrap().currency;

    let swept = expedition.sweep_idle(Instant::now() + Duration::from_secs(120));
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].reward.outcome, BattleOutcome::Defeat);
    assert_eq!(store.get_player(1).unwrap().currency, before - 25);
}

#[test]
fn test_first_jungle_ruins_exploration() {
    let (expedition, store) = setup(&VentureConfig::default(), 1);
    let catalog = expedition.catalog();
    let zone = catalog.zone_by_name("Jungle Ruins").unwrap();
    let curve = ProgressionCurve::for_zone(zone);

    let report = expedition.explore(1, None).unwrap();
    assert_eq!(report.zone_id, zone.id);
    assert_eq!(report.level_before, 1);
    assert!(report.xp_gained < curve.xp_for_level(1));
    assert_eq!(report.level_after, 1);
    assert_eq!(report.record.total_xp, report.xp_gained);
    assert_eq!(store.get_player(1).unwrap(), report.record);

    let progress = expedition.level_progress(1).unwrap();
    assert_eq!(progress.level, 1);
    assert_eq!(progress.xp_into_level, report.xp_gained);
}

#[test]
fn test_zero_map_multiplier_finds_no_items() {
    let (expedition, _store) = setup(&VentureConfig::default(), 1);
    for _ in 0..20 {
        let report = expedition.explore(1, Some(0.0)).unwrap();
        assert!(report.roll.found_items.is_empty());
        if report.encounter.is_some() {
            expedition.decline(1).unwrap();
        }
    }
}

#[test]
fn test_craft_consumes_exact_stock() {
    let (expedition, store) = setup(&VentureConfig::default(), 0);
    let class = expedition.catalog().class(1).unwrap();
    let mut record = PlayerRecord::new(7, "Smith", class, 1).with_currency(START_COINS);
    record.level = 3;
    record.inventory.add(102, 2).unwrap();
    record.inventory.add(201, 1).unwrap();
    store.insert_player(record);

    assert!(expedition.can_craft(7, 2).unwrap());
    let crafted = expedition.craft(7, 2).unwrap();
    assert_eq!(crafted.currency_spent, 20);
    assert_eq!(crafted.crafted_count, 1);

    let after = store.get_player(7).unwrap();
    assert!(!after.inventory.has_row(102));
    assert!(!after.inventory.has_row(201));
    assert_eq!(after.inventory.count_item(202), 1);
    assert_eq!(after.currency, START_COINS - 20);

    assert!(!expedition.can_craft(7, 2).unwrap());
    let err = expedition.craft(7, 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientResources);
    assert_eq!(store.get_player(7).unwrap(), after);

    assert_eq!(expedition.craft(7, 999).unwrap_err().kind(), ErrorKind::EntityNotFound);
}

#[test]
fn test_unknown_player() {
    let (expedition, _store) = setup(&VentureConfig::default(), 0);
    assert_eq!(expedition.explore(42, None).unwrap_err().kind(), ErrorKind::EntityNotFound);
    assert_eq!(expedition.level_progress(42).unwrap_err().kind(), ErrorKind::EntityNotFound);
    assert_eq!(expedition.fight(42).unwrap_err().kind(), ErrorKind::StateConflict);
}

#[test]
fn test_players_battle_in_parallel() {
    const PLAYERS: u64 = 8;
    let (expedition, store) = setup(&VentureConfig::default(), PLAYERS);
    let expedition = Arc::new(expedition);

    let handles: Vec<_> = (1..=PLAYERS)
        .map(|id| {
            let expedition = Arc::clone(&expedition);
            thread::spawn(move || {
                start_battle(&expedition, id);
                expedition.act(id, CombatAction::Attack).unwrap();
                match expedition.flee(id) {
                    Ok(settlement) => assert_eq!(settlement.reward.outcome, BattleOutcome::Fled),
                    // The first attack can already end the battle.
                    Err(err) => assert_eq!(err.kind(), ErrorKind::NoActiveSession),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for id in 1..=PLAYERS {
        assert!(expedition.active_session(id).is_none());
        assert!(store.get_player(id).unwrap().total_xp > 0);
    }
}

#[test]
fn test_ledger_balances_survive_restart() {
    let path = temp_ledger_path("restart");
    let mut config = VentureConfig::default();
    config.ledger_path = Some(path.clone());
    let catalog = Arc::new(Catalog::builtin().unwrap());

    let first = {
        let store = Arc::new(config.open_store(roster(&catalog)).unwrap());
        let expedition = Expedition::new(
            &config,
            Arc::clone(&catalog),
            Arc::clone(&store),
            SeedDeriver::test_seed(),
        )
        .unwrap();
        explore_quietly(&expedition, 1, 5);
        start_battle(&expedition, 1);
        expedition.flee(1).unwrap();
        store.get_player(1).unwrap()
    };
    assert!(first.total_xp > 0);
    assert_ne!(first, roster(&catalog)[0]);

    let second = {
        let store = Arc::new(config.open_store(roster(&catalog)).unwrap());
        assert_eq!(store.get_player(1).unwrap(), first);
        let expedition = Expedition::new(
            &config,
            Arc::clone(&catalog),
            Arc::clone(&store),
            SeedDeriver::test_seed(),
        )
        .unwrap();
        explore_quietly(&expedition, 1, 3);
        store.get_player(1).unwrap()
    };
    assert!(second.total_xp > first.total_xp);

    let reopened = config.open_store(roster(&catalog)).unwrap();
    assert_eq!(reopened.get_player(1).unwrap(), second);

    drop(reopened);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_store_without_ledger_starts_from_roster() {
    let config = VentureConfig::default();
    let catalog = Catalog::builtin().unwrap();
    let store = config.open_store(roster(&catalog)).unwrap();
    assert_eq!(store.get_player(1).unwrap(), roster(&catalog)[0]);
    assert!(store.get_player(2).is_err());
}
