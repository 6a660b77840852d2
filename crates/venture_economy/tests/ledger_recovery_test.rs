//! Integration test for ledger-backed store recovery.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use venture_economy::{
    Catalog, CraftingBench, ItemGrant, Ledger, MemoryStore, Persistence, PlayerRecord, RewardDelta,
};

fn temp_ledger_path(tag: &str) -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("test_store_{tag}_{id}.vldg"))
}

fn starter(catalog: &Catalog, id: u64) -> PlayerRecord {
    PlayerRecord::new(id, format!("player-{id}"), catalog.class(1).unwrap(), 1).with_currency(50)
}

fn fibers(quantity: u64) -> RewardDelta {
    RewardDelta {
        currency_delta: 10,
        xp_delta: 5,
        level_after: None,
        items: vec![ItemGrant::new(101, quantity)],
    }
}

#[test]
fn test_store_state_survives_restart() {
    let catalog = Catalog::builtin().unwrap();
    let path = temp_ledger_path("restart");

    let live = {
        let store = MemoryStore::with_ledger(Ledger::open(&path).unwrap());
        store.insert_player(starter(&catalog, 1));
        store.apply_reward_atomic(1, &fibers(6)).unwrap();
        CraftingBench::new(&catalog, &store).craft(1, 1).unwrap();
        store.apply_reward_atomic(1, &RewardDelta::penalty(7)).unwrap();
        store.get_player(1).unwrap()
    };

    let recovered = MemoryStore::recover([starter(&catalog, 1)], Ledger::open(&path).unwrap())
        .unwrap()
        .get_player(1)
        .unwrap();

    assert_eq!(recovered, live);
    assert_eq!(recovered.inventory.count_item(101), 3);
    assert_eq!(recovered.inventory.count_item(201), 1);
    assert_eq!(recovered.currency, 50 + 10 - 5 - 7);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_torn_tail_is_discarded() {
    let catalog = Catalog::builtin().unwrap();
    let path = temp_ledger_path("torn");

    {
        let store = MemoryStore::with_ledger(Ledger::open(&path).unwrap());
        store.insert_player(starter(&catalog, 1));
        store.apply_reward_atomic(1, &fibers(2)).unwrap();
    }

    // Simulate a crash halfway through the next record.
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[7, 0, 0, 0, 0, 0, 0, 0, 1, 0]).unwrap();
    }

    {
        let ledger = Ledger::open(&path).unwrap();
        assert_eq!(ledger.recovered_entries().len(), 1);
        let store = MemoryStore::recover([starter(&catalog, 1)], ledger).unwrap();
        store.apply_reward_atomic(1, &fibers(1)).unwrap();
    }

    let ledger = Ledger::open(&path).unwrap();
    assert_eq!(ledger.recovered_entries().len(), 2);
    let store = MemoryStore::recover([starter(&catalog, 1)], ledger).unwrap();
    assert_eq!(store.get_player(1).unwrap().inventory.count_item(101), 3);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_concurrent_players_all_journaled() {
    let catalog = Catalog::builtin().unwrap();
    let path = temp_ledger_path("concurrent");
    let players = 8u64;
    let rewards_per_player = 25u64;

    {
        let store = Arc::new(MemoryStore::with_ledger(Ledger::open(&path).unwrap()));
        for id in 0..players {
            store.insert_player(starter(&catalog, id));
        }

        let handles: Vec<_> = (0..players)
            .map(|id| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..rewards_per_player {
                        store.apply_reward_atomic(id, &fibers(1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    let ledger = Ledger::open(&path).unwrap();
    assert_eq!(
        ledger.recovered_entries().len() as u64,
        players * rewards_per_player
    );
    let store =
        MemoryStore::recover((0..players).map(|id| starter(&catalog, id)), ledger).unwrap();
    for id in 0..players {
        assert_eq!(
            store.get_player(id).unwrap().inventory.count_item(101),
            rewards_per_player
        );
    }

    std::fs::remove_file(&path).ok();
}
