use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use frame_annotator::overlay::OverlayBatch;
use frame_annotator::{Classification, OverlayGeometry, OverlayStore, Rect};

const BATCH_SIZE: usize = 8;
const BATCHES: u32 = 2000;

fn item(batch_id: u32, i: usize) -> OverlayGeometry {
    OverlayGeometry {
        bounds: Rect::new(i as f32 * 10.0, 0.0, 10.0, 10.0),
        landmarks: Vec::new(),
        classification: Classification::new("face", 0.5),
        tracking_id: Some(batch_id),
    }
}

#[test]
fn readers_never_see_a_partial_batch() {
    let store = Arc::new(OverlayStore::new());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut observed = 0u64;
                while !done.load(Ordering::SeqCst) {
                    let snapshot = store.snapshot_for_render();
                    assert!(
                        snapshot.is_empty() || snapshot.len() == BATCH_SIZE,
                        "partial batch of {} items",
                        snapshot.len()
                    );
                    if let Some(first) = snapshot.first() {
                        assert!(snapshot.iter().all(|o| o.tracking_id == first.tracking_id));
                        observed += 1;
                    }
                }
                observed
            })
        })
        .collect();

    for batch_id in 1..=BATCHES {
        let mut batch = store.stage();
        batch.clear();
        if batch_id % 7 != 0 {
            batch.extend((0..BATCH_SIZE).map(|i| item(batch_id, i)));
        }
        store.publish(batch);
    }
    let mut last = OverlayBatch::new();
    last.extend((0..BATCH_SIZE).map(|i| item(BATCHES + 1, i)));
    store.publish(last);
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    let final_snapshot = store.snapshot_for_render();
    assert_eq!(final_snapshot.len(), BATCH_SIZE);
    assert!(final_snapshot
        .iter()
        .all(|o| o.tracking_id == Some(BATCHES + 1)));
}

#[test]
fn snapshot_is_stable_while_writer_publishes() {
    let store = OverlayStore::new();
    let mut batch = OverlayBatch::new();
    batch.extend((0..BATCH_SIZE).map(|i| item(1, i)));
    store.publish(batch);

    let held = store.snapshot_for_render();
    store.clear();
    assert_eq!(held.len(), BATCH_SIZE);
    assert!(store.snapshot_for_render().is_empty());
}
