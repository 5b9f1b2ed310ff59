use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use archetype_ecs::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Tag(u8);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Counter(u32);

#[test]
fn deferred_create_is_invisible_until_drain() {
    let world = create_world("deferred-visibility");

    with_world(world, |w| {
        w.begin_deferred();
        let entity = w.create_entity();
        assert!(!w.is_alive(entity));
        assert_eq!(w.entity_count(), 0);

        w.end_deferred();
        assert!(w.is_alive(entity));
        assert_eq!(w.entity_count(), 1);
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn deferred_destroy_cancels_pending_create() {
    let world = create_world("deferred-cancel");
    let set_log: Arc<Mutex<Vec<Entity>>> = Arc::new(Mutex::new(Vec::new()));
    let removals = Arc::new(AtomicUsize::new(0));

    let (e1, e2) = with_world(world, |w| {
        let sink = Arc::clone(&set_log);
        w.on_set::<Tag, _>(move |_w, entity, _old| {
            sink.lock().unwrap().push(entity);
        });
        let counter = Arc::clone(&removals);
        w.on_remove::<Tag, _>(move |_w, _entity, _removed| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        w.begin_deferred();
        let e1 = w.create_entity();
        let e2 = w.create_entity();
        w.set(e1, Tag(1));
        w.set(e2, Tag(2));
        w.destroy_entity(e1);
        w.end_deferred();

        assert!(!w.is_alive(e1));
        assert!(w.is_alive(e2));
        assert_eq!(w.get::<Tag>(e2), Some(&Tag(2)));
        assert_eq!(w.entity_count(), 1);
        (e1, e2)
    })
    .unwrap();

    // Only e2's set callback fired; the cancelled entity never entered an
    // archetype observable by callbacks.
    assert_eq!(*set_log.lock().unwrap(), vec![e2]);
    assert_eq!(removals.load(Ordering::SeqCst), 0);
    assert_ne!(e1, e2);

    destroy_world(world);
}

#[test]
fn deferred_operations_apply_in_fifo_order() {
    let world = create_world("deferred-fifo");
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    with_world(world, |w| {
        let entity = w.create_entity();
        w.set(entity, Tag(1));

        let sink = Arc::clone(&events);
        w.on_set::<Tag, _>(move |_w, _entity, old| {
            sink.lock().unwrap().push(format!("set(old={})", old.0));
        });
        let sink = Arc::clone(&events);
        w.on_remove::<Tag, _>(move |_w, _entity, removed| {
            sink.lock().unwrap().push(format!("remove({})", removed.0));
        });

        w.begin_deferred();
        w.set(entity, Tag(5));
        w.remove::<Tag>(entity);

        // Nothing is applied mid-queue.
        assert_eq!(w.get::<Tag>(entity), Some(&Tag(1)));
        w.end_deferred();

        assert!(!w.has::<Tag>(entity));
        assert!(w.is_alive(entity));
    })
    .unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["set(old=1)".to_string(), "remove(5)".to_string()]
    );

    destroy_world(world);
}

fn run_sequence(world: WorldId, deferred: bool, log: &Arc<Mutex<Vec<String>>>) -> usize {
    with_world(world, |w| {
        let sink = Arc::clone(log);
        w.on_set::<Counter, _>(move |w_inner, entity, old| {
            let new = w_inner.get::<Counter>(entity).unwrap().0;
            sink.lock().unwrap().push(format!("set {} -> {}", old.0, new));
        });
        let sink = Arc::clone(log);
        w.on_remove::<Counter, _>(move |_w, _entity, removed| {
            sink.lock().unwrap().push(format!("remove {}", removed.0));
        });

        let e1 = w.create_entity();
        let e2 = w.create_entity();

        if deferred {
            w.begin_deferred();
        }
        w.set(e1, Counter(1));
        w.set(e2, Counter(2));
        w.set(e1, Counter(10));
        w.remove::<Counter>(e2);
        w.destroy_entity(e2);
        if deferred {
            w.end_deferred();
        }

        assert_eq!(w.get::<Counter>(e1), Some(&Counter(10)));
        assert!(!w.is_alive(e2));
        w.entity_count()
    })
    .unwrap()
}

#[test]
fn deferred_batch_matches_immediate_application() {
    let immediate_log = Arc::new(Mutex::new(Vec::new()));
    let deferred_log = Arc::new(Mutex::new(Vec::new()));

    let immediate_world = create_world("equivalence-immediate");
    let deferred_world = create_world("equivalence-deferred");

    let immediate_count = run_sequence(immediate_world, false, &immediate_log);
    let deferred_count = run_sequence(deferred_world, true, &deferred_log);

    assert_eq!(immediate_count, deferred_count);
    assert_eq!(*immediate_log.lock().unwrap(), *deferred_log.lock().unwrap());

    destroy_world(immediate_world);
    destroy_world(deferred_world);
}

#[test]
fn nested_defer_scopes_compose() {
    let world = create_world("deferred-nesting");

    with_world(world, |w| {
        w.begin_deferred();
        w.begin_deferred();
        let entity = w.create_entity();
        w.end_deferred();

        // Still one level deep: no drain yet.
        assert!(!w.is_alive(entity));

        w.end_deferred();
        assert!(w.is_alive(entity));
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn create_against_destroyed_archetype_is_cancelled_at_playback() {
    let world = create_world("deferred-dead-archetype");

    with_world(world, |w| {
        // Materialize the empty archetype so it can be destroyed mid-queue.
        let seed = w.create_entity();
        w.destroy_entity(seed);
        let empty = w.try_get_archetype(&Signature::new()).unwrap();

        w.begin_deferred();
        w.destroy_archetype(empty);
        let entity = w.create_entity();
        w.end_deferred();

        assert!(w.archetype(empty).is_none());
        assert!(!w.is_alive(entity));
        assert_eq!(w.entity_count(), 0);
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn events_enqueued_by_callbacks_run_in_the_same_drain() {
    let world = create_world("deferred-reentrant");
    let fired = Arc::new(AtomicUsize::new(0));

    with_world(world, |w| {
        let counter = Arc::clone(&fired);
        w.on_set::<Counter, _>(move |w_inner, entity, _old| {
            counter.fetch_add(1, Ordering::SeqCst);
            let current = w_inner.get::<Counter>(entity).copied().unwrap();
            if current.0 < 3 {
                // Issued mid-dispatch: queued, then applied by the same
                // drain pass.
                w_inner.set(entity, Counter(current.0 + 1));
            }
        });

        let entity = w.create_entity();
        w.set(entity, Counter(1));
        assert_eq!(w.get::<Counter>(entity), Some(&Counter(3)));
    })
    .unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 3);

    destroy_world(world);
}

#[test]
fn defer_scope_guard_drains_on_drop() {
    let world = create_world("deferred-guard");

    with_world(world, |w| {
        let entity;
        {
            let mut scope = w.defer_scope();
            entity = scope.create_entity();
            assert!(!scope.is_alive(entity));
        }
        assert!(w.is_alive(entity));
        assert_eq!(w.entity_count(), 1);
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn deferred_transfer_and_archetype_resize_play_back() {
    let source = create_world("deferred-transfer-src");
    let target = create_world("deferred-transfer-dst");

    let entity = with_world(source, |w| {
        let entity = w.create_entity();
        w.set(entity, Counter(42));

        w.begin_deferred();
        w.transfer(entity, target);
        assert!(w.is_alive(entity)); // not applied yet
        w.end_deferred();

        assert!(!w.is_alive(entity));
        assert_eq!(w.entity_count(), 0);
        entity
    })
    .unwrap();

    with_world(target, |w| {
        assert!(w.is_alive(entity));
        assert_eq!(w.get::<Counter>(entity), Some(&Counter(42)));
        assert_eq!(w.entity_count(), 1);

        w.begin_deferred();
        w.resize_backing_arrays();
        w.end_deferred();
    })
    .unwrap();

    destroy_world(source);
    destroy_world(target);
}
