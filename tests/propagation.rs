#![allow(missing_docs)]

use fdag::{GraphError, Manager, ManagerConfig, fn_source, fn_transform};
use std::{
    num::NonZeroUsize,
    sync::{
        Arc, Mutex,
        atomic::{AtomicI32, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

fn slots(len: usize) -> Arc<Vec<AtomicI32>> {
    Arc::new((0..len).map(|_| AtomicI32::new(0)).collect())
}

fn snapshot(slots: &[AtomicI32]) -> Vec<i32> {
    slots.iter().map(|slot| slot.load(Ordering::SeqCst)).collect()
}

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Counts how many times a payload is released.
#[derive(Debug)]
struct Tracked {
    value: i32,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn single_threaded_roots_fill_in_order() {
    let array = slots(5);
    let ran_times = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::<u16>::new();
    manager.run_single_threaded(true);

    for i in 0..5u16 {
        let array = array.clone();
        let ran_times = ran_times.clone();
        manager
            .add_dag(
                i,
                fn_source(move || {
                    let value = i32::from(i) + 1;
                    array[usize::from(i)].store(value, Ordering::SeqCst);
                    ran_times.fetch_add(1, Ordering::SeqCst);
                    Some(value)
                }),
                false,
            )
            .expect("root must attach");
    }
    manager.push_all_once();

    assert_eq!(snapshot(&array), vec![1, 2, 3, 4, 5]);
    assert_eq!(ran_times.load(Ordering::SeqCst), 5);
}

#[test]
fn pull_loops_fill_every_slot_concurrently() {
    let array = slots(5);
    let mut manager = Manager::<u64>::new();
    for i in 0..5u64 {
        let array = array.clone();
        manager
            .add_dag(
                i,
                fn_source(move || {
                    let slot = &array[i as usize];
                    if slot.load(Ordering::SeqCst) == 0 {
                        thread::sleep(Duration::from_millis(5 * (5 - i)));
                        slot.store(i as i32 + 1, Ordering::SeqCst);
                    }
                    None::<i32>
                }),
                true,
            )
            .expect("root must attach and start");
    }

    wait_until(|| snapshot(&array).iter().all(|&value| value != 0));
    manager.shutdown();

    assert_eq!(snapshot(&array), vec![1, 2, 3, 4, 5]);
}

#[test]
fn fan_out_delivers_the_same_value_to_every_child() {
    let array = slots(5);
    let counter = Arc::new(AtomicI32::new(6));
    let mut manager = Manager::<i32>::new();

    let source_counter = counter.clone();
    manager
        .add_dag(
            0,
            fn_source(move || Some(source_counter.fetch_add(1, Ordering::SeqCst) + 1)),
            false,
        )
        .expect("root must attach");
    for i in 0..5 {
        let array = array.clone();
        manager
            .add_node(
                i + 1,
                fn_transform(move |value: &i32| {
                    // Reverse the finishing order to exercise the barrier.
                    thread::sleep(Duration::from_millis(10 * (5 - i as u64)));
                    array[i as usize].store(*value, Ordering::SeqCst);
                    None::<i32>
                }),
                0,
            )
            .expect("child must attach");
    }
    assert_eq!(manager.len(), 1);

    manager.push_once(&0).expect("tree 0 exists");

    assert_eq!(snapshot(&array), vec![7; 5]);
    manager.push_once(&0).expect("tree 0 exists");
    assert_eq!(snapshot(&array), vec![8; 5]);
}

#[test]
fn fan_out_releases_each_value_exactly_once() {
    for single_threaded in [false, true] {
        let drops = Arc::new(AtomicUsize::new(0));
        let reads = Arc::new(AtomicUsize::new(0));
        let config = ManagerConfig::default().with_single_threaded(single_threaded);
        let mut manager = Manager::<u8>::with_config(&config).expect("global pool needs no setup");

        let source_drops = drops.clone();
        manager
            .add_dag(
                0,
                fn_source(move || {
                    Some(Tracked {
                        value: 3,
                        drops: source_drops.clone(),
                    })
                }),
                false,
            )
            .expect("root must attach");
        for i in 1..=4 {
            let reads = reads.clone();
            manager
                .add_node(
                    i,
                    fn_transform(move |tracked: &Tracked| {
                        assert_eq!(tracked.value, 3);
                        reads.fetch_add(1, Ordering::SeqCst);
                        None::<()>
                    }),
                    0,
                )
                .expect("reader must attach");
        }

        manager.push_once(&0).expect("tree 0 exists");
        assert_eq!(reads.load(Ordering::SeqCst), 4);
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        manager.push_once(&0).expect("tree 0 exists");
        assert_eq!(reads.load(Ordering::SeqCst), 8);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }
}

#[test]
fn accumulate_chain_of_nine_yields_ten() {
    for single_threaded in [true, false] {
        let final_value = Arc::new(AtomicI32::new(0));
        let mut manager = Manager::<i32>::new();
        manager.run_single_threaded(single_threaded);
        manager
            .add_dag(0, fn_source(|| Some(1)), false)
            .expect("root must attach");
        for i in 0..9 {
            manager
                .add_node(i + 1, fn_transform(|x: &i32| Some(x + 1)), i)
                .expect("link must attach");
        }
        let sink = final_value.clone();
        manager
            .add_node(
                10,
                fn_transform(move |x: &i32| {
                    sink.store(*x, Ordering::SeqCst);
                    None::<i32>
                }),
                9,
            )
            .expect("sink must attach");

        manager.push_all_once();
        assert_eq!(final_value.load(Ordering::SeqCst), 10);
    }
}

#[test]
fn single_threaded_runs_depth_first_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut manager = Manager::<&'static str>::new();
    manager.run_single_threaded(true);
    manager
        .add_dag("src", fn_source(|| Some(0)), false)
        .expect("root must attach");
    //      src
    //     /   \
    //    a     b
    //   / \     \
    //  a1  a2    b1
    for (id, parent) in [("a", "src"), ("b", "src"), ("a1", "a"), ("a2", "a"), ("b1", "b")] {
        let order = order.clone();
        manager
            .add_node(
                id,
                fn_transform(move |x: &i32| {
                    order.lock().unwrap().push(id);
                    Some(*x)
                }),
                parent,
            )
            .expect("node must attach");
    }

    manager.push_once(&"src").expect("tree src exists");
    assert_eq!(*order.lock().unwrap(), vec!["a", "a1", "a2", "b", "b1"]);
}

#[test]
fn absent_output_prunes_the_subtree() {
    let below = Arc::new(AtomicUsize::new(0));
    let sibling = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::<u8>::new();
    manager
        .add_dag(0, fn_source(|| Some(2)), false)
        .expect("root must attach");
    manager
        .add_node(1, fn_transform(|x: &i32| (*x % 2 == 1).then_some(*x)), 0)
        .expect("odd filter must attach");
    let count = below.clone();
    manager
        .add_node(
            2,
            fn_transform(move |_: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
                None::<()>
            }),
            1,
        )
        .expect("child of filter must attach");
    let count = sibling.clone();
    manager
        .add_node(
            3,
            fn_transform(move |_: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
                None::<()>
            }),
            0,
        )
        .expect("sibling must attach");

    manager.push_once(&0).expect("tree 0 exists");
    assert_eq!(below.load(Ordering::SeqCst), 0);
    assert_eq!(sibling.load(Ordering::SeqCst), 1);

    manager.pump(&0, 5).expect("tree 0 carries i32");
    assert_eq!(below.load(Ordering::SeqCst), 1);
    assert_eq!(sibling.load(Ordering::SeqCst), 2);
}

#[test]
fn empty_source_propagates_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::<u8>::new();
    manager
        .add_dag(0, fn_source(|| None::<i32>), false)
        .expect("root must attach");
    let count = calls.clone();
    manager
        .add_node(
            1,
            fn_transform(move |x: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
                Some(*x)
            }),
            0,
        )
        .expect("node must attach");

    manager.push_once(&0).expect("tree 0 exists");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(manager.push_once(&9), Err(GraphError::UnknownTree(9)));
}

#[test]
fn stopped_context_drops_late_results() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::<u8>::new();
    manager.run_single_threaded(true);
    manager
        .add_dag(0, fn_source(|| Some(1)), false)
        .expect("root must attach");
    let count = first.clone();
    manager
        .add_node(
            1,
            fn_transform(move |x: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
                Some(*x)
            }),
            0,
        )
        .expect("first must attach");
    let count = second.clone();
    manager
        .add_node(
            2,
            fn_transform(move |x: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
                Some(*x)
            }),
            1,
        )
        .expect("second must attach");

    manager.stop();
    manager.push_once(&0).expect("tree 0 exists");

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
}

#[test]
fn pull_loop_exits_after_the_activation_that_stopped_it() {
    let produced = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut manager = Manager::<u8>::new();
    let stop = manager.stop_handle();

    let counter = produced.clone();
    manager
        .add_dag(
            0,
            fn_source(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 100 {
                    stop.stop();
                }
                Some(n)
            }),
            false,
        )
        .expect("root must attach");
    manager
        .add_node(1, fn_transform(|n: &usize| Some(*n)), 0)
        .expect("relay must attach");
    let recorder = seen.clone();
    manager
        .add_node(
            2,
            fn_transform(move |n: &usize| {
                recorder.lock().unwrap().push(*n);
                None::<()>
            }),
            1,
        )
        .expect("recorder must attach");

    manager.start().expect("pull loop must spawn");
    wait_until(|| !manager.is_running());
    manager.shutdown();

    assert_eq!(produced.load(Ordering::SeqCst), 100);
    assert_eq!(*seen.lock().unwrap(), (1..100).collect::<Vec<_>>());

    // Restarting resumes pulling from the same source.
    manager.start().expect("pull loop must respawn");
    wait_until(|| produced.load(Ordering::SeqCst) > 100);
    manager.shutdown();
    assert!(!manager.trees().any(|tree| tree.is_running()));
}

#[test]
fn dropping_the_manager_joins_running_pull_loops() {
    let produced = Arc::new(AtomicUsize::new(0));
    {
        let mut manager = Manager::<u8>::new();
        let counter = produced.clone();
        manager
            .add_dag(
                0,
                fn_source(move || Some(counter.fetch_add(1, Ordering::SeqCst))),
                true,
            )
            .expect("root must attach and start");
        wait_until(|| produced.load(Ordering::SeqCst) > 0);
    }
    let after_drop = produced.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(produced.load(Ordering::SeqCst), after_drop);
}

#[test]
fn pump_checks_the_payload_type() {
    let received = Arc::new(AtomicI32::new(0));
    let mut manager = Manager::<u8>::new();
    manager
        .add_dag(0, fn_source(|| None::<i32>), false)
        .expect("root must attach");
    let sink = received.clone();
    manager
        .add_node(
            1,
            fn_transform(move |x: &i32| {
                sink.store(x + 1, Ordering::SeqCst);
                None::<()>
            }),
            0,
        )
        .expect("node must attach");

    manager.pump(&0, 41).expect("tree 0 carries i32");
    assert_eq!(received.load(Ordering::SeqCst), 42);

    assert!(matches!(
        manager.pump(&0, "not an i32"),
        Err(GraphError::TypeMismatch { parent: 0, .. })
    ));
    assert_eq!(manager.pump(&3, 1), Err(GraphError::UnknownTree(3)));

    manager
        .tree::<i32>(&0)
        .expect("typed lookup")
        .pump(9);
    assert_eq!(received.load(Ordering::SeqCst), 10);
}

#[test]
fn dedicated_pool_reaches_every_leaf_of_a_wide_deep_tree() {
    const BRANCHING: u32 = 4;
    const DEPTH: u32 = 3;

    let config = ManagerConfig::default()
        .with_worker_threads(NonZeroUsize::new(2).expect("non-zero"))
        .with_thread_name_prefix("wide");
    let mut manager = Manager::<u32>::with_config(&config).expect("pool must build");
    let leaves = Arc::new(AtomicUsize::new(0));
    let sum = Arc::new(AtomicUsize::new(0));

    manager
        .add_dag(0, fn_source(|| Some(1usize)), false)
        .expect("root must attach");
    let mut next_id = 1;
    let mut level = vec![0];
    for depth in 1..=DEPTH {
        let mut next_level = vec![];
        for &parent in &level {
            for _ in 0..BRANCHING {
                let id = next_id;
                next_id += 1;
                if depth == DEPTH {
                    let leaves = leaves.clone();
                    let sum = sum.clone();
                    manager
                        .add_node(
                            id,
                            fn_transform(move |x: &usize| {
                                leaves.fetch_add(1, Ordering::SeqCst);
                                sum.fetch_add(*x, Ordering::SeqCst);
                                None::<()>
                            }),
                            parent,
                        )
                        .expect("leaf must attach");
                } else {
                    manager
                        .add_node(id, fn_transform(|x: &usize| Some(x + 1)), parent)
                        .expect("inner node must attach");
                }
                next_level.push(id);
            }
        }
        level = next_level;
    }

    manager.push_once(&0).expect("tree 0 exists");

    let expected_leaves = BRANCHING.pow(DEPTH) as usize;
    assert_eq!(leaves.load(Ordering::SeqCst), expected_leaves);
    // Two "+1" levels above the leaves.
    assert_eq!(sum.load(Ordering::SeqCst), expected_leaves * 3);
}

#[test]
fn stop_inside_a_node_skips_its_later_siblings() {
    let stopper_calls = Arc::new(AtomicUsize::new(0));
    let sibling_calls = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::<u8>::new();
    manager.run_single_threaded(true);
    let stop = manager.stop_handle();

    //   0
    //   |
    //   1
    //  / \
    // 2   3
    manager
        .add_dag(0, fn_source(|| Some(1)), false)
        .expect("root must attach");
    manager
        .add_node(1, fn_transform(|x: &i32| Some(*x)), 0)
        .expect("relay must attach");
    let count = stopper_calls.clone();
    manager
        .add_node(
            2,
            fn_transform(move |_: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
                stop.stop();
                None::<()>
            }),
            1,
        )
        .expect("stopper must attach");
    let count = sibling_calls.clone();
    manager
        .add_node(
            3,
            fn_transform(move |_: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
                None::<()>
            }),
            1,
        )
        .expect("sibling must attach");

    manager.push_once(&0).expect("tree 0 exists");

    assert!(!manager.is_running());
    assert_eq!(stopper_calls.load(Ordering::SeqCst), 1);
    assert_eq!(sibling_calls.load(Ordering::SeqCst), 0);
}
