use crate::core::{MessageHandler, MessageKind};

#[test]
fn full_queue_drops_the_oldest_message() {
    let handler = MessageHandler::with_capacity(3);
    let sink = handler.sink();
    sink.info("first");
    sink.warning("second");
    sink.error("third");
    sink.fatal("fourth");

    assert_eq!(handler.num_waiting(), 3);
    assert_eq!(handler.num_infos(), 0);
    assert_eq!(handler.num_warnings(), 1);
    assert_eq!(handler.num_errors(), 1);
    assert_eq!(handler.num_fatals(), 1);

    let texts: Vec<String> = handler.drain().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["second", "third", "fourth"]);
    assert_eq!(handler.num_waiting(), 0);
    assert_eq!(handler.num_errors(), 0);
}

#[test]
fn counters_follow_consumption() {
    let handler = MessageHandler::default();
    let sink = handler.sink();
    sink.debug("d");
    sink.info("i1");
    sink.info("i2");
    assert_eq!(handler.num_debugs(), 1);
    assert_eq!(handler.num_infos(), 2);

    let first = handler.next().unwrap();
    assert_eq!(first.kind, MessageKind::Debug);
    assert_eq!(first.to_string(), "Debug: d");
    assert_eq!(handler.num_debugs(), 0);
    assert_eq!(handler.num_infos(), 2);

    handler.clear();
    assert_eq!(handler.num_waiting(), 0);
    assert_eq!(handler.num_infos(), 0);
    assert!(handler.next().is_none());
}

#[test]
fn sinks_can_post_from_other_threads() {
    let handler = MessageHandler::default();
    std::thread::scope(|s| {
        for t in 0..4 {
            let sink = handler.sink();
            s.spawn(move || {
                for i in 0..25 {
                    sink.add(MessageKind::Info, format!("t{t} m{i}"), "Worker");
                }
            });
        }
    });
    assert_eq!(handler.num_infos(), 100);
    let all = handler.drain();
    assert_eq!(all.len(), 100);
    assert!(all.iter().all(|m| m.tag == "Worker"));
}

#[test]
fn fatal_messages_use_their_own_prefix() {
    let handler = MessageHandler::default();
    handler.sink().fatal("out of memory");
    assert_eq!(handler.next().unwrap().to_string(), "Fatal error: out of memory");
}

#[test]
fn counters_stay_within_capacity_while_draining() {
    use std::sync::atomic::{AtomicBool, Ordering};

    const CAPACITY: usize = 16;
    let handler = MessageHandler::with_capacity(CAPACITY);
    let producing = AtomicBool::new(true);
    let mut max_seen = 0;
    std::thread::scope(|s| {
        let sink = handler.sink();
        let producing = &producing;
        s.spawn(move || {
            for i in 0..50_000 {
                sink.error(format!("e{i}"));
            }
            producing.store(false, Ordering::Release);
        });
        while producing.load(Ordering::Acquire) {
            max_seen = max_seen.max(handler.num_errors());
            handler.next();
        }
    });
    assert!(max_seen <= CAPACITY, "num_errors reached {max_seen}");
    assert_eq!(handler.num_errors(), handler.num_waiting());
    handler.clear();
    assert_eq!(handler.num_errors(), 0);
}
