// tests/engine.rs
use itch_book::book::BookError;
use itch_book::engine::{EngineError, OrderBook};
use itch_book::itch::{
    self, AddOrder, Header, Message, OrderCancel, OrderDelete, Price4, Side, Symbol,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn header(ts: u64) -> Header {
    Header {
        stock_locate: 0,
        tracking_number: 0,
        timestamp_ns: ts,
    }
}

fn add(stock: &str, id: u64, side: Side, shares: u32, price: Price4, ts: u64) -> Message {
    Message::AddOrder(AddOrder {
        header: header(ts),
        order_id: id,
        side,
        shares,
        stock: Symbol::new(stock),
        price,
        mpid: None,
    })
}

#[test]
fn end_to_end_byte_scenario_empties_the_book() {
    // A(id=1, buy 100 @ 10.0000), X(id=1, 40), D(id=1) in one buffer
    let mut buf = Vec::new();
    itch::encode(
        &add("TSLA", 1, Side::Buy, 100, Price4(100_000), 1),
        &mut buf,
    );
    itch::encode(
        &Message::OrderCancel(OrderCancel {
            header: header(2),
            order_id: 1,
            cancelled_shares: 40,
        }),
        &mut buf,
    );
    itch::encode(
        &Message::OrderDelete(OrderDelete {
            header: header(3),
            order_id: 1,
        }),
        &mut buf,
    );

    let errors: Arc<Mutex<Vec<BookError>>> = Arc::new(Mutex::new(Vec::new()));
    let mut ob = OrderBook::new("TSLA");
    {
        let errors = Arc::clone(&errors);
        ob.set_observer(move |_msg, err| {
            if let Some(e) = err {
                errors.lock().unwrap().push(*e);
            }
        })
        .unwrap();
    }

    ob.start().unwrap();
    let consumed = ob.submit_bytes(&buf).unwrap();
    assert_eq!(consumed, buf.len());
    ob.stop().unwrap();

    assert!(errors.lock().unwrap().is_empty());
    let book = ob.book().unwrap();
    assert_eq!(book.num_orders(), 0);
    assert_eq!(book.best_bid(), None);
    assert_eq!(book.best_ask(), None);
    book.assert_invariants();
}

#[test]
fn lifecycle_start_is_exclusive_and_stop_is_idempotent() {
    let mut ob = OrderBook::new("TSLA");
    assert!(!ob.is_running());

    ob.start().unwrap();
    assert!(ob.is_running());
    assert!(matches!(ob.start(), Err(EngineError::AlreadyRunning)));

    ob.stop().unwrap();
    assert!(!ob.is_running());
    ob.stop().unwrap(); // no-op

    // restart picks the same book back up
    ob.submit(add("TSLA", 7, Side::Sell, 10, Price4(120_000), 5))
        .unwrap();
    ob.start().unwrap();
    ob.stop().unwrap();
    assert_eq!(ob.best_ask(), Some(Price4(120_000)));
}

#[test]
fn queue_overflow_is_reported_not_dropped() {
    let mut ob = OrderBook::with_options("TSLA", 0.01, 2);

    ob.submit(add("TSLA", 1, Side::Buy, 10, Price4(100_000), 1))
        .unwrap();
    ob.submit(add("TSLA", 2, Side::Buy, 10, Price4(100_100), 2))
        .unwrap();
    assert!(matches!(
        ob.submit(add("TSLA", 3, Side::Buy, 10, Price4(100_200), 3)),
        Err(EngineError::QueueFull)
    ));

    // byte path reports partial consumption instead
    let mut buf = Vec::new();
    let m1 = add("TSLA", 4, Side::Buy, 10, Price4(100_300), 4);
    itch::encode(&m1, &mut buf);
    let one = buf.len();
    itch::encode(&add("TSLA", 5, Side::Buy, 10, Price4(100_400), 5), &mut buf);
    assert_eq!(ob.submit_bytes(&buf).unwrap(), 0);

    // drain through a start/stop cycle, then the rest fits
    ob.start().unwrap();
    ob.stop().unwrap();
    assert_eq!(ob.submit_bytes(&buf).unwrap(), one + one);
    ob.start().unwrap();
    ob.stop().unwrap();
    // ids 1, 2 from the typed path plus 4, 5 from the byte path; 3 was rejected
    assert_eq!(ob.book().unwrap().num_orders(), 4);
}

#[test]
fn decode_errors_surface_with_the_bad_offset() {
    let mut ob = OrderBook::new("TSLA");
    let mut buf = Vec::new();
    itch::encode(&add("TSLA", 1, Side::Buy, 10, Price4(100_000), 1), &mut buf);
    let good = buf.len();
    buf.push(0x00); // not a known type byte

    match ob.submit_bytes(&buf) {
        Err(EngineError::Decode { offset, source }) => {
            assert_eq!(offset, good);
            assert_eq!(source, itch::DecodeError::UnknownMessageType(0x00));
        }
        other => panic!("expected decode error, got {other:?}"),
    }

    // the record before the bad offset was enqueued and still applies
    ob.start().unwrap();
    ob.stop().unwrap();
    assert_eq!(ob.book().unwrap().num_orders(), 1);
}

#[test]
fn symbol_mismatch_reaches_the_observer_and_leaves_state_intact() {
    let seen: Arc<Mutex<Vec<(char, Option<BookError>)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut ob = OrderBook::new("TSLA");
    {
        let seen = Arc::clone(&seen);
        ob.set_observer(move |msg, err| {
            seen.lock().unwrap().push((msg.kind() as char, err.copied()));
        })
        .unwrap();
    }

    ob.submit(add("TSLA", 1, Side::Buy, 100, Price4(100_000), 1))
        .unwrap();
    ob.submit(add("AAPL", 2, Side::Buy, 100, Price4(100_000), 2))
        .unwrap();
    ob.start().unwrap();
    ob.stop().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], ('A', None));
    assert_eq!(
        seen[1],
        (
            'A',
            Some(BookError::SymbolMismatch {
                want: Symbol::new("TSLA"),
                got: Symbol::new("AAPL"),
            })
        )
    );

    let book = ob.book().unwrap();
    assert_eq!(book.num_orders(), 1);
    assert!(book.order(2).is_none());
}

#[test]
fn add_order_mints_ids_past_feed_assigned_ones() {
    let mut ob = OrderBook::new("TSLA");
    ob.submit(add("TSLA", 1, Side::Buy, 100, Price4(100_000), 1))
        .unwrap();
    ob.start().unwrap();
    ob.stop().unwrap();
    assert!(ob.book().unwrap().order(1).is_some());

    // id 1 is taken by the feed; the convenience path skips it
    let id = ob.add_order(10.25, 50, Side::Buy).unwrap();
    assert_ne!(id, 1);

    ob.start().unwrap();
    ob.stop().unwrap();
    let book = ob.book().unwrap();
    let minted = book.order(id).unwrap();
    assert_eq!(minted.quantity, 50);
    assert_eq!(minted.price, Some(Price4::from_f64(10.25)));
    assert_eq!(book.num_orders(), 2);
}

#[test]
fn bbo_is_visible_while_running() {
    let mut ob = OrderBook::new("TSLA");
    ob.start().unwrap();
    ob.submit(add("TSLA", 1, Side::Buy, 100, Price4(100_000), 1))
        .unwrap();

    // diagnostic read: poll until the driver has applied the add
    let deadline = Instant::now() + Duration::from_secs(5);
    while ob.best_bid().is_none() {
        assert!(Instant::now() < deadline, "driver never applied the add");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(ob.best_bid(), Some(Price4(100_000)));
    ob.stop().unwrap();
}

#[test]
fn replaying_the_same_bytes_builds_identical_books() {
    let mut buf = Vec::new();
    let prices = [100_000u32, 100_100, 99_900, 100_050, 100_200];
    for (i, &p) in prices.iter().enumerate() {
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        itch::encode(
            &add("TSLA", i as u64 + 1, side, 100 + i as u32, Price4(p), i as u64),
            &mut buf,
        );
    }
    itch::encode(
        &Message::OrderCancel(OrderCancel {
            header: header(10),
            order_id: 1,
            cancelled_shares: 30,
        }),
        &mut buf,
    );
    itch::encode(
        &Message::OrderDelete(OrderDelete {
            header: header(11),
            order_id: 2,
        }),
        &mut buf,
    );

    let run = |bytes: &[u8]| {
        let mut ob = OrderBook::new("TSLA");
        ob.start().unwrap();
        assert_eq!(ob.submit_bytes(bytes).unwrap(), bytes.len());
        ob.stop().unwrap();
        ob
    };

    let a = run(&buf);
    let b = run(&buf);
    assert_eq!(a.book().unwrap(), b.book().unwrap());
    a.book().unwrap().assert_invariants();
}
