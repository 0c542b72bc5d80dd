// tests/book_ops.rs
use itch_book::book::{Book, BookError, Order};
use itch_book::itch::{AddOrder, Header, Message, Price4, Side, Symbol};

fn tsla() -> Book {
    Book::new(Symbol::new("TSLA"), 0.01)
}

fn px(dollars: f64) -> Price4 {
    Price4::from_f64(dollars)
}

#[test]
fn add_cancel_execute_delete_scenario() {
    let mut book = tsla();

    // 1) first bid establishes the level
    book.add(Order::limit(1, Side::Buy, px(10.00), 100, 1000))
        .unwrap();
    assert_eq!(book.best_bid(), Some(px(10.00)));
    assert_eq!(book.best_ask(), None);
    assert!(book.order(1).is_some());

    // 2) second bid at the same price queues behind the first
    book.add(Order::limit(2, Side::Buy, px(10.00), 50, 1001))
        .unwrap();
    let level = book.level(Side::Buy, px(10.00)).unwrap();
    assert_eq!(level.iter().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(level.qty(), 150);
    assert_eq!(book.best_bid(), Some(px(10.00)));

    // 3) partial cancel shrinks the order but not its queue position
    book.cancel(1, 40).unwrap();
    assert_eq!(book.order(1).unwrap().quantity, 60);
    let level = book.level(Side::Buy, px(10.00)).unwrap();
    assert_eq!(level.iter().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(level.qty(), 110);

    // 4) execution to zero removes the order, the level survives
    book.execute(1, 60, 9).unwrap();
    assert!(book.order(1).is_none());
    let level = book.level(Side::Buy, px(10.00)).unwrap();
    assert_eq!(level.iter().collect::<Vec<_>>(), vec![2]);
    assert_eq!(book.best_bid(), Some(px(10.00)));

    // 5) deleting the last order prunes the level
    book.delete(2).unwrap();
    assert!(book.level(Side::Buy, px(10.00)).is_none());
    assert_eq!(book.best_bid(), None);
    assert_eq!(book.num_orders(), 0);

    // 6) replace of a nonexistent order fails
    assert_eq!(
        book.replace(3, 4, 10, px(11.00), 2000),
        Err(BookError::UnknownOrderId(3))
    );

    book.assert_invariants();
}

#[test]
fn best_prices_track_both_sides() {
    let mut book = tsla();
    book.add(Order::limit(1, Side::Buy, px(10.00), 10, 1)).unwrap();
    book.add(Order::limit(2, Side::Buy, px(10.50), 10, 2)).unwrap();
    book.add(Order::limit(3, Side::Buy, px(9.75), 10, 3)).unwrap();
    book.add(Order::limit(4, Side::Sell, px(11.00), 10, 4)).unwrap();
    book.add(Order::limit(5, Side::Sell, px(10.80), 10, 5)).unwrap();

    assert_eq!(book.best_bid(), Some(px(10.50)));
    assert_eq!(book.best_ask(), Some(px(10.80)));

    book.delete(2).unwrap();
    assert_eq!(book.best_bid(), Some(px(10.00)));
    book.delete(5).unwrap();
    assert_eq!(book.best_ask(), Some(px(11.00)));

    book.assert_invariants();
}

#[test]
fn duplicate_add_is_rejected_without_mutation() {
    let mut book = tsla();
    book.add(Order::limit(1, Side::Buy, px(10.00), 100, 1)).unwrap();
    let err = book
        .add(Order::limit(1, Side::Sell, px(12.00), 5, 2))
        .unwrap_err();
    assert_eq!(err, BookError::DuplicateOrderId(1));

    assert_eq!(book.order(1).unwrap().side, Side::Buy);
    assert!(book.level(Side::Sell, px(12.00)).is_none());
    book.assert_invariants();
}

#[test]
fn over_cancel_is_rejected() {
    let mut book = tsla();
    book.add(Order::limit(1, Side::Buy, px(10.00), 100, 1)).unwrap();

    assert_eq!(
        book.cancel(1, 101),
        Err(BookError::OverCancel {
            id: 1,
            requested: 101,
            remaining: 100
        })
    );
    assert_eq!(book.order(1).unwrap().quantity, 100);

    assert_eq!(
        book.execute(1, 150, 7),
        Err(BookError::OverCancel {
            id: 1,
            requested: 150,
            remaining: 100
        })
    );
    book.assert_invariants();
}

#[test]
fn unknown_ids_are_rejected_everywhere() {
    let mut book = tsla();
    assert_eq!(book.delete(5), Err(BookError::UnknownOrderId(5)));
    assert_eq!(book.cancel(5, 1), Err(BookError::UnknownOrderId(5)));
    assert_eq!(book.execute(5, 1, 1), Err(BookError::UnknownOrderId(5)));
}

#[test]
fn replace_inherits_side_and_joins_the_new_level_tail() {
    let mut book = tsla();
    book.add(Order::limit(1, Side::Sell, px(11.00), 100, 1)).unwrap();
    book.add(Order::limit(2, Side::Sell, px(11.50), 40, 2)).unwrap();

    book.replace(1, 10, 80, px(11.50), 99).unwrap();

    assert!(book.order(1).is_none());
    let new = book.order(10).unwrap();
    assert_eq!(new.side, Side::Sell);
    assert_eq!(new.quantity, 80);
    assert_eq!(new.price, Some(px(11.50)));
    assert_eq!(new.timestamp_ns, 99);

    // old level pruned, replacement behind the earlier resting order
    assert!(book.level(Side::Sell, px(11.00)).is_none());
    let level = book.level(Side::Sell, px(11.50)).unwrap();
    assert_eq!(level.iter().collect::<Vec<_>>(), vec![2, 10]);

    book.assert_invariants();
}

#[test]
fn replace_to_an_existing_id_leaves_both_orders_alone() {
    let mut book = tsla();
    book.add(Order::limit(1, Side::Buy, px(10.00), 100, 1)).unwrap();
    book.add(Order::limit(2, Side::Buy, px(10.00), 50, 2)).unwrap();

    assert_eq!(
        book.replace(1, 2, 10, px(9.00), 3),
        Err(BookError::DuplicateOrderId(2))
    );
    assert_eq!(book.order(1).unwrap().quantity, 100);
    assert_eq!(book.order(2).unwrap().quantity, 50);
    book.assert_invariants();
}

#[test]
fn execute_ignores_the_match_number_as_an_order_id() {
    let mut book = tsla();
    book.add(Order::limit(1, Side::Buy, px(10.00), 100, 1)).unwrap();
    book.add(Order::limit(2, Side::Sell, px(10.10), 100, 2)).unwrap();

    // match number 2 collides with a resting order id; that order must not move
    book.execute(1, 30, 2).unwrap();
    assert_eq!(book.order(1).unwrap().quantity, 70);
    assert_eq!(book.order(2).unwrap().quantity, 100);
    book.assert_invariants();
}

#[test]
fn execute_with_price_reduces_like_execute() {
    let mut book = tsla();
    book.add(Order::limit(1, Side::Buy, px(10.00), 100, 1)).unwrap();

    book.execute_with_price(1, 40, 5, px(10.01), b'Y').unwrap();
    assert_eq!(book.order(1).unwrap().quantity, 60);

    book.execute_with_price(1, 60, 6, px(10.02), b'N').unwrap();
    assert!(book.order(1).is_none());
    assert_eq!(book.best_bid(), None);
    book.assert_invariants();
}

#[test]
fn market_orders_never_rest() {
    let mut book = tsla();
    let market = Order {
        price: None,
        ..Order::limit(1, Side::Buy, px(0.0), 100, 1)
    };
    book.add(market).unwrap();
    assert_eq!(book.num_orders(), 0);
    assert_eq!(book.best_bid(), None);
}

#[test]
fn quantity_is_conserved_across_partial_reductions() {
    let mut book = tsla();
    let original = 100u32;
    book.add(Order::limit(1, Side::Buy, px(10.00), original, 1)).unwrap();

    let mut executed = 0u32;
    let mut cancelled = 0u32;

    book.execute(1, 25, 1).unwrap();
    executed += 25;
    book.cancel(1, 10).unwrap();
    cancelled += 10;
    book.execute(1, 15, 2).unwrap();
    executed += 15;

    let remaining = book.order(1).unwrap().quantity;
    assert_eq!(executed + cancelled + remaining, original);

    book.cancel(1, remaining).unwrap();
    cancelled += remaining;
    assert_eq!(executed + cancelled, original);
    assert!(book.order(1).is_none());
}

#[test]
fn apply_routes_messages_and_checks_the_symbol() {
    let mut book = tsla();

    let add = |stock: &str, id: u64| {
        Message::AddOrder(AddOrder {
            header: Header {
                stock_locate: 0,
                tracking_number: 0,
                timestamp_ns: 1,
            },
            order_id: id,
            side: Side::Buy,
            shares: 100,
            stock: Symbol::new(stock),
            price: Price4(100_000),
            mpid: None,
        })
    };

    book.apply(&add("TSLA", 1)).unwrap();
    assert!(book.order(1).is_some());

    let err = book.apply(&add("AAPL", 2)).unwrap_err();
    assert_eq!(
        err,
        BookError::SymbolMismatch {
            want: Symbol::new("TSLA"),
            got: Symbol::new("AAPL"),
        }
    );
    assert!(book.order(2).is_none());
    book.assert_invariants();
}

#[test]
fn inverse_sequence_restores_the_book() {
    let mut book = tsla();
    book.add(Order::limit(100, Side::Buy, px(9.00), 10, 1)).unwrap();
    book.add(Order::limit(101, Side::Sell, px(11.00), 20, 2)).unwrap();
    let before = book.levels_depth(Side::Buy, 0);
    let before_asks = book.levels_depth(Side::Sell, 0);
    let before_orders = book.num_orders();

    // adds then LIFO deletes return to the starting state
    let ids = [1u64, 2, 3, 4, 5];
    for (i, &id) in ids.iter().enumerate() {
        book.add(Order::limit(id, Side::Buy, px(10.00 + i as f64), 10, 10 + i as u64))
            .unwrap();
    }
    for &id in ids.iter().rev() {
        book.delete(id).unwrap();
    }

    assert_eq!(book.levels_depth(Side::Buy, 0), before);
    assert_eq!(book.levels_depth(Side::Sell, 0), before_asks);
    assert_eq!(book.num_orders(), before_orders);
    book.assert_invariants();
}

#[test]
fn depth_views_order_best_first() {
    let mut book = tsla();
    for (id, d) in [(1u64, 10.00), (2, 10.50), (3, 9.00)] {
        book.add(Order::limit(id, Side::Buy, px(d), 10, id)).unwrap();
    }
    for (id, d) in [(4u64, 11.00), (5, 11.25), (6, 12.00)] {
        book.add(Order::limit(id, Side::Sell, px(d), 10, id)).unwrap();
    }

    let bids = book.levels_depth(Side::Buy, 0);
    let bid_prices: Vec<Price4> = bids.iter().map(|l| l.price).collect();
    assert_eq!(bid_prices, vec![px(10.50), px(10.00), px(9.00)]);

    let asks = book.levels_depth(Side::Sell, 2);
    let ask_prices: Vec<Price4> = asks.iter().map(|l| l.price).collect();
    assert_eq!(ask_prices, vec![px(11.00), px(11.25)]);
}
