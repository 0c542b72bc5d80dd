// src/book.rs
//! Price-time priority book state for a single symbol.
//!
//! The book mirrors exchange state from an already-matched feed; it never
//! matches orders against each other. Three structures are kept in lockstep:
//!
//! - `orders`: the authoritative id → [`Order`] record (hash map, O(1) lookup)
//! - `bids` / `asks`: price → [`Level`] ordered maps (O(log L) level lookup,
//!   O(1) best-price reads at the endpoints; bids read highest-first, asks
//!   lowest-first)
//! - each [`Level`]: a FIFO queue of order ids at one price, plus the cached
//!   quantity sum for the level
//!
//! Queues hold only identifiers, never a second copy of an order. A level
//! exists iff its queue is non-empty; empty levels are pruned immediately.
//!
//! All mutation happens on whichever thread owns the `Book`; there is no
//! internal synchronization. In the running engine that is the driver thread.
//!
//! ## Example
//!
//! ```rust
//! use itch_book::book::{Book, Order};
//! use itch_book::itch::{Price4, Side, Symbol};
//!
//! let mut book = Book::new(Symbol::new("TSLA"), 0.01);
//!
//! book.add(Order::limit(1, Side::Buy, Price4::from_f64(10.0), 100, 1_000)).unwrap();
//! book.add(Order::limit(2, Side::Buy, Price4::from_f64(10.0), 50, 1_001)).unwrap();
//!
//! assert_eq!(book.best_bid(), Some(Price4::from_f64(10.0)));
//! assert_eq!(book.best_ask(), None);
//!
//! book.execute(1, 100, 9).unwrap();
//! assert!(book.order(1).is_none());
//! assert_eq!(book.best_bid(), Some(Price4::from_f64(10.0)));
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::{debug, trace};

use crate::itch::{Message, Price4, Side, Symbol};

pub type OrderId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ExecutionType {
    Market,
    Limit,
}

/// Carried for observers; the book itself does not act on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Order {
    pub order_id: OrderId,
    pub side: Side,
    pub execution_type: ExecutionType,
    pub time_in_force: TimeInForce,
    /// `None` only for market orders, which never rest on the book.
    pub price: Option<Price4>,
    pub quantity: u32,
    pub timestamp_ns: u64,
}

impl Order {
    /// A GTC limit order, the shape every feed-originated order has.
    pub fn limit(
        order_id: OrderId,
        side: Side,
        price: Price4,
        quantity: u32,
        timestamp_ns: u64,
    ) -> Self {
        Order {
            order_id,
            side,
            execution_type: ExecutionType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(price),
            quantity,
            timestamp_ns,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order(id={}, side={:?}, policy={:?}, tif={:?}, price=",
            self.order_id, self.side, self.execution_type, self.time_in_force
        )?;
        match self.price {
            Some(p) => write!(f, "{p}")?,
            None => f.write_str("market")?,
        }
        write!(f, ", qty={}, ts={}ns)", self.quantity, self.timestamp_ns)
    }
}

/// FIFO queue of resting order ids at one price, with the level's quantity
/// sum cached so depth reads do not walk the queue.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Level {
    queue: VecDeque<OrderId>,
    qty: u64,
}

impl Level {
    pub fn qty(&self) -> u64 {
        self.qty
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.queue.iter().copied()
    }
}

/// One side's depth entry, as exposed to snapshots and serialization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LevelView {
    pub price: Price4,
    pub qty: u64,
    pub orders: usize,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BookError {
    #[error("unknown order id {0}")]
    UnknownOrderId(OrderId),
    #[error("duplicate order id {0}")]
    DuplicateOrderId(OrderId),
    #[error("reduction of {requested} exceeds remaining {remaining} on order {id}")]
    OverCancel {
        id: OrderId,
        requested: u32,
        remaining: u32,
    },
    #[error("add for '{got}' does not match book symbol '{want}'")]
    SymbolMismatch { want: Symbol, got: Symbol },
    #[error("zero quantity on order {0}")]
    ZeroQuantity(OrderId),
}

#[derive(Debug, PartialEq)]
pub struct Book {
    symbol: Symbol,
    tick_size: f64,
    orders: hashbrown::HashMap<OrderId, Order>,
    bids: BTreeMap<Price4, Level>,
    asks: BTreeMap<Price4, Level>,
}

impl Book {
    pub fn new(symbol: Symbol, tick_size: f64) -> Self {
        Book {
            symbol,
            tick_size,
            orders: hashbrown::HashMap::new(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Metadata only; tick conformance is not enforced.
    #[inline]
    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    #[inline]
    pub fn reserve_orders(&mut self, n: usize) {
        self.orders.reserve(n);
    }

    #[inline]
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    #[inline]
    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn best_bid(&self) -> Option<Price4> {
        self.bids.keys().next_back().copied()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Price4> {
        self.asks.keys().next().copied()
    }

    pub fn level(&self, side: Side, price: Price4) -> Option<&Level> {
        self.side_levels(side).get(&price)
    }

    #[inline]
    fn side_levels(&self, side: Side) -> &BTreeMap<Price4, Level> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    fn side_levels_mut(&mut self, side: Side) -> &mut BTreeMap<Price4, Level> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Records `order` and appends it to the tail of its price level,
    /// creating the level if absent.
    ///
    /// A market order (no price) never rests; it is accepted and dropped.
    pub fn add(&mut self, order: Order) -> Result<(), BookError> {
        let Some(price) = order.price else {
            debug!(order_id = order.order_id, "market order ignored by book");
            return Ok(());
        };
        if order.quantity == 0 {
            return Err(BookError::ZeroQuantity(order.order_id));
        }
        if self.orders.contains_key(&order.order_id) {
            return Err(BookError::DuplicateOrderId(order.order_id));
        }

        let level = self.side_levels_mut(order.side).entry(price).or_default();
        level.queue.push_back(order.order_id);
        level.qty += u64::from(order.quantity);
        self.orders.insert(order.order_id, order);
        Ok(())
    }

    /// Removes the order from its queue and from the index, pruning the
    /// level if it became empty. Returns the removed record.
    pub fn delete(&mut self, id: OrderId) -> Result<Order, BookError> {
        let order = self
            .orders
            .remove(&id)
            .ok_or(BookError::UnknownOrderId(id))?;

        // only priced orders ever rest, so this always finds a level
        if let Some(price) = order.price {
            let levels = self.side_levels_mut(order.side);
            if let Some(level) = levels.get_mut(&price) {
                if let Some(at) = level.queue.iter().position(|&q| q == id) {
                    level.queue.remove(at);
                    level.qty -= u64::from(order.quantity);
                }
                if level.queue.is_empty() {
                    levels.remove(&price);
                }
            }
        }

        Ok(order)
    }

    /// Reduces remaining quantity by `qty`; reaching zero deletes the order.
    pub fn cancel(&mut self, id: OrderId, qty: u32) -> Result<(), BookError> {
        self.reduce(id, qty)
    }

    /// Applies an execution against a resting order. `match_number`
    /// identifies the trade for observers; it is NOT an order id and no
    /// second order is touched.
    pub fn execute(&mut self, id: OrderId, qty: u32, match_number: u64) -> Result<(), BookError> {
        trace!(order_id = id, qty, match_number, "execution");
        self.reduce(id, qty)
    }

    /// Same state effect as [`Book::execute`]; the execution price and
    /// printable flag exist for observers of the message stream.
    pub fn execute_with_price(
        &mut self,
        id: OrderId,
        qty: u32,
        match_number: u64,
        price: Price4,
        printable: u8,
    ) -> Result<(), BookError> {
        let printed = printable == b'Y';
        trace!(
            order_id = id,
            qty,
            match_number,
            %price,
            printed,
            "execution with price"
        );
        self.reduce(id, qty)
    }

    // Shared by cancel and execute: both are quantity reductions that turn
    // into a delete at zero.
    fn reduce(&mut self, id: OrderId, qty: u32) -> Result<(), BookError> {
        let order = self
            .orders
            .get(&id)
            .copied()
            .ok_or(BookError::UnknownOrderId(id))?;

        if qty == 0 {
            return Err(BookError::ZeroQuantity(id));
        }
        if qty > order.quantity {
            return Err(BookError::OverCancel {
                id,
                requested: qty,
                remaining: order.quantity,
            });
        }
        if qty == order.quantity {
            self.delete(id)?;
            return Ok(());
        }

        if let Some(price) = order.price {
            if let Some(level) = self.side_levels_mut(order.side).get_mut(&price) {
                level.qty -= u64::from(qty);
            }
        }
        if let Some(o) = self.orders.get_mut(&id) {
            o.quantity -= qty;
        }
        Ok(())
    }

    /// Atomically removes `old_id` and re-inserts under `new_id` at the new
    /// price and quantity. Side, time in force and execution type are
    /// inherited; the timestamp comes from the driving message. Queue
    /// position is not preserved: the replacement joins its level's tail.
    ///
    /// No state changes on error.
    pub fn replace(
        &mut self,
        old_id: OrderId,
        new_id: OrderId,
        qty: u32,
        price: Price4,
        timestamp_ns: u64,
    ) -> Result<(), BookError> {
        if self.orders.contains_key(&new_id) {
            return Err(BookError::DuplicateOrderId(new_id));
        }
        if !self.orders.contains_key(&old_id) {
            return Err(BookError::UnknownOrderId(old_id));
        }
        if qty == 0 {
            return Err(BookError::ZeroQuantity(new_id));
        }

        let old = self.delete(old_id)?;
        self.add(Order {
            order_id: new_id,
            side: old.side,
            execution_type: old.execution_type,
            time_in_force: old.time_in_force,
            price: Some(price),
            quantity: qty,
            timestamp_ns,
        })
    }

    /// Routes a decoded message to the operation it means. Adds are checked
    /// against the book's symbol; market-data kinds that do not affect the
    /// book succeed without touching state.
    pub fn apply(&mut self, msg: &Message) -> Result<(), BookError> {
        match msg {
            Message::AddOrder(m) => {
                if m.stock != self.symbol {
                    return Err(BookError::SymbolMismatch {
                        want: self.symbol,
                        got: m.stock,
                    });
                }
                self.add(Order::limit(
                    m.order_id,
                    m.side,
                    m.price,
                    m.shares,
                    m.header.timestamp_ns,
                ))
            }
            Message::OrderDelete(m) => self.delete(m.order_id).map(|_| ()),
            Message::OrderCancel(m) => self.cancel(m.order_id, m.cancelled_shares),
            Message::OrderExecuted(m) => {
                self.execute(m.order_id, m.executed_shares, m.match_number)
            }
            Message::OrderExecutedWithPrice(m) => self.execute_with_price(
                m.order_id,
                m.executed_shares,
                m.match_number,
                m.execution_price,
                m.printable,
            ),
            Message::OrderReplace(m) => self.replace(
                m.original_order_id,
                m.new_order_id,
                m.shares,
                m.price,
                m.header.timestamp_ns,
            ),
            // trades and administrative kinds are observer-only
            _ => Ok(()),
        }
    }

    /// Depth snapshot for one side, best price first. `depth == 0` means all
    /// levels.
    pub fn levels_depth(&self, side: Side, depth: usize) -> Vec<LevelView> {
        let levels = self.side_levels(side);
        let take_n = if depth == 0 {
            levels.len()
        } else {
            depth.min(levels.len())
        };

        let view = |(price, level): (&Price4, &Level)| LevelView {
            price: *price,
            qty: level.qty,
            orders: level.len(),
        };

        match side {
            Side::Buy => self.bids.iter().rev().take(take_n).map(view).collect(),
            Side::Sell => self.asks.iter().take(take_n).map(view).collect(),
        }
    }

    /// Human-readable dump of both sides, best prices first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- BIDS ({}) ---", self.symbol);
        for (price, level) in self.bids.iter().rev() {
            let _ = writeln!(out, "Price {price}:");
            for id in level.iter() {
                if let Some(order) = self.orders.get(&id) {
                    let _ = writeln!(out, "  {order}");
                }
            }
        }
        let _ = writeln!(out, "--- ASKS ({}) ---", self.symbol);
        for (price, level) in self.asks.iter() {
            let _ = writeln!(out, "Price {price}:");
            for id in level.iter() {
                if let Some(order) = self.orders.get(&id) {
                    let _ = writeln!(out, "  {order}");
                }
            }
        }
        out
    }
}

impl Book {
    /// Checks every cross-structure invariant; panics on violation. Used by
    /// the property tests after arbitrary operation sequences.
    pub fn assert_invariants(&self) {
        // 1) resting orders are priced with positive quantity
        for o in self.orders.values() {
            assert!(
                o.price.is_some(),
                "resting order {} without price",
                o.order_id
            );
            assert!(o.quantity > 0, "zero qty order {}", o.order_id);
        }

        // 2) every queued id resolves to an order on the right side/price,
        //    and each id is queued exactly once overall
        let mut seen: hashbrown::HashMap<OrderId, u32> = hashbrown::HashMap::new();
        for (side, levels) in [(Side::Buy, &self.bids), (Side::Sell, &self.asks)] {
            for (&price, level) in levels.iter() {
                assert!(!level.is_empty(), "empty level at {price}");
                let mut level_sum = 0u64;
                for id in level.iter() {
                    let o = self
                        .orders
                        .get(&id)
                        .unwrap_or_else(|| panic!("queued id {id} missing from order index"));
                    assert_eq!(o.side, side, "side mismatch for order {id}");
                    assert_eq!(o.price, Some(price), "price mismatch for order {id}");
                    level_sum += u64::from(o.quantity);
                    *seen.entry(id).or_insert(0) += 1;
                }
                // 3) cached level quantity equals the sum over its orders
                assert_eq!(level.qty, level_sum, "level qty mismatch at {price}");
            }
        }
        assert_eq!(seen.len(), self.orders.len(), "order/queue count mismatch");
        assert!(seen.values().all(|&n| n == 1), "order queued more than once");

        // 4) strict price ordering within each side
        for levels in [&self.bids, &self.asks] {
            let prices: Vec<Price4> = levels.keys().copied().collect();
            assert!(prices.windows(2).all(|w| w[0] < w[1]), "unsorted levels");
        }
    }
}
