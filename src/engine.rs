// src/engine.rs
//! The consumer driver and the public `OrderBook` surface.
//!
//! An [`OrderBook`] owns the producer side of the SPSC ring and, while
//! stopped, the [`Book`] state itself. `start` moves the book, the consumer
//! handle and the observer onto a dedicated driver thread; `stop` clears the
//! run flag, lets the driver drain whatever is still queued, then joins and
//! takes ownership back. Book state is only ever mutated on the driver
//! thread.
//!
//! While the driver runs, `best_bid`/`best_ask` answer from a pair of shared
//! atomics the driver refreshes after every message, a diagnostic view that
//! is one message behind at worst. Once stopped, reads come straight from the book.
//!
//! ```rust,no_run
//! use itch_book::engine::OrderBook;
//! use itch_book::itch::Side;
//!
//! let mut book = OrderBook::new("TSLA");
//! book.start().unwrap();
//! book.add_order(10.0, 100, Side::Buy).unwrap();
//! book.stop().unwrap();
//! assert!(book.best_bid().is_some());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

use crate::book::{Book, BookError, OrderId};
use crate::itch::{self, AddOrder, DecodeError, Header, Message, Price4, Side, Symbol};
use crate::queue;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_TICK_SIZE: f64 = 0.01;

/// Idle nap between polls of an empty ring, bounding the driver's busy-wait.
const IDLE_SLEEP: Duration = Duration::from_micros(1);

const NS_PER_DAY: u64 = 24 * 60 * 60 * 1_000_000_000;
const BBO_EMPTY: u64 = u64::MAX;

/// Callback invoked on the driver thread after each message is applied,
/// with the apply error if there was one. Must not block.
pub type Observer = dyn FnMut(&Message, Option<&BookError>) + Send;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("driver already running")]
    AlreadyRunning,
    #[error("message queue full")]
    QueueFull,
    #[error("decode failed at offset {offset}: {source}")]
    Decode {
        offset: usize,
        #[source]
        source: DecodeError,
    },
}

/// Nanoseconds since the most recent UTC midnight, the timestamp domain the
/// feed uses.
pub fn ns_since_midnight() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64 % NS_PER_DAY)
        .unwrap_or(0)
}

fn pack_price(p: Option<Price4>) -> u64 {
    p.map(|p| u64::from(p.0)).unwrap_or(BBO_EMPTY)
}

fn unpack_price(v: u64) -> Option<Price4> {
    (v != BBO_EMPTY).then(|| Price4(v as u32))
}

struct SharedBbo {
    bid: AtomicU64,
    ask: AtomicU64,
}

impl SharedBbo {
    fn new() -> Self {
        SharedBbo {
            bid: AtomicU64::new(BBO_EMPTY),
            ask: AtomicU64::new(BBO_EMPTY),
        }
    }

    fn store(&self, bid: Option<Price4>, ask: Option<Price4>) {
        self.bid.store(pack_price(bid), Ordering::Relaxed);
        self.ask.store(pack_price(ask), Ordering::Relaxed);
    }

    fn bid(&self) -> Option<Price4> {
        unpack_price(self.bid.load(Ordering::Relaxed))
    }

    fn ask(&self) -> Option<Price4> {
        unpack_price(self.ask.load(Ordering::Relaxed))
    }
}

/// Everything the driver thread owns while running.
struct Worker {
    book: Book,
    rx: queue::Consumer<Message>,
    observer: Option<Box<Observer>>,
}

impl Worker {
    fn run(mut self, running: Arc<AtomicBool>, bbo: Arc<SharedBbo>) -> Self {
        while running.load(Ordering::Acquire) {
            match self.rx.try_pop() {
                Some(msg) => self.handle(&msg, &bbo),
                None => thread::sleep(IDLE_SLEEP),
            }
        }

        // quiescent drain: everything enqueued before the stop still applies
        while let Some(msg) = self.rx.try_pop() {
            self.handle(&msg, &bbo);
        }

        self
    }

    fn handle(&mut self, msg: &Message, bbo: &SharedBbo) {
        let result = self.book.apply(msg);
        bbo.store(self.book.best_bid(), self.book.best_ask());

        match &mut self.observer {
            Some(observer) => observer(msg, result.as_ref().err()),
            None => {
                if let Err(e) = &result {
                    let kind = msg.kind() as char;
                    warn!(%kind, error = %e, "message dropped");
                }
            }
        }
    }
}

enum State {
    Stopped(Box<Worker>),
    Running(JoinHandle<Worker>),
}

/// A single-symbol order book fed through a bounded SPSC ring by one
/// producer thread and mutated by one driver thread.
pub struct OrderBook {
    symbol: Symbol,
    tick_size: f64,
    tx: queue::Producer<Message>,
    running: Arc<AtomicBool>,
    bbo: Arc<SharedBbo>,
    state: Option<State>,
    next_order_id: OrderId,
}

impl OrderBook {
    pub fn new(symbol: &str) -> Self {
        Self::with_options(symbol, DEFAULT_TICK_SIZE, DEFAULT_QUEUE_CAPACITY)
    }

    /// `symbol` keeps at most 8 ASCII bytes (space-padded); `tick_size` is
    /// metadata only.
    pub fn with_options(symbol: &str, tick_size: f64, queue_capacity: usize) -> Self {
        let symbol = Symbol::new(symbol);
        let (tx, rx) = queue::bounded(queue_capacity);

        OrderBook {
            symbol,
            tick_size,
            tx,
            running: Arc::new(AtomicBool::new(false)),
            bbo: Arc::new(SharedBbo::new()),
            state: Some(State::Stopped(Box::new(Worker {
                book: Book::new(symbol, tick_size),
                rx,
                observer: None,
            }))),
            next_order_id: 1,
        }
    }

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    #[inline]
    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, Some(State::Running(_)))
    }

    /// Replaces the per-message callback. The default (no observer) logs
    /// apply errors and continues. Only settable while stopped, since the
    /// observer lives on the driver thread once started.
    pub fn set_observer<F>(&mut self, observer: F) -> Result<(), EngineError>
    where
        F: FnMut(&Message, Option<&BookError>) + Send + 'static,
    {
        match self.state.as_mut() {
            Some(State::Stopped(worker)) => {
                worker.observer = Some(Box::new(observer));
                Ok(())
            }
            _ => Err(EngineError::AlreadyRunning),
        }
    }

    /// Spawns the driver thread. Fails with `AlreadyRunning` if it is
    /// already up.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }
        let Some(State::Stopped(worker)) = self.state.take() else {
            return Err(EngineError::AlreadyRunning);
        };

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let bbo = Arc::clone(&self.bbo);
        let handle = thread::spawn(move || worker.run(running, bbo));
        self.state = Some(State::Running(handle));

        info!(symbol = %self.symbol, "driver started");
        Ok(())
    }

    /// Signals the driver, which finishes the in-flight message, drains the
    /// queue residue, and exits; then joins and takes the book back.
    /// Calling `stop` on a stopped book is a no-op.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        match self.state.take() {
            Some(State::Running(handle)) => {
                self.running.store(false, Ordering::Release);
                match handle.join() {
                    Ok(worker) => {
                        self.state = Some(State::Stopped(Box::new(worker)));
                        info!(symbol = %self.symbol, "driver stopped");
                        Ok(())
                    }
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            other => {
                self.state = other;
                Ok(())
            }
        }
    }

    /// Enqueues one typed message. `QueueFull` is the backpressure signal;
    /// nothing is dropped silently.
    pub fn submit(&mut self, msg: Message) -> Result<(), EngineError> {
        self.tx.try_push(msg).map_err(|_| EngineError::QueueFull)
    }

    /// Decodes and enqueues the records packed into `bytes`, returning how
    /// many bytes were consumed. Consumption stops early (still `Ok`) when
    /// the ring fills, so the caller picks its own policy: drop, spin, or
    /// resubmit the rest. A malformed record fails with the offending
    /// offset; records before it are already enqueued.
    pub fn submit_bytes(&mut self, bytes: &[u8]) -> Result<usize, EngineError> {
        let mut offset = 0;
        while offset < bytes.len() {
            let (msg, consumed) = itch::decode(&bytes[offset..])
                .map_err(|source| EngineError::Decode { offset, source })?;
            if self.tx.try_push(msg).is_err() {
                break;
            }
            offset += consumed;
        }
        Ok(offset)
    }

    /// Convenience path: mints a fresh order id, stamps the host clock, and
    /// submits a GTC limit add carrying this book's symbol.
    pub fn add_order(
        &mut self,
        price: f64,
        quantity: u32,
        side: Side,
    ) -> Result<OrderId, EngineError> {
        let order_id = self.mint_order_id();
        self.submit(Message::AddOrder(AddOrder {
            header: Header {
                stock_locate: 0,
                tracking_number: 0,
                timestamp_ns: ns_since_midnight(),
            },
            order_id,
            side,
            shares: quantity,
            stock: self.symbol,
            price: Price4::from_f64(price),
            mpid: None,
        }))?;
        Ok(order_id)
    }

    // Monotonic id counter, advanced past any feed-assigned ids whenever the
    // book is visible (stopped). While running the driver owns the index, so
    // a collision surfaces as DuplicateOrderId through the observer instead.
    fn mint_order_id(&mut self) -> OrderId {
        if let Some(State::Stopped(worker)) = self.state.as_ref() {
            while worker.book.order(self.next_order_id).is_some() {
                self.next_order_id += 1;
            }
        }
        let id = self.next_order_id;
        self.next_order_id += 1;
        id
    }

    /// Highest resting bid. Exact while stopped; while running this is the
    /// driver's last published value and is for diagnostics only.
    pub fn best_bid(&self) -> Option<Price4> {
        match self.state.as_ref() {
            Some(State::Stopped(worker)) => worker.book.best_bid(),
            _ => self.bbo.bid(),
        }
    }

    /// Lowest resting ask; same caveats as [`OrderBook::best_bid`].
    pub fn best_ask(&self) -> Option<Price4> {
        match self.state.as_ref() {
            Some(State::Stopped(worker)) => worker.book.best_ask(),
            _ => self.bbo.ask(),
        }
    }

    /// The book state, available while the driver is stopped.
    pub fn book(&self) -> Option<&Book> {
        match self.state.as_ref() {
            Some(State::Stopped(worker)) => Some(&worker.book),
            _ => None,
        }
    }

    /// Full depth dump while stopped; a one-line BBO while running.
    pub fn print(&self) {
        match self.state.as_ref() {
            Some(State::Stopped(worker)) => print!("{}", worker.book.render()),
            _ => {
                let fmt = |p: Option<Price4>| p.map_or_else(|| "-".to_string(), |p| p.to_string());
                println!(
                    "{} bid={} ask={}",
                    self.symbol,
                    fmt(self.bbo.bid()),
                    fmt(self.bbo.ask())
                );
            }
        }
    }
}

impl Drop for OrderBook {
    fn drop(&mut self) {
        if let Some(State::Running(handle)) = self.state.take() {
            self.running.store(false, Ordering::Release);
            let _ = handle.join();
        }
    }
}
