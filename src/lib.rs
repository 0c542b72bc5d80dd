//! # itch-book: Single-Symbol ITCH 5.0 Order Book
//!
//! This crate maintains a price-time priority limit order book for one stock
//! symbol, driven by a NASDAQ TotalView-ITCH 5.0 style binary feed. The feed
//! is an already-matched replay: the book mirrors exchange state, it does not
//! match orders.
//!
//! ## Architecture
//!
//! ```text
//! caller ──(bytes | typed message)──► codec ──► SPSC ring ──► driver thread ──► book
//! ```
//!
//! - **`itch`**: the wire codec (table-driven record lengths, field-by-field
//!   big-endian decoding, symmetric encoding)
//! - **`queue`**: a bounded lock-free single-producer/single-consumer ring
//! - **`book`**: the order index, the two price-level maps and their FIFO
//!   queues, with the invariants that tie them together
//! - **`engine`**: the driver thread and the public [`engine::OrderBook`]
//!   surface (start/stop, submit, best bid/ask)
//! - **`wire`**: hand-assembled JSON frames for BBO and depth snapshots
//!
//! ## Example
//!
//! ```rust,no_run
//! use itch_book::engine::OrderBook;
//! use itch_book::itch::Side;
//!
//! let mut book = OrderBook::new("TSLA");
//! book.start().unwrap();
//!
//! // feed bytes straight off a capture...
//! let replay: Vec<u8> = std::fs::read("data/feed.bin").unwrap();
//! book.submit_bytes(&replay).unwrap();
//!
//! // ...or place orders directly
//! book.add_order(10.25, 100, Side::Buy).unwrap();
//!
//! book.stop().unwrap();
//! book.print();
//! ```
pub mod book;
pub mod engine;
pub mod itch;
pub mod queue;
pub mod wire;
