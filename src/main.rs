// src/main.rs
mod metrics;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memmap2::Mmap;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use std::{
    fs::File,
    path::PathBuf,
    sync::{atomic::Ordering, Arc},
    thread,
    time::{Duration, Instant},
};
use tracing::{error, info};

use crate::metrics::Metrics;
use itch_book::{
    engine::{EngineError, OrderBook, DEFAULT_QUEUE_CAPACITY},
    itch::{
        self, AddOrder, Header, Message, OrderCancel, OrderDelete, OrderExecuted, OrderReplace,
        Price4, Side, Symbol, SystemEvent,
    },
    wire,
};

#[derive(Parser, Debug)]
#[command(name = "itch-book", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write a synthetic single-symbol ITCH capture.
    Gen {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "TSLA")]
        symbol: String,
        /// Number of order lifecycle records to emit.
        #[arg(long, default_value_t = 10_000)]
        orders: usize,
        /// Seed for a reproducible capture.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Replay a capture through the book and report the final state.
    Replay {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        symbol: String,
        /// Optional JSON document with the final state and counters.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Depth=0 means full depth (all price levels).
        #[arg(long, default_value_t = 10)]
        depth: usize,
        #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,
        /// Log a BBO frame every N applied messages. Set 0 to disable.
        #[arg(long, default_value_t = 100_000)]
        progress_every: u64,
        /// Optional Prometheus-style counter dump.
        #[arg(long)]
        metrics_out: Option<PathBuf>,
        /// Dump the full book to stdout after the replay.
        #[arg(long, default_value_t = false)]
        print: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Gen {
            out,
            symbol,
            orders,
            seed,
        } => gen_capture(out, &symbol, orders, seed),
        Cmd::Replay {
            file,
            symbol,
            out,
            depth,
            queue_capacity,
            progress_every,
            metrics_out,
            print,
        } => replay(
            file,
            &symbol,
            out,
            depth,
            queue_capacity,
            progress_every,
            metrics_out,
            print,
        ),
    }
}

fn gen_capture(out: PathBuf, symbol: &str, orders: usize, seed: Option<u64>) -> Result<()> {
    let sym = Symbol::new(symbol);
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut buf: Vec<u8> = Vec::with_capacity(orders * 40);
    let mut ts: u64 = 1;
    let mut next_id: u64 = 1;
    let mut next_match: u64 = 1;
    // (order id, remaining shares) for every order still on the book
    let mut live: Vec<(u64, u32)> = Vec::new();

    let mut header = |ts: &mut u64| {
        let h = Header {
            stock_locate: 1,
            tracking_number: 0,
            timestamp_ns: *ts,
        };
        *ts += 1;
        h
    };

    itch::encode(
        &Message::SystemEvent(SystemEvent {
            header: header(&mut ts),
            event_code: b'O',
        }),
        &mut buf,
    );

    for _ in 0..orders {
        let h = header(&mut ts);
        let roll: f64 = rng.gen();

        if live.is_empty() || roll < 0.55 {
            let order_id = next_id;
            next_id += 1;
            let side = if rng.gen_bool(0.5) {
                Side::Buy
            } else {
                Side::Sell
            };
            let shares: u32 = rng.gen_range(1..=10_000);
            let price = Price4(rng.gen_range(1..=50_000u32) * 100);
            itch::encode(
                &Message::AddOrder(AddOrder {
                    header: h,
                    order_id,
                    side,
                    shares,
                    stock: sym,
                    price,
                    mpid: None,
                }),
                &mut buf,
            );
            live.push((order_id, shares));
        } else if roll < 0.70 {
            let at = rng.gen_range(0..live.len());
            let (order_id, remaining) = live[at];
            let qty = rng.gen_range(1..=remaining);
            itch::encode(
                &Message::OrderCancel(OrderCancel {
                    header: h,
                    order_id,
                    cancelled_shares: qty,
                }),
                &mut buf,
            );
            if qty == remaining {
                live.swap_remove(at);
            } else {
                live[at].1 -= qty;
            }
        } else if roll < 0.85 {
            let at = rng.gen_range(0..live.len());
            let (order_id, remaining) = live[at];
            let qty = rng.gen_range(1..=remaining);
            itch::encode(
                &Message::OrderExecuted(OrderExecuted {
                    header: h,
                    order_id,
                    executed_shares: qty,
                    match_number: next_match,
                }),
                &mut buf,
            );
            next_match += 1;
            if qty == remaining {
                live.swap_remove(at);
            } else {
                live[at].1 -= qty;
            }
        } else if roll < 0.95 {
            let at = rng.gen_range(0..live.len());
            let (order_id, _) = live[at];
            itch::encode(
                &Message::OrderDelete(OrderDelete { header: h, order_id }),
                &mut buf,
            );
            live.swap_remove(at);
        } else {
            let at = rng.gen_range(0..live.len());
            let (original_order_id, _) = live[at];
            let new_order_id = next_id;
            next_id += 1;
            let shares: u32 = rng.gen_range(1..=10_000);
            let price = Price4(rng.gen_range(1..=50_000u32) * 100);
            itch::encode(
                &Message::OrderReplace(OrderReplace {
                    header: h,
                    original_order_id,
                    new_order_id,
                    shares,
                    price,
                }),
                &mut buf,
            );
            live[at] = (new_order_id, shares);
        }
    }

    itch::encode(
        &Message::SystemEvent(SystemEvent {
            header: header(&mut ts),
            event_code: b'C',
        }),
        &mut buf,
    );

    std::fs::write(&out, &buf).with_context(|| format!("write capture {out:?}"))?;
    info!(
        out = ?out,
        bytes = buf.len(),
        records = orders + 2,
        resting = live.len(),
        "capture written"
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn replay(
    file: PathBuf,
    symbol: &str,
    out: Option<PathBuf>,
    depth: usize,
    queue_capacity: usize,
    progress_every: u64,
    metrics_out: Option<PathBuf>,
    print: bool,
) -> Result<()> {
    let f = File::open(&file).with_context(|| format!("open capture {file:?}"))?;
    let mmap = unsafe { Mmap::map(&f)? };
    let bytes = mmap.as_ref();
    info!(file = ?file, bytes = bytes.len(), symbol, "replay starting");

    let metrics = Arc::new(Metrics::new());
    let mut ob = OrderBook::with_options(symbol, 0.01, queue_capacity);
    {
        let m = Arc::clone(&metrics);
        ob.set_observer(move |_msg, err| {
            m.inc_total();
            if err.is_some() {
                m.inc_apply_err();
            }
        })?;
    }
    ob.start()?;

    let started = Instant::now();
    let mut off = 0usize;
    let mut last_tick = 0u64;
    let mut halted_at: Option<usize> = None;

    while off < bytes.len() {
        match ob.submit_bytes(&bytes[off..]) {
            Ok(consumed) => {
                off += consumed;
                if off < bytes.len() {
                    // ring full: spin-wait for the driver to make room
                    thread::sleep(Duration::from_micros(50));
                }
            }
            Err(EngineError::Decode { offset, source }) => {
                metrics.inc_decode_err();
                error!(offset = off + offset, error = %source, "malformed record; replay halted");
                halted_at = Some(off + offset);
                break;
            }
            Err(e) => return Err(e.into()),
        }

        if progress_every > 0 {
            let done = metrics.msgs_total.load(Ordering::Relaxed);
            if done.saturating_sub(last_tick) >= progress_every {
                last_tick = done;
                let frame = wire::encode_bbo(ob.symbol(), done, ob.best_bid(), ob.best_ask());
                info!("{}", String::from_utf8_lossy(&frame));
            }
        }
    }

    ob.stop()?;
    let elapsed = started.elapsed();

    let msgs = metrics.msgs_total.load(Ordering::Relaxed);
    let decode_errors = metrics.decode_err.load(Ordering::Relaxed);
    let apply_errors = metrics.apply_err.load(Ordering::Relaxed);
    info!(
        msgs,
        decode_errors,
        apply_errors,
        complete = halted_at.is_none(),
        elapsed_ms = elapsed.as_millis() as u64,
        "replay finished"
    );

    if let Some(book) = ob.book() {
        let bids = book.levels_depth(Side::Buy, depth);
        let asks = book.levels_depth(Side::Sell, depth);

        let frame = wire::encode_snapshot(ob.symbol(), &bids, &asks);
        println!("{}", String::from_utf8_lossy(&frame));

        if let Some(path) = out {
            let doc = json!({
                "type": "final",
                "symbol": ob.symbol().as_str(),
                "messages": msgs,
                "decode_errors": decode_errors,
                "apply_errors": apply_errors,
                "halted_at": halted_at,
                "resting_orders": book.num_orders(),
                "best_bid": book.best_bid().map(|p| p.0),
                "best_ask": book.best_ask().map(|p| p.0),
                "bids": bids,
                "asks": asks,
            });
            std::fs::write(&path, serde_json::to_vec_pretty(&doc)?)
                .with_context(|| format!("write final document {path:?}"))?;
            info!(out = ?path, "wrote final document");
        }
    }

    if let Some(path) = metrics_out {
        std::fs::write(&path, metrics.prometheus_text())
            .with_context(|| format!("write metrics {path:?}"))?;
    }

    if print {
        ob.print();
    }

    Ok(())
}
