// src/wire.rs
use bytes::Bytes;
use itoa::Buffer;

use crate::book::LevelView;
use crate::itch::{Price4, Symbol};

#[inline(always)]
fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
}

#[inline(always)]
fn push_u64(out: &mut Vec<u8>, buf: &mut Buffer, v: u64) {
    push_str(out, buf.format(v));
}

#[inline(always)]
fn push_opt_price(out: &mut Vec<u8>, buf: &mut Buffer, v: Option<Price4>) {
    match v {
        Some(p) => push_str(out, buf.format(p.0)),
        None => push_str(out, "null"),
    }
}

fn push_levels(out: &mut Vec<u8>, buf: &mut Buffer, levels: &[LevelView]) {
    for (i, lv) in levels.iter().enumerate() {
        if i != 0 {
            out.push(b',');
        }
        push_str(out, "{\"px\":");
        push_str(out, buf.format(lv.price.0));
        push_str(out, ",\"qty\":");
        push_u64(out, buf, lv.qty);
        push_str(out, ",\"orders\":");
        push_u64(out, buf, lv.orders as u64);
        out.push(b'}');
    }
}

/// One-line best-bid/offer frame. Prices are integer ten-thousandths.
pub fn encode_bbo(symbol: Symbol, msgs: u64, bid: Option<Price4>, ask: Option<Price4>) -> Bytes {
    let mut out = Vec::with_capacity(128);
    let mut b = Buffer::new();

    push_str(&mut out, "{\"type\":\"bbo\",\"symbol\":\"");
    push_str(&mut out, symbol.as_str());
    push_str(&mut out, "\",\"msgs\":");
    push_u64(&mut out, &mut b, msgs);

    push_str(&mut out, ",\"bid_px\":");
    push_opt_price(&mut out, &mut b, bid);

    push_str(&mut out, ",\"ask_px\":");
    push_opt_price(&mut out, &mut b, ask);

    out.push(b'}');
    Bytes::from(out)
}

/// Depth snapshot frame, best levels first on both sides.
pub fn encode_snapshot(symbol: Symbol, bids: &[LevelView], asks: &[LevelView]) -> Bytes {
    let mut out = Vec::with_capacity(96 + (bids.len() + asks.len()) * 40);
    let mut b = Buffer::new();

    push_str(&mut out, "{\"type\":\"snapshot\",\"symbol\":\"");
    push_str(&mut out, symbol.as_str());
    push_str(&mut out, "\",\"bids\":[");
    push_levels(&mut out, &mut b, bids);

    push_str(&mut out, "],\"asks\":[");
    push_levels(&mut out, &mut b, asks);

    push_str(&mut out, "]}");
    Bytes::from(out)
}
