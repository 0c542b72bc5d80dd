use std::{collections::HashSet, env, fs};

use anyhow::{Context, Result};
use itch_book::itch::{Message, MessageIter};

fn main() -> Result<()> {
    let path = env::args().nth(1).unwrap_or_else(|| "data/feed.bin".to_string());
    let bytes = fs::read(&path).with_context(|| format!("read {path}"))?;

    let mut counts = [0u64; 256];
    let mut symbols = HashSet::<[u8; 8]>::new();
    let mut total = 0u64;

    for item in MessageIter::new(&bytes) {
        let msg = match item {
            Ok((_, msg)) => msg,
            Err(e) => {
                eprintln!("decode stopped: {e}");
                break;
            }
        };
        counts[msg.kind() as usize] += 1;
        total += 1;

        if let Message::AddOrder(m) = &msg {
            symbols.insert(m.stock.raw());
        }
    }

    println!("records={total}");
    for (kind, &n) in counts.iter().enumerate() {
        if n > 0 {
            println!("type {}={n}", kind as u8 as char);
        }
    }
    println!("unique_symbols={}", symbols.len());
    Ok(())
}
