// tests/golden_smoke.rs
use std::process::Command;

use itch_book::itch::{
    self, AddOrder, Header, Message, OrderCancel, OrderExecuted, Price4, Side, Symbol,
};

fn header(ts: u64) -> Header {
    Header {
        stock_locate: 1,
        tracking_number: 0,
        timestamp_ns: ts,
    }
}

fn tiny_capture() -> Vec<u8> {
    let sym = Symbol::new("TSLA");
    let mut buf = Vec::new();
    itch::encode(
        &Message::AddOrder(AddOrder {
            header: header(1),
            order_id: 1,
            side: Side::Buy,
            shares: 100,
            stock: sym,
            price: Price4(100_000),
            mpid: None,
        }),
        &mut buf,
    );
    itch::encode(
        &Message::AddOrder(AddOrder {
            header: header(2),
            order_id: 2,
            side: Side::Sell,
            shares: 50,
            stock: sym,
            price: Price4(101_000),
            mpid: None,
        }),
        &mut buf,
    );
    itch::encode(
        &Message::OrderExecuted(OrderExecuted {
            header: header(3),
            order_id: 1,
            executed_shares: 30,
            match_number: 7,
        }),
        &mut buf,
    );
    itch::encode(
        &Message::OrderCancel(OrderCancel {
            header: header(4),
            order_id: 2,
            cancelled_shares: 20,
        }),
        &mut buf,
    );
    buf
}

#[test]
fn golden_smoke_replays_a_tiny_capture() {
    let tmp = tempfile::tempdir().unwrap();
    let in_path = tmp.path().join("tiny.bin");
    let out_path = tmp.path().join("out.json");

    std::fs::write(&in_path, tiny_capture()).unwrap();

    let exe = env!("CARGO_BIN_EXE_itch-book");
    let output = Command::new(exe)
        .args([
            "replay",
            "--file",
            in_path.to_str().unwrap(),
            "--symbol",
            "TSLA",
            "--out",
            out_path.to_str().unwrap(),
            "--depth",
            "0",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");

    // machine-readable snapshot frame on stdout
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#""type":"snapshot""#), "stdout: {stdout}");
    assert!(stdout.contains(r#""px":100000"#), "stdout: {stdout}");
    assert!(stdout.contains(r#""px":101000"#), "stdout: {stdout}");

    // final document mirrors the surviving book
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(doc["type"], "final");
    assert_eq!(doc["symbol"], "TSLA");
    assert_eq!(doc["messages"], 4);
    assert_eq!(doc["decode_errors"], 0);
    assert_eq!(doc["apply_errors"], 0);
    assert_eq!(doc["resting_orders"], 2);
    assert_eq!(doc["best_bid"], 100_000);
    assert_eq!(doc["best_ask"], 101_000);
    assert_eq!(doc["bids"][0]["qty"], 70);
    assert_eq!(doc["asks"][0]["qty"], 30);
}

#[test]
fn gen_replay_inspect_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let cap_path = tmp.path().join("cap.bin");
    let out_path = tmp.path().join("out.json");
    let exe = env!("CARGO_BIN_EXE_itch-book");

    let status = Command::new(exe)
        .args([
            "gen",
            "--out",
            cap_path.to_str().unwrap(),
            "--symbol",
            "TSLA",
            "--orders",
            "500",
            "--seed",
            "42",
        ])
        .status()
        .unwrap();
    assert!(status.success());

    let output = Command::new(exe)
        .args([
            "replay",
            "--file",
            cap_path.to_str().unwrap(),
            "--symbol",
            "TSLA",
            "--out",
            out_path.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(doc["messages"], 502); // orders + open/close system events
    assert_eq!(doc["decode_errors"], 0);
    assert_eq!(doc["apply_errors"], 0);

    let inspect = env!("CARGO_BIN_EXE_inspect");
    let output = Command::new(inspect)
        .arg(cap_path.to_str().unwrap())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("records=502"), "stdout: {stdout}");
    assert!(stdout.contains("unique_symbols=1"), "stdout: {stdout}");
}
