// src/itch.rs
//! TotalView-ITCH 5.0 wire codec.
//!
//! Each record starts with a one-byte message type, followed by an 11-byte
//! common prefix (type + stock locate + tracking number + 48-bit timestamp)
//! and a fixed-size, type-specific body. Records are packed back to back with
//! no padding. All multi-byte integers are big-endian on the wire; prices are
//! 32-bit fixed-point values with four implied decimal places.
//!
//! Decoding is field-by-field from the byte slice rather than a packed-struct
//! reinterpretation, so it is independent of host endianness and alignment.
//! The decoder is pure and allocation-free; it may be called from any thread.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Length of the common record prefix: type(1) + stock_locate(2) +
/// tracking_number(2) + timestamp(6).
pub const HEADER_LEN: usize = 11;

const NS_MASK_48: u64 = (1 << 48) - 1;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown message type byte 0x{0:02x}")]
    UnknownMessageType(u8),
    #[error("truncated record: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

/// Total record length for a message type byte, including the common prefix.
pub const fn record_len(kind: u8) -> Option<usize> {
    let body = match kind {
        b'S' => 1,
        b'R' => 28,
        b'H' => 14,
        b'Y' => 9,
        b'L' => 15,
        b'V' => 12,
        b'W' => 1,
        b'K' => 9,
        b'J' => 24,
        b'h' => 10,
        b'A' => 25,
        b'F' => 29,
        b'E' => 20,
        b'C' => 25,
        b'X' => 12,
        b'D' => 8,
        b'U' => 24,
        b'P' => 33,
        b'Q' => 29,
        b'B' => 8,
        b'I' => 46,
        b'N' => 41,
        _ => return None,
    };
    Some(HEADER_LEN + body)
}

/// Price in ten-thousandths of a dollar, exactly as carried on the wire.
///
/// Keeping the fixed-point integer all the way into the book gives exact
/// ordering and map-key equality; conversion to floating point happens only
/// at the display and convenience-API boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Price4(pub u32);

impl Price4 {
    pub fn from_f64(dollars: f64) -> Self {
        Price4((dollars * 10_000.0).round() as u32)
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / 10_000.0
    }
}

impl fmt::Display for Price4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / 10_000, self.0 % 10_000)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire indicator: `'B'` is a buy, anything else sells.
    pub fn from_wire(b: u8) -> Self {
        if b == b'B' {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Side::Buy => b'B',
            Side::Sell => b'S',
        }
    }
}

/// An 8-byte, space-padded ASCII stock symbol.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol([u8; 8]);

impl Symbol {
    /// Pads with spaces; input beyond 8 bytes is truncated.
    pub fn new(s: &str) -> Self {
        let mut raw = [b' '; 8];
        for (dst, src) in raw.iter_mut().zip(s.bytes()) {
            *dst = src;
        }
        Symbol(raw)
    }

    pub fn from_raw(raw: [u8; 8]) -> Self {
        Symbol(raw)
    }

    pub fn raw(&self) -> [u8; 8] {
        self.0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.0.trim_ascii_end()).unwrap_or("")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

/// Common record prefix shared by every message kind.
///
/// The wire timestamp is 48 bits of nanoseconds since midnight; it is
/// zero-extended to 64 bits here and masked back down on encode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub stock_locate: u16,
    pub tracking_number: u16,
    pub timestamp_ns: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemEvent {
    pub header: Header,
    pub event_code: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockDirectory {
    pub header: Header,
    pub stock: Symbol,
    pub market_category: u8,
    pub financial_status: u8,
    pub round_lot_size: u32,
    pub round_lots_only: u8,
    pub issue_classification: u8,
    pub issue_sub_type: [u8; 2],
    pub authenticity: u8,
    pub short_sale_threshold: u8,
    pub ipo_flag: u8,
    pub luld_reference_tier: u8,
    pub etp_flag: u8,
    pub etp_leverage_factor: u32,
    pub inverse_indicator: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockTradingAction {
    pub header: Header,
    pub stock: Symbol,
    pub trading_state: u8,
    pub reserved: u8,
    pub reason: [u8; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortSalePriceTest {
    pub header: Header,
    pub stock: Symbol,
    pub reg_sho_action: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketParticipantPosition {
    pub header: Header,
    pub mpid: [u8; 4],
    pub stock: Symbol,
    pub primary_market_maker: u8,
    pub market_maker_mode: u8,
    pub participant_state: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MwcbDeclineLevel {
    pub header: Header,
    pub level_one: Price4,
    pub level_two: Price4,
    pub level_three: Price4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MwcbStatus {
    pub header: Header,
    pub breached_level: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotingPeriodUpdate {
    pub header: Header,
    pub release_time: u32,
    pub release_qualifier: u8,
    pub ipo_price: Price4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LuldAuctionCollar {
    pub header: Header,
    pub stock: Symbol,
    pub reference_price: Price4,
    pub upper_collar: Price4,
    pub lower_collar: Price4,
    pub extension: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationalHalt {
    pub header: Header,
    pub stock: Symbol,
    pub market_code: u8,
    pub halt_action: u8,
}

/// Covers both the `'A'` (no MPID) and `'F'` (attributed) add-order kinds;
/// `mpid` is `Some` exactly for `'F'` records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddOrder {
    pub header: Header,
    pub order_id: u64,
    pub side: Side,
    pub shares: u32,
    pub stock: Symbol,
    pub price: Price4,
    pub mpid: Option<[u8; 4]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderExecuted {
    pub header: Header,
    pub order_id: u64,
    pub executed_shares: u32,
    pub match_number: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderExecutedWithPrice {
    pub header: Header,
    pub order_id: u64,
    pub executed_shares: u32,
    pub match_number: u64,
    pub printable: u8,
    pub execution_price: Price4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderCancel {
    pub header: Header,
    pub order_id: u64,
    pub cancelled_shares: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderDelete {
    pub header: Header,
    pub order_id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderReplace {
    pub header: Header,
    pub original_order_id: u64,
    pub new_order_id: u64,
    pub shares: u32,
    pub price: Price4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trade {
    pub header: Header,
    pub order_id: u64,
    pub side: Side,
    pub shares: u32,
    pub stock: Symbol,
    pub price: Price4,
    pub match_number: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrossTrade {
    pub header: Header,
    pub shares: u64,
    pub stock: Symbol,
    pub cross_price: Price4,
    pub match_number: u64,
    pub cross_type: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrokenTrade {
    pub header: Header,
    pub match_number: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Noii {
    pub header: Header,
    pub paired_shares: u64,
    pub imbalance_shares: u64,
    pub imbalance_direction: u8,
    pub stock: Symbol,
    pub far_price: Price4,
    pub near_price: Price4,
    pub current_reference_price: Price4,
    pub cross_type: u8,
    pub price_variation_indicator: u8,
    /// Trailing record bytes, preserved so re-encoding is byte-identical.
    pub reserved: [u8; 7],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectListingCapitalRaise {
    pub header: Header,
    pub stock: Symbol,
    pub open_eligibility_status: u8,
    pub minimum_allowable_price: Price4,
    pub maximum_allowable_price: Price4,
    pub near_execution_price: Price4,
    pub near_execution_time: u64,
    pub lower_price_range_collar: Price4,
    pub upper_price_range_collar: Price4,
    /// Trailing record bytes, preserved so re-encoding is byte-identical.
    pub reserved: [u8; 4],
}

/// A decoded ITCH record.
///
/// The book-affecting kinds are `AddOrder`, `OrderExecuted`,
/// `OrderExecutedWithPrice`, `OrderCancel`, `OrderDelete` and `OrderReplace`;
/// everything else is parsed and forwarded to observers without touching
/// book state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Message {
    SystemEvent(SystemEvent),
    StockDirectory(StockDirectory),
    StockTradingAction(StockTradingAction),
    ShortSalePriceTest(ShortSalePriceTest),
    MarketParticipantPosition(MarketParticipantPosition),
    MwcbDeclineLevel(MwcbDeclineLevel),
    MwcbStatus(MwcbStatus),
    QuotingPeriodUpdate(QuotingPeriodUpdate),
    LuldAuctionCollar(LuldAuctionCollar),
    OperationalHalt(OperationalHalt),
    AddOrder(AddOrder),
    OrderExecuted(OrderExecuted),
    OrderExecutedWithPrice(OrderExecutedWithPrice),
    OrderCancel(OrderCancel),
    OrderDelete(OrderDelete),
    OrderReplace(OrderReplace),
    Trade(Trade),
    CrossTrade(CrossTrade),
    BrokenTrade(BrokenTrade),
    Noii(Noii),
    DirectListingCapitalRaise(DirectListingCapitalRaise),
}

impl Message {
    /// The wire type byte this record encodes as.
    pub fn kind(&self) -> u8 {
        match self {
            Message::SystemEvent(_) => b'S',
            Message::StockDirectory(_) => b'R',
            Message::StockTradingAction(_) => b'H',
            Message::ShortSalePriceTest(_) => b'Y',
            Message::MarketParticipantPosition(_) => b'L',
            Message::MwcbDeclineLevel(_) => b'V',
            Message::MwcbStatus(_) => b'W',
            Message::QuotingPeriodUpdate(_) => b'K',
            Message::LuldAuctionCollar(_) => b'J',
            Message::OperationalHalt(_) => b'h',
            Message::AddOrder(m) => {
                if m.mpid.is_some() {
                    b'F'
                } else {
                    b'A'
                }
            }
            Message::OrderExecuted(_) => b'E',
            Message::OrderExecutedWithPrice(_) => b'C',
            Message::OrderCancel(_) => b'X',
            Message::OrderDelete(_) => b'D',
            Message::OrderReplace(_) => b'U',
            Message::Trade(_) => b'P',
            Message::CrossTrade(_) => b'Q',
            Message::BrokenTrade(_) => b'B',
            Message::Noii(_) => b'I',
            Message::DirectListingCapitalRaise(_) => b'N',
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Message::SystemEvent(m) => &m.header,
            Message::StockDirectory(m) => &m.header,
            Message::StockTradingAction(m) => &m.header,
            Message::ShortSalePriceTest(m) => &m.header,
            Message::MarketParticipantPosition(m) => &m.header,
            Message::MwcbDeclineLevel(m) => &m.header,
            Message::MwcbStatus(m) => &m.header,
            Message::QuotingPeriodUpdate(m) => &m.header,
            Message::LuldAuctionCollar(m) => &m.header,
            Message::OperationalHalt(m) => &m.header,
            Message::AddOrder(m) => &m.header,
            Message::OrderExecuted(m) => &m.header,
            Message::OrderExecutedWithPrice(m) => &m.header,
            Message::OrderCancel(m) => &m.header,
            Message::OrderDelete(m) => &m.header,
            Message::OrderReplace(m) => &m.header,
            Message::Trade(m) => &m.header,
            Message::CrossTrade(m) => &m.header,
            Message::BrokenTrade(m) => &m.header,
            Message::Noii(m) => &m.header,
            Message::DirectListingCapitalRaise(m) => &m.header,
        }
    }

    /// Encoded record length, per the length table.
    pub fn encoded_len(&self) -> usize {
        // kind() only returns bytes present in the table
        record_len(self.kind()).unwrap()
    }
}

// Big-endian field cursor over a length-checked record slice.
struct Cur<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cur<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cur { buf, pos: 0 }
    }

    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        let v = u16::from_be_bytes(self.buf[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        v
    }

    fn u32(&mut self) -> u32 {
        let v = u32::from_be_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        v
    }

    fn u48(&mut self) -> u64 {
        let mut v = 0u64;
        for &b in &self.buf[self.pos..self.pos + 6] {
            v = (v << 8) | u64::from(b);
        }
        self.pos += 6;
        v
    }

    fn u64(&mut self) -> u64 {
        let v = u64::from_be_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        v
    }

    fn price(&mut self) -> Price4 {
        Price4(self.u32())
    }

    fn side(&mut self) -> Side {
        Side::from_wire(self.u8())
    }

    fn arr<const N: usize>(&mut self) -> [u8; N] {
        let v: [u8; N] = self.buf[self.pos..self.pos + N].try_into().unwrap();
        self.pos += N;
        v
    }

    fn symbol(&mut self) -> Symbol {
        Symbol::from_raw(self.arr::<8>())
    }

    fn header(&mut self) -> Header {
        Header {
            stock_locate: self.u16(),
            tracking_number: self.u16(),
            timestamp_ns: self.u48(),
        }
    }
}

/// Decodes the record at the start of `buf`, returning the message and the
/// number of bytes consumed. The caller advances its cursor by exactly that
/// amount; records are packed with no padding.
pub fn decode(buf: &[u8]) -> Result<(Message, usize), DecodeError> {
    let Some(&kind) = buf.first() else {
        return Err(DecodeError::Truncated { need: 1, have: 0 });
    };
    let len = record_len(kind).ok_or(DecodeError::UnknownMessageType(kind))?;
    if buf.len() < len {
        return Err(DecodeError::Truncated {
            need: len,
            have: buf.len(),
        });
    }

    let mut c = Cur::new(&buf[1..len]);
    let header = c.header();

    let msg = match kind {
        b'S' => Message::SystemEvent(SystemEvent {
            header,
            event_code: c.u8(),
        }),
        b'R' => Message::StockDirectory(StockDirectory {
            header,
            stock: c.symbol(),
            market_category: c.u8(),
            financial_status: c.u8(),
            round_lot_size: c.u32(),
            round_lots_only: c.u8(),
            issue_classification: c.u8(),
            issue_sub_type: c.arr::<2>(),
            authenticity: c.u8(),
            short_sale_threshold: c.u8(),
            ipo_flag: c.u8(),
            luld_reference_tier: c.u8(),
            etp_flag: c.u8(),
            etp_leverage_factor: c.u32(),
            inverse_indicator: c.u8(),
        }),
        b'H' => Message::StockTradingAction(StockTradingAction {
            header,
            stock: c.symbol(),
            trading_state: c.u8(),
            reserved: c.u8(),
            reason: c.arr::<4>(),
        }),
        b'Y' => Message::ShortSalePriceTest(ShortSalePriceTest {
            header,
            stock: c.symbol(),
            reg_sho_action: c.u8(),
        }),
        b'L' => Message::MarketParticipantPosition(MarketParticipantPosition {
            header,
            mpid: c.arr::<4>(),
            stock: c.symbol(),
            primary_market_maker: c.u8(),
            market_maker_mode: c.u8(),
            participant_state: c.u8(),
        }),
        b'V' => Message::MwcbDeclineLevel(MwcbDeclineLevel {
            header,
            level_one: c.price(),
            level_two: c.price(),
            level_three: c.price(),
        }),
        b'W' => Message::MwcbStatus(MwcbStatus {
            header,
            breached_level: c.u8(),
        }),
        b'K' => Message::QuotingPeriodUpdate(QuotingPeriodUpdate {
            header,
            release_time: c.u32(),
            release_qualifier: c.u8(),
            ipo_price: c.price(),
        }),
        b'J' => Message::LuldAuctionCollar(LuldAuctionCollar {
            header,
            stock: c.symbol(),
            reference_price: c.price(),
            upper_collar: c.price(),
            lower_collar: c.price(),
            extension: c.u32(),
        }),
        b'h' => Message::OperationalHalt(OperationalHalt {
            header,
            stock: c.symbol(),
            market_code: c.u8(),
            halt_action: c.u8(),
        }),
        b'A' | b'F' => Message::AddOrder(AddOrder {
            header,
            order_id: c.u64(),
            side: c.side(),
            shares: c.u32(),
            stock: c.symbol(),
            price: c.price(),
            mpid: if kind == b'F' {
                Some(c.arr::<4>())
            } else {
                None
            },
        }),
        b'E' => Message::OrderExecuted(OrderExecuted {
            header,
            order_id: c.u64(),
            executed_shares: c.u32(),
            match_number: c.u64(),
        }),
        b'C' => Message::OrderExecutedWithPrice(OrderExecutedWithPrice {
            header,
            order_id: c.u64(),
            executed_shares: c.u32(),
            match_number: c.u64(),
            printable: c.u8(),
            execution_price: c.price(),
        }),
        b'X' => Message::OrderCancel(OrderCancel {
            header,
            order_id: c.u64(),
            cancelled_shares: c.u32(),
        }),
        b'D' => Message::OrderDelete(OrderDelete {
            header,
            order_id: c.u64(),
        }),
        b'U' => Message::OrderReplace(OrderReplace {
            header,
            original_order_id: c.u64(),
            new_order_id: c.u64(),
            shares: c.u32(),
            price: c.price(),
        }),
        b'P' => Message::Trade(Trade {
            header,
            order_id: c.u64(),
            side: c.side(),
            shares: c.u32(),
            stock: c.symbol(),
            price: c.price(),
            match_number: c.u64(),
        }),
        b'Q' => Message::CrossTrade(CrossTrade {
            header,
            shares: c.u64(),
            stock: c.symbol(),
            cross_price: c.price(),
            match_number: c.u64(),
            cross_type: c.u8(),
        }),
        b'B' => Message::BrokenTrade(BrokenTrade {
            header,
            match_number: c.u64(),
        }),
        b'I' => Message::Noii(Noii {
            header,
            paired_shares: c.u64(),
            imbalance_shares: c.u64(),
            imbalance_direction: c.u8(),
            stock: c.symbol(),
            far_price: c.price(),
            near_price: c.price(),
            current_reference_price: c.price(),
            cross_type: c.u8(),
            price_variation_indicator: c.u8(),
            reserved: c.arr::<7>(),
        }),
        b'N' => Message::DirectListingCapitalRaise(DirectListingCapitalRaise {
            header,
            stock: c.symbol(),
            open_eligibility_status: c.u8(),
            minimum_allowable_price: c.price(),
            maximum_allowable_price: c.price(),
            near_execution_price: c.price(),
            near_execution_time: c.u64(),
            lower_price_range_collar: c.price(),
            upper_price_range_collar: c.price(),
            reserved: c.arr::<4>(),
        }),
        // record_len already rejected every other byte
        _ => unreachable!(),
    };

    debug_assert_eq!(c.pos, len - 1);
    Ok((msg, len))
}

// Big-endian append helpers for the encoder.
fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u48(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&(v & NS_MASK_48).to_be_bytes()[2..]);
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_header(out: &mut Vec<u8>, kind: u8, h: &Header) {
    out.push(kind);
    put_u16(out, h.stock_locate);
    put_u16(out, h.tracking_number);
    put_u48(out, h.timestamp_ns);
}

/// Appends the wire form of `msg` to `out`. Decoding a valid buffer and
/// re-encoding every message reproduces the input byte for byte.
pub fn encode(msg: &Message, out: &mut Vec<u8>) {
    put_header(out, msg.kind(), msg.header());

    match msg {
        Message::SystemEvent(m) => out.push(m.event_code),
        Message::StockDirectory(m) => {
            out.extend_from_slice(&m.stock.raw());
            out.push(m.market_category);
            out.push(m.financial_status);
            put_u32(out, m.round_lot_size);
            out.push(m.round_lots_only);
            out.push(m.issue_classification);
            out.extend_from_slice(&m.issue_sub_type);
            out.push(m.authenticity);
            out.push(m.short_sale_threshold);
            out.push(m.ipo_flag);
            out.push(m.luld_reference_tier);
            out.push(m.etp_flag);
            put_u32(out, m.etp_leverage_factor);
            out.push(m.inverse_indicator);
        }
        Message::StockTradingAction(m) => {
            out.extend_from_slice(&m.stock.raw());
            out.push(m.trading_state);
            out.push(m.reserved);
            out.extend_from_slice(&m.reason);
        }
        Message::ShortSalePriceTest(m) => {
            out.extend_from_slice(&m.stock.raw());
            out.push(m.reg_sho_action);
        }
        Message::MarketParticipantPosition(m) => {
            out.extend_from_slice(&m.mpid);
            out.extend_from_slice(&m.stock.raw());
            out.push(m.primary_market_maker);
            out.push(m.market_maker_mode);
            out.push(m.participant_state);
        }
        Message::MwcbDeclineLevel(m) => {
            put_u32(out, m.level_one.0);
            put_u32(out, m.level_two.0);
            put_u32(out, m.level_three.0);
        }
        Message::MwcbStatus(m) => out.push(m.breached_level),
        Message::QuotingPeriodUpdate(m) => {
            put_u32(out, m.release_time);
            out.push(m.release_qualifier);
            put_u32(out, m.ipo_price.0);
        }
        Message::LuldAuctionCollar(m) => {
            out.extend_from_slice(&m.stock.raw());
            put_u32(out, m.reference_price.0);
            put_u32(out, m.upper_collar.0);
            put_u32(out, m.lower_collar.0);
            put_u32(out, m.extension);
        }
        Message::OperationalHalt(m) => {
            out.extend_from_slice(&m.stock.raw());
            out.push(m.market_code);
            out.push(m.halt_action);
        }
        Message::AddOrder(m) => {
            put_u64(out, m.order_id);
            out.push(m.side.to_wire());
            put_u32(out, m.shares);
            out.extend_from_slice(&m.stock.raw());
            put_u32(out, m.price.0);
            if let Some(mpid) = m.mpid {
                out.extend_from_slice(&mpid);
            }
        }
        Message::OrderExecuted(m) => {
            put_u64(out, m.order_id);
            put_u32(out, m.executed_shares);
            put_u64(out, m.match_number);
        }
        Message::OrderExecutedWithPrice(m) => {
            put_u64(out, m.order_id);
            put_u32(out, m.executed_shares);
            put_u64(out, m.match_number);
            out.push(m.printable);
            put_u32(out, m.execution_price.0);
        }
        Message::OrderCancel(m) => {
            put_u64(out, m.order_id);
            put_u32(out, m.cancelled_shares);
        }
        Message::OrderDelete(m) => put_u64(out, m.order_id),
        Message::OrderReplace(m) => {
            put_u64(out, m.original_order_id);
            put_u64(out, m.new_order_id);
            put_u32(out, m.shares);
            put_u32(out, m.price.0);
        }
        Message::Trade(m) => {
            put_u64(out, m.order_id);
            out.push(m.side.to_wire());
            put_u32(out, m.shares);
            out.extend_from_slice(&m.stock.raw());
            put_u32(out, m.price.0);
            put_u64(out, m.match_number);
        }
        Message::CrossTrade(m) => {
            put_u64(out, m.shares);
            out.extend_from_slice(&m.stock.raw());
            put_u32(out, m.cross_price.0);
            put_u64(out, m.match_number);
            out.push(m.cross_type);
        }
        Message::BrokenTrade(m) => put_u64(out, m.match_number),
        Message::Noii(m) => {
            put_u64(out, m.paired_shares);
            put_u64(out, m.imbalance_shares);
            out.push(m.imbalance_direction);
            out.extend_from_slice(&m.stock.raw());
            put_u32(out, m.far_price.0);
            put_u32(out, m.near_price.0);
            put_u32(out, m.current_reference_price.0);
            out.push(m.cross_type);
            out.push(m.price_variation_indicator);
            out.extend_from_slice(&m.reserved);
        }
        Message::DirectListingCapitalRaise(m) => {
            out.extend_from_slice(&m.stock.raw());
            out.push(m.open_eligibility_status);
            put_u32(out, m.minimum_allowable_price.0);
            put_u32(out, m.maximum_allowable_price.0);
            put_u32(out, m.near_execution_price.0);
            put_u64(out, m.near_execution_time);
            put_u32(out, m.lower_price_range_collar.0);
            put_u32(out, m.upper_price_range_collar.0);
            out.extend_from_slice(&m.reserved);
        }
    }
}

/// Iterator over the records packed into a contiguous buffer.
///
/// Yields `(offset, message)` pairs; stops after the first decode error
/// (malformed input halts parsing at the bad offset).
pub struct MessageIter<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> MessageIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        MessageIter {
            buf,
            pos: 0,
            failed: false,
        }
    }

    /// Current byte offset into the buffer.
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<(usize, Message), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        match decode(&self.buf[self.pos..]) {
            Ok((msg, consumed)) => {
                let at = self.pos;
                self.pos += consumed;
                Some(Ok((at, msg)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
