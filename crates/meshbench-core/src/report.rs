//! The result of one experiment and its textual renderings.

use std::fmt;

use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::units::{Bytes, Meters, Milliwatts};

/// Aggregate result of one experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// The routing protocol as requested, even if it was not recognized.
    pub protocol: String,
    pub area: Meters,
    pub nodes: usize,
    pub tx_power: Milliwatts,
    pub intensity: f64,
    /// Payload bytes handed to the network by all sources.
    pub tx: Bytes,
    /// Payload bytes received by all sinks.
    pub rx: Bytes,
}

impl Report {
    /// `rx / tx`, or NaN if nothing was transmitted.
    pub fn efficiency(&self) -> f64 {
        if self.tx == Bytes::ZERO {
            return f64::NAN;
        }
        self.rx.into_f64() / self.tx.into_f64()
    }
}

/// Renders the report as a single comma-separated line of alternating keys and values.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "protocol,{},area,{},nodes,{},txpower,{},intensity,{},efficiency,{},tx,{},rx,{}",
            self.protocol,
            self.area.into_u64(),
            self.nodes,
            fmt_g(self.tx_power.into_f64()),
            fmt_g(self.intensity),
            fmt_g(self.efficiency()),
            self.tx.into_u64(),
            self.rx.into_u64(),
        )
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let efficiency = Some(self.efficiency()).filter(|e| e.is_finite());
        let mut s = serializer.serialize_struct("Report", 8)?;
        s.serialize_field("protocol", &self.protocol)?;
        s.serialize_field("area", &self.area.into_u64())?;
        s.serialize_field("nodes", &self.nodes)?;
        s.serialize_field("txpower", &self.tx_power.into_f64())?;
        s.serialize_field("intensity", &self.intensity)?;
        s.serialize_field("efficiency", &efficiency)?;
        s.serialize_field("tx", &self.tx.into_u64())?;
        s.serialize_field("rx", &self.rx.into_u64())?;
        s.end()
    }
}

const PRECISION: i32 = 6;

/// Formats `x` the way `printf("%g")` does: six significant digits, fixed or scientific
/// notation depending on the exponent, trailing zeros removed.
pub fn fmt_g(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }
    // The exponent after rounding to PRECISION significant digits decides the notation.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if (-4..PRECISION).contains(&exp) {
        let fixed = format!("{:.*}", (PRECISION - 1 - exp) as usize, x);
        trim_fraction(&fixed).to_owned()
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
