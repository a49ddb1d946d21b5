//! Typed cell parsing
//!
//! Spreadsheet cells arrive as calamine `Data`; every declared column is
//! parsed through its mapping type before it may touch an asset payload.

use std::net::IpAddr;

use calamine::Data;
use chrono::{NaiveDate, NaiveDateTime};
use ipnetwork::IpNetwork;

/// Column types a mapping may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Text,
    Int,
    Bool,
    Inet,
    Cidr,
    Timestamp,
}

impl CellType {
    pub fn parse(s: &str) -> Option<CellType> {
        match s {
            "TEXT" => Some(CellType::Text),
            "INT" => Some(CellType::Int),
            "BOOL" => Some(CellType::Bool),
            "INET" => Some(CellType::Inet),
            "CIDR" => Some(CellType::Cidr),
            "TIMESTAMP" => Some(CellType::Timestamp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Text => "TEXT",
            CellType::Int => "INT",
            CellType::Bool => "BOOL",
            CellType::Inet => "INET",
            CellType::Cidr => "CIDR",
            CellType::Timestamp => "TIMESTAMP",
        }
    }
}

/// A parsed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Inet(IpAddr),
    Cidr(IpNetwork),
    Timestamp(NaiveDateTime),
}

impl ParsedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParsedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParsedValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParsedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_inet(&self) -> Option<IpAddr> {
        match self {
            ParsedValue::Inet(ip) => Some(*ip),
            _ => None,
        }
    }

    pub fn as_cidr(&self) -> Option<IpNetwork> {
        match self {
            ParsedValue::Cidr(net) => Some(*net),
            _ => None,
        }
    }
}

/// Cell text, or `None` for an empty cell. Whole floats render without the
/// trailing `.0` Excel gives numeric cells.
pub fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Error(e) => return Some(format!("#ERR:{:?}", e)),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parse raw cell text via a declared type. The error string is surfaced in
/// the per-row error sample.
pub fn parse_cell(raw: &str, ty: CellType) -> Result<ParsedValue, String> {
    let raw = raw.trim();
    match ty {
        CellType::Text => Ok(ParsedValue::Text(raw.to_string())),
        CellType::Int => raw
            .parse::<i64>()
            .map(ParsedValue::Int)
            .map_err(|_| format!("not an integer: {:?}", raw)),
        CellType::Bool => match raw.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Ok(ParsedValue::Bool(true)),
            "no" | "n" | "false" | "0" => Ok(ParsedValue::Bool(false)),
            _ => Err(format!("not a boolean: {:?}", raw)),
        },
        CellType::Inet => raw
            .parse::<IpAddr>()
            .map(ParsedValue::Inet)
            .map_err(|_| format!("not an IP address: {:?}", raw)),
        CellType::Cidr => raw
            .parse::<IpNetwork>()
            .map(ParsedValue::Cidr)
            .map_err(|_| format!("not a CIDR network: {:?}", raw)),
        CellType::Timestamp => parse_timestamp(raw)
            .map(ParsedValue::Timestamp)
            .ok_or_else(|| format!("not a timestamp: {:?}", raw)),
    }
}

/// Accepted timestamp shapes, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text_variants() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::String("  ".to_string())), None);
        assert_eq!(
            cell_text(&Data::String(" sw-01 ".to_string())),
            Some("sw-01".to_string())
        );
        assert_eq!(cell_text(&Data::Float(24.0)), Some("24".to_string()));
        assert_eq!(cell_text(&Data::Float(2.5)), Some("2.5".to_string()));
        assert_eq!(cell_text(&Data::Int(120)), Some("120".to_string()));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_cell("42", CellType::Int), Ok(ParsedValue::Int(42)));
        assert!(parse_cell("forty-two", CellType::Int).is_err());
    }

    #[test]
    fn test_parse_bool_accepted_spellings() {
        for raw in ["yes", "Y", "true", "1"] {
            assert_eq!(parse_cell(raw, CellType::Bool), Ok(ParsedValue::Bool(true)));
        }
        for raw in ["no", "N", "false", "0"] {
            assert_eq!(
                parse_cell(raw, CellType::Bool),
                Ok(ParsedValue::Bool(false))
            );
        }
        assert!(parse_cell("maybe", CellType::Bool).is_err());
    }

    #[test]
    fn test_parse_inet_v4_and_v6() {
        assert_eq!(
            parse_cell("10.0.0.1", CellType::Inet),
            Ok(ParsedValue::Inet("10.0.0.1".parse().unwrap()))
        );
        assert_eq!(
            parse_cell("fd00::1", CellType::Inet),
            Ok(ParsedValue::Inet("fd00::1".parse().unwrap()))
        );
        assert!(parse_cell("999.1.2.3", CellType::Inet).is_err());
    }

    #[test]
    fn test_parse_cidr() {
        assert_eq!(
            parse_cell("10.20.0.0/24", CellType::Cidr),
            Ok(ParsedValue::Cidr("10.20.0.0/24".parse().unwrap()))
        );
        assert!(parse_cell("10.20.0.0/99", CellType::Cidr).is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        for raw in [
            "2026-03-01",
            "2026-03-01 14:30:00",
            "03/01/2026",
            "03/01/2026 14:30:00",
        ] {
            assert!(parse_cell(raw, CellType::Timestamp).is_ok(), "{}", raw);
        }
        assert!(parse_cell("March 1st", CellType::Timestamp).is_err());
    }
}
