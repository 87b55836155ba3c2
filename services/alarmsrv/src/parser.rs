//! Sensor payload decoder
//!
//! The gateway firmware emits a JSON-looking blob that is not reliably valid
//! JSON, so fields are pulled out by position instead of by key. The positions
//! are described by a [`FrameLayout`]; every index is bounds-checked and a
//! mismatch yields a [`ParseError`] naming the field that failed.
//!
//! Layout v1, after splitting on `}`:
//!
//! ```text
//! seg[0]  {"alarmType":"HighTemp", ...              -> alarm type (first token)
//! seg[4]  ...,"tags":{"gatewayId":"GW-7","sensorId":"S1"
//!                                                    -> gateway (2nd last), sensor (last)
//! seg[5]  ,"columns":[..],"values":[["<time>",<value>]]
//!                                                    -> time (token 3), value (token 4)
//! ```

use thiserror::Error;

use crate::types::AlarmRecord;

/// Selects one token out of a `,`-split segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenIndex {
    /// Zero-based from the start
    FromStart(usize),
    /// One-based from the end (`FromEnd(1)` is the last token)
    FromEnd(usize),
}

impl TokenIndex {
    fn select<'a>(&self, tokens: &[&'a str]) -> Option<&'a str> {
        let idx = match *self {
            Self::FromStart(i) => i,
            Self::FromEnd(i) => tokens.len().checked_sub(i)?,
        };
        tokens.get(idx).copied()
    }
}

impl std::fmt::Display for TokenIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromStart(i) => write!(f, "#{}", i),
            Self::FromEnd(i) => write!(f, "#-{}", i),
        }
    }
}

/// How the field value is cut out of its token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extract {
    /// Split on the pair delimiter, take part N, drop quotes
    PairPart(usize),
    /// Drop row brackets, split on quotes, take part N
    QuotedPart(usize),
    /// Whole token with row-closing brackets removed
    Bare,
}

/// Position of one field inside the frame
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub segment: usize,
    pub token: TokenIndex,
    pub extract: Extract,
}

/// Fixed delimiters and field positions of one firmware payload version
#[derive(Debug, Clone, Copy)]
pub struct FrameLayout {
    pub version: u8,
    pub segment_delimiter: char,
    pub token_delimiter: char,
    pub pair_delimiter: char,
    pub quote: char,
    pub row_open: &'static str,
    pub row_close: &'static str,
    pub alarm_type: FieldSpec,
    pub sensor_id: FieldSpec,
    pub gateway_id: FieldSpec,
    pub observed_at: FieldSpec,
    pub value: FieldSpec,
}

/// Layout emitted by the current gateway firmware
pub const LAYOUT_V1: FrameLayout = FrameLayout {
    version: 1,
    segment_delimiter: '}',
    token_delimiter: ',',
    pair_delimiter: ':',
    quote: '"',
    row_open: "[[",
    row_close: "]]",
    alarm_type: FieldSpec {
        name: "alarm_type",
        segment: 0,
        token: TokenIndex::FromStart(0),
        extract: Extract::PairPart(1),
    },
    sensor_id: FieldSpec {
        name: "sensor_id",
        segment: 4,
        token: TokenIndex::FromEnd(1),
        extract: Extract::PairPart(1),
    },
    gateway_id: FieldSpec {
        name: "gateway_id",
        segment: 4,
        token: TokenIndex::FromEnd(2),
        extract: Extract::PairPart(2),
    },
    observed_at: FieldSpec {
        name: "observed_at",
        segment: 5,
        token: TokenIndex::FromStart(3),
        extract: Extract::QuotedPart(3),
    },
    value: FieldSpec {
        name: "value",
        segment: 5,
        token: TokenIndex::FromStart(4),
        extract: Extract::Bare,
    },
};

/// Why a payload could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty payload")]
    EmptyPayload,

    #[error("{field}: segment {index} missing (payload has {found})")]
    MissingSegment {
        field: &'static str,
        index: usize,
        found: usize,
    },

    #[error("{field}: token {position} missing in segment {segment} (segment has {found})")]
    MissingToken {
        field: &'static str,
        segment: usize,
        position: TokenIndex,
        found: usize,
    },

    #[error("{field}: part {part} missing (token has {found})")]
    MissingPart {
        field: &'static str,
        part: usize,
        found: usize,
    },

    #[error("{field}: empty value")]
    EmptyField { field: &'static str },
}

/// Decode one chunk with the current layout
pub fn parse(raw: &[u8]) -> Result<AlarmRecord, ParseError> {
    LAYOUT_V1.parse(raw)
}

/// Decode lossily, drop line breaks, trim the ends
fn normalize(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .trim()
        .to_string()
}

impl FrameLayout {
    pub fn parse(&self, raw: &[u8]) -> Result<AlarmRecord, ParseError> {
        let text = normalize(raw);
        if text.is_empty() {
            return Err(ParseError::EmptyPayload);
        }

        let segments: Vec<&str> = text.split(self.segment_delimiter).collect();

        let alarm_type = self.extract(&segments, &self.alarm_type)?;
        let sensor_id = self.extract(&segments, &self.sensor_id)?;
        let gateway_id = self.extract(&segments, &self.gateway_id)?;
        let value = self.extract(&segments, &self.value)?;
        let observed_at = self.extract(&segments, &self.observed_at)?;

        Ok(AlarmRecord::new(
            alarm_type,
            sensor_id,
            gateway_id,
            value,
            observed_at,
        ))
    }

    fn extract(&self, segments: &[&str], spec: &FieldSpec) -> Result<String, ParseError> {
        let segment = segments
            .get(spec.segment)
            .ok_or(ParseError::MissingSegment {
                field: spec.name,
                index: spec.segment,
                found: segments.len(),
            })?;

        let tokens: Vec<&str> = segment.split(self.token_delimiter).collect();
        let token = spec.token.select(&tokens).ok_or(ParseError::MissingToken {
            field: spec.name,
            segment: spec.segment,
            position: spec.token,
            found: tokens.len(),
        })?;

        let raw_value = match spec.extract {
            Extract::PairPart(n) => {
                let parts: Vec<&str> = token.split(self.pair_delimiter).collect();
                let part = parts.get(n).ok_or(ParseError::MissingPart {
                    field: spec.name,
                    part: n,
                    found: parts.len(),
                })?;
                part.replace(self.quote, "")
            },
            Extract::QuotedPart(n) => {
                let cleaned = token.replace(self.row_open, "").replace(self.row_close, "");
                let parts: Vec<&str> = cleaned.split(self.quote).collect();
                let part = parts.get(n).ok_or(ParseError::MissingPart {
                    field: spec.name,
                    part: n,
                    found: parts.len(),
                })?;
                (*part).to_string()
            },
            Extract::Bare => token.replace(self.row_close, ""),
        };

        let value = raw_value.trim();
        if value.is_empty() {
            return Err(ParseError::EmptyField { field: spec.name });
        }
        Ok(value.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::types::SendStatus;

    const FRAME: &str = r#"{"alarmType":"HighTemp","source":{"site":{"room":{"rack":{"slot":"1"}}}},"series":[{"name":"temperature","tags":{"gatewayId":"GW-7","sensorId":"S1"},"columns":["time","value"],"values":[["2024-01-01T00:00:00",9.5]]}]}"#;

    fn assert_canonical(record: &AlarmRecord) {
        assert_eq!(record.alarm_type, "HighTemp");
        assert_eq!(record.sensor_id, "S1");
        assert_eq!(record.gateway_id, "GW-7");
        assert_eq!(record.observed_at, "2024-01-01T00:00:00");
        assert_eq!(record.value, "9.5");
    }

    #[test]
    fn test_parse_canonical_frame() {
        let record = parse(FRAME.as_bytes()).unwrap();
        assert_canonical(&record);
        assert_eq!(record.send_status, SendStatus::NotSent);
    }

    #[test]
    fn test_parse_tolerates_line_breaks_and_padding() {
        let noisy = format!(
            "\r\n  {}\n\n",
            FRAME
                .replace(",\"series\"", ",\r\n\"series\"")
                .replace(",\"columns\"", ",\n\"columns\"")
        );
        assert_canonical(&parse(noisy.as_bytes()).unwrap());
    }

    #[test]
    fn test_parse_tolerates_spaces_around_values() {
        let spaced = FRAME
            .replace(r#""sensorId":"S1""#, r#""sensorId": "S1" "#)
            .replace(r#""gatewayId":"GW-7""#, r#""gatewayId": "GW-7""#)
            .replace(r#"[["2024-01-01T00:00:00",9.5]]"#, r#"[[ "2024-01-01T00:00:00", 9.5 ]]"#);
        let record = parse(spaced.as_bytes()).unwrap();
        assert_eq!(record.sensor_id, "S1");
        assert_eq!(record.gateway_id, "GW-7");
        assert_eq!(record.observed_at, "2024-01-01T00:00:00");
    }

    #[test]
    fn test_parse_empty_payload() {
        assert_eq!(parse(b""), Err(ParseError::EmptyPayload));
        assert_eq!(parse(b" \r\n "), Err(ParseError::EmptyPayload));
    }

    #[test]
    fn test_parse_missing_segment_reports_field() {
        let err = parse(br#"{"alarmType":"HighTemp"}"#).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingSegment {
                field: "sensor_id",
                index: 4,
                found: 2,
            }
        );
    }

    #[test]
    fn test_parse_empty_sensor_id_rejected() {
        let frame = FRAME.replace(r#""sensorId":"S1""#, r#""sensorId":"""#);
        assert_eq!(
            parse(frame.as_bytes()),
            Err(ParseError::EmptyField { field: "sensor_id" })
        );
    }

    #[test]
    fn test_parse_non_utf8_garbage_fails_soft() {
        let err = parse(b"\xff\xfe}}}}}}").unwrap_err();
        assert!(matches!(err, ParseError::MissingPart { field: "alarm_type", .. }));
    }

    #[test]
    fn test_parse_every_prefix_fails_soft() {
        let bytes = FRAME.as_bytes();
        let values_at = FRAME.find(r#""values""#).unwrap();
        for n in 0..bytes.len() {
            let result = parse(&bytes[..n]);
            if n < values_at {
                assert!(result.is_err(), "prefix of {} bytes parsed", n);
            }
        }
    }

    #[test]
    fn test_token_index_select() {
        let tokens = ["a", "b", "c"];
        assert_eq!(TokenIndex::FromStart(0).select(&tokens), Some("a"));
        assert_eq!(TokenIndex::FromEnd(1).select(&tokens), Some("c"));
        assert_eq!(TokenIndex::FromEnd(3).select(&tokens), Some("a"));
        assert_eq!(TokenIndex::FromEnd(4).select(&tokens), None);
        assert_eq!(TokenIndex::FromStart(3).select(&tokens), None);
    }
}
