//! Conversions between dbscope values and the PostgreSQL wire format

use bytes::BytesMut;
use dbscope_core::Value;
use postgres_types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// Owned query parameter, shaped to the type the server inferred for it.
///
/// tokio-postgres writes the binary width of the Rust type, so an `i64`
/// bound to an `int4` placeholder must be narrowed before sending.
#[derive(Debug)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
}

impl PgValue {
    /// Convert a value for the given parameter type
    pub(crate) fn for_type(value: &Value, target: &Type) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int8(v) => Self::coerce_int(*v as i64, target),
            Value::Int16(v) => Self::coerce_int(*v as i64, target),
            Value::Int32(v) => Self::coerce_int(*v as i64, target),
            Value::Int64(v) => Self::coerce_int(*v, target),
            Value::Float32(v) if *target == Type::FLOAT8 => PgValue::Float64(*v as f64),
            Value::Float32(v) => PgValue::Float32(*v),
            Value::Float64(v) if *target == Type::FLOAT4 => PgValue::Float32(*v as f32),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) | Value::String(v) => Self::coerce_string(v, target),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::Array(_) => PgValue::String(value.to_string()),
        }
    }

    fn coerce_int(value: i64, target: &Type) -> Self {
        match *target {
            Type::INT2 => PgValue::Int16(value as i16),
            Type::INT4 => PgValue::Int32(value as i32),
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::FLOAT8 => PgValue::Float64(value as f64),
            _ => PgValue::Int64(value),
        }
    }

    /// Parse textual arguments into the placeholder's type.
    ///
    /// Tool callers pass every argument as a string, so `$1` compared to an
    /// integer column arrives as `"42"`. Unparsable text is sent as-is and
    /// the server reports the mismatch.
    fn coerce_string(value: &str, target: &Type) -> Self {
        let text = || PgValue::String(value.to_string());
        match *target {
            Type::BOOL => match value.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "yes" | "on" => PgValue::Bool(true),
                "f" | "false" | "0" | "no" | "off" => PgValue::Bool(false),
                _ => text(),
            },
            Type::INT2 => value.trim().parse().map(PgValue::Int16).unwrap_or_else(|_| text()),
            Type::INT4 => value.trim().parse().map(PgValue::Int32).unwrap_or_else(|_| text()),
            Type::INT8 => value.trim().parse().map(PgValue::Int64).unwrap_or_else(|_| text()),
            Type::FLOAT4 => value.trim().parse().map(PgValue::Float32).unwrap_or_else(|_| text()),
            Type::FLOAT8 => value.trim().parse().map(PgValue::Float64).unwrap_or_else(|_| text()),
            Type::UUID => value.parse().map(PgValue::Uuid).unwrap_or_else(|_| text()),
            Type::JSON | Type::JSONB => serde_json::from_str(value)
                .map(PgValue::Json)
                .unwrap_or_else(|_| text()),
            Type::DATE => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(PgValue::Date)
                .unwrap_or_else(|_| text()),
            Type::TIME => chrono::NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
                .map(PgValue::Time)
                .unwrap_or_else(|_| text()),
            Type::TIMESTAMP => parse_naive_timestamp(value)
                .map(PgValue::DateTime)
                .unwrap_or_else(text),
            Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(value)
                .map(|ts| ts.with_timezone(&chrono::Utc))
                .ok()
                .or_else(|| parse_naive_timestamp(value).map(|ts| ts.and_utc()))
                .map(PgValue::DateTimeUtc)
                .unwrap_or_else(text),
            _ => text(),
        }
    }
}

fn parse_naive_timestamp(value: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// One decoded result cell.
///
/// Accepts every column type: domains decode through their base type,
/// enums and unknown types fall back to their UTF-8 payload.
#[derive(Debug)]
pub(crate) struct PgCell(pub(crate) Value);

impl<'a> FromSql<'a> for PgCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode(ty, raw).map(PgCell)
    }

    fn from_sql_null(_: &Type) -> Result<Self, BoxError> {
        Ok(PgCell(Value::Null))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn decode(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    match ty.kind() {
        Kind::Domain(base) => return decode(base, raw),
        Kind::Enum(_) => return Ok(Value::String(String::from_utf8(raw.to_vec())?)),
        Kind::Array(_) => {
            let items = Vec::<PgCell>::from_sql(ty, raw)?;
            return Ok(Value::Array(items.into_iter().map(|c| c.0).collect()));
        }
        _ => {}
    }

    let value = match *ty {
        Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
        Type::CHAR => Value::String(String::from_utf8_lossy(raw).into_owned()),
        Type::INT2 => Value::Int16(i16::from_sql(ty, raw)?),
        Type::INT4 => Value::Int32(i32::from_sql(ty, raw)?),
        Type::INT8 => Value::Int64(i64::from_sql(ty, raw)?),
        Type::OID => Value::Int64(u32::from_sql(ty, raw)? as i64),
        Type::FLOAT4 => Value::Float32(f32::from_sql(ty, raw)?),
        Type::FLOAT8 => Value::Float64(f64::from_sql(ty, raw)?),
        Type::NUMERIC => Value::Decimal(parse_numeric(raw)?),
        Type::BYTEA => Value::Bytes(raw.to_vec()),
        Type::UUID => Value::Uuid(uuid::Uuid::from_sql(ty, raw)?),
        Type::JSON | Type::JSONB => Value::Json(serde_json::Value::from_sql(ty, raw)?),
        Type::DATE => Value::Date(chrono::NaiveDate::from_sql(ty, raw)?),
        Type::TIME => Value::Time(chrono::NaiveTime::from_sql(ty, raw)?),
        Type::TIMESTAMP => Value::DateTime(chrono::NaiveDateTime::from_sql(ty, raw)?),
        Type::TIMESTAMPTZ => {
            Value::DateTimeUtc(chrono::DateTime::<chrono::Utc>::from_sql(ty, raw)?)
        }
        _ => match String::from_utf8(raw.to_vec()) {
            Ok(text) => Value::String(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
    };
    Ok(value)
}

/// Render a binary NUMERIC payload as decimal text without losing precision
pub(crate) fn parse_numeric(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid NUMERIC payload: too short".into());
    }

    let ndigits = i16::from_be_bytes([raw[0], raw[1]]) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]);
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = i16::from_be_bytes([raw[6], raw[7]]) as usize;

    if raw.len() < 8 + ndigits * 2 {
        return Err("invalid NUMERIC payload: truncated digits".into());
    }
    if sign == 0xC000 {
        return Ok("NaN".to_string());
    }

    let digits: Vec<u16> = raw[8..8 + ndigits * 2]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    if digits.iter().any(|group| *group > 9999) {
        return Err("invalid NUMERIC payload: group out of range".into());
    }

    let integer_groups = if weight >= 0 { weight as usize + 1 } else { 0 };
    let mut integer = String::new();
    for index in 0..integer_groups {
        let group = digits.get(index).copied().unwrap_or(0);
        if index == 0 {
            integer.push_str(&group.to_string());
        } else {
            integer.push_str(&format!("{group:04}"));
        }
    }
    if integer.is_empty() {
        integer.push('0');
    }

    let mut fraction = String::new();
    if dscale > 0 {
        // Negative weights mean leading zero groups after the point.
        let leading_zero_groups = if weight < -1 { (-1 - weight) as usize } else { 0 };
        for _ in 0..leading_zero_groups {
            fraction.push_str("0000");
        }
        for group in digits.iter().skip(integer_groups.min(digits.len())) {
            fraction.push_str(&format!("{group:04}"));
        }
        if fraction.len() < dscale {
            fraction.push_str(&"0".repeat(dscale - fraction.len()));
        } else {
            fraction.truncate(dscale);
        }
    }

    let mut output = String::new();
    if sign == 0x4000 {
        output.push('-');
    }
    output.push_str(&integer);
    if !fraction.is_empty() {
        output.push('.');
        output.push_str(&fraction);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn numeric(weight: i16, sign: u16, dscale: i16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as i16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for digit in digits {
            raw.extend_from_slice(&digit.to_be_bytes());
        }
        raw
    }

    #[rstest]
    #[case::integer(numeric(1, 0, 0, &[12, 3456]), "123456")]
    #[case::keeps_scale(numeric(0, 0, 2, &[12, 5000]), "12.50")]
    #[case::negative(numeric(0, 0x4000, 1, &[7, 2500]), "-7.2")]
    #[case::small_fraction(numeric(-2, 0, 6, &[1200]), "0.000012")]
    #[case::zero(numeric(0, 0, 0, &[]), "0")]
    #[case::nan(numeric(0, 0xC000, 0, &[]), "NaN")]
    fn numeric_payloads(#[case] raw: Vec<u8>, #[case] expected: &str) {
        assert_eq!(parse_numeric(&raw).unwrap(), expected);
    }

    #[test]
    fn truncated_numeric_is_an_error() {
        assert!(parse_numeric(&[0, 2, 0, 0]).is_err());
    }

    #[test]
    fn text_arguments_follow_placeholder_type() {
        assert!(matches!(
            PgValue::for_type(&Value::from("42"), &Type::INT4),
            PgValue::Int32(42)
        ));
        assert!(matches!(
            PgValue::for_type(&Value::Int64(7), &Type::INT2),
            PgValue::Int16(7)
        ));
        assert!(matches!(
            PgValue::for_type(&Value::from("users"), &Type::NAME),
            PgValue::String(ref s) if s == "users"
        ));
        assert!(matches!(
            PgValue::for_type(&Value::from("not a number"), &Type::INT8),
            PgValue::String(_)
        ));
    }

    #[test]
    fn cells_decode_by_type() {
        let cell = PgCell::from_sql(&Type::INT8, &42i64.to_be_bytes()).unwrap();
        assert_eq!(cell.0, Value::Int64(42));

        let cell = PgCell::from_sql(&Type::NAME, b"orders").unwrap();
        assert_eq!(cell.0, Value::String("orders".into()));

        let cell = PgCell::from_sql_null(&Type::TEXT).unwrap();
        assert_eq!(cell.0, Value::Null);
    }
}
