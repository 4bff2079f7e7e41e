//! 请求信封解析
//!
//! 尽力从原始请求体中提取 `{action, amount, timestamp, nonce}`。
//! 解析失败不是错误，只会让该请求失去防重放保护。

use serde_json::Value;

/// 请求信封
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// 请求体是 JSON 对象，且 `timestamp` 与 `nonce` 都存在且非空
    Present {
        action: Option<String>,
        amount: Option<f64>,
        /// 原始 timestamp 字段，整数转换留给 [`crate::replay::ReplayGuard`]
        timestamp: Value,
        nonce: String,
    },
    /// 不是 JSON 对象，或缺少 timestamp/nonce
    Absent,
}

impl Envelope {
    pub fn parse(body: &[u8]) -> Self {
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
            return Envelope::Absent;
        };

        let (Some(timestamp), Some(nonce)) = (fields.get("timestamp"), fields.get("nonce")) else {
            return Envelope::Absent;
        };

        if !is_truthy(timestamp) || !is_truthy(nonce) {
            return Envelope::Absent;
        }

        let nonce = match nonce {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        Envelope::Present {
            action: fields
                .get("action")
                .and_then(Value::as_str)
                .map(str::to_string),
            amount: fields.get("amount").and_then(Value::as_f64),
            timestamp: timestamp.clone(),
            nonce,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Envelope::Present { .. })
    }

    pub fn nonce(&self) -> Option<&str> {
        match self {
            Envelope::Present { nonce, .. } => Some(nonce),
            Envelope::Absent => None,
        }
    }
}

/// 将 timestamp 字段转换为整数秒
///
/// 接受 JSON 整数、没有小数部分的浮点数，以及内容为十进制整数的字符串
pub fn timestamp_secs(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Some(f as i64)
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_envelope() {
        let body = br#"{"action":"transfer","amount":1000,"timestamp":1700000000,"nonce":"n1"}"#;
        match Envelope::parse(body) {
            Envelope::Present {
                action,
                amount,
                timestamp,
                nonce,
            } => {
                assert_eq!(action.as_deref(), Some("transfer"));
                assert_eq!(amount, Some(1000.0));
                assert_eq!(timestamp_secs(&timestamp), Some(1_700_000_000));
                assert_eq!(nonce, "n1");
            }
            Envelope::Absent => panic!("Expected envelope to be present"),
        }
    }

    #[test]
    fn test_non_json_body_is_absent() {
        assert_eq!(Envelope::parse(b"not json at all"), Envelope::Absent);
        assert_eq!(Envelope::parse(b""), Envelope::Absent);
        assert_eq!(Envelope::parse(b"[1,2,3]"), Envelope::Absent);
        assert_eq!(Envelope::parse(b"{\"timestamp\": 1"), Envelope::Absent);
    }

    #[test]
    fn test_missing_or_falsy_fields_are_absent() {
        assert_eq!(Envelope::parse(br#"{"nonce":"n1"}"#), Envelope::Absent);
        assert_eq!(Envelope::parse(br#"{"timestamp":1}"#), Envelope::Absent);
        assert_eq!(
            Envelope::parse(br#"{"timestamp":0,"nonce":"n1"}"#),
            Envelope::Absent
        );
        assert_eq!(
            Envelope::parse(br#"{"timestamp":1,"nonce":""}"#),
            Envelope::Absent
        );
        assert_eq!(
            Envelope::parse(br#"{"timestamp":null,"nonce":"n1"}"#),
            Envelope::Absent
        );
    }

    #[test]
    fn test_non_numeric_timestamp_still_present() {
        let envelope = Envelope::parse(br#"{"timestamp":"yesterday","nonce":"n1"}"#);
        match envelope {
            Envelope::Present { timestamp, .. } => assert_eq!(timestamp_secs(&timestamp), None),
            Envelope::Absent => panic!("Expected envelope to be present"),
        }
    }

    #[test]
    fn test_non_string_nonce_uses_json_text() {
        let envelope = Envelope::parse(br#"{"timestamp":5,"nonce":42}"#);
        assert_eq!(envelope.nonce(), Some("42"));
    }

    #[test]
    fn test_timestamp_conversion() {
        assert_eq!(timestamp_secs(&json!(1700000000)), Some(1_700_000_000));
        assert_eq!(timestamp_secs(&json!(-5)), Some(-5));
        assert_eq!(timestamp_secs(&json!(1700000000.0)), Some(1_700_000_000));
        assert_eq!(timestamp_secs(&json!(" 1700000000 ")), Some(1_700_000_000));
        assert_eq!(timestamp_secs(&json!(1.5)), None);
        assert_eq!(timestamp_secs(&json!("12abc")), None);
        assert_eq!(timestamp_secs(&json!(true)), None);
        assert_eq!(timestamp_secs(&json!([1])), None);
    }
}
