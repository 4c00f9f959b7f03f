//! Open-box request and response bodies

use ppk_common::config::RequestDefaults;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Scanned box identifier
///
/// Kept verbatim. On the wire it is a JSON number when the text is a
/// canonical integer literal and a JSON string otherwise, so the request body
/// is always valid JSON whatever the QR code contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxId(String);

impl BoxId {
    pub fn new(scanned: impl Into<String>) -> Self {
        Self(scanned.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value if the text is a canonical integer (no sign `+`, no
    /// leading zeros, no surrounding whitespace)
    pub fn as_number(&self) -> Option<i64> {
        let digits = self.0.strip_prefix('-').unwrap_or(&self.0);
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'))
            && self.0 != "-0";
        if canonical {
            self.0.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for BoxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_number() {
            Some(n) => serializer.serialize_i64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

/// Body of `POST .../Access/openbox`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub delivery_id: i64,
    pub box_id: BoxId,
    pub token_format: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub qr_code_info: Option<String>,
    pub terminal_seed: i64,
    pub is_multibox: bool,
    pub door_index: i32,
    pub add_access_log: bool,
}

impl AccessRequest {
    pub fn new(box_id: BoxId, defaults: &RequestDefaults) -> Self {
        Self {
            delivery_id: defaults.delivery_id,
            box_id,
            token_format: defaults.token_format,
            latitude: defaults.latitude,
            longitude: defaults.longitude,
            qr_code_info: defaults.qr_code_info.clone(),
            terminal_seed: defaults.terminal_seed,
            is_multibox: defaults.is_multibox,
            door_index: defaults.door_index,
            add_access_log: defaults.add_access_log,
        }
    }
}

/// Open-box response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    /// Base64 encoded ZIP archive
    pub data: String,
    pub result: i64,
    pub error_number: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn body(box_id: &str) -> Value {
        let request = AccessRequest::new(BoxId::new(box_id), &RequestDefaults::default());
        serde_json::to_value(&request).unwrap()
    }

    #[test]
    fn test_numeric_box_id_is_json_number() {
        let value = body("42");
        assert_eq!(value["boxId"], json!(42));
    }

    #[test]
    fn test_non_numeric_box_id_still_valid_json() {
        let request = AccessRequest::new(BoxId::new("BOX-7\"x"), &RequestDefaults::default());
        let text = serde_json::to_string(&request).unwrap();

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["boxId"], json!("BOX-7\"x"));
    }

    #[test]
    fn test_leading_zero_box_id_kept_verbatim() {
        assert_eq!(body("007")["boxId"], json!("007"));
        assert_eq!(body("-5")["boxId"], json!(-5));
        assert_eq!(body("-0")["boxId"], json!("-0"));
        assert_eq!(body("0")["boxId"], json!(0));
    }

    #[test]
    fn test_out_of_range_box_id_is_string() {
        assert_eq!(body("99999999999999999999")["boxId"], json!("99999999999999999999"));
    }

    #[test]
    fn test_request_fields_match_wire_format() {
        let value = body("1");
        assert_eq!(
            value,
            json!({
                "deliveryId": 12345,
                "boxId": 1,
                "tokenFormat": 4,
                "latitude": 46.056946,
                "longitude": 14.505751,
                "qrCodeInfo": null,
                "terminalSeed": 111222,
                "isMultibox": false,
                "doorIndex": 0,
                "addAccessLog": true
            })
        );
    }

    #[test]
    fn test_response_parses_integer_error_number() {
        let response: AccessResponse =
            serde_json::from_str(r#"{"data":"UEs=","result":0,"errorNumber":0}"#).unwrap();
        assert_eq!(response.data, "UEs=");
        assert_eq!(response.result, 0);
        assert_eq!(response.error_number, 0.0);
    }

    #[test]
    fn test_response_missing_data_rejected() {
        let result = serde_json::from_str::<AccessResponse>(r#"{"result":1,"errorNumber":3}"#);
        assert!(result.is_err());
    }
}
