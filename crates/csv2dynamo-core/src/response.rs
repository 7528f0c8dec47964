// Invocation response contract
//
// Mirrors the proxy-style shape callers expect: a numeric status code and a
// JSON-encoded body carrying a single message.

use serde::{Deserialize, Serialize};
use serde_json::json;

pub const SUCCESS_MESSAGE: &str = "CSV file was successfully written to DynamoDB.";
pub const MALFORMED_MESSAGE: &str = "Event is malformed.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderResponse {
    pub status_code: u16,
    pub body: String,
}

impl LoaderResponse {
    pub fn message(status_code: u16, message: &str) -> Self {
        Self {
            status_code,
            body: json!({ "message": message }).to_string(),
        }
    }

    pub fn success() -> Self {
        Self::message(200, SUCCESS_MESSAGE)
    }

    pub fn malformed() -> Self {
        Self::message(400, MALFORMED_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let value = serde_json::to_value(LoaderResponse::success()).unwrap();
        assert_eq!(value["statusCode"], 200);

        let body: serde_json::Value =
            serde_json::from_str(value["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["message"], SUCCESS_MESSAGE);
    }

    #[test]
    fn test_malformed_shape() {
        let response = LoaderResponse::malformed();
        assert_eq!(response.status_code, 400);
        assert!(!response.is_success());
        assert_eq!(response.body, r#"{"message":"Event is malformed."}"#);
    }
}
