use serde::Deserialize;
use serde_json::Value;

use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct CallbackEnvelope {
    #[serde(rename = "Body")]
    body: CallbackBody,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    #[serde(rename = "stkCallback")]
    stk_callback: StkCallback,
}

/// Asynchronous STK push result as posted by the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata", default)]
    pub metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    fn metadata_value(&self, name: &str) -> Option<&Value> {
        self.metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)
            .map(|item| &item.value)
    }

    pub fn receipt_number(&self) -> Option<String> {
        match self.metadata_value("MpesaReceiptNumber")? {
            Value::String(receipt) => Some(receipt.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

/// Validates the shape of a callback payload.
///
/// # Errors
/// `Validation` when the `Body.stkCallback` object, its `CheckoutRequestID`,
/// or its `ResultCode` is missing or mistyped.
pub fn parse_callback(payload: Value) -> Result<StkCallback, ServiceError> {
    serde_json::from_value::<CallbackEnvelope>(payload)
        .map(|envelope| envelope.body.stk_callback)
        .map_err(|e| ServiceError::Validation(format!("Invalid Callback Body: {e}")))
}
