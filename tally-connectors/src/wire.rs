//! Wire shapes of the inventory JSON-RPC API.
//!
//! Related-record fields are loosely typed on the wire: a `[id, "name"]`
//! pair, a bare id, a bare name, or `false` when unset. Everything is
//! normalised into the domain types here so nothing past this module
//! inspects raw payloads.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tally_domain::{Location, PositionId, Product, StockPosition};
use tally_ledger::{CountReceipt, LedgerError, LedgerResult};

// =============================================================================
// JSON-RPC envelope
// =============================================================================

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<P> {
    /// Always "2.0"
    pub jsonrpc: &'static str,
    /// Always "call"
    pub method: &'static str,
    /// Request id
    pub id: u64,
    /// Route parameters
    pub params: P,
}

impl<P> RpcRequest<P> {
    /// Wrap route parameters.
    pub fn call(id: u64, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "call",
            id,
            params,
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    /// Result payload
    #[serde(default)]
    pub result: Option<Value>,
    /// Error object
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub struct RpcError {
    /// Top-level message
    #[serde(default)]
    pub message: Option<String>,
    /// Server-side detail
    #[serde(default)]
    pub data: Option<RpcErrorData>,
}

/// Detail of a JSON-RPC error.
#[derive(Debug, Deserialize)]
pub struct RpcErrorData {
    /// Detailed message, preferred over the top-level one
    #[serde(default)]
    pub message: Option<String>,
}

impl RpcError {
    /// Most specific message available.
    pub fn message(&self) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.message.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Request failed".to_string())
    }
}

impl RpcResponse {
    /// Unwrap the result, mapping every failure shape to a remote error.
    ///
    /// Besides protocol errors, routes report failures inside the result
    /// as `{"success": false, "error": ".."}` or `{"error": ".."}`.
    pub fn into_result(self) -> LedgerResult<Value> {
        if let Some(error) = self.error {
            return Err(LedgerError::remote(error.message()));
        }
        let result = self.result.unwrap_or(Value::Null);

        if let Value::Object(map) = &result {
            let error = map.get("error").and_then(Value::as_str).map(str::to_string);
            let failed = map.get("success").and_then(Value::as_bool) == Some(false);
            match (error, failed) {
                (Some(message), _) => return Err(LedgerError::remote(message)),
                (None, true) => return Err(LedgerError::remote("Request failed")),
                (None, false) => {},
            }
        }
        Ok(result)
    }
}

// =============================================================================
// Related-record fields
// =============================================================================

/// A many-to-one field as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Related {
    /// `[id, "display name"]`
    Pair(u64, String),
    /// Bare id
    Id(u64),
    /// Bare display name
    Name(String),
    /// `false` or `true` (unset)
    Flag(bool),
}

impl Related {
    /// Record id, if present.
    pub fn id(&self) -> Option<u64> {
        match self {
            Related::Pair(id, _) | Related::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Display name, if present and non-empty.
    pub fn name(&self) -> Option<String> {
        match self {
            Related::Pair(_, name) | Related::Name(name) if !name.is_empty() => {
                Some(name.clone())
            },
            _ => None,
        }
    }
}

/// A scalar text field that may come back as `false` when empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Text {
    /// Value present
    Value(String),
    /// `false`
    Unset(bool),
}

impl Text {
    fn into_option(self) -> Option<String> {
        match self {
            Text::Value(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }
}

fn text(field: Option<Text>) -> Option<String> {
    field.and_then(Text::into_option)
}

// =============================================================================
// Positions
// =============================================================================

/// A stock quant as returned by the listing route.
#[derive(Debug, Clone, Deserialize)]
pub struct WireQuant {
    /// Record id
    pub id: PositionId,
    /// Product, as pair or id
    pub product_id: Related,
    /// Clean product name, when the route provides it
    #[serde(default)]
    pub product_name: Option<Text>,
    /// Reference code
    #[serde(default, alias = "default_code")]
    pub product_default_code: Option<Text>,
    /// Location, as pair or id
    pub location_id: Related,
    /// Location name, when the route provides it
    #[serde(default)]
    pub location_name: Option<Text>,
    /// Lot, as pair or `false`
    #[serde(default)]
    pub lot_id: Option<Related>,
    /// Lot name, when the route provides it
    #[serde(default)]
    pub lot_name: Option<Text>,
    /// Unit of measure, as pair
    #[serde(default)]
    pub product_uom_id: Option<Related>,
    /// Unit of measure name
    #[serde(default)]
    pub product_uom: Option<Text>,
    /// On-hand quantity (the expected quantity)
    pub quantity: Decimal,
    /// Counted quantity
    #[serde(default)]
    pub inventory_quantity: Option<Decimal>,
    /// Whether a count was set
    #[serde(default)]
    pub inventory_quantity_set: Option<bool>,
    /// Counted minus on-hand
    #[serde(default)]
    pub inventory_diff_quantity: Option<Decimal>,
}

impl WireQuant {
    /// Normalise into a domain position.
    pub fn into_position(self) -> LedgerResult<StockPosition> {
        let product_id = self
            .product_id
            .id()
            .ok_or_else(|| LedgerError::Decode(format!("quant {} has no product", self.id)))?;
        let location_id = self
            .location_id
            .id()
            .ok_or_else(|| LedgerError::Decode(format!("quant {} has no location", self.id)))?;

        let product_name = text(self.product_name)
            .or_else(|| self.product_id.name())
            .unwrap_or_default();
        let location_name = text(self.location_name)
            .or_else(|| self.location_id.name())
            .unwrap_or_default();
        let unit_name = text(self.product_uom)
            .or_else(|| self.product_uom_id.as_ref().and_then(Related::name))
            .unwrap_or_default();
        let lot_name = text(self.lot_name).or_else(|| self.lot_id.as_ref().and_then(Related::name));

        let is_counted = self
            .inventory_quantity_set
            .unwrap_or(self.inventory_quantity.is_some());

        let mut position = StockPosition::new(
            self.id,
            product_id,
            product_name,
            location_id,
            location_name,
            unit_name,
            self.quantity,
        );
        position.product_code = text(self.product_default_code);
        position.lot_name = lot_name;
        position.diff_quantity = self.inventory_diff_quantity;
        if let (true, Some(counted)) = (is_counted, self.inventory_quantity) {
            position.record_count(counted);
        }
        Ok(position)
    }
}

/// Result of the listing route.
#[derive(Debug, Deserialize)]
pub struct WireQuantPage {
    /// Page of quants
    pub quants: Vec<WireQuant>,
    /// Total matching quants
    pub total: usize,
}

// =============================================================================
// Writes
// =============================================================================

/// Result of the set-quantity route.
#[derive(Debug, Deserialize)]
pub struct WireCountReceipt {
    /// Stored counted quantity
    pub inventory_quantity: Decimal,
    /// Stored difference
    #[serde(default, alias = "diff")]
    pub inventory_diff_quantity: Option<Decimal>,
}

impl WireCountReceipt {
    /// Normalise into a receipt.
    pub fn into_receipt(self) -> LedgerResult<CountReceipt> {
        let diff_quantity = self
            .inventory_diff_quantity
            .ok_or_else(|| LedgerError::Decode("count receipt without difference".into()))?;
        Ok(CountReceipt {
            quantity: self.inventory_quantity,
            diff_quantity,
        })
    }
}

/// Result of the create-quant route.
#[derive(Debug, Deserialize)]
pub struct WireCreated {
    /// Id of the created or updated quant
    pub quant_id: PositionId,
}

// =============================================================================
// Locations / products
// =============================================================================

/// A location as returned by the locations route.
#[derive(Debug, Deserialize)]
pub struct WireLocation {
    /// Record id
    pub id: u64,
    /// Display name
    #[serde(alias = "complete_name", alias = "display_name")]
    pub name: String,
}

impl From<WireLocation> for Location {
    fn from(wire: WireLocation) -> Self {
        Location::new(wire.id, wire.name)
    }
}

/// A product as returned by product search.
#[derive(Debug, Deserialize)]
pub struct WireProduct {
    /// Record id
    pub id: u64,
    /// Display name
    pub display_name: String,
    /// Reference code, `false` when unset
    #[serde(default)]
    pub default_code: Option<Text>,
}

impl From<WireProduct> for Product {
    fn from(wire: WireProduct) -> Self {
        Product {
            id: wire.id,
            display_name: wire.display_name,
            code: text(wire.default_code),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_related_shapes() {
        let pair: Related = serde_json::from_value(json!([7, "WH/Stock"])).unwrap();
        assert_eq!(pair.id(), Some(7));
        assert_eq!(pair.name().as_deref(), Some("WH/Stock"));

        let id: Related = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(id, Related::Id(7));
        assert_eq!(id.name(), None);

        let unset: Related = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(unset.id(), None);
        assert_eq!(unset.name(), None);

        let name: Related = serde_json::from_value(json!("LOT-1")).unwrap();
        assert_eq!(name.name().as_deref(), Some("LOT-1"));
    }

    #[test]
    fn test_search_read_quant() {
        let wire: WireQuant = serde_json::from_value(json!({
            "id": 11,
            "product_id": [42, "[FURN_7777] Office Chair"],
            "location_id": [8, "WH/Stock"],
            "lot_id": false,
            "product_uom_id": [1, "Units"],
            "quantity": 10.0,
            "inventory_quantity": 0.0,
            "inventory_quantity_set": false
        }))
        .unwrap();
        let position = wire.into_position().unwrap();

        assert_eq!(position.product_id, 42);
        assert_eq!(position.product_name, "[FURN_7777] Office Chair");
        assert_eq!(position.location_name, "WH/Stock");
        assert_eq!(position.unit_name, "Units");
        assert_eq!(position.lot_name, None);
        assert_eq!(position.expected_quantity, dec!(10));
        assert!(!position.is_counted);
        assert_eq!(position.counted_quantity, None);
    }

    #[test]
    fn test_flat_quant() {
        let wire: WireQuant = serde_json::from_value(json!({
            "id": 12,
            "product_id": 42,
            "product_name": "Office Chair (Black)",
            "product_default_code": "",
            "product_uom": "Units",
            "location_id": 8,
            "location_name": "WH/Stock",
            "lot_name": "LOT-9",
            "quantity": 3.5,
            "inventory_quantity": 4.0,
            "inventory_quantity_set": true,
            "inventory_diff_quantity": 0.5
        }))
        .unwrap();
        let position = wire.into_position().unwrap();

        assert_eq!(position.product_name, "Office Chair (Black)");
        assert_eq!(position.product_code, None);
        assert_eq!(position.lot_name.as_deref(), Some("LOT-9"));
        assert!(position.is_counted);
        assert_eq!(position.counted_quantity, Some(dec!(4)));
        assert_eq!(position.diff_quantity, Some(dec!(0.5)));
    }

    #[test]
    fn test_quant_without_product_is_decode_error() {
        let wire: WireQuant = serde_json::from_value(json!({
            "id": 13,
            "product_id": false,
            "location_id": 8,
            "quantity": 1
        }))
        .unwrap();
        assert!(matches!(wire.into_position(), Err(LedgerError::Decode(_))));
    }

    #[test]
    fn test_error_shapes() {
        let rpc: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"message": "Odoo Server Error", "data": {"message": "Access denied"}}
        }))
        .unwrap();
        assert_eq!(rpc.into_result(), Err(LedgerError::remote("Access denied")));

        let failed: RpcResponse = serde_json::from_value(json!({
            "result": {"success": false, "error": "Quant not found"}
        }))
        .unwrap();
        assert_eq!(failed.into_result(), Err(LedgerError::remote("Quant not found")));

        let bare: RpcResponse = serde_json::from_value(json!({
            "result": {"error": "No inventory adjustments to apply."}
        }))
        .unwrap();
        assert!(bare.into_result().is_err());

        let ok: RpcResponse = serde_json::from_value(json!({"result": {"success": true}})).unwrap();
        assert!(ok.into_result().is_ok());
    }

    #[test]
    fn test_product_code_false() {
        let product: Product = serde_json::from_value::<WireProduct>(json!({
            "id": 5,
            "display_name": "Desk Lamp",
            "default_code": false
        }))
        .unwrap()
        .into();
        assert_eq!(product.code, None);
    }
}
