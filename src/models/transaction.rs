use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Address;

/// Ethereum transaction as returned by `eth_getBlockByNumber` with full objects.
///
/// Numeric fields stay in the node's hex string encoding and are written back
/// unchanged. Fields the node sends that are not listed here land in `other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    /// `None` for contract creation
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    pub address: String,
    pub storage_keys: Vec<String>,
}

/// Block body. Only the transaction list is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub transactions: Vec<Transaction>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Side of a transaction an address is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Transaction {
    /// Minimal value transfer, mostly useful for tests and fixtures
    pub fn new(hash: &str, from: &str, to: Option<&str>) -> Self {
        Self {
            hash: hash.to_string(),
            from: from.to_string(),
            to: to.map(str::to_string),
            block_hash: None,
            block_number: None,
            chain_id: None,
            gas: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            input: None,
            nonce: None,
            transaction_index: None,
            tx_type: None,
            value: None,
            access_list: None,
            v: None,
            r: None,
            s: None,
            other: Map::new(),
        }
    }

    /// Classify this transaction relative to `address`.
    ///
    /// A match on `to` wins, so a self-transfer counts once, as inbound.
    pub fn direction_for(&self, address: &Address) -> Option<Direction> {
        if address.matches(self.to.as_deref()) {
            Some(Direction::Inbound)
        } else if address.matches(Some(&self.from)) {
            Some(Direction::Outbound)
        } else {
            None
        }
    }

    pub fn involves(&self, address: &Address) -> bool {
        self.direction_for(address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_transaction_json() -> Value {
        json!({
            "accessList": [],
            "blockHash": "0x8e38b4dbf6b11fcc3b9dee84fb7986e29ca0a02cecd8977c161ff7333329681e",
            "blockNumber": "0x10d4f",
            "chainId": "0x1",
            "from": "0xA7D9DDBE1F17865597FBD27EC712455208B6B76D",
            "gas": "0x5208",
            "gasPrice": "0x4a817c800",
            "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "input": "0x",
            "maxFeePerGas": "0x4a817c800",
            "maxPriorityFeePerGas": "0x0",
            "nonce": "0x15",
            "r": "0x1b5e176d927f8e9ab405058b2d2457392da3e20f328b16ddabcebc33eaac5fea",
            "s": "0x4ba69724e8f69de52f0125ad8b3c5c2cef33019bac3249e2c0a2192766d1721c",
            "to": "0xF02C1C8E6114B1DBE8937A39260B5B0A374432BB",
            "transactionIndex": "0x41",
            "type": "0x2",
            "v": "0x0",
            "value": "0xf3dbb76162000",
            "yParity": "0x0"
        })
    }

    #[test]
    fn test_transaction_deserialization() {
        let tx: Transaction = serde_json::from_value(sample_transaction_json()).unwrap();

        assert_eq!(tx.from, "0xA7D9DDBE1F17865597FBD27EC712455208B6B76D");
        assert_eq!(tx.to.as_deref(), Some("0xF02C1C8E6114B1DBE8937A39260B5B0A374432BB"));
        assert_eq!(tx.tx_type.as_deref(), Some("0x2"));
        assert_eq!(tx.access_list, Some(vec![]));
        assert_eq!(tx.other.get("yParity"), Some(&json!("0x0")));
    }

    #[test]
    fn test_hex_fields_pass_through_unchanged() {
        let raw = sample_transaction_json();
        let tx: Transaction = serde_json::from_value(raw.clone()).unwrap();
        let reserialized = serde_json::to_value(&tx).unwrap();

        assert_eq!(reserialized, raw);
    }

    #[test]
    fn test_contract_creation_has_no_recipient() {
        let tx: Transaction = serde_json::from_value(json!({
            "hash": "0x01",
            "from": "0xaa",
            "to": null,
        }))
        .unwrap();

        assert!(tx.to.is_none());
        assert_eq!(serde_json::to_value(&tx).unwrap()["to"], Value::Null);
    }

    #[test]
    fn test_direction_for() {
        let me = Address::new("0xAA");
        let inbound = Transaction::new("0x01", "0xbb", Some("0xaa"));
        let outbound = Transaction::new("0x02", "0xAA", Some("0xbb"));
        let creation = Transaction::new("0x03", "0xaa", None);
        let unrelated = Transaction::new("0x04", "0xbb", Some("0xcc"));
        let to_self = Transaction::new("0x05", "0xaa", Some("0xAA"));

        assert_eq!(inbound.direction_for(&me), Some(Direction::Inbound));
        assert_eq!(outbound.direction_for(&me), Some(Direction::Outbound));
        assert_eq!(creation.direction_for(&me), Some(Direction::Outbound));
        assert_eq!(unrelated.direction_for(&me), None);
        assert_eq!(to_self.direction_for(&me), Some(Direction::Inbound));
        assert!(!unrelated.involves(&me));
    }

    #[test]
    fn test_block_deserialization() {
        let block: Block = serde_json::from_value(json!({
            "number": "0x10d4f",
            "hash": "0xabc",
            "parentHash": "0xdef",
            "timestamp": "0x55ba467c",
            "miner": "0x0000000000000000000000000000000000000000",
            "transactions": [sample_transaction_json()],
            "uncles": []
        }))
        .unwrap();

        assert_eq!(block.number, "0x10d4f");
        assert_eq!(block.transactions.len(), 1);
        assert!(block.other.contains_key("miner"));
    }

    #[test]
    fn test_block_without_transactions_is_rejected() {
        let result: std::result::Result<Block, _> =
            serde_json::from_value(json!({"number": "0x1", "hash": "0xabc"}));
        assert!(result.is_err());
    }
}
