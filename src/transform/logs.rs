use crate::domain::{BlockInternalTransaction, RawLog};

/// Parses a raw log's `indexed` JSON array and, if it is an `ICXTransfer`
/// event, produces the internal-transaction row it represents. Any other
/// event name is not an internal transaction and is dropped (`Ok(None)`).
///
/// A malformed `indexed` field is fatal: it indicates upstream corruption,
/// not a transient condition, so this returns `Err` rather than silently
/// skipping the log.
pub fn transform_log(raw: &RawLog) -> anyhow::Result<Option<BlockInternalTransaction>> {
    let indexed: Vec<String> = serde_json::from_str(&raw.indexed)
        .map_err(|err| anyhow::anyhow!("unable to parse indexed field {:?}: {err}", raw.indexed))?;

    let signature = indexed
        .first()
        .ok_or_else(|| anyhow::anyhow!("indexed field has no event signature"))?;
    let method = signature.split('(').next().unwrap_or(signature);

    if method != "ICXTransfer" {
        return Ok(None);
    }

    let amount = indexed
        .get(3)
        .ok_or_else(|| anyhow::anyhow!("ICXTransfer indexed field missing amount at index 3"))?
        .clone();

    Ok(Some(BlockInternalTransaction {
        transaction_hash: raw.transaction_hash.clone(),
        log_index: raw.log_index,
        number: raw.block_number,
        amount,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icx_transfer_log_becomes_internal_transaction() {
        let raw = RawLog {
            block_number: 103,
            transaction_hash: "0xbb".to_string(),
            log_index: 0,
            indexed: r#"["ICXTransfer(Address,Address,int)","0x1","0x2","0xde"]"#.to_string(),
        };

        let out = transform_log(&raw).unwrap().unwrap();

        assert_eq!(out.transaction_hash, "0xbb");
        assert_eq!(out.log_index, 0);
        assert_eq!(out.amount, "0xde");
    }

    #[test]
    fn non_transfer_log_is_dropped() {
        let raw = RawLog {
            block_number: 1,
            transaction_hash: "0xcc".to_string(),
            log_index: 1,
            indexed: r#"["SomeOtherEvent(int)","0x1"]"#.to_string(),
        };

        assert!(transform_log(&raw).unwrap().is_none());
    }

    #[test]
    fn malformed_indexed_field_is_an_error() {
        let raw = RawLog {
            block_number: 1,
            transaction_hash: "0xcc".to_string(),
            log_index: 0,
            indexed: "not json".to_string(),
        };

        assert!(transform_log(&raw).is_err());
    }
}
