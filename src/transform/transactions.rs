use crate::bigint::multiply_hex;
use crate::domain::{BlockFailedTransaction, BlockTransaction, RawTransaction};

pub struct TransactionTransformOutput {
    pub transaction: BlockTransaction,
    pub failed: Option<BlockFailedTransaction>,
}

/// `receipt_status == 0` marks a failed transaction in the original chain
/// encoding (any non-zero status is success).
fn is_failed(receipt_status: u32) -> bool {
    receipt_status == 0
}

/// Transforms one raw transaction. The fee is `step_price * step_used`
/// computed in arbitrary precision: the naive 64-bit product overflows for
/// mainnet values, which is the correctness fix this transformer exists to
/// make.
pub fn transform_transaction(raw: &RawTransaction) -> anyhow::Result<TransactionTransformOutput> {
    let fee = multiply_hex(&raw.receipt_step_price, &raw.receipt_step_used)?;

    let transaction = BlockTransaction {
        transaction_hash: raw.hash.clone(),
        number: raw.block_number,
        fee,
        amount: raw.value.clone(),
    };

    let failed = is_failed(raw.receipt_status).then(|| BlockFailedTransaction {
        transaction_hash: raw.hash.clone(),
        number: raw.block_number,
    });

    Ok(TransactionTransformOutput { transaction, failed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_transaction_is_not_marked_failed() {
        let raw = RawTransaction {
            block_number: 101,
            hash: "0xtx101".to_string(),
            receipt_step_price: "0x10".to_string(),
            receipt_step_used: "0x1".to_string(),
            value: "0x100".to_string(),
            receipt_status: 1,
            ..Default::default()
        };

        let out = transform_transaction(&raw).unwrap();

        assert_eq!(out.transaction.fee, "0x10");
        assert_eq!(out.transaction.amount, "0x100");
        assert!(out.failed.is_none());
    }

    #[test]
    fn zero_receipt_status_marks_transaction_failed() {
        let raw = RawTransaction {
            block_number: 102,
            hash: "0xtx102".to_string(),
            receipt_step_price: "0x1".to_string(),
            receipt_step_used: "0x1".to_string(),
            value: "0x0".to_string(),
            receipt_status: 0,
            ..Default::default()
        };

        let out = transform_transaction(&raw).unwrap();

        assert!(out.failed.is_some());
        assert_eq!(out.failed.unwrap().number, 102);
    }

    #[test]
    fn fee_multiplication_does_not_overflow_u64() {
        let raw = RawTransaction {
            block_number: 105,
            hash: "0xtx105a".to_string(),
            receipt_step_price: "0xffffffffffffffff".to_string(),
            receipt_step_used: "0x1".to_string(),
            value: "0x0".to_string(),
            receipt_status: 1,
            ..Default::default()
        };

        let out = transform_transaction(&raw).unwrap();
        assert_eq!(out.transaction.fee, "0xffffffffffffffff");
    }
}
