// SPDX-License-Identifier: CC0-1.0

//! The builder's pure safety kernel.
//!
//! Funding may add arbitrary wallet inputs to a transaction, and a deed is
//! just a 600-sat output, so a careless funder could sweep somebody's plot
//! deed in as fee material. Before anything is broadcast, the signed
//! transaction is decoded and checked here against the previous-output
//! values of every input.

use std::collections::HashMap;

use bitcoin::{Amount, OutPoint, Transaction};
use pixelplot_protocol::DEED_VALUE;

use crate::Error;

/// Checks that the transaction spends exactly the deeds it is allowed to.
///
/// With `intended = None` (a CLAIM) no input may have a 600-sat previous
/// output. Otherwise exactly one input must, and it must be `intended`.
/// `prevouts` must cover every input of `tx`.
pub fn verify_funding(
    tx: &Transaction,
    prevouts: &HashMap<OutPoint, Amount>,
    intended: Option<OutPoint>,
) -> Result<(), Error> {
    let deed_inputs: Vec<OutPoint> = tx
        .input
        .iter()
        .map(|input| input.previous_output)
        .filter(|outpoint| prevouts.get(outpoint).copied() == Some(DEED_VALUE))
        .collect();

    match intended {
        None =>
            if deed_inputs.is_empty() {
                Ok(())
            } else {
                Err(Error::WouldBrickPlot)
            },
        Some(deed) => {
            if prevouts.get(&deed).copied() != Some(DEED_VALUE) {
                return Err(Error::UnknownDeed(deed));
            }
            if deed_inputs.len() == 1 && deed_inputs[0] == deed {
                Ok(())
            } else {
                Err(Error::WouldBrickPlot)
            }
        }
    }
}

/// The lowest-indexed output of value exactly 600 sats, if any.
///
/// Funding may reorder outputs, so the deed cannot be assumed to still sit
/// where `createrawtransaction` put it.
pub fn find_deed_output(tx: &Transaction) -> Option<u32> {
    tx.output.iter().position(|output| output.value == DEED_VALUE).map(|vout| vout as u32)
}

#[cfg(test)]
mod tests {
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::Hash as _;
    use bitcoin::transaction::Version;
    use bitcoin::{ScriptBuf, Sequence, TxIn, TxOut, Txid, Witness};

    use super::*;

    fn outpoint(salt: u8) -> OutPoint {
        OutPoint { txid: Txid::from_byte_array([salt; 32]), vout: 0 }
    }

    fn tx_spending(outpoints: &[OutPoint]) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: outpoints
                .iter()
                .map(|&previous_output| TxIn {
                    previous_output,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![],
        }
    }

    fn prevouts(entries: &[(OutPoint, u64)]) -> HashMap<OutPoint, Amount> {
        entries.iter().map(|&(op, sats)| (op, Amount::from_sat(sats))).collect()
    }

    #[test]
    fn claim_with_plain_inputs_passes() {
        let tx = tx_spending(&[outpoint(1), outpoint(2)]);
        let values = prevouts(&[(outpoint(1), 50_000), (outpoint(2), 10_000)]);
        assert!(verify_funding(&tx, &values, None).is_ok());
    }

    #[test]
    fn claim_funded_with_a_deed_is_rejected() {
        let tx = tx_spending(&[outpoint(1), outpoint(2)]);
        let values = prevouts(&[(outpoint(1), 50_000), (outpoint(2), 600)]);
        assert!(matches!(verify_funding(&tx, &values, None), Err(Error::WouldBrickPlot)));
    }

    #[test]
    fn spend_of_exactly_the_intended_deed_passes() {
        let deed = outpoint(7);
        let tx = tx_spending(&[deed, outpoint(1)]);
        let values = prevouts(&[(deed, 600), (outpoint(1), 25_000)]);
        assert!(verify_funding(&tx, &values, Some(deed)).is_ok());
    }

    #[test]
    fn spend_dragging_in_a_second_deed_is_rejected() {
        let deed = outpoint(7);
        let tx = tx_spending(&[deed, outpoint(8)]);
        let values = prevouts(&[(deed, 600), (outpoint(8), 600)]);
        assert!(matches!(verify_funding(&tx, &values, Some(deed)), Err(Error::WouldBrickPlot)));
    }

    #[test]
    fn spend_of_the_wrong_deed_is_rejected() {
        let intended = outpoint(7);
        let other = outpoint(8);
        let tx = tx_spending(&[other, outpoint(1)]);
        let values = prevouts(&[(other, 600), (outpoint(1), 25_000)]);
        assert!(matches!(verify_funding(&tx, &values, Some(intended)), Err(Error::UnknownDeed(_))));
    }

    #[test]
    fn intended_outpoint_that_is_not_a_deed_is_rejected() {
        let intended = outpoint(7);
        let tx = tx_spending(&[intended]);
        let values = prevouts(&[(intended, 599)]);
        assert!(matches!(
            verify_funding(&tx, &values, Some(intended)),
            Err(Error::UnknownDeed(op)) if op == intended
        ));
    }

    #[test]
    fn deed_output_search_picks_lowest_index() {
        let mut tx = tx_spending(&[outpoint(1)]);
        tx.output = vec![
            TxOut { value: Amount::from_sat(9_400), script_pubkey: ScriptBuf::new() },
            TxOut { value: Amount::from_sat(600), script_pubkey: ScriptBuf::new() },
            TxOut { value: Amount::from_sat(600), script_pubkey: ScriptBuf::new() },
        ];
        assert_eq!(find_deed_output(&tx), Some(1));

        tx.output.truncate(1);
        assert_eq!(find_deed_output(&tx), None);
    }
}
