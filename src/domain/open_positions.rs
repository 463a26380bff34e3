//! Open position resolution: keeps only each instrument's current
//! holding episode.
//!
//! A position that is closed (net amount back to exactly zero) and later
//! reopened is reported from the reopening onward, not from its full
//! multi-episode history.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::instrument::Instrument;
use super::transaction::TransactionEvent;

#[derive(Debug, Default)]
struct Episode {
    cumulative: Decimal,
    transactions: Vec<TransactionEvent>,
}

/// Partition the ledger per instrument and return the currently open
/// episode for each. Instruments that end flat are excluded.
pub fn resolve_open_positions(
    transactions: &[TransactionEvent],
) -> BTreeMap<Instrument, Vec<TransactionEvent>> {
    let mut sorted: Vec<&TransactionEvent> = transactions.iter().collect();
    sorted.sort_by_key(|t| t.date);

    let mut episodes: BTreeMap<Instrument, Episode> = BTreeMap::new();
    for transaction in sorted {
        let episode = episodes.entry(transaction.instrument.clone()).or_default();
        episode.cumulative += transaction.side.signed(transaction.amount);
        episode.transactions.push(transaction.clone());

        // Net-zero crossing closes the episode; the next transaction
        // starts a fresh one.
        if episode.cumulative.is_zero() {
            episodes.insert(transaction.instrument.clone(), Episode::default());
        }
    }

    episodes
        .into_iter()
        .filter(|(_, episode)| !episode.cumulative.is_zero())
        .map(|(instrument, episode)| (instrument, episode.transactions))
        .collect()
}
