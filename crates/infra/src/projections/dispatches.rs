use std::cmp::Reverse;
use std::collections::BTreeSet;

use thiserror::Error;

use tracechain_core::{Address, BoxId, DispatchId, ProductId};
use tracechain_events::{AcceptanceRecord, DispatchRecord, ReportRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Two dispatch records claim the same id. The ledger never does this, so
    /// the input is corrupt.
    #[error("duplicate dispatch id {dispatch_id}")]
    DuplicateDispatchId { dispatch_id: DispatchId },

    /// One product was minted twice with different attributes.
    #[error("conflicting entry records for product {product_id} in box {box_id}")]
    ConflictingEntry { box_id: BoxId, product_id: ProductId },
}

/// Merge Single and Multi dispatch records into one list.
///
/// Ordered by timestamp descending, ties by ascending dispatch id.
pub fn dispatch_view<'a>(
    records: impl IntoIterator<Item = &'a DispatchRecord>,
) -> Result<Vec<DispatchRecord>, AggregateError> {
    let mut seen = BTreeSet::new();
    let mut merged = Vec::new();
    for record in records {
        if !seen.insert(record.dispatch_id()) {
            return Err(AggregateError::DuplicateDispatchId {
                dispatch_id: record.dispatch_id(),
            });
        }
        merged.push(record.clone());
    }

    merged.sort_by_key(|r| (Reverse(r.timestamp()), r.dispatch_id()));
    Ok(merged)
}

/// Dispatches an account sent onward (not sales).
pub fn sent_by<'a>(view: &'a [DispatchRecord], account: &Address) -> Vec<&'a DispatchRecord> {
    view.iter()
        .filter(|r| r.from() == account && !r.is_sale())
        .collect()
}

/// Dispatches an account made to the burn address.
pub fn sales_by<'a>(view: &'a [DispatchRecord], account: &Address) -> Vec<&'a DispatchRecord> {
    view.iter()
        .filter(|r| r.from() == account && r.is_sale())
        .collect()
}

/// Dispatches addressed to an account.
pub fn incoming_to<'a>(view: &'a [DispatchRecord], account: &Address) -> Vec<&'a DispatchRecord> {
    view.iter().filter(|r| r.to() == account).collect()
}

/// Every dispatch touching `product_id`, oldest first.
pub fn track_product(view: &[DispatchRecord], product_id: ProductId) -> Vec<&DispatchRecord> {
    let mut trail: Vec<_> = view.iter().filter(|r| r.covers(product_id)).collect();
    trail.sort_by_key(|r| (r.timestamp(), r.dispatch_id()));
    trail
}

/// Deliveries accepted by an account, newest first.
pub fn accepted_by<'a>(
    records: impl IntoIterator<Item = &'a AcceptanceRecord>,
    account: &Address,
) -> Vec<AcceptanceRecord> {
    let mut out: Vec<_> = records
        .into_iter()
        .filter(|r| &r.accepted_by == account)
        .cloned()
        .collect();
    out.sort_by_key(|r| (Reverse(r.accepted_at), r.dispatch_id));
    out
}

/// Reports filed by an account, newest first.
pub fn reports_by<'a>(records: impl IntoIterator<Item = &'a ReportRecord>, account: &Address) -> Vec<ReportRecord> {
    let mut out: Vec<_> = records
        .into_iter()
        .filter(|r| &r.report_by == account)
        .cloned()
        .collect();
    out.sort_by(|a, b| {
        b.reported_at
            .cmp(&a.reported_at)
            .then_with(|| a.product_id.cmp(&b.product_id))
            .then_with(|| a.position.cmp(&b.position))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use tracechain_events::{DispatchKind, LogPosition};

    fn addr(tail: &str) -> Address {
        Address::parse(&format!("0x{tail:0>40}")).unwrap()
    }

    pub(crate) fn dispatch(id: u64, start: u64, end: u64, from: &str, to: Address, ts: i64) -> DispatchRecord {
        let kind = if start == end { DispatchKind::Single } else { DispatchKind::Multi };
        DispatchRecord::new(
            DispatchId::new(id),
            kind,
            ProductId::new(start),
            ProductId::new(end),
            addr(from),
            to,
            DateTime::from_timestamp(ts, 0).unwrap(),
            end - start + 1,
            None,
            LogPosition { block_number: id, log_index: 0 },
        )
        .unwrap()
    }

    #[test]
    fn merges_and_sorts_newest_first_with_id_tie_break() {
        let records = vec![
            dispatch(1, 1, 1, "c1", addr("a1"), 100),
            dispatch(3, 2, 5, "c1", addr("a1"), 300),
            dispatch(2, 6, 6, "c1", addr("a1"), 300),
        ];
        let view = dispatch_view(&records).unwrap();
        let ids: Vec<u64> = view.iter().map(|r| r.dispatch_id().get()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn duplicate_dispatch_id_is_rejected() {
        let records = vec![
            dispatch(1, 1, 1, "c1", addr("a1"), 100),
            dispatch(1, 2, 4, "c1", addr("a1"), 200),
        ];
        assert_eq!(
            dispatch_view(&records).unwrap_err(),
            AggregateError::DuplicateDispatchId { dispatch_id: DispatchId::new(1) }
        );
    }

    #[test]
    fn sent_and_sales_are_disjoint() {
        let records = vec![
            dispatch(1, 1, 1, "e1", Address::burn(), 100),
            dispatch(2, 2, 3, "e1", addr("a1"), 200),
            dispatch(3, 4, 4, "c1", addr("e1"), 300),
        ];
        let view = dispatch_view(&records).unwrap();

        let sent: Vec<_> = sent_by(&view, &addr("e1")).iter().map(|r| r.dispatch_id().get()).collect();
        let sold: Vec<_> = sales_by(&view, &addr("e1")).iter().map(|r| r.dispatch_id().get()).collect();
        assert_eq!(sent, vec![2]);
        assert_eq!(sold, vec![1]);
        assert_eq!(incoming_to(&view, &addr("e1")).len(), 1);
    }

    #[test]
    fn tracking_follows_a_product_through_ranges() {
        let records = vec![
            dispatch(1, 10, 14, "c1", addr("a1"), 100),
            dispatch(2, 12, 12, "a1", addr("d1"), 200),
            dispatch(3, 15, 20, "c1", addr("a1"), 150),
        ];
        let view = dispatch_view(&records).unwrap();
        let trail: Vec<_> = track_product(&view, ProductId::new(12))
            .iter()
            .map(|r| r.dispatch_id().get())
            .collect();
        assert_eq!(trail, vec![1, 2]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn records() -> impl Strategy<Value = Vec<DispatchRecord>> {
            prop::collection::vec((1u64..50, 1u64..20, 0i64..5), 0..30).prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (start, len, ts))| {
                        dispatch(i as u64 + 1, start, start + len - 1, "c1", addr("a1"), 1_700_000_000 + ts)
                    })
                    .collect()
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 1000, .. ProptestConfig::default() })]

            /// Aggregating the same input in any order gives the same view.
            #[test]
            fn view_is_order_independent(records in records(), seed in any::<u64>()) {
                let mut shuffled = records.clone();
                let n = shuffled.len();
                if n > 1 {
                    let k = (seed as usize) % n;
                    shuffled.rotate_left(k);
                    shuffled.reverse();
                }

                let a = dispatch_view(&records).unwrap();
                let b = dispatch_view(&shuffled).unwrap();
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(a, dispatch_view(&records).unwrap());
            }

            /// Merged views never carry the same dispatch id twice.
            #[test]
            fn view_ids_are_unique(records in records()) {
                let view = dispatch_view(&records).unwrap();
                let ids: BTreeSet<_> = view.iter().map(|r| r.dispatch_id()).collect();
                prop_assert_eq!(ids.len(), view.len());
                for r in &view {
                    prop_assert!(r.start_id() <= r.end_id());
                }
            }
        }
    }
}
