//! Exclusive table allocation.
//!
//! Every reservation decision starts by locking the configured table rows
//! with `SELECT ... FOR UPDATE` inside the caller's transaction. The table
//! set is small provisioning data, so the lock serializes the whole
//! read-then-write window and two concurrent reservations can never both
//! see the same table as free.

use crate::server::core::error::{CoreError, CoreResult};
use crate::server::util::text;
use tokio_postgres::Transaction;

/// Channel values that seat the customer at a table. The empty/absent
/// channel defaults to dine-in, matching the walk-in flow; anything
/// unrecognized is treated as not needing a table.
const DINE_IN_TYPES: &[&str] = &["", "dine-in", "dine_in", "dinein", "dine in"];

pub(crate) fn requires_table(order_type: Option<&str>) -> bool {
    let folded = text::fold(order_type.unwrap_or(""));
    DINE_IN_TYPES.contains(&folded.as_str())
}

/// Normalized key for matching a requested label against the configured
/// set: case/diacritic-insensitive, whitespace and punctuation dropped,
/// tolerant of "table"/"ban"/"no."/"#" prefixes, so "Bàn 3", "table no. 3",
/// "#3" and "3" all resolve to the same table.
pub(crate) fn normalize_label(raw: &str) -> String {
    let folded = text::fold(raw);
    let mut key: String = folded.chars().filter(|c| c.is_alphanumeric()).collect();
    for prefix in ["tableno", "table", "ban", "no"] {
        if let Some(rest) = key.strip_prefix(prefix) {
            if !rest.is_empty() {
                key = rest.to_string();
                break;
            }
        }
    }
    key
}

#[derive(Debug, Clone)]
pub(crate) struct TableRow {
    pub number: String,
    pub display_name: String,
    pub occupied: bool,
    pub current_order_id: Option<i32>,
}

/// A reservation that has flipped `occupied` but not yet stamped an owning
/// order: the order row does not exist at reservation time. Finalize once
/// it does. If the enclosing transaction aborts first, the flip rolls back
/// with it and the table never leaks.
#[derive(Debug)]
pub(crate) struct PendingReservation {
    pub number: String,
}

async fn lock_all(txn: &Transaction<'_>) -> CoreResult<Vec<TableRow>> {
    let rows = txn
        .query(
            "SELECT number, display_name, occupied, current_order_id \
             FROM dining_table ORDER BY length(number), number FOR UPDATE",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| TableRow {
            number: r.get("number"),
            display_name: r.get("display_name"),
            occupied: r.get("occupied"),
            current_order_id: r.get("current_order_id"),
        })
        .collect())
}

fn resolve_label<'a>(rows: &'a [TableRow], requested: &str) -> Option<&'a TableRow> {
    let key = normalize_label(requested);
    rows.iter().find(|t| {
        normalize_label(&t.number) == key || normalize_label(&t.display_name) == key
    })
}

/// Rows arrive ordered by (length, number), so the first unoccupied one is
/// the allocation choice.
fn first_free(rows: &[TableRow]) -> Option<&TableRow> {
    rows.iter().find(|t| !t.occupied)
}

/// Reserve a table for an order that is about to be written.
///
/// With an explicit label: unknown label -> `NotFound`, held by another
/// order -> `Conflict`, held by `for_order` itself -> no-op keep. Without
/// a label: first free table, or `NoCapacity`.
pub(crate) async fn reserve(
    txn: &Transaction<'_>,
    requested: Option<&str>,
    for_order: Option<i32>,
) -> CoreResult<PendingReservation> {
    let tables = lock_all(txn).await?;
    let picked = match requested {
        Some(label) => {
            let table = resolve_label(&tables, label)
                .ok_or_else(|| CoreError::not_found(format!("table '{}'", label.trim())))?;
            if table.occupied {
                match (table.current_order_id, for_order) {
                    (Some(holder), Some(mover)) if holder == mover => {
                        return Ok(PendingReservation {
                            number: table.number.clone(),
                        });
                    }
                    _ => {
                        return Err(CoreError::conflict(format!(
                            "table '{}' is already occupied",
                            table.number
                        )));
                    }
                }
            }
            table
        }
        None => first_free(&tables).ok_or(CoreError::NoCapacity)?,
    };

    txn.execute(
        "UPDATE dining_table SET occupied = TRUE WHERE number = $1",
        &[&picked.number],
    )
    .await?;
    Ok(PendingReservation {
        number: picked.number.clone(),
    })
}

/// Stamp the owning order once its row is durably written in the same
/// transaction.
pub(crate) async fn finalize(
    txn: &Transaction<'_>,
    reservation: &PendingReservation,
    order_id: i32,
) -> CoreResult<()> {
    txn.execute(
        "UPDATE dining_table SET occupied = TRUE, current_order_id = $2 WHERE number = $1",
        &[&reservation.number, &order_id],
    )
    .await?;
    Ok(())
}

/// Free a table, but only if this order still holds it. Used by table
/// moves so a concurrent reassignment is never clobbered.
pub(crate) async fn release_if_held(
    txn: &Transaction<'_>,
    number: &str,
    order_id: i32,
) -> CoreResult<()> {
    txn.execute(
        "UPDATE dining_table SET occupied = FALSE, current_order_id = NULL \
         WHERE number = $1 AND current_order_id = $2",
        &[&number, &order_id],
    )
    .await?;
    Ok(())
}

/// Free whatever table the order holds; returns its number if there was
/// one.
pub(crate) async fn release_for_order(
    txn: &Transaction<'_>,
    order_id: i32,
) -> CoreResult<Option<String>> {
    let rows = txn
        .query(
            "UPDATE dining_table SET occupied = FALSE, current_order_id = NULL \
             WHERE current_order_id = $1 RETURNING number",
            &[&order_id],
        )
        .await?;
    Ok(rows.first().map(|r| r.get("number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(number: &str, occupied: bool, order: Option<i32>) -> TableRow {
        TableRow {
            number: number.to_string(),
            display_name: format!("Ban {number}"),
            occupied,
            current_order_id: order,
        }
    }

    #[test]
    fn dine_in_family_requires_a_table() {
        assert!(requires_table(None));
        assert!(requires_table(Some("")));
        assert!(requires_table(Some("dine-in")));
        assert!(requires_table(Some("dine_in")));
        assert!(requires_table(Some("Dine In")));
    }

    #[test]
    fn other_channels_do_not() {
        assert!(!requires_table(Some("takeaway")));
        assert!(!requires_table(Some("delivery")));
        assert!(!requires_table(Some("drive-through")));
    }

    #[test]
    fn label_keys_match_across_spellings() {
        for raw in ["3", "table 3", "Table no. 3", "#3", "Bàn 3", "ban3"] {
            assert_eq!(normalize_label(raw), "3", "label '{raw}'");
        }
    }

    #[test]
    fn label_keys_keep_distinct_tables_distinct() {
        assert_ne!(normalize_label("table 3"), normalize_label("table 13"));
        assert_ne!(normalize_label("1"), normalize_label("11"));
    }

    #[test]
    fn resolves_by_number_or_display_name() {
        let rows = vec![table("1", false, None), table("2", false, None)];
        assert_eq!(resolve_label(&rows, "Bàn 2").unwrap().number, "2");
        assert_eq!(resolve_label(&rows, "#1").unwrap().number, "1");
        assert!(resolve_label(&rows, "9").is_none());
    }

    #[test]
    fn first_free_skips_occupied_tables() {
        let rows = vec![
            table("1", true, Some(7)),
            table("2", false, None),
            table("3", false, None),
        ];
        assert_eq!(first_free(&rows).unwrap().number, "2");
    }

    #[test]
    fn first_free_none_when_full() {
        let rows = vec![table("1", true, Some(7)), table("2", true, Some(8))];
        assert!(first_free(&rows).is_none());
    }
}
