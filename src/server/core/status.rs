//! Order status state machine.
//!
//! The transition graph and the alias table are deliberately separate
//! pieces of data: teaching the system a new human-readable label never
//! touches transition logic.

use crate::server::core::error::{CoreError, CoreResult};
use crate::server::util::text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OrderStatus {
    Pending,
    Confirmed,
    SentToKitchen,
    Processing,
    Completed,
    Served,
    Cancelled,
}

impl OrderStatus {
    pub(crate) const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::SentToKitchen,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Served,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::SentToKitchen => "sent_to_kitchen",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Served => "served",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Legal targets from this state. Self-transitions are not listed:
    /// re-applying the current status is always a no-op success.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::SentToKitchen, OrderStatus::Cancelled],
            OrderStatus::SentToKitchen => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderStatus::Completed => &[OrderStatus::Served],
            OrderStatus::Served => &[],
            OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition(self, to: OrderStatus) -> bool {
        self == to || self.allowed_targets().contains(&to)
    }

    /// Terminal states never hold a table.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Served | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Folded label -> canonical status. Canonical tokens first, then the
/// display labels the staff and kitchen apps send.
const ALIASES: &[(&str, OrderStatus)] = &[
    ("pending", OrderStatus::Pending),
    ("cho xac nhan", OrderStatus::Pending),
    ("cho nhan vien", OrderStatus::Pending),
    ("confirmed", OrderStatus::Confirmed),
    ("da xac nhan", OrderStatus::Confirmed),
    ("sent_to_kitchen", OrderStatus::SentToKitchen),
    ("sent to kitchen", OrderStatus::SentToKitchen),
    ("cho bep", OrderStatus::SentToKitchen),
    ("chua xu ly", OrderStatus::SentToKitchen),
    ("processing", OrderStatus::Processing),
    ("dang xu ly", OrderStatus::Processing),
    ("bep dang lam", OrderStatus::Processing),
    ("completed", OrderStatus::Completed),
    ("hoan thanh", OrderStatus::Completed),
    ("served", OrderStatus::Served),
    ("da phuc vu", OrderStatus::Served),
    ("cancelled", OrderStatus::Cancelled),
    ("canceled", OrderStatus::Cancelled),
    ("da huy", OrderStatus::Cancelled),
];

/// Resolve a raw status token: trimmed, case/diacritic-insensitive, alias
/// aware. Unknown tokens are a validation failure.
pub(crate) fn normalize(raw: &str) -> CoreResult<OrderStatus> {
    let folded = text::fold(raw);
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == folded)
        .map(|(_, status)| *status)
        .ok_or_else(|| CoreError::validation(format!("invalid status: '{}'", raw.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_targets(from: OrderStatus) -> Vec<OrderStatus> {
        use OrderStatus::*;
        match from {
            Pending => vec![Confirmed, Cancelled],
            Confirmed => vec![SentToKitchen, Cancelled],
            SentToKitchen => vec![Processing, Cancelled],
            Processing => vec![Completed, Cancelled],
            Completed => vec![Served],
            Served => vec![],
            Cancelled => vec![],
        }
    }

    #[test]
    fn transition_matrix_matches_graph() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let legal = from == to || expected_targets(from).contains(&to);
                assert_eq!(
                    from.can_transition(to),
                    legal,
                    "{from} -> {to} legality mismatch"
                );
            }
        }
    }

    #[test]
    fn self_transition_is_always_allowed() {
        for status in OrderStatus::ALL {
            assert!(status.can_transition(status));
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(OrderStatus::Served.allowed_targets().is_empty());
        assert!(OrderStatus::Cancelled.allowed_targets().is_empty());
        assert!(!OrderStatus::Served.can_transition(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition(OrderStatus::Pending));
    }

    #[test]
    fn skipping_a_stage_is_illegal() {
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Processing));
        assert!(!OrderStatus::Confirmed.can_transition(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.can_transition(OrderStatus::Cancelled));
    }

    #[test]
    fn normalizes_canonical_tokens() {
        for status in OrderStatus::ALL {
            assert_eq!(normalize(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn normalizes_case_and_padding() {
        assert_eq!(
            normalize("  Sent_To_Kitchen ").unwrap(),
            OrderStatus::SentToKitchen
        );
        assert_eq!(normalize("PENDING").unwrap(), OrderStatus::Pending);
    }

    #[test]
    fn normalizes_display_labels() {
        assert_eq!(normalize("Đã phục vụ").unwrap(), OrderStatus::Served);
        assert_eq!(normalize("đã huỷ").unwrap(), OrderStatus::Cancelled);
        assert_eq!(normalize("Chờ xác nhận").unwrap(), OrderStatus::Pending);
        assert_eq!(normalize("bếp đang làm").unwrap(), OrderStatus::Processing);
        assert_eq!(normalize("hoàn thành").unwrap(), OrderStatus::Completed);
    }

    #[test]
    fn unknown_token_is_a_validation_error() {
        let err = normalize("shipped").unwrap_err();
        assert!(matches!(
            err,
            crate::server::core::error::CoreError::Validation { .. }
        ));
    }
}
