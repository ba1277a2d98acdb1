//! Auction order data model and Dutch-auction price curve

use crate::chain::{ChainId, OrderId};
use crate::commitment::Commitment;

use serde::{Deserialize, Serialize};

/// A decaying-price order for a cross-chain swap
///
/// Immutable once registered; archived when fully filled or expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    /// Ledger the maker's funds are escrowed on
    pub src_chain: ChainId,
    /// Ledger the maker wants funds on
    pub dst_chain: ChainId,
    pub maker: String,
    /// Asset escrowed by the maker on the source ledger
    pub src_token: String,
    /// Asset the maker is owed on the destination ledger
    pub dst_token: String,
    /// Auction window start (source-chain time)
    pub start_time: u64,
    /// Auction window end; the price sits at the reserve from here on
    pub end_time: u64,
    pub start_price: u128,
    pub reserve_price: u128,
    /// Total fillable quantity
    pub total_amount: u128,
    pub commitment: Commitment,
}

impl Order {
    /// Current Dutch-auction price under linear decay.
    ///
    /// Monotonically non-increasing in `now` and bounded to
    /// `[reserve_price, start_price]`.
    pub fn current_price(&self, now: u64) -> u128 {
        let elapsed = now.saturating_sub(self.start_time) as u128;
        let duration = self.end_time.saturating_sub(self.start_time) as u128;
        if duration == 0 || elapsed >= duration {
            return self.reserve_price;
        }

        let price_diff = self.start_price - self.reserve_price;
        self.start_price - price_diff * elapsed / duration
    }

    /// Validate the bounds the order book relies on
    pub fn validate(&self) -> Result<(), String> {
        if self.total_amount == 0 {
            return Err("total_amount must be greater than zero".to_string());
        }
        if self.start_price < self.reserve_price {
            return Err("start_price must be at least reserve_price".to_string());
        }
        if self.end_time < self.start_time {
            return Err("end_time precedes start_time".to_string());
        }
        Ok(())
    }
}

/// An accepted fill of one order slice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub resolver: String,
    pub amount: u128,
    /// Leaf digest that authorized this fill
    pub secret_digest: [u8; 32],
    /// Source-chain time the fill was accepted
    pub filled_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::keccak256;

    fn order(start_price: u128, reserve_price: u128, start_time: u64, end_time: u64) -> Order {
        Order {
            order_id: [1u8; 32],
            src_chain: 1,
            dst_chain: 2,
            maker: "maker".to_string(),
            src_token: "0xtoken".to_string(),
            dst_token: "uatom".to_string(),
            start_time,
            end_time,
            start_price,
            reserve_price,
            total_amount: 100,
            commitment: Commitment::HashLock(keccak256(b"s")),
        }
    }

    #[test]
    fn test_linear_decay_scenario() {
        let order = order(100, 10, 0, 100);
        assert_eq!(order.current_price(0), 100);
        assert_eq!(order.current_price(50), 55);
        assert_eq!(order.current_price(100), 10);
        assert_eq!(order.current_price(150), 10);
    }

    #[test]
    fn test_price_bounds_and_monotonicity() {
        let order = order(1_000_000, 37, 500, 12_345);

        // Before the window the price holds at the start price
        assert_eq!(order.current_price(0), order.start_price);

        let mut last = u128::MAX;
        for now in (0..15_000).step_by(7) {
            let price = order.current_price(now);
            assert!(price <= order.start_price);
            assert!(price >= order.reserve_price);
            assert!(price <= last);
            last = price;
        }
        assert_eq!(order.current_price(u64::MAX), order.reserve_price);
    }

    #[test]
    fn test_degenerate_window_sits_at_reserve() {
        let order = order(100, 10, 50, 50);
        assert_eq!(order.current_price(49), 10);
        assert_eq!(order.current_price(50), 10);
    }

    #[test]
    fn test_validation() {
        assert!(order(100, 10, 0, 100).validate().is_ok());
        assert!(order(5, 10, 0, 100).validate().is_err());
        assert!(order(100, 10, 100, 0).validate().is_err());

        let mut zero_amount = order(100, 10, 0, 100);
        zero_amount.total_amount = 0;
        assert!(zero_amount.validate().is_err());
    }
}
