//! Multi-leg order execution and bounded position waits.

use crate::error::{Result, TradingError};
use crate::exchange::{Order, TradingGateway};
use crate::strategy::trade::Leg;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Submit `legs` as market orders, in order.
///
/// If a leg fails after earlier legs filled, the filled legs are offset
/// (newest first) before `PartialExecution` is returned, so the caller never
/// holds a half-built hedge. A failure of the first leg is returned as-is.
pub async fn execute_legs(gateway: &dyn TradingGateway, legs: &[Leg]) -> Result<Vec<Order>> {
    let mut filled: Vec<Order> = Vec::with_capacity(legs.len());

    for (index, leg) in legs.iter().enumerate() {
        match gateway.market_order(&leg.ticker, leg.side, leg.quantity).await {
            Ok(order) => {
                info!(
                    ticker = %leg.ticker,
                    side = %leg.side,
                    quantity = %leg.quantity,
                    order_id = order.order_id,
                    leg = index + 1,
                    total = legs.len(),
                    "Leg submitted"
                );
                filled.push(order);
            }
            Err(e) if index == 0 => return Err(e),
            Err(e) => {
                error!(
                    ticker = %leg.ticker,
                    leg = index + 1,
                    total = legs.len(),
                    error = %e,
                    "Leg failed - offsetting filled legs"
                );
                unwind(gateway, &legs[..index]).await;
                return Err(TradingError::PartialExecution {
                    completed: index,
                    total: legs.len(),
                    source: Box::new(e),
                });
            }
        }
    }

    Ok(filled)
}

/// Best-effort reversal of already-filled legs.
pub async fn unwind(gateway: &dyn TradingGateway, legs: &[Leg]) {
    for leg in legs.iter().rev() {
        let reverse = leg.reversed();
        if let Err(e) = gateway
            .market_order(&reverse.ticker, reverse.side, reverse.quantity)
            .await
        {
            error!(
                ticker = %reverse.ticker,
                side = %reverse.side,
                quantity = %reverse.quantity,
                error = %e,
                "CRITICAL: failed to offset filled leg"
            );
        }
    }
}

/// Polling cadence and upper bound for position waits.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

/// Result of a bounded wait.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Reached(Decimal),
    TimedOut { last_seen: Decimal },
}

/// Poll `ticker` until its position is at least `target`, or give up after
/// `policy.max_wait`.
pub async fn wait_for_position(
    gateway: &dyn TradingGateway,
    ticker: &str,
    target: Decimal,
    policy: WaitPolicy,
) -> Result<WaitOutcome> {
    let deadline = Instant::now() + policy.max_wait;

    loop {
        let position = gateway.get_position(ticker).await?;
        if position >= target {
            debug!(%ticker, %position, %target, "Position reached");
            return Ok(WaitOutcome::Reached(position));
        }
        if Instant::now() >= deadline {
            warn!(%ticker, %position, %target, "Timed out waiting for position");
            return Ok(WaitOutcome::TimedOut { last_seen: position });
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{MockExchange, OrderSide};
    use rust_decimal_macros::dec;

    fn quick_wait() -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_execute_legs_in_order() {
        let exchange = MockExchange::new();
        let legs = vec![
            Leg::new("CL", OrderSide::Buy, dec!(30)),
            Leg::new("CL-2F", OrderSide::Sell, dec!(30)),
        ];
        let orders = execute_legs(&exchange, &legs).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].ticker, "CL");
        assert_eq!(exchange.position("CL").await, dec!(30));
        assert_eq!(exchange.position("CL-2F").await, dec!(-30));
    }

    #[tokio::test]
    async fn test_partial_failure_offsets_filled_legs() {
        let exchange = MockExchange::new();
        exchange.fail_order_at(3).await;
        let legs = vec![Leg::new("CL-2F", OrderSide::Buy, dec!(11)); 3];

        let err = execute_legs(&exchange, &legs).await.unwrap_err();
        match err {
            TradingError::PartialExecution { completed, total, .. } => {
                assert_eq!(completed, 2);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(exchange.position("CL-2F").await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_first_leg_failure_is_plain_error() {
        let exchange = MockExchange::new();
        exchange.fail_order_at(1).await;
        let legs = vec![Leg::new("CL", OrderSide::Buy, dec!(10))];
        let err = execute_legs(&exchange, &legs).await.unwrap_err();
        assert!(matches!(err, TradingError::Transient { .. }));
        assert_eq!(exchange.submitted_orders().await.len(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_position_reached() {
        let exchange = MockExchange::new();
        exchange.set_position("CL", dec!(100)).await;
        let outcome = wait_for_position(&exchange, "CL", dec!(100), quick_wait())
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Reached(dec!(100)));
    }

    #[tokio::test]
    async fn test_wait_for_position_times_out() {
        let exchange = MockExchange::new();
        exchange.set_position("CL-NYC", dec!(40)).await;
        let outcome = wait_for_position(&exchange, "CL-NYC", dec!(100), quick_wait())
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut { last_seen: dec!(40) });
    }
}
