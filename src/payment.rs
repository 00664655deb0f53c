//! Payment gate in front of the convert action.
//!
//! Only a boolean access check and a price quote matter to the rest of the
//! crate; [`MockCheckout`] simulates a hosted checkout that always succeeds.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::utils::PixelshiftResult;

/// A checkout session created for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
    pub amount_cents: u64,
}

#[async_trait]
pub trait PaymentGate: Send + Sync {
    /// Whether conversions are currently paid for.
    fn has_access(&self) -> bool;

    fn quote_cents(&self, image_count: usize) -> u64;

    /// Runs a checkout for `image_count` images and grants access on success.
    async fn authorize(&self, image_count: usize) -> PixelshiftResult<CheckoutSession>;
}

/// Renders cents as a dollar amount with two decimals (`150` -> `1.50`).
pub fn format_price(amount_cents: u64) -> String {
    format!("{}.{:02}", amount_cents / 100, amount_cents % 100)
}

/// Simulated checkout: waits `delay`, then grants access for the rest of the process.
pub struct MockCheckout {
    price_per_image_cents: u64,
    delay: Duration,
    access: AtomicBool,
    session: Mutex<Option<String>>,
}

impl MockCheckout {
    pub fn new(price_per_image_cents: u64, delay: Duration) -> Self {
        Self {
            price_per_image_cents,
            delay,
            access: AtomicBool::new(false),
            session: Mutex::new(None),
        }
    }

    /// Pre-authorized gate, for tools that should never prompt.
    pub fn granted() -> Self {
        let gate = Self::new(0, Duration::ZERO);
        gate.access.store(true, Ordering::SeqCst);
        gate
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_access(&self) {
        self.access.store(false, Ordering::SeqCst);
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[async_trait]
impl PaymentGate for MockCheckout {
    fn has_access(&self) -> bool {
        self.access.load(Ordering::SeqCst)
    }

    fn quote_cents(&self, image_count: usize) -> u64 {
        image_count as u64 * self.price_per_image_cents
    }

    async fn authorize(&self, image_count: usize) -> PixelshiftResult<CheckoutSession> {
        let amount_cents = self.quote_cents(image_count);
        let session_id = format!("cs_demo_{}", Utc::now().timestamp_millis());
        let session = CheckoutSession {
            checkout_url: format!("https://checkout.example.invalid/pay/demo#{image_count}"),
            session_id,
            amount_cents,
        };
        debug!("Created checkout session {} for ${}", session.session_id, format_price(amount_cents));

        tokio::time::sleep(self.delay).await;

        self.access.store(true, Ordering::SeqCst);
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.session_id.clone());
        info!("Checkout {} completed", session.session_id);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_render_with_cents() {
        assert_eq!(format_price(100), "1.00");
        assert_eq!(format_price(250), "2.50");
        assert_eq!(format_price(5), "0.05");
    }

    #[tokio::test]
    async fn checkout_grants_access_until_cleared() {
        let gate = MockCheckout::new(100, Duration::ZERO);
        assert!(!gate.has_access());
        assert_eq!(gate.quote_cents(3), 300);

        let session = gate.authorize(3).await.unwrap();
        assert!(session.session_id.starts_with("cs_demo_"));
        assert_eq!(session.amount_cents, 300);
        assert!(gate.has_access());
        assert_eq!(gate.session_id(), Some(session.session_id));

        gate.clear_access();
        assert!(!gate.has_access());
        assert_eq!(gate.session_id(), None);
    }
}
