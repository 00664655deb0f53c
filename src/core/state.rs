//! Process-wide application context.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::core::BatchProgress;
use crate::history::{HistoryStore, JsonFileStore};
use crate::host::{LocalHost, MediaHost};
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::payment::{format_price, MockCheckout, PaymentGate};
use crate::processing::{ConversionQueue, ConvertOutcome, FormatConverter, RasterConverter};
use crate::utils::{PixelshiftError, PixelshiftResult};

/// Application context, constructed once per process.
///
/// Owns the shared history store and the collaborators every conversion
/// queue is wired with. Cloning shares the same store.
#[derive(Clone)]
pub struct AppState {
    config: Config,
    history: Arc<Mutex<HistoryStore>>,
    converter: Arc<dyn FormatConverter>,
    host: Arc<dyn MediaHost>,
    notifier: Arc<dyn Notifier>,
    payment: Arc<dyn PaymentGate>,
}

impl AppState {
    /// Creates a context with the production collaborators for `config`.
    pub fn from_config(config: Config) -> Self {
        let history = HistoryStore::open(JsonFileStore::open(&config.history_path));
        let host = LocalHost::new(&config.output_dir);
        let payment = MockCheckout::new(
            config.price_per_image_cents,
            Duration::from_millis(config.checkout_delay_ms),
        );
        debug!("History store at {}", config.history_path.display());

        Self::new(config, history)
            .with_host(Arc::new(host))
            .with_payment(Arc::new(payment))
    }

    /// Creates a context around `history` with default collaborators.
    pub fn new(config: Config, history: HistoryStore) -> Self {
        let host = LocalHost::new(&config.output_dir);
        Self {
            config,
            history: Arc::new(Mutex::new(history)),
            converter: Arc::new(RasterConverter::new()),
            host: Arc::new(host),
            notifier: Arc::new(LogNotifier),
            payment: Arc::new(MockCheckout::granted()),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn FormatConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_host(mut self, host: Arc<dyn MediaHost>) -> Self {
        self.host = host;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_payment(mut self, payment: Arc<dyn PaymentGate>) -> Self {
        self.payment = payment;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> Arc<Mutex<HistoryStore>> {
        self.history.clone()
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn payment(&self) -> &Arc<dyn PaymentGate> {
        &self.payment
    }

    /// Creates an empty queue starting from the configured settings.
    pub fn create_queue(&self) -> PixelshiftResult<ConversionQueue> {
        Ok(ConversionQueue::new(
            self.config.settings()?,
            self.converter.clone(),
            self.history.clone(),
            self.host.clone(),
            self.notifier.clone(),
        ))
    }

    /// Runs the payment gate when needed, then converts everything eligible.
    pub async fn pay_and_convert(&self, queue: &ConversionQueue) -> PixelshiftResult<ConvertOutcome> {
        self.pay_and_convert_with_progress(queue, |_| {}).await
    }

    pub async fn pay_and_convert_with_progress(
        &self,
        queue: &ConversionQueue,
        progress: impl FnMut(BatchProgress) + Send,
    ) -> PixelshiftResult<ConvertOutcome> {
        let count = queue.len().await;
        if count == 0 {
            return Ok(ConvertOutcome::NothingToConvert);
        }

        if !self.payment.has_access() {
            let price = format_price(self.payment.quote_cents(count));
            self.notifier.notify(Notice::payment_processing(&price, count));

            match self.payment.authorize(count).await {
                Ok(session) => {
                    info!("Payment {} accepted", session.session_id);
                    self.notifier.notify(Notice::payment_succeeded());
                }
                Err(e) => {
                    self.notifier.notify(Notice::payment_failed());
                    return Err(PixelshiftError::payment(e.to_string()));
                }
            }
        }

        Ok(queue.convert_all_with_progress(progress).await)
    }
}
