//! Cost-aware routing: model selection, cache short-circuit, retries.

use crate::backend::{CompletionRequest, ModelBackend};
use crate::cache::{cache_key, CachedResponse, ResponseCache};
use crate::complexity::ComplexityScorer;
use crate::cost::{compute_cost, CostLedger, CostRecord};
use crate::error::{GatewayError, Result};
use caduceus_core::config::{PricingConfig, RoutingConfig, UpstreamConfig};
use caduceus_core::{PipelineConfig, RequestId, Timestamp, UserRole};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of routing and executing one request.
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    /// The response text (still containing placeholders)
    pub text: String,

    /// Model that was routed to
    pub model: String,

    /// Complexity score that drove the choice
    pub complexity: f64,

    /// Whether the response came from the cache
    pub cache_hit: bool,

    /// Cost of this call in USD (zero on cache hit)
    pub cost_usd: f64,

    /// Input tokens consumed (zero on cache hit)
    pub input_tokens: u32,

    /// Output tokens generated (zero on cache hit)
    pub output_tokens: u32,
}

/// Routes requests to the cheapest adequate model, serving repeats from
/// the response cache and recording every call in the cost ledger.
pub struct CostRouter {
    backend: Arc<dyn ModelBackend>,
    cache: ResponseCache,
    scorer: ComplexityScorer,
    routing: RoutingConfig,
    pricing: PricingConfig,
    upstream: UpstreamConfig,
    ledger: CostLedger,
}

impl CostRouter {
    /// Create a router over a backend using the pipeline configuration.
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            cache: ResponseCache::new(&config.cache),
            scorer: ComplexityScorer::new(config.routing.clone()),
            routing: config.routing.clone(),
            pricing: config.pricing.clone(),
            upstream: config.upstream.clone(),
            ledger: CostLedger::new(),
        }
    }

    /// Select the model for a message and role.
    ///
    /// Patients are always served by the cheap model; clinician and admin
    /// queries escalate to the capable model once complexity crosses the
    /// routing threshold. Returns the model and the complexity score.
    #[must_use]
    pub fn select_model(&self, message: &str, role: UserRole) -> (String, f64) {
        let complexity = self.scorer.score(message);

        let model = match role {
            UserRole::Patient => self.routing.cheap_model.clone(),
            UserRole::Clinician | UserRole::Admin => {
                if complexity >= self.routing.complexity_threshold {
                    self.routing.capable_model.clone()
                } else {
                    self.routing.cheap_model.clone()
                }
            }
        };

        (model, complexity)
    }

    /// Estimate the cost of serving `message` before calling the backend.
    ///
    /// Used by admission control: a rough token estimate (four characters
    /// per input token, a capped output allowance) priced at the selected
    /// model's rates.
    #[must_use]
    pub fn estimate_cost(&self, message: &str, role: UserRole) -> f64 {
        let (model, _) = self.select_model(message, role);
        #[allow(clippy::cast_possible_truncation)]
        let input_tokens = (message.len() / 4).min(u32::MAX as usize) as u32;
        compute_cost(&self.pricing, &model, input_tokens, 500)
    }

    /// Route and execute a request: serve from cache or call the backend
    /// with bounded retries, then price and record the call.
    ///
    /// # Errors
    /// Returns error only after exhausting retries against the backend.
    pub async fn execute(
        &self,
        request_id: &RequestId,
        message: &str,
        role: UserRole,
    ) -> Result<RoutedResponse> {
        self.execute_at(request_id, message, role, Utc::now()).await
    }

    /// Clock-injected variant of [`execute`](Self::execute).
    pub async fn execute_at(
        &self,
        request_id: &RequestId,
        message: &str,
        role: UserRole,
        now: Timestamp,
    ) -> Result<RoutedResponse> {
        let (model, complexity) = self.select_model(message, role);
        let key = cache_key(message, role, &model);

        if let Some(cached) = self.cache.get_at(&key, now).await {
            tracing::info!(request_id = %request_id, model = %model, "cache hit");
            self.ledger
                .record(CostRecord {
                    request_id: request_id.clone(),
                    model: cached.model.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    cost_usd: 0.0,
                    cache_hit: true,
                    role,
                    timestamp: now,
                })
                .await;

            return Ok(RoutedResponse {
                text: cached.text,
                model: cached.model,
                complexity,
                cache_hit: true,
                cost_usd: 0.0,
                input_tokens: 0,
                output_tokens: 0,
            });
        }

        let request = CompletionRequest::new(message, model.clone());
        let completion = self.call_with_retry(request).await?;

        let cost_usd = compute_cost(
            &self.pricing,
            &model,
            completion.input_tokens,
            completion.output_tokens,
        );

        self.ledger
            .record(CostRecord {
                request_id: request_id.clone(),
                model: model.clone(),
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                cost_usd,
                cache_hit: false,
                role,
                timestamp: now,
            })
            .await;

        self.cache
            .insert_at(
                key,
                CachedResponse {
                    text: completion.text.clone(),
                    model: model.clone(),
                    input_tokens: completion.input_tokens,
                    output_tokens: completion.output_tokens,
                },
                now,
            )
            .await;

        tracing::info!(
            request_id = %request_id,
            model = %model,
            cost_usd,
            complexity,
            "backend call completed"
        );

        Ok(RoutedResponse {
            text: completion.text,
            model,
            complexity,
            cache_hit: false,
            cost_usd,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
        })
    }

    /// The spend ledger.
    #[must_use]
    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    /// The response cache (exposed for maintenance sweeps).
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Call the backend under the configured timeout, retrying transient
    /// failures with capped exponential backoff and jitter.
    async fn call_with_retry(
        &self,
        request: CompletionRequest,
    ) -> Result<crate::backend::ModelCompletion> {
        let attempts = self.upstream.max_retries + 1;
        let timeout = Duration::from_secs(self.upstream.timeout_secs);
        let mut last_error: Option<GatewayError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let base = self.upstream.backoff_base_ms.saturating_mul(1 << (attempt - 1));
                let jitter = rand::thread_rng().gen_range(0..=self.upstream.backoff_base_ms / 2);
                let delay = Duration::from_millis(base + jitter);
                tracing::debug!(attempt, ?delay, "retrying backend call");
                tokio::time::sleep(delay).await;
            }

            let outcome = tokio::time::timeout(timeout, self.backend.complete(request.clone()))
                .await
                .map_err(|_| GatewayError::Timeout {
                    seconds: self.upstream.timeout_secs,
                })
                .and_then(|r| r);

            match outcome {
                Ok(completion) => return Ok(completion),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(attempt, error = %err, "backend call failed, will retry");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(GatewayError::RetriesExhausted {
            attempts,
            last_error: last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelCompletion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Backend that counts calls and echoes the prompt.
    struct MockBackend {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first: 0,
            }
        }

        fn failing_first(n: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first: n,
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelBackend for MockBackend {
        async fn complete(&self, request: CompletionRequest) -> Result<ModelCompletion> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(GatewayError::Api {
                    backend: "mock".to_string(),
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(ModelCompletion {
                text: format!("echo: {}", request.prompt),
                model: request.model,
                input_tokens: 100,
                output_tokens: 50,
            })
        }

        fn backend_id(&self) -> &str {
            "mock"
        }
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.upstream.backoff_base_ms = 1;
        config
    }

    #[test]
    fn test_patient_always_routed_to_cheap_model() {
        let router = CostRouter::new(Arc::new(MockBackend::new()), &config());
        let complex = "What is the differential diagnosis? Is it viral? Really??? \
                       Please include treatment research.";

        let (model, complexity) = router.select_model(complex, UserRole::Patient);
        assert_eq!(model, "gpt-4o-mini");
        assert!(complexity >= 0.5);
    }

    #[test]
    fn test_clinician_escalates_on_complexity() {
        let router = CostRouter::new(Arc::new(MockBackend::new()), &config());

        let (simple_model, _) = router.select_model("quick question", UserRole::Clinician);
        assert_eq!(simple_model, "gpt-4o-mini");

        let complex = "What is the differential diagnosis? Is it viral? Really??? \
                       Please include treatment research.";
        let (complex_model, _) = router.select_model(complex, UserRole::Clinician);
        assert_eq!(complex_model, "gpt-4o");
    }

    #[test]
    fn test_estimate_cost_is_positive_for_priced_model() {
        let router = CostRouter::new(Arc::new(MockBackend::new()), &config());
        let estimate = router.estimate_cost("hello there", UserRole::Patient);
        assert!(estimate > 0.0);
        assert!(estimate < 0.01);
    }

    #[tokio::test]
    async fn test_second_identical_request_hits_cache() {
        let backend = Arc::new(MockBackend::new());
        let router = CostRouter::new(backend.clone(), &config());
        let id = RequestId::generate();

        let first = router
            .execute(&id, "what helps a headache?", UserRole::Patient)
            .await
            .expect("first call");
        assert!(!first.cache_hit);

        let second = router
            .execute(&id, "What helps a  headache?", UserRole::Patient)
            .await
            .expect("second call");
        assert!(second.cache_hit);
        assert_eq!(second.text, first.text);
        assert!(second.cost_usd.abs() < f64::EPSILON);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_expiry_triggers_fresh_call() {
        let backend = Arc::new(MockBackend::new());
        let router = CostRouter::new(backend.clone(), &config());
        let id = RequestId::generate();
        let now = Utc::now();

        router
            .execute_at(&id, "hello", UserRole::Patient, now)
            .await
            .expect("first call");

        let later = now + chrono::Duration::seconds(86_401);
        let third = router
            .execute_at(&id, "hello", UserRole::Patient, later)
            .await
            .expect("post-expiry call");

        assert!(!third.cache_hit);
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let backend = Arc::new(MockBackend::failing_first(2));
        let router = CostRouter::new(backend.clone(), &config());

        let routed = router
            .execute(&RequestId::generate(), "hello", UserRole::Patient)
            .await
            .expect("eventually succeeds");

        assert!(!routed.cache_hit);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted_surfaces_error() {
        let backend = Arc::new(MockBackend::failing_first(10));
        let router = CostRouter::new(backend.clone(), &config());

        let result = router
            .execute(&RequestId::generate(), "hello", UserRole::Patient)
            .await;

        assert!(matches!(result, Err(GatewayError::RetriesExhausted { .. })));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_ledger_records_both_hit_and_miss() {
        let router = CostRouter::new(Arc::new(MockBackend::new()), &config());
        let id = RequestId::generate();

        router
            .execute(&id, "hello", UserRole::Patient)
            .await
            .expect("first");
        router
            .execute(&id, "hello", UserRole::Patient)
            .await
            .expect("second");

        assert_eq!(router.ledger().len().await, 2);
        assert_eq!(router.ledger().cache_hits().await, 1);
        let total = router.ledger().total_cost_usd().await;
        assert!(total > 0.0);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        struct Unauthorized;

        #[async_trait]
        impl ModelBackend for Unauthorized {
            async fn complete(&self, _request: CompletionRequest) -> Result<ModelCompletion> {
                Err(GatewayError::Api {
                    backend: "mock".to_string(),
                    status: 401,
                    message: "bad key".to_string(),
                })
            }

            fn backend_id(&self) -> &str {
                "mock"
            }
        }

        let router = CostRouter::new(Arc::new(Unauthorized), &config());
        let result = router
            .execute(&RequestId::generate(), "hello", UserRole::Patient)
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::Api { status: 401, .. })
        ));
    }
}
