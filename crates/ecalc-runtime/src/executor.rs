//! Guarded formula execution
//!
//! Wraps resolver calls with the operational policies that protect the
//! service from untrusted formula text: a per-caller rate limit and a
//! per-call deadline. Results come back as an [`ExecutionOutcome`], the
//! envelope the admin "test formula" view displays.

use std::sync::Arc;
use std::time::Instant;

use ecalc_model::{Catalog, FieldValues, Value};
use ecalc_resolver::{Resolver, ResolverConfig};
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, ExecutionConfig};
use crate::error::ExecutionError;
use crate::rate_limit::RateLimiter;

/// What to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionRequest {
    /// Resolve a template
    Template(String),
    /// Resolve a stored formula by name
    Formula(String),
    /// Resolve a template and format it for display
    Render(String),
}

/// Structured result of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    /// Whether a result was produced
    pub success: bool,
    /// Resolved value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Wall-clock time in milliseconds
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
}

impl ExecutionOutcome {
    fn from_result(result: Result<Value, ExecutionError>, started: Instant) -> Self {
        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(value) => Self {
                success: true,
                result: Some(value),
                error: None,
                error_kind: None,
                execution_time_ms,
            },
            Err(err) => Self {
                success: false,
                result: None,
                error: Some(err.to_string()),
                error_kind: Some(err.kind().to_string()),
                execution_time_ms,
            },
        }
    }
}

/// Runs resolver calls under a deadline and rate limit
pub struct FormulaExecutor {
    catalog: Arc<dyn Catalog>,
    resolver: ResolverConfig,
    execution: ExecutionConfig,
    limiter: RateLimiter,
}

impl std::fmt::Debug for FormulaExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaExecutor")
            .field("resolver", &self.resolver)
            .field("execution", &self.execution)
            .field("callers", &self.limiter.len())
            .finish_non_exhaustive()
    }
}

impl FormulaExecutor {
    /// Create executor over `catalog`
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, config: &EngineConfig) -> Self {
        Self {
            catalog,
            resolver: config.resolver,
            execution: config.execution,
            limiter: RateLimiter::per_minute(config.execution.rate_limit_per_minute),
        }
    }

    /// Get rate limiter
    #[inline]
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Execute a request for `caller`
    ///
    /// The resolver runs on the blocking pool. When the deadline passes the
    /// caller gets [`ExecutionError::Timeout`] at once; the worker is left to
    /// finish and its result is dropped.
    ///
    /// # Errors
    /// Returns rate-limit, timeout, resolution or worker failures
    pub async fn execute(
        &self,
        caller: &str,
        request: ExecutionRequest,
        fields: FieldValues,
    ) -> Result<Value, ExecutionError> {
        if let Err(retry_after) = self.limiter.check(caller) {
            tracing::warn!("Rate limit exceeded for {}", caller);
            return Err(ExecutionError::RateLimited {
                caller: caller.to_string(),
                retry_after,
            });
        }

        let catalog = Arc::clone(&self.catalog);
        let config = self.resolver;
        let task = tokio::task::spawn_blocking(move || {
            let resolver = Resolver::new(catalog.as_ref()).with_config(config);
            match &request {
                ExecutionRequest::Template(text) => resolver.resolve(text, &fields),
                ExecutionRequest::Formula(name) => resolver.resolve_formula(name, &fields),
                ExecutionRequest::Render(text) => resolver.render(text, &fields).map(Value::Text),
            }
        });

        let limit = self.execution.timeout();
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join)) => Err(ExecutionError::Join(join.to_string())),
            Err(_) => {
                tracing::warn!("Execution for {} exceeded {}ms", caller, limit.as_millis());
                Err(ExecutionError::Timeout { limit })
            }
        }
    }

    /// Execute and wrap the result in an outcome envelope
    pub async fn run(
        &self,
        caller: &str,
        request: ExecutionRequest,
        fields: FieldValues,
    ) -> ExecutionOutcome {
        let started = Instant::now();
        let result = self.execute(caller, request, fields).await;
        let outcome = ExecutionOutcome::from_result(result, started);
        tracing::info!(
            "Execution for {} finished in {}ms (success: {})",
            caller,
            outcome.execution_time_ms,
            outcome.success
        );
        outcome
    }

    /// Run the stored formula `name`, as the admin "test formula" action does
    pub async fn test_formula(
        &self,
        caller: &str,
        name: &str,
        fields: FieldValues,
    ) -> ExecutionOutcome {
        self.run(caller, ExecutionRequest::Formula(name.to_string()), fields)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecalc_model::{CatalogSnapshot, Formula, MemoryCatalog};
    use ecalc_test_utils::{energy_catalog, sample_submission};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn executor(config: &EngineConfig) -> FormulaExecutor {
        FormulaExecutor::new(Arc::new(energy_catalog()), config)
    }

    #[tokio::test]
    async fn successful_outcome() {
        let exec = executor(&EngineConfig::default());
        let outcome = exec
            .run(
                "admin",
                ExecutionRequest::Template("round([calc:annual_savings])".into()),
                sample_submission(),
            )
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.result, Some(Value::Number(1440.0)));
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn failure_outcome_carries_kind() {
        let exec = executor(&EngineConfig::default());
        let fields = sample_submission().with("heating_type", "electric");
        let outcome = exec.test_formula("admin", "heating_cost", fields).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("lookup_miss"));
        assert!(outcome.error.unwrap().contains("heating_rate"));
    }

    #[tokio::test]
    async fn outcome_serializes_camel_case() {
        let exec = executor(&EngineConfig::default());
        let outcome = exec
            .run("admin", ExecutionRequest::Template("1 / 0".into()), FieldValues::new())
            .await;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "division by zero");
        assert_eq!(json["errorKind"], "division_by_zero");
        assert!(json["executionTime"].is_u64());
        assert!(json.get("result").is_none());
    }

    #[tokio::test]
    async fn render_request_returns_text() {
        let exec = executor(&EngineConfig::default());
        let value = exec
            .execute(
                "admin",
                ExecutionRequest::Render("CO2: [calc:co2_reduction] t".into()),
                sample_submission(),
            )
            .await
            .unwrap();
        assert_eq!(value, Value::from("CO2: 3.19 t"));
    }

    #[tokio::test]
    async fn rate_limit_rejects_excess_calls() {
        let exec = executor(&EngineConfig::default().with_rate_limit(2));
        let request = || ExecutionRequest::Template("1 + 1".into());

        assert!(exec.execute("a", request(), FieldValues::new()).await.is_ok());
        assert!(exec.execute("a", request(), FieldValues::new()).await.is_ok());
        let err = exec
            .execute("a", request(), FieldValues::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "rate_limited");

        // Other callers are unaffected
        assert!(exec.execute("b", request(), FieldValues::new()).await.is_ok());
    }

    #[tokio::test]
    async fn shared_subformulas_resolve_once() {
        let mut snapshot = CatalogSnapshot::new().with_formula(Formula::new("f0", "1"));
        for i in 1..30 {
            let text = format!("[calc:f{0}] + [calc:f{0}]", i - 1);
            snapshot = snapshot.with_formula(Formula::new(format!("f{i}"), text));
        }
        let catalog = MemoryCatalog::from_snapshot(snapshot).unwrap();
        let exec = FormulaExecutor::new(Arc::new(catalog), &EngineConfig::default());

        let value = exec
            .execute("a", ExecutionRequest::Formula("f29".into()), FieldValues::new())
            .await
            .unwrap();
        assert_eq!(value, Value::Number(f64::from(1u32 << 29)));
    }

    /// Catalog whose reads stall, standing in for a pathological formula
    struct Stalling(MemoryCatalog);

    impl Catalog for Stalling {
        fn formula(&self, name: &str) -> Option<&Formula> {
            std::thread::sleep(Duration::from_millis(300));
            self.0.formula(name)
        }

        fn lookup(&self, name: &str) -> Option<&ecalc_model::FormulaLookup> {
            self.0.lookup(name)
        }

        fn card_field(&self, name: &str) -> Option<&ecalc_model::CardField> {
            self.0.card_field(name)
        }
    }

    #[tokio::test]
    async fn deadline_bounds_slow_resolution() {
        let config = EngineConfig::default().with_timeout(Duration::from_millis(20));
        let exec = FormulaExecutor::new(Arc::new(Stalling(energy_catalog())), &config);

        let outcome = exec
            .test_formula("admin", "annual_savings", sample_submission())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("timeout"));
        assert!(outcome.execution_time_ms < 300);
    }

    #[tokio::test]
    async fn pathological_nesting_is_reported_not_fatal() {
        let exec = executor(&EngineConfig::default());
        let text = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        let outcome = exec
            .run("admin", ExecutionRequest::Template(text), FieldValues::new())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("syntax_error"));
    }
}
