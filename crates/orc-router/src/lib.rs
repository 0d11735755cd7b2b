#![forbid(unsafe_code)]
//! Pure routing decision function (spec §4.6): `route(task, catalog,
//! budget_state) -> (provider, method) | NoProvider`.
//!
//! No single analog beyond its general "resolve-then-dispatch"
//! shape — `builder::resolve_cli_overrides` in the codex wrapper workspace
//! resolves a final config from several override layers without side
//! effects, the same shape `route` uses to resolve a final `(provider,
//! method)` from several gates. The function takes no lock, performs no
//! I/O, and does not consult live pool state, matching spec §9 "Router
//! purity".

use orc_config::RoutingConfig;
use orc_types::{ComplexityHint, Provider, ProviderCatalog, ProviderKind, TaskSpec, WorkerMethod};

/// Remaining global budget available to the router's budget gate. Caller
/// (`orc-manager`) tracks spend and passes the current remainder in; the
/// router never mutates or persists it (spec §9 "Global mutable state: none
/// is required").
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BudgetState {
    pub remaining_budget_usd: Option<f64>,
}

/// The provider/method pair a successful `route` call resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub provider: String,
    pub method: WorkerMethod,
    pub estimated_cost_usd: f64,
}

/// `route` plus a short human-readable rationale (spec §4.6 `recommend`).
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub decision: Option<RouteDecision>,
    pub rationale: String,
}

fn default_kind_for_complexity(hint: ComplexityHint) -> ProviderKind {
    match hint {
        ComplexityHint::Trivial | ComplexityHint::Simple => ProviderKind::ApiOpenaiCompat,
        ComplexityHint::Moderate => ProviderKind::Cli,
        ComplexityHint::Complex => ProviderKind::Acp,
    }
}

fn preferred_kind(task: &TaskSpec, routing: &RoutingConfig) -> ProviderKind {
    routing
        .complexity_kind
        .get(&task.complexity_hint)
        .copied()
        .unwrap_or_else(|| default_kind_for_complexity(task.complexity_hint))
}

fn passes_context_gate(task: &TaskSpec, provider: &Provider) -> bool {
    task.estimated_tokens <= provider.context_window
}

fn estimated_cost(task: &TaskSpec, provider: &Provider) -> f64 {
    provider.estimated_cost(task.estimated_tokens, task.default_expected_output_tokens())
}

fn passes_budget_gate(task: &TaskSpec, provider: &Provider, budget: &BudgetState) -> bool {
    let cost = estimated_cost(task, provider);
    if let Some(max_cost) = task.max_cost {
        if cost > max_cost {
            return false;
        }
    }
    if let Some(remaining) = budget.remaining_budget_usd {
        if cost > remaining {
            return false;
        }
    }
    true
}

/// A kind matching the complexity preference is treated as a different kind
/// than the one ultimately chosen when nothing matches (api-anthropic and
/// api-openai-compat both satisfy an "api" preference).
fn matches_preference(kind: ProviderKind, preference: ProviderKind) -> bool {
    match preference {
        ProviderKind::ApiOpenaiCompat | ProviderKind::ApiAnthropic => {
            matches!(kind, ProviderKind::ApiOpenaiCompat | ProviderKind::ApiAnthropic)
        }
        other => kind == other,
    }
}

fn pick_cheapest<'a>(
    task: &TaskSpec,
    candidates: &[&'a Provider],
) -> Option<&'a Provider> {
    candidates
        .iter()
        .copied()
        .min_by(|a, b| {
            let cost_a = estimated_cost(task, a);
            let cost_b = estimated_cost(task, b);
            cost_a
                .partial_cmp(&cost_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        })
}

/// Resolves `task` against `catalog` and `budget` to a single provider and
/// method, or `None` (`NoProvider`) if every candidate is filtered out.
pub fn route(
    task: &TaskSpec,
    catalog: &ProviderCatalog,
    routing: &RoutingConfig,
    budget: &BudgetState,
) -> Option<RouteDecision> {
    if let Some(preferred_name) = &task.preferred_provider {
        if let Some(provider) = catalog.get(preferred_name) {
            if passes_budget_gate(task, provider, budget) {
                return Some(RouteDecision {
                    provider: provider.name.clone(),
                    method: provider.kind.preferred_method(),
                    estimated_cost_usd: estimated_cost(task, provider),
                });
            }
        }
    }

    let context_ok: Vec<&Provider> = catalog
        .iter()
        .filter(|p| passes_context_gate(task, p))
        .collect();

    let preference = preferred_kind(task, routing);
    let preferred_candidates: Vec<&Provider> = context_ok
        .iter()
        .copied()
        .filter(|p| matches_preference(p.kind, preference))
        .collect();
    let pool = if preferred_candidates.is_empty() {
        context_ok
    } else {
        preferred_candidates
    };

    let budget_ok: Vec<&Provider> = pool
        .into_iter()
        .filter(|p| passes_budget_gate(task, p, budget))
        .collect();

    let winner = pick_cheapest(task, &budget_ok)?;
    Some(RouteDecision {
        provider: winner.name.clone(),
        method: winner.kind.preferred_method(),
        estimated_cost_usd: estimated_cost(task, winner),
    })
}

/// Like [`route`], but restricted to providers whose preferred method is
/// `method` rather than following the complexity→kind preference. Used when
/// a caller pins the transport (spec §4.8 `spawn(task, method)`) while still
/// wanting the cheapest-candidate tie-break and the context/budget gates.
pub fn route_with_method(
    task: &TaskSpec,
    catalog: &ProviderCatalog,
    budget: &BudgetState,
    method: WorkerMethod,
) -> Option<RouteDecision> {
    if let Some(preferred_name) = &task.preferred_provider {
        if let Some(provider) = catalog.get(preferred_name) {
            if provider.kind.preferred_method() == method && passes_budget_gate(task, provider, budget) {
                return Some(RouteDecision {
                    provider: provider.name.clone(),
                    method,
                    estimated_cost_usd: estimated_cost(task, provider),
                });
            }
        }
    }

    let candidates: Vec<&Provider> = catalog
        .iter()
        .filter(|p| passes_context_gate(task, p) && p.kind.preferred_method() == method)
        .filter(|p| passes_budget_gate(task, p, budget))
        .collect();

    let winner = pick_cheapest(task, &candidates)?;
    Some(RouteDecision {
        provider: winner.name.clone(),
        method,
        estimated_cost_usd: estimated_cost(task, winner),
    })
}

/// `route` plus a rationale naming the gate that determined the outcome
/// (spec §4.6 `recommend`). Pure: repeated calls with unchanged inputs
/// return identical results (spec §8 invariant 6).
pub fn recommend(
    task: &TaskSpec,
    catalog: &ProviderCatalog,
    routing: &RoutingConfig,
    budget: &BudgetState,
) -> Recommendation {
    let decision = route(task, catalog, routing, budget);
    let rationale = match &decision {
        None => "no provider satisfies the context window and budget gates".to_string(),
        Some(d) if task.preferred_provider.as_deref() == Some(d.provider.as_str()) => format!(
            "manual override `{}` accepted (within budget, estimated cost ${:.6})",
            d.provider, d.estimated_cost_usd
        ),
        Some(d) => {
            let preference = preferred_kind(task, routing);
            format!(
                "complexity `{:?}` prefers `{:?}`; `{}` selected after the context-window and budget gates (estimated cost ${:.6})",
                task.complexity_hint, preference, d.provider, d.estimated_cost_usd
            )
        }
    };
    Recommendation { decision, rationale }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_types::ComplexityHint;

    fn openai_compat() -> Provider {
        Provider {
            name: "cheap-api".to_string(),
            kind: ProviderKind::ApiOpenaiCompat,
            model_id: "gpt-4o-mini".to_string(),
            context_window: 8192,
            cost_per_input_token: 1e-6,
            cost_per_output_token: 2e-6,
            max_concurrency: 4,
            endpoint: None,
            config_path: None,
            tags: vec![],
        }
    }

    fn acp_provider() -> Provider {
        Provider {
            name: "local-acp".to_string(),
            kind: ProviderKind::Acp,
            model_id: "agent-1".to_string(),
            context_window: 200_000,
            cost_per_input_token: 0.0,
            cost_per_output_token: 0.0,
            max_concurrency: 2,
            endpoint: None,
            config_path: None,
            tags: vec![],
        }
    }

    fn catalog() -> ProviderCatalog {
        ProviderCatalog::new([openai_compat(), acp_provider()])
    }

    /// S1 — Trivial routing.
    #[test]
    fn s1_trivial_routing_prefers_cheap_api() {
        let task = TaskSpec::new("t1", "fix a typo", 200)
            .with_complexity(ComplexityHint::Trivial)
            .with_max_cost(0.01);
        let decision = route(&task, &catalog(), &RoutingConfig::default(), &BudgetState::default())
            .expect("a provider should be selected");
        assert_eq!(decision.provider, "cheap-api");
        assert_eq!(decision.method, WorkerMethod::Api);

        let rec = recommend(&task, &catalog(), &RoutingConfig::default(), &BudgetState::default());
        assert!(rec.rationale.contains("Trivial"));
        assert!(rec.rationale.contains("cost"));
    }

    /// S2 — Context-size override.
    #[test]
    fn s2_context_size_override_selects_acp() {
        let task = TaskSpec::new("t2", "large refactor", 100_000).with_complexity(ComplexityHint::Simple);
        let decision = route(&task, &catalog(), &RoutingConfig::default(), &BudgetState::default())
            .expect("acp provider has enough context");
        assert_eq!(decision.provider, "local-acp");
        assert_eq!(decision.method, WorkerMethod::Acp);
    }

    /// §8.9 — context gate exhausts every candidate.
    #[test]
    fn boundary_context_gate_rejects_every_provider() {
        let task = TaskSpec::new("t3", "huge task", 500_000).with_complexity(ComplexityHint::Simple);
        let decision = route(&task, &catalog(), &RoutingConfig::default(), &BudgetState::default());
        assert!(decision.is_none());
    }

    /// §8.10 — zero max_cost against positive rates exhausts every candidate.
    #[test]
    fn boundary_zero_max_cost_rejects_positive_rate_providers() {
        let only_paid = ProviderCatalog::new([openai_compat()]);
        let task = TaskSpec::new("t4", "cheap task", 100)
            .with_complexity(ComplexityHint::Trivial)
            .with_max_cost(0.0);
        let decision = route(&task, &only_paid, &RoutingConfig::default(), &BudgetState::default());
        assert!(decision.is_none());
    }

    /// §8.6 — `recommend` is pure.
    #[test]
    fn recommend_is_pure() {
        let task = TaskSpec::new("t5", "idempotence check", 200).with_complexity(ComplexityHint::Trivial);
        let c = catalog();
        let routing = RoutingConfig::default();
        let budget = BudgetState::default();
        let first = recommend(&task, &c, &routing, &budget);
        let second = recommend(&task, &c, &routing, &budget);
        assert_eq!(first, second);
    }

    #[test]
    fn preferred_provider_overrides_complexity_mapping() {
        let task = TaskSpec::new("t6", "force acp", 200)
            .with_complexity(ComplexityHint::Trivial)
            .with_preferred_provider("local-acp");
        let decision = route(&task, &catalog(), &RoutingConfig::default(), &BudgetState::default())
            .expect("preferred provider exists and is within budget");
        assert_eq!(decision.provider, "local-acp");
        assert_eq!(decision.method, WorkerMethod::Acp);
    }

    #[test]
    fn route_with_method_restricts_candidates_to_the_pinned_transport() {
        let task = TaskSpec::new("t8", "force cli transport", 200).with_complexity(ComplexityHint::Trivial);
        // Neither catalog provider is `Cli`, so pinning to `Cli` leaves no candidates
        // even though the cheap api provider would otherwise win on cost.
        let decision = route_with_method(&task, &catalog(), &BudgetState::default(), WorkerMethod::Cli);
        assert!(decision.is_none());

        let decision = route_with_method(&task, &catalog(), &BudgetState::default(), WorkerMethod::Acp)
            .expect("the acp provider satisfies the pinned method");
        assert_eq!(decision.provider, "local-acp");
        assert_eq!(decision.method, WorkerMethod::Acp);
    }

    #[test]
    fn preferred_provider_over_budget_falls_back_to_normal_routing() {
        let task = TaskSpec::new("t7", "fallback", 200)
            .with_complexity(ComplexityHint::Trivial)
            .with_max_cost(0.0)
            .with_preferred_provider("cheap-api");
        // cheap-api is over budget at max_cost=0, and acp has zero rates so it still wins.
        let decision = route(&task, &catalog(), &RoutingConfig::default(), &BudgetState::default())
            .expect("acp has zero cost and still satisfies the budget gate");
        assert_eq!(decision.provider, "local-acp");
    }
}
