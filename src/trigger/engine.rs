//! Trigger evaluation.
//!
//! Thresholds combine disjunctively: a rule fires when ANY configured
//! threshold is satisfied. This errs on the side of invoking a
//! safety/quality agent once rather than missing a signal.

use super::context::TriggerContext;
use super::rules::{ExecutionMode, RuleSet, TriggerRule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record for one rule evaluation. Append-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub agent_name: String,
    pub execution_mode: ExecutionMode,
    pub triggered: bool,
    /// Names the specific threshold(s) and the values compared.
    pub reasoning: String,
    pub context_snapshot: TriggerContext,
    pub timestamp: DateTime<Utc>,
}

/// Evaluate every rule against the context.
///
/// Pure with respect to its inputs: no hidden state, so a logged context
/// snapshot fully reproduces the decision. Disabled rules are skipped but
/// still recorded, keeping the audit trail complete.
pub fn evaluate(context: &TriggerContext, rules: &RuleSet) -> Vec<TriggerDecision> {
    rules
        .rules
        .iter()
        .map(|rule| evaluate_rule(context, rule))
        .collect()
}

fn evaluate_rule(context: &TriggerContext, rule: &TriggerRule) -> TriggerDecision {
    let (triggered, reasoning) = if !rule.enabled {
        (false, "disabled".to_string())
    } else {
        let checks = check_thresholds(context, rule);
        if checks.is_empty() {
            (false, "no thresholds configured".to_string())
        } else {
            let fired: Vec<&str> = checks
                .iter()
                .filter(|c| c.fired)
                .map(|c| c.clause.as_str())
                .collect();
            if fired.is_empty() {
                // Non-firing decisions still name every threshold and the
                // values compared, so the audit record is self-explaining.
                let clauses: Vec<&str> = checks.iter().map(|c| c.clause.as_str()).collect();
                (false, clauses.join("; "))
            } else {
                (true, fired.join("; "))
            }
        }
    };

    TriggerDecision {
        agent_name: rule.agent_name.clone(),
        execution_mode: rule.execution_mode,
        triggered,
        reasoning,
        context_snapshot: context.clone(),
        timestamp: Utc::now(),
    }
}

struct ThresholdCheck {
    fired: bool,
    clause: String,
}

impl ThresholdCheck {
    fn new(fired: bool, clause: String) -> Self {
        Self { fired, clause }
    }
}

/// One comparison per configured threshold, fired or not. A context field
/// that is absent never satisfies a threshold, so unconfigured data cannot
/// fire a side effect the operator did not ask for.
fn check_thresholds(context: &TriggerContext, rule: &TriggerRule) -> Vec<ThresholdCheck> {
    let t = &rule.thresholds;
    let mut checks = Vec::new();

    if let Some(threshold) = t.files_threshold {
        checks.push(match context.files_touched {
            Some(actual) => ThresholdCheck::new(
                actual >= threshold,
                format!(
                    "files_touched={} {} files_threshold={}",
                    actual,
                    if actual >= threshold { ">=" } else { "<" },
                    threshold
                ),
            ),
            None => ThresholdCheck::new(
                false,
                format!("files_touched absent (files_threshold={})", threshold),
            ),
        });
    }

    if let Some(threshold) = t.loc_threshold {
        checks.push(match context.lines_changed {
            Some(actual) => ThresholdCheck::new(
                actual >= threshold,
                format!(
                    "lines_changed={} {} loc_threshold={}",
                    actual,
                    if actual >= threshold { ">=" } else { "<" },
                    threshold
                ),
            ),
            None => ThresholdCheck::new(
                false,
                format!("lines_changed absent (loc_threshold={})", threshold),
            ),
        });
    }

    // Confidence triggers BELOW the threshold: low confidence invites review.
    if let Some(threshold) = t.confidence_threshold {
        checks.push(match context.confidence_score {
            Some(actual) => ThresholdCheck::new(
                actual <= threshold,
                format!(
                    "confidence_score={} {} confidence_threshold={}",
                    actual,
                    if actual <= threshold { "<=" } else { ">" },
                    threshold
                ),
            ),
            None => ThresholdCheck::new(
                false,
                format!("confidence_score absent (confidence_threshold={})", threshold),
            ),
        });
    }

    if let Some(threshold) = t.complexity_at_least {
        checks.push(match context.complexity {
            Some(actual) => ThresholdCheck::new(
                actual >= threshold,
                format!(
                    "complexity={} {} complexity_at_least={}",
                    actual,
                    if actual >= threshold { ">=" } else { "<" },
                    threshold
                ),
            ),
            None => ThresholdCheck::new(
                false,
                format!("complexity absent (complexity_at_least={})", threshold),
            ),
        });
    }

    for tag in &t.risk_tags {
        let present = context.risk_indicators.contains(tag);
        checks.push(ThresholdCheck::new(
            present,
            format!(
                "risk_indicator '{}' {}",
                tag,
                if present { "present" } else { "absent" }
            ),
        ));
    }

    if t.on_external_dependency {
        checks.push(ThresholdCheck::new(
            context.external_dependency,
            format!("external_dependency={}", context.external_dependency),
        ));
    }

    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::context::ComplexitySignal;
    use crate::trigger::rules::TriggerRule;

    fn single(rule: TriggerRule) -> RuleSet {
        RuleSet::new(vec![rule]).unwrap()
    }

    #[test]
    fn test_files_threshold_fires_with_exact_reasoning() {
        let ctx = TriggerContext::new().with_files_touched(3).with_lines_changed(50);
        let rules = single(TriggerRule::silent("explorer").with_files_threshold(2));

        let decisions = evaluate(&ctx, &rules);
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].triggered);
        assert_eq!(decisions[0].reasoning, "files_touched=3 >= files_threshold=2");
    }

    #[test]
    fn test_files_threshold_boundary_inclusive() {
        let ctx = TriggerContext::new().with_files_touched(2);
        let rules = single(TriggerRule::silent("explorer").with_files_threshold(2));
        assert!(evaluate(&ctx, &rules)[0].triggered);
    }

    #[test]
    fn test_confidence_uses_lte_comparison() {
        let ctx = TriggerContext::new().with_confidence(0.4);
        let rules = single(TriggerRule::interactive("deep-research").with_confidence_threshold(0.6));

        let decisions = evaluate(&ctx, &rules);
        assert!(decisions[0].triggered);
        assert_eq!(
            decisions[0].reasoning,
            "confidence_score=0.4 <= confidence_threshold=0.6"
        );
    }

    #[test]
    fn test_high_confidence_does_not_fire() {
        let ctx = TriggerContext::new().with_confidence(0.9);
        let rules = single(TriggerRule::interactive("deep-research").with_confidence_threshold(0.6));
        let decision = &evaluate(&ctx, &rules)[0];
        assert!(!decision.triggered);
        assert_eq!(
            decision.reasoning,
            "confidence_score=0.9 > confidence_threshold=0.6"
        );
    }

    #[test]
    fn test_disjunctive_either_branch_fires() {
        let rules = single(
            TriggerRule::silent("explorer")
                .with_files_threshold(5)
                .with_loc_threshold(100),
        );

        // Only the files branch satisfied.
        let ctx = TriggerContext::new().with_files_touched(6).with_lines_changed(10);
        let d = &evaluate(&ctx, &rules)[0];
        assert!(d.triggered);
        assert!(d.reasoning.contains("files_touched"));
        assert!(!d.reasoning.contains("lines_changed"));

        // Only the loc branch satisfied.
        let ctx = TriggerContext::new().with_files_touched(1).with_lines_changed(250);
        let d = &evaluate(&ctx, &rules)[0];
        assert!(d.triggered);
        assert!(d.reasoning.contains("lines_changed=250 >= loc_threshold=100"));

        // Both satisfied: reasoning cites both.
        let ctx = TriggerContext::new().with_files_touched(6).with_lines_changed(250);
        let d = &evaluate(&ctx, &rules)[0];
        assert!(d.triggered);
        assert!(d.reasoning.contains("files_touched"));
        assert!(d.reasoning.contains("lines_changed"));

        // Neither satisfied.
        let ctx = TriggerContext::new().with_files_touched(1).with_lines_changed(10);
        assert!(!evaluate(&ctx, &rules)[0].triggered);
    }

    #[test]
    fn test_missing_context_field_never_fires() {
        // Rule wants files_touched but the context does not carry it.
        let ctx = TriggerContext::new().with_lines_changed(500);
        let rules = single(TriggerRule::silent("explorer").with_files_threshold(1));

        let decision = &evaluate(&ctx, &rules)[0];
        assert!(!decision.triggered);
        assert_eq!(decision.reasoning, "files_touched absent (files_threshold=1)");
    }

    #[test]
    fn test_nonfiring_reasoning_names_threshold_and_values() {
        let ctx = TriggerContext::new().with_files_touched(1);
        let rules = single(TriggerRule::silent("explorer").with_files_threshold(2));

        let decision = &evaluate(&ctx, &rules)[0];
        assert!(!decision.triggered);
        assert_eq!(decision.reasoning, "files_touched=1 < files_threshold=2");
    }

    #[test]
    fn test_nonfiring_reasoning_lists_every_threshold() {
        let ctx = TriggerContext::new().with_files_touched(1).with_confidence(0.9);
        let rules = single(
            TriggerRule::interactive("reviewer")
                .with_files_threshold(5)
                .with_confidence_threshold(0.5)
                .with_risk_tag("payment"),
        );

        let decision = &evaluate(&ctx, &rules)[0];
        assert!(!decision.triggered);
        assert_eq!(
            decision.reasoning,
            "files_touched=1 < files_threshold=5; \
             confidence_score=0.9 > confidence_threshold=0.5; \
             risk_indicator 'payment' absent"
        );
    }

    #[test]
    fn test_disabled_rule_recorded_not_evaluated() {
        let ctx = TriggerContext::new().with_files_touched(100);
        let rules = single(TriggerRule::silent("explorer").with_files_threshold(1).disabled());

        let decision = &evaluate(&ctx, &rules)[0];
        assert!(!decision.triggered);
        assert_eq!(decision.reasoning, "disabled");
    }

    #[test]
    fn test_complexity_threshold() {
        let rules = single(
            TriggerRule::silent("decomposer").with_complexity_at_least(ComplexitySignal::Medium),
        );

        let ctx = TriggerContext::new().with_complexity(ComplexitySignal::High);
        let d = &evaluate(&ctx, &rules)[0];
        assert!(d.triggered);
        assert_eq!(d.reasoning, "complexity=high >= complexity_at_least=medium");

        let ctx = TriggerContext::new().with_complexity(ComplexitySignal::Low);
        assert!(!evaluate(&ctx, &rules)[0].triggered);
    }

    #[test]
    fn test_risk_tags_fire_on_overlap() {
        let rules = single(
            TriggerRule::interactive("security-review")
                .with_risk_tag("security")
                .with_risk_tag("payment"),
        );

        let ctx = TriggerContext::new().with_risk_indicator("payment");
        let d = &evaluate(&ctx, &rules)[0];
        assert!(d.triggered);
        assert_eq!(d.reasoning, "risk_indicator 'payment' present");

        let ctx = TriggerContext::new().with_risk_indicator("ux");
        assert!(!evaluate(&ctx, &rules)[0].triggered);
    }

    #[test]
    fn test_external_dependency_trigger() {
        let rules = single(TriggerRule::silent("source-verifier").on_external_dependency());

        let ctx = TriggerContext::new().with_external_dependency();
        assert!(evaluate(&ctx, &rules)[0].triggered);

        let ctx = TriggerContext::new();
        assert!(!evaluate(&ctx, &rules)[0].triggered);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let ctx = TriggerContext::new()
            .with_files_touched(3)
            .with_confidence(0.3)
            .with_risk_indicator("auth");
        let rules = RuleSet::new(vec![
            TriggerRule::silent("explorer").with_files_threshold(2),
            TriggerRule::interactive("deep-research").with_confidence_threshold(0.6),
            TriggerRule::interactive("security-review").with_risk_tag("auth"),
            TriggerRule::silent("never").with_loc_threshold(1_000_000),
        ])
        .unwrap();

        let first = evaluate(&ctx, &rules);
        let second = evaluate(&ctx, &rules);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.agent_name, b.agent_name);
            assert_eq!(a.triggered, b.triggered);
            assert_eq!(a.reasoning, b.reasoning);
            assert_eq!(a.context_snapshot, b.context_snapshot);
        }
    }

    #[test]
    fn test_every_rule_gets_a_decision() {
        let ctx = TriggerContext::new();
        let rules = RuleSet::new(vec![
            TriggerRule::silent("a").with_files_threshold(1),
            TriggerRule::silent("b").with_loc_threshold(1).disabled(),
            TriggerRule::interactive("c").with_confidence_threshold(0.5),
        ])
        .unwrap();

        let decisions = evaluate(&ctx, &rules);
        assert_eq!(decisions.len(), 3);
        let names: Vec<&str> = decisions.iter().map(|d| d.agent_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
