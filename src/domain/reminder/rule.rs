//! Reminder rules and their resolution per subscription.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::SubscriptionId;

use super::ReminderEventType;

/// Who a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "subscription_id")]
pub enum RuleScope {
    /// The user's default, inherited by every subscription without an override.
    Default,
    /// Override for a single subscription.
    Subscription(SubscriptionId),
}

/// "Remind me `lead_days` before `event_type`".
///
/// Any lead time is accepted. One longer than the gap between two charges
/// simply never lines up with the next billing date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRule {
    pub scope: RuleScope,
    pub event_type: ReminderEventType,
    pub enabled: bool,
    pub lead_days: u32,
}

impl ReminderRule {
    pub fn new(scope: RuleScope, event_type: ReminderEventType, lead_days: u32) -> Self {
        Self {
            scope,
            event_type,
            enabled: true,
            lead_days,
        }
    }

    /// Enabled user-default rule.
    pub fn default_scope(event_type: ReminderEventType, lead_days: u32) -> Self {
        Self::new(RuleScope::Default, event_type, lead_days)
    }

    /// Enabled per-subscription override.
    pub fn for_subscription(
        subscription_id: SubscriptionId,
        event_type: ReminderEventType,
        lead_days: u32,
    ) -> Self {
        Self::new(RuleScope::Subscription(subscription_id), event_type, lead_days)
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// True for default rules and for overrides targeting this subscription.
    pub fn applies_to(&self, subscription_id: &SubscriptionId) -> bool {
        match &self.scope {
            RuleScope::Default => true,
            RuleScope::Subscription(id) => id == subscription_id,
        }
    }

    fn is_override_for(&self, subscription_id: &SubscriptionId) -> bool {
        matches!(&self.scope, RuleScope::Subscription(id) if id == subscription_id)
    }
}

/// Rules used when a user never configured defaults.
pub fn builtin_default_rules() -> Vec<ReminderRule> {
    vec![
        ReminderRule::default_scope(ReminderEventType::TrialEnding, 3),
        ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 3),
        ReminderRule::default_scope(ReminderEventType::SubscriptionRenewal, 7),
    ]
}

/// Resolves at most one rule per event type for a subscription.
///
/// A subscription override wins over the user default of the same event
/// type. When `rules` holds no default-scoped rule at all, the built-in
/// defaults stand in for them. Disabled rules are kept so an override can
/// switch a default off.
///
/// Several rules of the same scope and event type resolve the same way
/// whatever order they arrive in: an enabled rule beats a disabled one,
/// then the longest lead time wins.
pub fn effective_rules(subscription_id: &SubscriptionId, rules: &[ReminderRule]) -> Vec<ReminderRule> {
    let builtin;
    let defaults: &[ReminderRule] = if rules.iter().any(|r| r.scope == RuleScope::Default) {
        rules
    } else {
        builtin = builtin_default_rules();
        &builtin
    };

    ReminderEventType::ALL
        .iter()
        .filter_map(|event_type| {
            pick(
                rules
                    .iter()
                    .filter(|r| r.event_type == *event_type && r.is_override_for(subscription_id)),
            )
            .or_else(|| {
                pick(
                    defaults
                        .iter()
                        .filter(|r| r.event_type == *event_type && r.scope == RuleScope::Default),
                )
            })
            .cloned()
        })
        .collect()
}

fn pick<'a>(candidates: impl Iterator<Item = &'a ReminderRule>) -> Option<&'a ReminderRule> {
    candidates.max_by_key(|r| (r.enabled, r.lead_days))
}

/// All rules configured by one user, defaults and overrides together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<ReminderRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ReminderRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ReminderRule] {
        &self.rules
    }

    /// Effective rules for one subscription, see [`effective_rules`].
    pub fn effective_for(&self, subscription_id: &SubscriptionId) -> Vec<ReminderRule> {
        effective_rules(subscription_id, &self.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_id(id: &str) -> SubscriptionId {
        SubscriptionId::new(id).unwrap()
    }

    fn lead_for(rules: &[ReminderRule], event_type: ReminderEventType) -> Option<(u32, bool)> {
        rules
            .iter()
            .find(|r| r.event_type == event_type)
            .map(|r| (r.lead_days, r.enabled))
    }

    #[test]
    fn long_lead_times_are_kept_as_configured() {
        let set = RuleSet::new(vec![
            ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 400),
            ReminderRule::for_subscription(sub_id("sub-1"), ReminderEventType::TrialEnding, 1000),
        ]);

        let rules = set.effective_for(&sub_id("sub-1"));
        assert_eq!(lead_for(&rules, ReminderEventType::PaymentUpcoming), Some((400, true)));
        assert_eq!(lead_for(&rules, ReminderEventType::TrialEnding), Some((1000, true)));
    }

    #[test]
    fn duplicate_rules_resolve_regardless_of_order() {
        let rules = vec![
            ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 1),
            ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 7).disabled(),
            ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 3),
        ];
        let mut reversed = rules.clone();
        reversed.reverse();

        for order in [rules, reversed] {
            let resolved = effective_rules(&sub_id("sub-1"), &order);
            assert_eq!(lead_for(&resolved, ReminderEventType::PaymentUpcoming), Some((3, true)));
        }
    }

    #[test]
    fn disabled_default_alone_does_not_bring_back_builtins() {
        let set = RuleSet::new(vec![
            ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 3).disabled(),
        ]);

        let rules = set.effective_for(&sub_id("sub-1"));
        assert_eq!(rules.len(), 1);
        assert_eq!(lead_for(&rules, ReminderEventType::PaymentUpcoming), Some((3, false)));
    }

    #[test]
    fn empty_rule_set_falls_back_to_builtin_defaults() {
        let rules = RuleSet::default().effective_for(&sub_id("sub-1"));

        assert_eq!(rules.len(), 3);
        assert_eq!(lead_for(&rules, ReminderEventType::TrialEnding), Some((3, true)));
        assert_eq!(lead_for(&rules, ReminderEventType::SubscriptionRenewal), Some((7, true)));
    }

    #[test]
    fn override_beats_default_for_same_event_type() {
        let set = RuleSet::new(vec![
            ReminderRule::default_scope(ReminderEventType::PaymentUpcoming, 3),
            ReminderRule::for_subscription(sub_id("sub-1"), ReminderEventType::PaymentUpcoming, 1),
        ]);

        let for_sub1 = set.effective_for(&sub_id("sub-1"));
        let for_sub2 = set.effective_for(&sub_id("sub-2"));

        assert_eq!(lead_for(&for_sub1, ReminderEventType::PaymentUpcoming), Some((1, true)));
        assert_eq!(lead_for(&for_sub2, ReminderEventType::PaymentUpcoming), Some((3, true)));
    }

    #[test]
    fn configured_defaults_replace_builtins_entirely() {
        let set = RuleSet::new(vec![ReminderRule::default_scope(
            ReminderEventType::PaymentUpcoming,
            5,
        )]);

        let rules = set.effective_for(&sub_id("sub-1"));

        assert_eq!(rules.len(), 1);
        assert_eq!(lead_for(&rules, ReminderEventType::TrialEnding), None);
    }

    #[test]
    fn disabled_override_switches_default_off() {
        let set = RuleSet::new(vec![
            ReminderRule::default_scope(ReminderEventType::TrialEnding, 3),
            ReminderRule::for_subscription(sub_id("sub-1"), ReminderEventType::TrialEnding, 3)
                .disabled(),
        ]);

        let rules = set.effective_for(&sub_id("sub-1"));
        assert_eq!(lead_for(&rules, ReminderEventType::TrialEnding), Some((3, false)));
    }

    #[test]
    fn override_for_other_subscription_does_not_apply() {
        let rule = ReminderRule::for_subscription(sub_id("sub-1"), ReminderEventType::TrialEnding, 2);
        assert!(rule.applies_to(&sub_id("sub-1")));
        assert!(!rule.applies_to(&sub_id("sub-2")));
    }
}
