//! When/If/Then tag rule interpreter.
//!
//! Rules see one message at a time. Triggers and conditions read the
//! statistical result, never tags applied by other rules, so the outcome
//! depends only on the message, the user and the rule set.

use brain_core::Sentiment;
use database::{Direction, RuleAction, RuleCondition, RuleTrigger, TagRule};
use tracing::debug;

/// What the rules get to look at.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub direction: Direction,
    pub text: &'a str,
    pub sentiment: Sentiment,
    /// Tags from the statistical pass.
    pub message_tags: &'a [String],
    pub user_day: i64,
    /// Tags accumulated on the user.
    pub user_tags: &'a [String],
}

/// Actions queued by the rules that fired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub apply: Vec<String>,
    pub remove: Vec<String>,
    /// IDs of the rules that fired, in evaluation order.
    pub fired: Vec<i64>,
}

fn trigger_matches(trigger: &RuleTrigger, ctx: &RuleContext<'_>) -> bool {
    match trigger {
        RuleTrigger::MessageReceived => ctx.direction == Direction::Incoming,
        RuleTrigger::UserDayReached { day } => ctx.user_day == *day,
        RuleTrigger::SentimentDetected { sentiment } => ctx.sentiment == *sentiment,
        RuleTrigger::TagApplied { tag } => ctx.message_tags.contains(tag),
    }
}

fn condition_holds(condition: &RuleCondition, ctx: &RuleContext<'_>) -> bool {
    match condition {
        RuleCondition::ContainsKeyword { keyword } => {
            !keyword.is_empty() && ctx.text.to_lowercase().contains(&keyword.to_lowercase())
        }
        RuleCondition::SentimentIs { sentiment } => ctx.sentiment == *sentiment,
        RuleCondition::UserDayIs { day } => ctx.user_day == *day,
        RuleCondition::TagExists { tag } => ctx.user_tags.contains(tag),
        RuleCondition::UserDayGreaterThan { day } => ctx.user_day > *day,
        RuleCondition::UserDayLessThan { day } => ctx.user_day < *day,
    }
}

fn push_unique(list: &mut Vec<String>, tag: &str) {
    if !list.iter().any(|t| t == tag) {
        list.push(tag.to_string());
    }
}

/// Evaluate active rules, highest priority first.
///
/// A rule with no conditions fires whenever its trigger matches.
pub fn evaluate(rules: &[TagRule], ctx: &RuleContext<'_>) -> RuleOutcome {
    let mut ordered: Vec<&TagRule> = rules.iter().filter(|r| r.is_active).collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    let mut outcome = RuleOutcome::default();

    for rule in ordered {
        if !trigger_matches(&rule.trigger, ctx) {
            continue;
        }
        if !rule.conditions.iter().all(|c| condition_holds(c, ctx)) {
            continue;
        }

        debug!("Rule '{}' (priority {}) fired", rule.name, rule.priority);
        outcome.fired.push(rule.id);

        for action in &rule.actions {
            match action {
                RuleAction::ApplyTag { tag } => push_unique(&mut outcome.apply, tag),
                RuleAction::RemoveTag { tag } => push_unique(&mut outcome.remove, tag),
            }
        }
    }

    outcome
}

/// `(base ∪ apply) − remove`, first occurrence order, no duplicates.
pub fn merge(base: &[String], outcome: &RuleOutcome) -> Vec<String> {
    let mut merged = Vec::new();
    for tag in base.iter().chain(outcome.apply.iter()) {
        if !outcome.remove.contains(tag) {
            push_unique(&mut merged, tag);
        }
    }
    merged
}
