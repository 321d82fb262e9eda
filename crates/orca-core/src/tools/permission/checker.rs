//! Rule evaluation

use parking_lot::RwLock;
use tracing::{debug, instrument};

use super::glob::GlobMatcher;
use super::rule::PermissionRule;
use super::signature::SignatureBuilder;
use super::types::{
    MatchType, PermissionBehavior, PermissionCheckResult, PermissionRulesConfig,
    ToolInvocationDescriptor,
};
use crate::error::OrcaResult;

#[derive(Debug, Default)]
struct RuleSets {
    allow: Vec<PermissionRule>,
    ask: Vec<PermissionRule>,
    deny: Vec<PermissionRule>,
}

impl RuleSets {
    fn ordered(&self) -> [(PermissionBehavior, &[PermissionRule]); 3] {
        [
            (PermissionBehavior::Deny, self.deny.as_slice()),
            (PermissionBehavior::Allow, self.allow.as_slice()),
            (PermissionBehavior::Ask, self.ask.as_slice()),
        ]
    }

    fn set_mut(&mut self, behavior: PermissionBehavior) -> &mut Vec<PermissionRule> {
        match behavior {
            PermissionBehavior::Allow => &mut self.allow,
            PermissionBehavior::Ask => &mut self.ask,
            PermissionBehavior::Deny => &mut self.deny,
        }
    }
}

/// Resolves allow / ask / deny for tool invocations
///
/// Deny rules win unconditionally, then allow, then ask. Within a rule set
/// the match types are tried in [`MatchType::ORDER`]. No match means ask.
#[derive(Debug, Default)]
pub struct PermissionChecker {
    rules: RwLock<RuleSets>,
    signatures: SignatureBuilder,
    globs: GlobMatcher,
}

impl PermissionChecker {
    /// Create a checker from configured rule lists
    pub fn new(config: &PermissionRulesConfig) -> OrcaResult<Self> {
        let checker = Self::default();
        checker.update_config(config)?;
        Ok(checker)
    }

    /// Replace the signature builder
    pub fn with_signature_builder(mut self, signatures: SignatureBuilder) -> Self {
        self.signatures = signatures;
        self
    }

    /// Canonical signature for an invocation
    pub fn signature(&self, descriptor: &ToolInvocationDescriptor) -> String {
        self.signatures.signature(descriptor)
    }

    /// Decide an invocation
    #[instrument(skip(self, descriptor), fields(tool = %descriptor.tool_name))]
    pub fn check(&self, descriptor: &ToolInvocationDescriptor) -> PermissionCheckResult {
        let signature = self.signatures.signature(descriptor);
        let rules = self.rules.read();

        for (behavior, set) in rules.ordered() {
            if let Some((rule, match_type)) = self.find_match(set, descriptor, &signature) {
                debug!(
                    signature = %signature,
                    rule = %rule,
                    decision = %behavior,
                    ?match_type,
                    "permission rule matched"
                );
                return PermissionCheckResult {
                    result: behavior,
                    matched_rule: Some(rule.to_string()),
                    match_type: Some(match_type),
                    signature,
                };
            }
        }

        debug!(signature = %signature, "no permission rule matched");
        PermissionCheckResult::unmatched(signature)
    }

    fn find_match<'a>(
        &self,
        rules: &'a [PermissionRule],
        descriptor: &ToolInvocationDescriptor,
        signature: &str,
    ) -> Option<(&'a PermissionRule, MatchType)> {
        MatchType::ORDER.into_iter().find_map(|kind| {
            rules
                .iter()
                .find(|rule| rule.matches(kind, descriptor, signature, &self.globs))
                .map(|rule| (rule, kind))
        })
    }

    /// Append rules; existing rules are never removed.
    ///
    /// Every rule is parsed before any is added. Returns how many new rules
    /// were added after de-duplication.
    pub fn update_config(&self, config: &PermissionRulesConfig) -> OrcaResult<usize> {
        let mut parsed = Vec::new();
        for (behavior, raw_rules) in [
            (PermissionBehavior::Allow, &config.allow),
            (PermissionBehavior::Ask, &config.ask),
            (PermissionBehavior::Deny, &config.deny),
        ] {
            for raw in raw_rules {
                parsed.push((behavior, PermissionRule::parse(raw)?));
            }
        }

        let mut rules = self.rules.write();
        let mut added = 0;
        for (behavior, rule) in parsed {
            let set = rules.set_mut(behavior);
            if !set.contains(&rule) {
                set.push(rule);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Add a single rule
    pub fn add_rule(&self, behavior: PermissionBehavior, raw: &str) -> OrcaResult<bool> {
        let rule = PermissionRule::parse(raw)?;
        let mut rules = self.rules.write();
        let set = rules.set_mut(behavior);
        if set.contains(&rule) {
            return Ok(false);
        }
        set.push(rule);
        Ok(true)
    }

    /// Snapshot of the current rules
    pub fn rules(&self) -> PermissionRulesConfig {
        let rules = self.rules.read();
        let strings = |set: &[PermissionRule]| set.iter().map(|r| r.to_string()).collect();
        PermissionRulesConfig {
            allow: strings(&rules.allow),
            ask: strings(&rules.ask),
            deny: strings(&rules.deny),
        }
    }
}
