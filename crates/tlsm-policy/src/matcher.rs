//! First-match request matching.
//!
//! A rule matches a request when:
//!
//! 1. For `analyze` rules: the request subject equals the rule subject
//!    exactly. Operation and object are not consulted.
//! 2. Otherwise the operations are equal, the rule subject is a prefix of
//!    the request subject, and the operation's object matcher accepts the
//!    pair (see [`object_matcher`]).
//!
//! Matching is a single linear pass; the first matching rule wins.

use std::sync::Arc;

use tlsm_core::{AccessRequest, Category, Operation};

use crate::policy::Policy;

/// Object token that matches any request object for exact-match operations.
pub const WILDCARD_OBJECT: &str = "any";

/// Compares a rule object against a request object.
pub type ObjectMatcher = fn(rule_object: &str, request_object: &str) -> bool;

/// The object matcher for one operation kind.
///
/// | operation | rule object matches when |
/// |-----------|--------------------------|
/// | `open`    | it occurs anywhere in the request path |
/// | `bind`, `connect`, `execve` | it equals the request object, or is `any` |
/// | `signal`  | always |
#[must_use]
pub fn object_matcher(operation: Operation) -> ObjectMatcher {
    match operation {
        Operation::FileOpen => contains,
        Operation::SocketBind | Operation::SocketConnect | Operation::Execve => exact_or_any,
        Operation::Signal => unconditional,
    }
}

fn contains(rule_object: &str, request_object: &str) -> bool {
    request_object.contains(rule_object)
}

fn exact_or_any(rule_object: &str, request_object: &str) -> bool {
    rule_object == WILDCARD_OBJECT || rule_object == request_object
}

fn unconditional(_rule_object: &str, _request_object: &str) -> bool {
    true
}

/// Check whether one rule applies to a request.
#[must_use]
pub fn policy_matches(policy: &Policy, request: &AccessRequest) -> bool {
    if policy.category == Category::Analyze {
        return policy.subject == request.subject;
    }
    let Some(operation) = policy.operation else {
        return false;
    };
    operation == request.operation
        && request.subject.starts_with(policy.subject.as_str())
        && object_matcher(operation)(&policy.object, &request.object)
}

/// Find the first rule that applies to a request, with its index.
#[must_use]
pub fn find_match<'a>(
    rules: &'a [Arc<Policy>],
    request: &AccessRequest,
) -> Option<(usize, &'a Arc<Policy>)> {
    rules
        .iter()
        .enumerate()
        .find(|(_, policy)| policy_matches(policy, request))
}
