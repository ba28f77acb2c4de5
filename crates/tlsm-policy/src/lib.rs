//! TLSM Policy - Ordered rule store and first-match request matcher.
//!
//! A [`Policy`] is one rule: a category, an operation (absent for
//! `analyze` rules), a subject prefix and an operation-specific object.
//! Policies live in a [`RuleStore`], an insertion-ordered list that is
//! matched head to tail; the first matching rule wins and an empty store
//! (or no match) means the request is allowed.
//!
//! # Example
//!
//! ```
//! use tlsm_core::{AccessRequest, Category, Operation};
//! use tlsm_policy::{Policy, RuleStore};
//!
//! let store = RuleStore::new();
//! store.append(Policy::parse("/bin/cat deny open secret").unwrap()).unwrap();
//!
//! let request = AccessRequest::new(Operation::FileOpen, "/etc/secret")
//!     .with_subject("/bin/cat");
//! let matched = store.find_match(&request).unwrap();
//! assert_eq!(matched.index, 0);
//! assert_eq!(matched.policy.category, Category::Deny);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod conf;
/// Error types and results for rule parsing and storage.
pub mod error;
pub mod matcher;
pub mod policy;
pub mod store;

pub use conf::{load_policy_file, parse_policy_file};
pub use error::{PolicyError, PolicyResult};
pub use matcher::{ObjectMatcher, WILDCARD_OBJECT, find_match, object_matcher, policy_matches};
pub use policy::Policy;
pub use store::{DEFAULT_MAX_RULES, MatchedPolicy, RuleStore};
