//! A single access-control rule.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tlsm_core::{Category, Operation};

use crate::error::{PolicyError, PolicyResult};

/// One rule of the rule store.
///
/// `analyze` rules carry no operation and no object: they watch every
/// operation of one exact subject. Every other rule names an operation and,
/// unless the operation takes no object, a non-empty object.
#[derive(Debug)]
pub struct Policy {
    /// Outcome class for matching requests.
    pub category: Category,
    /// Operation this rule applies to, `None` for `analyze` rules.
    pub operation: Option<Operation>,
    /// Executable path prefix (exact path for `analyze` rules).
    pub subject: String,
    /// Operation-specific object, empty when the operation takes none.
    pub object: String,
    hit_count: AtomicU64,
}

impl Policy {
    /// Create an operation rule.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] if `category` is `analyze`, the subject
    /// is empty, or the object does not fit the operation's arity.
    pub fn new(
        category: Category,
        subject: impl Into<String>,
        operation: Operation,
        object: impl Into<String>,
    ) -> PolicyResult<Self> {
        let subject = subject.into();
        let object = object.into();
        let text = format!("{subject} {category} {operation} {object}");

        if category == Category::Analyze {
            return Err(PolicyError::parse(
                &text,
                "analyze rules take no operation or object",
            ));
        }
        if subject.is_empty() {
            return Err(PolicyError::parse(&text, "empty subject"));
        }
        match (operation.arity(), object.is_empty()) {
            (0, false) => {
                return Err(PolicyError::parse(
                    &text,
                    format!("{operation} rules take no object"),
                ));
            },
            (1, true) => {
                return Err(PolicyError::parse(
                    &text,
                    format!("{operation} rules need an object"),
                ));
            },
            _ => {},
        }

        Ok(Self {
            category,
            operation: Some(operation),
            subject,
            object,
            hit_count: AtomicU64::new(0),
        })
    }

    /// Create an `analyze` rule for one exact subject.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] if the subject is empty.
    pub fn analyze(subject: impl Into<String>) -> PolicyResult<Self> {
        let subject = subject.into();
        if subject.is_empty() {
            return Err(PolicyError::parse("analyze", "empty subject"));
        }
        Ok(Self {
            category: Category::Analyze,
            operation: None,
            subject,
            object: String::new(),
            hit_count: AtomicU64::new(0),
        })
    }

    /// Parse `<subject> <category> [operation [object]]`.
    ///
    /// Words are separated by runs of whitespace; a trailing newline is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] on unknown words or wrong word counts.
    pub fn parse(text: &str) -> PolicyResult<Self> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let (subject, category) = match words.as_slice() {
            [subject, category, ..] => (*subject, *category),
            _ => return Err(PolicyError::parse(text, "expected <subject> <category>")),
        };
        let category: Category = category
            .parse()
            .map_err(|e| PolicyError::parse(text, format!("{e}")))?;

        let rest = words.get(2..).unwrap_or_default();
        if category == Category::Analyze {
            if !rest.is_empty() {
                return Err(PolicyError::parse(
                    text,
                    "analyze rules take no operation or object",
                ));
            }
            return Self::analyze(subject);
        }

        let Some((operation, objects)) = rest.split_first() else {
            return Err(PolicyError::parse(text, "missing operation"));
        };
        let operation: Operation = operation
            .parse()
            .map_err(|e| PolicyError::parse(text, format!("{e}")))?;
        if objects.len() != operation.arity() {
            return Err(PolicyError::parse(
                text,
                format!(
                    "{operation} takes {} object word(s), got {}",
                    operation.arity(),
                    objects.len()
                ),
            ));
        }
        let object = objects.first().copied().unwrap_or_default();
        Self::new(category, subject, operation, object)
    }

    /// Number of requests this rule has adjudicated.
    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    /// Count one adjudication by this rule.
    pub fn record_hit(&self) {
        // Saturate instead of wrapping; the closure never returns None.
        let _ = self
            .hit_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_add(1))
            });
    }

    /// Render the `list` line for this rule at `index`.
    #[must_use]
    pub fn listing_line(&self, index: usize) -> String {
        let operation = self.operation.map_or("-", Operation::as_str);
        let object = if self.object.is_empty() {
            "-"
        } else {
            self.object.as_str()
        };
        format!(
            "rule #{index} : {} {} {operation} {object} (hit count {})",
            self.subject,
            self.category,
            self.hit_count()
        )
    }
}

impl Clone for Policy {
    fn clone(&self) -> Self {
        Self {
            category: self.category,
            operation: self.operation,
            subject: self.subject.clone(),
            object: self.object.clone(),
            hit_count: AtomicU64::new(self.hit_count()),
        }
    }
}

impl PartialEq for Policy {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category
            && self.operation == other.operation
            && self.subject == other.subject
            && self.object == other.object
    }
}

impl Eq for Policy {}

/// Renders the rule in the same form [`Policy::parse`] accepts.
impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.category)?;
        if let Some(op) = self.operation {
            write!(f, " {op}")?;
        }
        if !self.object.is_empty() {
            write!(f, " {}", self.object)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_rule() {
        let p = Policy::parse("/bin/cat deny open /home/user/secret.txt\n").unwrap();
        assert_eq!(p.category, Category::Deny);
        assert_eq!(p.operation, Some(Operation::FileOpen));
        assert_eq!(p.subject, "/bin/cat");
        assert_eq!(p.object, "/home/user/secret.txt");
        assert_eq!(p.hit_count(), 0);
    }

    #[test]
    fn test_parse_collapses_repeated_spaces() {
        let p = Policy::parse("  /usr/bin/python   ask  bind   192.168.1.1 ").unwrap();
        assert_eq!(p.category, Category::Ask);
        assert_eq!(p.object, "192.168.1.1");
    }

    #[test]
    fn test_parse_signal_rule_without_object() {
        let p = Policy::parse("/usr/bin/python3 deny signal").unwrap();
        assert_eq!(p.operation, Some(Operation::Signal));
        assert!(p.object.is_empty());
    }

    #[test]
    fn test_parse_signal_rule_rejects_object() {
        assert!(matches!(
            Policy::parse("/usr/bin/python3 deny signal 15"),
            Err(PolicyError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_analyze_rule() {
        let p = Policy::parse("/opt/app/bin/server analyze").unwrap();
        assert_eq!(p.category, Category::Analyze);
        assert_eq!(p.operation, None);
        assert!(p.object.is_empty());
    }

    #[test]
    fn test_parse_analyze_rejects_operation() {
        assert!(Policy::parse("/opt/app analyze open /etc").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "",
            "/bin/cat",
            "/bin/cat deny",
            "/bin/cat block open x",
            "/bin/cat deny undefined x",
            "/bin/cat deny open",
            "/bin/cat deny open a b",
        ] {
            assert!(Policy::parse(text).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_new_rejects_analyze_category() {
        assert!(Policy::new(Category::Analyze, "/bin/x", Operation::Execve, "any").is_err());
    }

    #[test]
    fn test_record_hit() {
        let p = Policy::parse("/bin/nc deny connect any").unwrap();
        p.record_hit();
        p.record_hit();
        assert_eq!(p.hit_count(), 2);
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for text in [
            "/bin/cat deny open secret",
            "/bin/kill ask signal",
            "/opt/app analyze",
        ] {
            let p = Policy::parse(text).unwrap();
            assert_eq!(p.to_string(), text);
            assert_eq!(Policy::parse(&p.to_string()).unwrap(), p);
        }
    }

    #[test]
    fn test_listing_line() {
        let p = Policy::parse("/bin/cat deny open secret").unwrap();
        p.record_hit();
        assert_eq!(
            p.listing_line(3),
            "rule #3 : /bin/cat deny open secret (hit count 1)"
        );
        let a = Policy::parse("/opt/app analyze").unwrap();
        assert_eq!(a.listing_line(0), "rule #0 : /opt/app analyze - - (hit count 0)");
    }

    #[test]
    fn test_clone_keeps_hit_count() {
        let p = Policy::parse("/bin/cat deny open secret").unwrap();
        p.record_hit();
        let q = p.clone();
        assert_eq!(q.hit_count(), 1);
        p.record_hit();
        assert_eq!(q.hit_count(), 1);
    }
}
