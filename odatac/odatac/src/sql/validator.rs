use std::fmt::Debug;
use std::sync::OnceLock;

use regex::Regex;

/// Policy for identifiers written into SQL.
pub trait NameValidator: Debug + Send + Sync {
    /// Whether `name` may be written as an identifier.
    fn test(&self, name: &str) -> bool;

    /// Quotes `name` using `format`, in which `$1` stands for the name.
    fn escape(&self, name: &str, format: &str) -> String {
        format.replace("$1", name)
    }
}

/// Accepts dotted names of plain identifiers, such as `Order.customer`.
/// Each segment is quoted on its own; a `*` segment is left as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectNameValidator;

fn valid_segment() -> &'static Regex {
    static VALID_SEGMENT: OnceLock<Regex> = OnceLock::new();
    VALID_SEGMENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

impl NameValidator for ObjectNameValidator {
    fn test(&self, name: &str) -> bool {
        let mut segments = name.split('.').peekable();
        while let Some(segment) = segments.next() {
            let is_last = segments.peek().is_none();
            if !(valid_segment().is_match(segment) || (is_last && segment == "*")) {
                return false;
            }
        }
        true
    }

    fn escape(&self, name: &str, format: &str) -> String {
        name.split('.')
            .map(|segment| match segment {
                "*" => segment.to_string(),
                _ => format.replace("$1", segment),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_object_names() {
        let validator = ObjectNameValidator;
        assert!(validator.test("name"));
        assert!(validator.test("Order.customer_id"));
        assert!(validator.test("User.*"));
        assert!(!validator.test("1abc"));
        assert!(!validator.test("name; DROP TABLE x"));
        assert!(!validator.test("a..b"));
        assert!(!validator.test("*.a"));

        assert_eq!(validator.escape("User.name", "\"$1\""), r#""User"."name""#);
        assert_eq!(validator.escape("User.*", "[$1]"), "[User].*");
    }
}
