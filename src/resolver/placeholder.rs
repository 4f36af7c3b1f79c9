use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("Unable to resolve property ${{{0}}}")]
    Unresolved(String),
    #[error("Property ${{{0}}} refers to itself")]
    Recursive(String),
}

/// Expands every `${key}` in `text`, expanding looked up values again until no
/// placeholder is left. An unterminated `${` is kept as written.
pub fn substitute<F>(text: &str, lookup: F) -> Result<String, PlaceholderError>
where
    F: Fn(&str) -> Option<String>,
{
    expand(text, &lookup, &mut Vec::new())
}

fn expand<F>(text: &str, lookup: &F, visiting: &mut Vec<String>) -> Result<String, PlaceholderError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('}') else {
            result.push_str(&rest[start..]);
            return Ok(result);
        };
        let key = &rest[start + 2..start + end];
        if visiting.iter().any(|visited| visited == key) {
            return Err(PlaceholderError::Recursive(key.to_owned()));
        }
        let value = lookup(key).ok_or_else(|| PlaceholderError::Unresolved(key.to_owned()))?;
        visiting.push(key.to_owned());
        let expanded = expand(&value, lookup, visiting)?;
        visiting.pop();
        result.push_str(&expanded);
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    use pretty_assertions::assert_eq;

    fn lookup(properties: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let properties = properties
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| properties.get(key).cloned()
    }

    #[test]
    fn nested_placeholders() {
        let lookup = lookup(&[("a", "${b}.${c}"), ("b", "1"), ("c", "${d}"), ("d", "2")]);
        assert_eq!(substitute("v${a}-final", lookup), Ok("v1.2-final".to_owned()));
    }

    #[test]
    fn same_property_twice_is_not_recursion() {
        let lookup = lookup(&[("v", "1.0")]);
        assert_eq!(substitute("${v}/${v}", lookup), Ok("1.0/1.0".to_owned()));
    }

    #[test]
    fn recursion_is_detected() {
        let lookup = lookup(&[("a", "${b}"), ("b", "${a}")]);
        assert_eq!(
            substitute("${a}", lookup),
            Err(PlaceholderError::Recursive("a".to_owned()))
        );
    }

    #[test]
    fn unresolved_property() {
        assert_eq!(
            substitute("${missing}", lookup(&[])),
            Err(PlaceholderError::Unresolved("missing".to_owned()))
        );
        assert_eq!(substitute("${open", lookup(&[])), Ok("${open".to_owned()));
    }
}
