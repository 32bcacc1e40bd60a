//! Tokenizer for `name=value[,name=value]*` condition strings.

/// One `name=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Key, case-sensitive.
    pub name: String,
    /// Raw value text.
    pub value: String,
}

/// Pairs in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyList {
    properties: Vec<Property>,
}

impl PropertyList {
    /// Value of the first property called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .map(|property| property.value.as_str())
    }

    /// Iterates the properties in order.
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` when there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Parses a condition string.
///
/// Whitespace around names and values is ignored. Empty input, an empty
/// name or value, a missing or repeated `=`, or a stray `,` rejects the
/// whole string; there is no partial result.
#[must_use]
pub fn parse_properties(text: &str) -> Option<PropertyList> {
    if text.trim().is_empty() {
        return None;
    }
    let properties = text
        .split(',')
        .map(parse_pair)
        .collect::<Option<Vec<_>>>()?;
    Some(PropertyList { properties })
}

fn parse_pair(token: &str) -> Option<Property> {
    let (name, value) = token.split_once('=')?;
    let name = name.trim();
    let value = value.trim();
    if !is_atom(name) || !is_atom(value) {
        return None;
    }
    Some(Property {
        name: name.to_owned(),
        value: value.to_owned(),
    })
}

fn is_atom(text: &str) -> bool {
    !text.is_empty() && !text.contains(|c: char| c == '=' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_pairs_in_order() {
        let list =
            parse_properties("when=ongcmarkcomplete,gen=2,promoted_bytes_threshold=1000")
                .expect("valid condition");
        let names: Vec<_> = list.iter().map(|property| property.name.as_str()).collect();
        assert_eq!(names, ["when", "gen", "promoted_bytes_threshold"]);
        assert_eq!(list.get("gen"), Some("2"));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let list = parse_properties("  when = ongcmarkcomplete ,\tgen=1 ").expect("valid");
        assert_eq!(list.get("when"), Some("ongcmarkcomplete"));
        assert_eq!(list.get("gen"), Some("1"));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("when=,gen=2")]
    #[case("=value")]
    #[case("when")]
    #[case("when=a=b")]
    #[case("when=a,")]
    #[case(",when=a")]
    #[case("when=a,,gen=2")]
    #[case("wh en=a")]
    fn rejects_malformed_input(#[case] text: &str) {
        assert_eq!(parse_properties(text), None);
    }
}
