//! Multi-valued query string parameters.

use crate::errors::{Result, SlicerError};

/// Every `name=value` pair of a query string, in the order they were sent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        QueryParams { pairs }
    }

    /// First value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of `name`, in occurrence order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Splits every occurrence of `name` on `separator` and concatenates the
    /// tokens, preserving order.
    pub fn split_all(&self, name: &str, separator: char) -> Vec<String> {
        self.get_all(name)
            .flat_map(|value| value.split(separator))
            .map(str::to_string)
            .collect()
    }
}

/// A parameter restricted to a fixed set of lower-case literals.
pub trait ParameterChoice: Sized + Copy + 'static {
    const NAME: &'static str;
    const CHOICES: &'static [(&'static str, Self)];
    const DEFAULT: Self;
}

/// Reads a [`ParameterChoice`] from `params`. The value is matched
/// case-insensitively; a missing or empty value selects the default.
pub fn validated_parameter<T: ParameterChoice>(params: &QueryParams) -> Result<T> {
    let value = match params.get(T::NAME) {
        Some(value) if !value.is_empty() => value.to_lowercase(),
        _ => return Ok(T::DEFAULT),
    };

    T::CHOICES
        .iter()
        .find(|(literal, _)| *literal == value)
        .map(|(_, choice)| *choice)
        .ok_or_else(|| {
            let names: Vec<&str> = T::CHOICES.iter().map(|(literal, _)| *literal).collect();
            SlicerError::Request(format!(
                "Parameter '{}' should be one of: {}",
                T::NAME,
                names.join(", ")
            ))
        })
}

/// Interprets the usual spellings of a boolean. Anything else is undecided.
pub fn str_to_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Shape {
        Round,
        Square,
    }

    impl ParameterChoice for Shape {
        const NAME: &'static str = "shape";
        const CHOICES: &'static [(&'static str, Self)] =
            &[("round", Shape::Round), ("square", Shape::Square)];
        const DEFAULT: Self = Shape::Round;
    }

    #[test]
    fn test_parse_keeps_every_occurrence() {
        let params = QueryParams::parse(Some("cut=a:1&cut=b:2&page=3"));
        assert_eq!(params.get("cut"), Some("a:1"));
        assert_eq!(params.get_all("cut").collect::<Vec<_>>(), vec!["a:1", "b:2"]);
        assert_eq!(params.get("page"), Some("3"));
        assert!(!params.contains("pagesize"));
    }

    #[test]
    fn test_parse_decodes_values() {
        let params = QueryParams::parse(Some("cut=date%3A2024%7Cgeo%3Aus&name=a+b"));
        assert_eq!(params.get("cut"), Some("date:2024|geo:us"));
        assert_eq!(params.get("name"), Some("a b"));
    }

    #[test]
    fn test_parse_without_query() {
        let params = QueryParams::parse(None);
        assert_eq!(params, QueryParams::default());
        assert_eq!(params.get_all("cut").count(), 0);
    }

    #[test]
    fn test_split_all_concatenates_occurrences() {
        let params = QueryParams::parse(Some("aggregates=a%7Cb&aggregates=c"));
        assert_eq!(params.split_all("aggregates", '|'), vec!["a", "b", "c"]);
        assert!(params.split_all("drilldown", '|').is_empty());
    }

    #[test]
    fn test_validated_parameter() {
        let params = QueryParams::parse(Some("shape=SQUARE"));
        assert_eq!(validated_parameter::<Shape>(&params).unwrap(), Shape::Square);

        let params = QueryParams::parse(Some("shape="));
        assert_eq!(validated_parameter::<Shape>(&params).unwrap(), Shape::Round);

        let params = QueryParams::parse(None);
        assert_eq!(validated_parameter::<Shape>(&params).unwrap(), Shape::Round);

        let params = QueryParams::parse(Some("shape=triangle"));
        let err = validated_parameter::<Shape>(&params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'shape' should be one of: round, square"
        );
    }

    #[test]
    fn test_str_to_bool() {
        for value in ["true", "Yes", "1", "ON"] {
            assert_eq!(str_to_bool(value), Some(true), "{value}");
        }
        for value in ["false", "no", "0", "Off"] {
            assert_eq!(str_to_bool(value), Some(false), "{value}");
        }
        assert_eq!(str_to_bool("maybe"), None);
        assert_eq!(str_to_bool(""), None);
    }
}
