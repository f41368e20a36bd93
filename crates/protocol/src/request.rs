use std::collections::HashMap;

use fsal_core::FsalError;

use crate::xml::Element;

/// One parsed request: the command name and its flattened parameter set.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub command: String,
    params: HashMap<String, ParamValue>,
}

#[derive(Debug, Clone)]
enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParsedRequest {
    /// Parses a single `<request><command><type>…</type><params>…</params></command></request>`
    /// document (spec §4.10).
    pub fn parse(xml_bytes: &[u8]) -> Result<Self, FsalError> {
        let root = crate::xml::parse(xml_bytes)?;
        if root.name != "request" {
            return Err(FsalError::Protocol(format!(
                "expected <request> root, found <{}>",
                root.name
            )));
        }
        let command_el = root
            .child("command")
            .ok_or_else(|| FsalError::Protocol("request is missing <command>".to_string()))?;
        let command = command_el
            .child("type")
            .map(|e| e.text_trimmed().to_string())
            .ok_or_else(|| FsalError::Protocol("command is missing <type>".to_string()))?;

        let mut params = HashMap::new();
        if let Some(params_el) = command_el.child("params") {
            for child in &params_el.children {
                params.insert(child.name.clone(), Self::value_of(child));
            }
        }

        Ok(Self { command, params })
    }

    /// A list-valued param has element children (the singularized-tag
    /// wrapper, e.g. `<paths><path>…</path>…</paths>`); a scalar has only
    /// text. Children's own tag names aren't checked — any child's text is
    /// taken, matching spec §4.10's "children carry the singularized tag
    /// name" without requiring the caller to know what that name is.
    fn value_of(el: &Element) -> ParamValue {
        if el.children.is_empty() {
            ParamValue::Scalar(el.text_trimmed().to_string())
        } else {
            ParamValue::List(el.children.iter().map(|c| c.text_trimmed().to_string()).collect())
        }
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        match self.params.get(key) {
            Some(ParamValue::Scalar(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str, FsalError> {
        self.str(key)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FsalError::Protocol(format!("missing required parameter: {key}")))
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.str(key) {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.str(key).and_then(|s| s.parse().ok())
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.str(key).and_then(|s| s.parse().ok())
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        match self.params.get(key) {
            Some(ParamValue::List(items)) => items.clone(),
            Some(ParamValue::Scalar(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_type_and_scalar_params() {
        let doc = b"<request><command><type>LIST_DIR</type><params><path>docs</path></params></command></request>";
        let req = ParsedRequest::parse(doc).unwrap();
        assert_eq!(req.command, "LIST_DIR");
        assert_eq!(req.str("path"), Some("docs"));
    }

    #[test]
    fn parses_list_valued_params() {
        let doc = b"<request><command><type>FILTER</type><params><paths><path>a</path><path>b</path></paths></params></command></request>";
        let req = ParsedRequest::parse(doc).unwrap();
        assert_eq!(req.list("paths"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn missing_command_type_is_a_protocol_error() {
        let doc = b"<request><command><params/></command></request>";
        assert!(ParsedRequest::parse(doc).is_err());
    }

    #[test]
    fn bool_param_parses_lowercase_literals() {
        let doc = b"<request><command><type>SEARCH</type><params><whole_words>true</whole_words></params></command></request>";
        let req = ParsedRequest::parse(doc).unwrap();
        assert!(req.bool("whole_words", false));
        assert!(!req.bool("missing_key", false));
    }
}
