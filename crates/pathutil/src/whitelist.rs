/// An ordered inclusion filter. When non-empty, only paths equal to a
/// configured prefix or lying strictly beneath one (`prefix + "/"`) are
/// visible and indexable. An empty whitelist allows everything.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    prefixes: Vec<String>,
}

impl Whitelist {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self { prefixes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn is_whitelisted(&self, rel: &str) -> bool {
        if self.prefixes.is_empty() {
            return true;
        }
        self.prefixes.iter().any(|prefix| {
            rel == prefix || rel.starts_with(&format!("{prefix}/"))
        })
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}
