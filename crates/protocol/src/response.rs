//! Response serialization (spec §4.10): the `<response><result>…</result></response>`
//! envelope, `<file>`/`<dir>` entry rendering, and `<event>` rendering.

use fsal_core::{ChangeEvent, FsEntry};

use crate::xml::Element;

/// One assembled protocol response, built up by [`crate::dispatch`] and
/// rendered to a NUL-free XML document via [`Response::render`].
#[derive(Debug, Default)]
pub struct Response {
    success: bool,
    error: Option<String>,
    params: Vec<Element>,
    count: Option<u64>,
    is_match: Option<bool>,
    is_partial: Option<bool>,
    events: Option<Vec<ChangeEvent>>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn ok_if(success: bool) -> Self {
        Self {
            success,
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_params(mut self, params: Vec<Element>) -> Self {
        self.params = params;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_is_match(mut self, is_match: bool) -> Self {
        self.is_match = Some(is_match);
        self
    }

    pub fn with_is_partial(mut self, is_partial: bool) -> Self {
        self.is_partial = Some(is_partial);
        self
    }

    pub fn with_events(mut self, events: Vec<ChangeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Renders the complete response document (no trailing NUL — framing is
    /// the server's concern, not the response's).
    pub fn render(&self) -> Vec<u8> {
        let mut result = vec![Element::leaf("success", bool_str(self.success))];
        if let Some(error) = &self.error {
            result.push(Element::leaf("error", error.clone()));
        }
        if !self.params.is_empty() {
            result.push(Element::parent("params", self.params.clone()));
        }
        if let Some(count) = self.count {
            result.push(Element::leaf("count", count.to_string()));
        }
        if let Some(is_match) = self.is_match {
            result.push(Element::leaf("is-match", bool_str(is_match)));
        }
        if let Some(is_partial) = self.is_partial {
            result.push(Element::leaf("is_partial", bool_str(is_partial)));
        }
        if let Some(events) = &self.events {
            result.push(Element::parent("events", events.iter().map(render_event).collect()));
        }

        let root = Element::parent("response", vec![Element::parent("result", result)]);
        crate::xml::write(&root)
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn render_event(event: &ChangeEvent) -> Element {
    Element::parent(
        "event",
        vec![
            Element::leaf("type", event.kind()),
            Element::leaf("src", event.path()),
            Element::leaf("is_dir", bool_str(event.is_dir())),
        ],
    )
}

/// One `<file>` or `<dir>` entry, per spec §4.10.
pub fn render_entry(entry: &FsEntry) -> Element {
    let tag = if entry.entry_type.is_dir() { "dir" } else { "file" };
    Element::parent(
        tag,
        vec![
            Element::leaf("base-path", entry.base_path.clone()),
            Element::leaf("rel-path", entry.path.clone()),
            Element::leaf("create-timestamp", format!("{:.1}", entry.create_time as f64)),
            Element::leaf("modify-timestamp", format!("{:.1}", entry.modify_time as f64)),
            Element::leaf("size", entry.size.to_string()),
        ],
    )
}

/// Splits a flat row set into `<dirs>`/`<files>` param elements, the shape
/// `LIST_DIR`/`LIST_DESCENDANTS`/`SEARCH`/`FILTER` all share.
pub fn render_dirs_and_files(entries: &[FsEntry]) -> Vec<Element> {
    let (dirs, files): (Vec<&FsEntry>, Vec<&FsEntry>) = entries.iter().partition(|e| e.entry_type.is_dir());
    vec![
        Element::parent("dirs", dirs.into_iter().map(render_entry).collect()),
        Element::parent("files", files.into_iter().map(render_entry).collect()),
    ]
}
