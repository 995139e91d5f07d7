use crate::document::{ElementId, ElementKind, ModelDocument, Xyz};
use flowbridge_host_runtime::{HandlerError, HostApplication, HostError, Notice, NoticeLevel};
use std::collections::VecDeque;

/// Answer to an interactive selection prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pick {
    Element(ElementId),
    Point(Xyz),
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickRequest {
    Element(ElementKind),
    Point,
}

/// Source of the user's interactive selections.
pub trait Picker {
    fn pick(&mut self, document: &ModelDocument, request: PickRequest, prompt: &str) -> Pick;
}

/// Replays a fixed sequence of picks; cancels once it runs out.
#[derive(Debug, Default)]
pub struct ScriptedPicker {
    picks: VecDeque<Pick>,
}

impl ScriptedPicker {
    pub fn new(picks: impl IntoIterator<Item = Pick>) -> Self {
        Self {
            picks: picks.into_iter().collect(),
        }
    }
}

impl Picker for ScriptedPicker {
    fn pick(&mut self, _document: &ModelDocument, _request: PickRequest, _prompt: &str) -> Pick {
        self.picks.pop_front().unwrap_or(Pick::Cancel)
    }
}

/// Picks the first element of the requested kind, and the midpoint of the
/// last picked wall for point prompts.
#[derive(Debug, Default)]
pub struct AutoPicker {
    last_element: Option<ElementId>,
}

impl Picker for AutoPicker {
    fn pick(&mut self, document: &ModelDocument, request: PickRequest, prompt: &str) -> Pick {
        let pick = match request {
            PickRequest::Element(kind) => document
                .elements_of(kind)
                .next()
                .map_or(Pick::Cancel, |(id, _)| Pick::Element(id)),
            PickRequest::Point => self
                .last_element
                .and_then(|id| document.wall_midpoint(id))
                .map_or(Pick::Cancel, Pick::Point),
        };
        if let Pick::Element(id) = pick {
            self.last_element = Some(id);
        }
        tracing::info!(prompt, ?pick, "auto-picked");
        pick
    }
}

/// The host application: the active document, the selection UI and the
/// modal notices shown to the user.
pub struct ModelHost {
    document: Option<ModelDocument>,
    picker: Box<dyn Picker>,
    notices: Vec<Notice>,
}

impl ModelHost {
    pub fn new(document: Option<ModelDocument>, picker: Box<dyn Picker>) -> Self {
        Self {
            document,
            picker,
            notices: Vec::new(),
        }
    }

    pub fn active_document(&self) -> Result<&ModelDocument, HostError> {
        self.document.as_ref().ok_or(HostError::NoActiveDocument)
    }

    pub fn active_document_mut(&mut self) -> Result<&mut ModelDocument, HostError> {
        self.document.as_mut().ok_or(HostError::NoActiveDocument)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Prompts for an element of `kind`. A cancelled prompt is
    /// [`HandlerError::Cancelled`]; picking something else is a failure.
    pub fn pick_element(
        &mut self,
        kind: ElementKind,
        prompt: &str,
    ) -> Result<ElementId, HandlerError> {
        let document = self.document.as_ref().ok_or(HostError::NoActiveDocument)?;
        match self.picker.pick(document, PickRequest::Element(kind), prompt) {
            Pick::Element(id) => match document.element(id) {
                Some(element) if element.kind() == kind => Ok(id),
                _ => Err(HandlerError::Failed(format!("selected element is not a {kind:?}"))),
            },
            Pick::Cancel => Err(HandlerError::Cancelled),
            Pick::Point(_) => Err(HandlerError::Failed(
                "expected an element, got a point".to_string(),
            )),
        }
    }

    pub fn pick_point(&mut self, prompt: &str) -> Result<Xyz, HandlerError> {
        let document = self.document.as_ref().ok_or(HostError::NoActiveDocument)?;
        match self.picker.pick(document, PickRequest::Point, prompt) {
            Pick::Point(point) => Ok(point),
            Pick::Cancel => Err(HandlerError::Cancelled),
            Pick::Element(_) => Err(HandlerError::Failed(
                "expected a point, got an element".to_string(),
            )),
        }
    }
}

impl HostApplication for ModelHost {
    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(title = %notice.title, "{}", notice.message),
            NoticeLevel::Error => tracing::error!(title = %notice.title, "{}", notice.message),
        }
        self.notices.push(notice);
    }
}
