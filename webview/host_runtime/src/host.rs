//! The host application surface the bridge drives: a single-writer
//! document mutated only inside transactions, plus the host's own notice
//! dialogs.

use crate::error::HostError;
use std::ops::{Deref, DerefMut};

pub trait Document {
    fn begin_transaction(&mut self, name: &str) -> Result<(), HostError>;
    fn commit_transaction(&mut self) -> Result<(), HostError>;
    fn rollback_transaction(&mut self);
}

/// Open transaction on a document. Rolls back on drop unless committed,
/// so any early return inside a handler leaves the document untouched.
pub struct Transaction<'a, D: Document> {
    document: &'a mut D,
    finished: bool,
}

impl<'a, D: Document> Transaction<'a, D> {
    pub fn start(document: &'a mut D, name: &str) -> Result<Self, HostError> {
        document.begin_transaction(name)?;
        Ok(Self {
            document,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<(), HostError> {
        self.finished = true;
        match self.document.commit_transaction() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.document.rollback_transaction();
                Err(err)
            }
        }
    }
}

impl<D: Document> Deref for Transaction<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &*self.document
    }
}

impl<D: Document> DerefMut for Transaction<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut *self.document
    }
}

impl<D: Document> Drop for Transaction<'_, D> {
    fn drop(&mut self) {
        if !self.finished {
            self.document.rollback_transaction();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A modal message shown by the host, outside the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

pub trait HostApplication: 'static {
    fn notify(&mut self, notice: Notice);
}
