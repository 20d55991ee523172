/// Diagnostics sink for ingestion and view building
///
/// Two severities only: a warning means the operation recovered (a column
/// was defaulted, a filter clause dropped), a critical means part of the
/// result could not be produced correctly.
///
/// # Examples
///
/// ```
/// use livepivot::{CollectedDiagnostics, Diagnostics, Severity};
///
/// let diagnostics = CollectedDiagnostics::new();
/// diagnostics.warn("column 'x' defaulted to string");
///
/// assert_eq!(diagnostics.count(Severity::Warning), 1);
/// assert_eq!(diagnostics.count(Severity::Critical), 0);
/// ```

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Critical,
}

/// Receiver for recoverable and fatal diagnostics.
pub trait Diagnostics {
    fn warn(&self, message: &str);
    fn critical(&self, message: &str);
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn critical(&self, message: &str) {
        log::error!("{}", message);
    }
}

/// Keeps every diagnostic in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectedDiagnostics {
    entries: RefCell<Vec<(Severity, String)>>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries.borrow().clone()
    }

    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.borrow().iter().filter(|(s, _)| *s == severity).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Diagnostics for CollectedDiagnostics {
    fn warn(&self, message: &str) {
        self.entries.borrow_mut().push((Severity::Warning, message.to_string()));
    }

    fn critical(&self, message: &str) {
        self.entries.borrow_mut().push((Severity::Critical, message.to_string()));
    }
}

/// Lets one sink be handed to a table and still be inspected afterwards.
impl<T: Diagnostics + ?Sized> Diagnostics for Rc<T> {
    fn warn(&self, message: &str) {
        (**self).warn(message);
    }

    fn critical(&self, message: &str) {
        (**self).critical(message);
    }
}
