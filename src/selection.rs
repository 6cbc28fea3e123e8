use crate::data::RecordId;

type Listener = Box<dyn FnMut(Option<RecordId>)>;

/// The one clicked country, if any. Listeners hear every change.
#[derive(Default)]
pub struct Selection {
    current: Option<RecordId>,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Selection {
    pub fn subscribe(&mut self, listener: impl FnMut(Option<RecordId>) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn current(&self) -> Option<RecordId> {
        self.current
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Sets the selection, replacing any previous one.
    pub fn select(&mut self, record: RecordId) {
        self.current = Some(record);
        self.emit();
    }

    /// Unsets the selection. Silent when nothing was selected.
    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            self.emit();
        }
    }

    fn emit(&mut self) {
        let current = self.current;
        for listener in &mut self.listeners {
            listener(current);
        }
    }
}
