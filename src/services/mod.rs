pub mod autosave;
pub mod reminder;

pub use autosave::AutosaveService;
pub use reminder::ReminderService;
