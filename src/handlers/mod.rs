pub mod events;

pub use events::BotHandler;
