pub mod completion;
pub mod store;
pub mod sweeper;

pub use completion::CompletionTrigger;
pub use store::{
    Clock, CompletionEvent, CompletionObserver, ManualClock, SessionStats, SessionStore,
    SystemClock,
};
