pub mod clock;
pub mod commands;
pub mod editor;
pub mod error;
pub mod gesture;
pub mod history;
pub mod workspace;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use commands::{BoundsChange, Command, CommandKind, CommandOp, RemovedElement, StepSetting};
pub use editor::{Editor, UndoUiState};
pub use error::CommandError;
pub use gesture::{DragGesture, GESTURE_EPSILON, Modifiers, ResizeGesture, ResizeHandle};
pub use history::{History, HistoryConfig, Recorded};
pub use workspace::{EditorHooks, NoopHooks, Selection, Workspace};
