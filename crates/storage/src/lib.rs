pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStorage;
pub use record::{
    now_rfc3339, RoutineExercise, RoutineRecord, SeriesRecord, SessionClose, SessionRecord,
};
pub use traits::{RoutineStore, SessionStore};
