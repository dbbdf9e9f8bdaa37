//! Domain - ドメインモデル（category, ids, state, task）

pub mod category;
pub mod ids;
pub mod state;
pub mod task;

pub use self::category::Category;
pub use self::ids::TaskId;
pub use self::state::TaskStatus;
pub use self::task::{DEFAULT_MAX_RETRIES, Task};
