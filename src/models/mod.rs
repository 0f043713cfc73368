pub mod task;
pub mod user;

pub use task::{
    welcome_tasks, BulkTaskRequest, CompletionCount, NewTask, Priority, Task, TaskPatch,
    MAX_BULK_TASKS, TASK_FIELDS,
};
pub use user::{
    LogonRequest, NewUser, RegisterRequest, User, UserCredentials, UserWithStats, USER_FIELDS,
};
