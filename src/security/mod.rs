pub mod command_executor;
pub mod token_manager;

pub use command_executor::{
    CancelHandle, CommandError, CommandOutput, CommandRunner, ExecutionContext, Invocation,
    SafeCommandExecutor,
};
pub use token_manager::SecureTokenManager;
