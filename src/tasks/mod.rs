mod change;

pub use change::ChangeTask;
