//! Application error type.
//!
//! Every fallible operation returns `AppError`, which carries the process exit
//! code alongside the message so `main` can map failures without matching on
//! variants:
//!
//! - `2` configuration, input files and persisted artifacts
//! - `3` structural data problems (wrong index kind, not enough rows to split)
//! - `4` external sources and numeric failures

pub const EXIT_INPUT: u8 = 2;
pub const EXIT_STRUCTURAL: u8 = 3;
pub const EXIT_EXTERNAL: u8 = 4;

#[derive(Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(EXIT_STRUCTURAL, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(EXIT_EXTERNAL, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
