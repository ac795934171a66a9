use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TicTacResult<T> = Result<T, TicTacError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Success,
    InputValidationError,
    IoSystemError,
    ComputationError,
    PersistenceError,
    InternalError,
}

impl ErrorCategory {
    pub const fn exit_descriptor(self) -> ExitDescriptor {
        match self {
            Self::Success => ExitDescriptor {
                exit_code: 0,
                rust_category: "Success",
                run_class: "SUCCESS",
            },
            Self::InputValidationError => ExitDescriptor {
                exit_code: 2,
                rust_category: "InputValidationError",
                run_class: "CONFIG_FATAL",
            },
            Self::IoSystemError => ExitDescriptor {
                exit_code: 3,
                rust_category: "IoSystemError",
                run_class: "IO_FATAL",
            },
            Self::ComputationError => ExitDescriptor {
                exit_code: 4,
                rust_category: "ComputationError",
                run_class: "NUMERIC_FATAL",
            },
            Self::PersistenceError => ExitDescriptor {
                exit_code: 5,
                rust_category: "PersistenceError",
                run_class: "STORE_FATAL",
            },
            Self::InternalError => ExitDescriptor {
                exit_code: 6,
                rust_category: "InternalError",
                run_class: "SYS_FATAL",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.exit_descriptor().exit_code
    }

    pub const fn rust_category(self) -> &'static str {
        self.exit_descriptor().rust_category
    }

    pub const fn run_class(self) -> &'static str {
        self.exit_descriptor().run_class
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitDescriptor {
    pub exit_code: i32,
    pub rust_category: &'static str,
    pub run_class: &'static str,
}

/// Error carried across module boundaries of the solver pipeline.
///
/// The placeholder is a stable machine-readable code (`INPUT.GRID`,
/// `RUN.EIGEN`, `STORE.FINGERPRINT`, ...) that tests and the CLI match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicTacError {
    category: ErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl TicTacError {
    pub fn new(
        category: ErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ComputationError, placeholder, message)
    }

    pub fn persistence(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::PersistenceError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for TicTacError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.rust_category(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for TicTacError {}
