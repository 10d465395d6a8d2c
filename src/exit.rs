// src/exit.rs
//! Standardized process exit codes for `graft`.
//!
//! The CLI contract is deliberately narrow: 0 on full success, 1 on invalid
//! arguments, front-end failure or manifest I/O failure.

use std::process::Termination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GraftExit {
    /// All translation units were instrumented and the manifest was written.
    Success = 0,
    /// Argument, parse or manifest error.
    Error = 1,
}

impl GraftExit {
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Termination for GraftExit {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn report(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self.code() as u8)
    }
}

impl From<anyhow::Result<()>> for GraftExit {
    fn from(res: anyhow::Result<()>) -> Self {
        match res {
            Ok(()) => Self::Success,
            Err(e) => {
                eprintln!("Error: {e}");
                Self::Error
            }
        }
    }
}
