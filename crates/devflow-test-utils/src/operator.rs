//! Scripted operator

use devflow_core::{CoreError, Operator};

/// [`Operator`] that never waits and remembers what it was shown
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperator {
    /// Banners the operator confirmed
    pub confirmed: Vec<String>,
    /// Messages shown without waiting
    pub notified: Vec<String>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, banner: &str) -> Result<(), CoreError> {
        self.confirmed.push(banner.to_string());
        Ok(())
    }

    fn notify(&mut self, message: &str) {
        self.notified.push(message.to_string());
    }
}
