//! Header binding generation
//!
//! Builds the header translator from its checkout under the external dir,
//! then runs it once per configured header. The translator writes its output
//! next to the header, so each run happens in the header's directory.

use crate::config::DevflowConfig;
use crate::error::CoreError;
use crate::runner::{CommandRunner, ToolInvocation};
use std::path::{Path, PathBuf};

/// Drives the header translator
#[derive(Debug)]
pub struct BindingGenerator<'a, R> {
    config: &'a DevflowConfig,
    runner: R,
}

impl<'a, R: CommandRunner> BindingGenerator<'a, R> {
    /// Create a generator
    pub fn new(config: &'a DevflowConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn generator_dir(&self) -> PathBuf {
        self.config
            .external_dir()
            .join(&self.config.bindings.generator)
    }

    /// Invocation building the translator
    #[must_use]
    pub fn build_invocation(&self) -> ToolInvocation {
        let dir = self.generator_dir();
        ToolInvocation::new(&self.config.build.program)
            .arg("build")
            .current_dir(&dir)
            .expect_output(dir.join(&self.config.bindings.generator_binary))
    }

    /// Invocation translating one header, relative to the external dir
    #[must_use]
    pub fn header_invocation(&self, header: &Path) -> ToolInvocation {
        let header = self.config.external_dir().join(header);
        let binary = self
            .generator_dir()
            .join(&self.config.bindings.generator_binary);
        let invocation = ToolInvocation::new(binary);
        match (header.parent(), header.file_name()) {
            (Some(dir), Some(file)) => invocation.arg(file).current_dir(dir),
            _ => invocation.arg(&header),
        }
    }

    /// Build the translator and run it over every header
    ///
    /// Returns the number of headers translated.
    ///
    /// # Errors
    /// Returns the first tool failure
    pub fn generate(&self) -> Result<usize, CoreError> {
        tracing::info!("building {}", self.config.bindings.generator.display());
        self.runner.run(&self.build_invocation())?;

        for header in &self.config.bindings.headers {
            tracing::info!("generating bindings for {}", header.display());
            self.runner.run(&self.header_invocation(header))?;
        }
        Ok(self.config.bindings.headers.len())
    }
}
