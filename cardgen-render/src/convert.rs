//! Binary layer conversion with `usdcat`

use crate::command::{CommandRunner, ToolCommand};
use cardgen_core::Result;
use cardgen_usd::LayerConverter;
use std::path::Path;
use std::sync::Arc;

/// Converts between crate and text layers by shelling out to `usdcat`
pub struct UsdcatConverter {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl UsdcatConverter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "usdcat".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn command(&self, input: &Path, output: &Path) -> ToolCommand {
        let command = ToolCommand::new(self.program.as_str())
            .arg(input)
            .arg("-o")
            .arg(output);
        // `.usd` is ambiguous; binary subjects stay binary
        if output.extension().is_some_and(|ext| ext == "usd") {
            command.args(["--usdFormat", "usdc"])
        } else {
            command
        }
    }
}

impl LayerConverter for UsdcatConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        self.runner.run(&self.command(input, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProcessRunner;
    use std::ffi::OsStr;

    #[test]
    fn test_usdcat_arguments() {
        let converter = UsdcatConverter::new(Arc::new(ProcessRunner)).with_program("usdcat-test");
        let to_text = converter.command(Path::new("in.usdc"), Path::new("out.usda"));
        assert_eq!(to_text.to_string(), "usdcat-test in.usdc -o out.usda");

        let to_binary = converter.command(Path::new("in.usda"), Path::new("out.usd"));
        assert_eq!(to_binary.flag_value("--usdFormat"), Some(OsStr::new("usdc")));
    }
}
