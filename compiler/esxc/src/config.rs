//! Driver configuration.

use esx_diagnostic::emitter::ColorMode;
use esx_diagnostic::queue::DiagnosticConfig;
use esx_kernel::SynthesisOptions;
use esx_lower::LowerOptions;
use thiserror::Error;

/// Options for one device compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Total flattened kernel argument size above which W1001 is issued.
    pub max_kernel_args_size: u64,
    /// Name kernels by their stable lambda name.
    pub unnamed_lambda: bool,
    /// Reject kernel arguments whose class is not standard layout.
    pub std_layout_kernel_params: bool,
    /// Errors reported before the rest are dropped (0 = unlimited).
    pub error_limit: usize,
    /// Render the integration header after synthesis.
    pub emit_header: bool,
    pub color: ColorMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_kernel_args_size: esx_kernel::handlers::MAX_KERNEL_ARGS_SIZE,
            unnamed_lambda: false,
            std_layout_kernel_params: false,
            error_limit: 10,
            emit_header: true,
            color: ColorMode::Auto,
        }
    }
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for `{flag}`")]
    InvalidValue { flag: &'static str, value: String },
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag,
        value: value.to_string(),
    })
}

impl Config {
    /// Apply one command-line flag. Returns `Ok(false)` when `arg` is not a
    /// configuration flag.
    pub fn apply_flag(&mut self, arg: &str) -> Result<bool, ConfigError> {
        if let Some(value) = arg.strip_prefix("--max-kernel-args-size=") {
            self.max_kernel_args_size = parse_number("--max-kernel-args-size", value)?;
        } else if let Some(value) = arg.strip_prefix("--error-limit=") {
            self.error_limit = parse_number("--error-limit", value)?;
        } else if let Some(value) = arg.strip_prefix("--color=") {
            self.color = match value {
                "auto" => ColorMode::Auto,
                "always" => ColorMode::Always,
                "never" => ColorMode::Never,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        flag: "--color",
                        value: value.to_string(),
                    })
                }
            };
        } else if arg == "--unnamed-lambda" {
            self.unnamed_lambda = true;
        } else if arg == "--std-layout-kernel-params" {
            self.std_layout_kernel_params = true;
        } else if arg == "--no-header" {
            self.emit_header = false;
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    /// Build a config from `args`, returning the arguments that are not
    /// configuration flags.
    pub fn from_args<'a>(
        args: impl IntoIterator<Item = &'a str>,
    ) -> Result<(Config, Vec<&'a str>), ConfigError> {
        let mut config = Config::default();
        let mut rest = Vec::new();
        for arg in args {
            if !config.apply_flag(arg)? {
                rest.push(arg);
            }
        }
        Ok((config, rest))
    }

    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            max_kernel_args_size: self.max_kernel_args_size,
            unnamed_lambda: self.unnamed_lambda,
            std_layout_kernel_params: self.std_layout_kernel_params,
        }
    }

    pub fn lower_options(&self) -> LowerOptions {
        LowerOptions::default()
    }

    pub fn diagnostic_config(&self) -> DiagnosticConfig {
        DiagnosticConfig {
            error_limit: self.error_limit,
            ..DiagnosticConfig::default()
        }
    }
}
