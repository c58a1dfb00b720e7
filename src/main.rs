use std::io::{self, Write};
use std::process::ExitCode;

use appsettings_di::{logging, AppContext, Configuration, Error, Settings};
use serde::Deserialize;
use thiserror::Error;

const SETTINGS_FILE: &str = "appsettings.toml";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MyAppSettings {
    string_setting: String,
    int_setting: i32,
    bool_setting: bool,
}

impl Settings for MyAppSettings {
    const SECTION: &'static str = "MyAppSettings";
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Startup(#[from] Error),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn main() -> ExitCode {
    logging::init_logger();

    let result = Configuration::from_file(SETTINGS_FILE, false)
        .map_err(|e| AppError::from(Error::from(e)))
        .and_then(|config| run(config, &mut io::stdout().lock()));

    ExitCode::from(report(result, &mut io::stderr()))
}

/// Binds the settings from `config` and prints them to `out`.
fn run(config: Configuration, out: &mut impl Write) -> Result<(), AppError> {
    writeln!(out, "Add App Settings to Dependency Injection Demo")?;

    let ctx = AppContext::builder()
        .with_config(config)
        .with_settings::<MyAppSettings>()
        .build()?;

    let settings = ctx.resolve::<MyAppSettings>()?;

    writeln!(out, "\nMy App Settings:")?;
    writeln!(out, "String Setting: {}", settings.string_setting)?;
    writeln!(out, "Int Setting: {}", settings.int_setting)?;
    writeln!(out, "Bool Setting: {}", settings.bool_setting)?;

    Ok(())
}

/// Maps the outcome to an exit status, writing any error to `err`.
fn report(result: Result<(), AppError>, err: &mut impl Write) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(err, "error: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> Configuration {
        Configuration::from_toml_str(toml).unwrap()
    }

    fn run_to_strings(config: Configuration) -> (u8, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run(config, &mut out);
        let status = report(result, &mut err);
        (
            status,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_prints_bound_settings() {
        let (status, out, err) = run_to_strings(config(
            r#"
            [MyAppSettings]
            StringSetting = "hello"
            IntSetting = "42"
            BoolSetting = "true"
            "#,
        ));

        assert_eq!(status, 0);
        assert_eq!(
            out,
            "Add App Settings to Dependency Injection Demo\n\
             \n\
             My App Settings:\n\
             String Setting: hello\n\
             Int Setting: 42\n\
             Bool Setting: true\n"
        );
        assert!(err.is_empty());
    }

    #[test]
    fn test_empty_configuration_prints_defaults() {
        let (status, out, _) = run_to_strings(Configuration::default());

        assert_eq!(status, 0);
        assert!(out.contains("String Setting: \n"));
        assert!(out.contains("Int Setting: 0\n"));
        assert!(out.contains("Bool Setting: false\n"));
    }

    #[test]
    fn test_binding_failure_exits_nonzero() {
        let (status, out, err) = run_to_strings(config("[MyAppSettings]\nIntSetting = \"abc\""));

        assert_eq!(status, 1);
        assert!(!out.contains("My App Settings:"));
        assert!(err.starts_with("error: "));
        assert!(err.contains("MyAppSettings:IntSetting"));
        assert_eq!(err.lines().count(), 1);
    }
}
