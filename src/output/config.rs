use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputConfig {
    /// `--json` always selects the JSON presenter; otherwise DOCTALK_OUTPUT_FORMAT decides.
    pub fn from_env() -> Self {
        let format = if crate::telemetry::config::json_mode() {
            OutputFormat::Json
        } else {
            parse_format(env::var("DOCTALK_OUTPUT_FORMAT").ok().as_deref())
        };
        let pretty = parse_flag(env::var("DOCTALK_OUTPUT_PRETTY").ok().as_deref());
        OutputConfig { format, pretty }
    }
}

fn parse_format(v: Option<&str>) -> OutputFormat {
    match v {
        Some(v) if v.eq_ignore_ascii_case("json") => OutputFormat::Json,
        _ => OutputFormat::Text,
    }
}

fn parse_flag(v: Option<&str>) -> bool {
    matches!(v, Some(v) if v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_flag_parsing() {
        assert_eq!(parse_format(Some("JSON")), OutputFormat::Json);
        assert_eq!(parse_format(Some("mcp")), OutputFormat::Text);
        assert_eq!(parse_format(None), OutputFormat::Text);
        assert!(parse_flag(Some("yes")));
        assert!(parse_flag(Some("1")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(None));
    }
}
