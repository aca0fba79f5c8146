use agenda_core::config::{ConfigOverrides, fold_name};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Reference instant instead of now (ISO-8601, local or with offset)
    #[arg(long, value_name = "DATETIME", global = true)]
    pub at: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show due alarms followed by overdue, active and upcoming tasks
    ///
    /// Example: agenda agenda --user u-1 --at "2024-01-03 07:30"
    Agenda {
        #[arg(long)]
        user: Option<String>,
    },
    /// List completed tasks
    ///
    /// Example: agenda completed --user u-1
    Completed {
        #[arg(long)]
        user: Option<String>,
    },
    /// List alarms by their next fire time
    ///
    /// Example: agenda upcoming --user u-1
    Upcoming {
        #[arg(long)]
        user: Option<String>,
    },
    /// Classify a single task against the reference instant
    ///
    /// Example: agenda status 12 --user u-1
    Status {
        id: i64,
        #[arg(long)]
        user: Option<String>,
    },
    /// Show when an alarm fires next
    ///
    /// Example: agenda next 3 --user u-1
    Next {
        id: i64,
        #[arg(long)]
        user: Option<String>,
    },
    /// Report alarms due right now and mark one-shot alarms as spent
    ///
    /// Example: agenda ring
    Ring,
    /// Validate every record in the snapshot
    ///
    /// Example: agenda check
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    UtcOffset,
    DefaultUser,
    Theme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let (key, value) = raw
        .trim()
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let field = fold_name(key);
    let target = match field.as_str() {
        "" => return Err("override key cannot be empty".to_string()),
        "utc_offset" | "offset" => ConfigOverrideTarget::UtcOffset,
        "default_user" | "user" => ConfigOverrideTarget::DefaultUser,
        "theme" => ConfigOverrideTarget::Theme,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride {
        target,
        value: value.trim().to_string(),
    })
}

pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)?;
        match parsed.target {
            ConfigOverrideTarget::UtcOffset => overrides.utc_offset = Some(parsed.value),
            ConfigOverrideTarget::DefaultUser => overrides.default_user = Some(parsed.value),
            ConfigOverrideTarget::Theme => overrides.theme = Some(parsed.value),
        }
    }
    Ok(overrides)
}
