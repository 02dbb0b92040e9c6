// Copyright (c) The buildtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{Args, ValueEnum};
use miette::{GraphicalTheme, MietteHandlerOpts, ThemeStyles};
use owo_colors::{OwoColorize, Style, style};
use std::fmt;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable holding the log filter, in `tracing_subscriber::filter::Targets`
/// syntax.
pub(crate) const LOG_ENV: &str = "BUILDTEST_LOG";

/// Log events with this target are printed without an `error:`/`info:` heading.
pub(crate) const NO_HEADING_TARGET: &str = "buildtest::no_heading";

/// The target prefix shared by every event this crate emits.
const CRATE_TARGET: &str = "buildtest";

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects, Style},
    };

    const HEADER: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const USAGE: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const LITERAL: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    const PLACEHOLDER: Style = AnsiColor::Cyan.on_default();
    const ERROR: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);
    const VALID: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    const INVALID: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);

    pub(crate) const fn style() -> Styles {
        Styles::styled()
            .header(HEADER)
            .usage(USAGE)
            .literal(LITERAL)
            .placeholder(PLACEHOLDER)
            .error(ERROR)
            .valid(VALID)
            .invalid(INVALID)
    }
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Verbose output
    #[arg(long, short, env = "BUILDTEST_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        value_name = "WHEN",
        env = "BUILDTEST_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let OutputOpts { verbose, color } = self;

        color.init(verbose);

        OutputContext { color }
    }
}

/// Output settings resolved from the command line.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns general stderr styles for the current output context.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();

        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }

        styles
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

struct SimpleFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for SimpleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        if metadata.target() != NO_HEADING_TARGET {
            match *metadata.level() {
                Level::ERROR => {
                    write!(writer, "{}: ", "error".style(self.styles.error))?;
                }
                Level::WARN => {
                    write!(writer, "{}: ", "warning".style(self.styles.warning))?;
                }
                Level::INFO => {
                    write!(writer, "{}: ", "info".style(self.styles.info))?;
                }
                Level::DEBUG => {
                    write!(writer, "{}: ", "debug".style(self.styles.debug))?;
                }
                Level::TRACE => {
                    write!(writer, "{}: ", "trace".style(self.styles.trace))?;
                }
            }
        }

        let mut visitor = MessageVisitor {
            writer: &mut writer,
            field_style: self.styles.field,
            error: None,
        };

        event.record(&mut visitor);

        if let Some(error) = visitor.error {
            return Err(error);
        }

        writeln!(writer)
    }
}

static MESSAGE_FIELD: &str = "message";

/// Writes the message, followed by any other fields as `name=value`.
///
/// Tracing records the message first, so the fields always trail it.
struct MessageVisitor<'writer, 'a> {
    writer: &'a mut format::Writer<'writer>,
    field_style: Style,
    error: Option<fmt::Error>,
}

impl Visit for MessageVisitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let result = if field.name() == MESSAGE_FIELD {
            write!(self.writer, "{value:?}")
        } else {
            write!(
                self.writer,
                " {}={value:?}",
                field.name().style(self.field_style)
            )
        };
        if let Err(error) = result {
            self.error = Some(error);
        }
    }
}

impl Color {
    pub(crate) fn init(self, verbose: bool) {
        // Pass the styles in as a stylesheet to ensure we use the latest supports-color here.
        let mut log_styles = LogStyles::default();
        if self.should_colorize(supports_color::Stream::Stderr) {
            log_styles.colorize();
        }

        INIT_LOGGER.call_once(|| {
            let default_level = if verbose {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            };
            let (targets, filter_error) =
                parse_log_filter(std::env::var_os(LOG_ENV), default_level);

            let layer = tracing_subscriber::fmt::layer()
                .event_format(SimpleFormatter { styles: log_styles })
                .with_writer(std::io::stderr)
                .with_filter(targets);

            tracing_subscriber::registry().with(layer).init();

            if let Some(filter_error) = filter_error {
                tracing::warn!("ignoring {LOG_ENV}: {filter_error}");
            }

            let hook_result = miette::set_hook(Box::new(move |_| {
                let theme_styles = if self.should_colorize(supports_color::Stream::Stderr) {
                    ThemeStyles {
                        error: style().red().bold(),
                        warning: style().yellow().bold(),
                        advice: style().bright_cyan().bold(),
                        help: style().cyan(),
                        link: style().cyan().underline().bold(),
                        linum: style().dimmed(),
                        highlights: vec![style().red(), style().yellow(), style().bright_cyan()],
                    }
                } else {
                    ThemeStyles::none()
                };
                let mut graphical_theme = if supports_unicode::on(supports_unicode::Stream::Stderr)
                {
                    GraphicalTheme::unicode()
                } else {
                    GraphicalTheme::ascii()
                };
                graphical_theme.characters.error = "error:".into();
                graphical_theme.styles = theme_styles;

                let handler = MietteHandlerOpts::new().graphical_theme(graphical_theme);
                Box::new(handler.build())
            }));
            if let Err(error) = hook_result {
                tracing::debug!("miette hook was already installed: {error}");
            }
        });
    }

    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Parses the log filter. An unset or empty filter means `default_level` everywhere; an invalid
/// filter also falls back to it, and the reason is returned.
fn parse_log_filter(
    value: Option<std::ffi::OsString>,
    default_level: LevelFilter,
) -> (Targets, Option<String>) {
    let default = || Targets::new().with_default(default_level);
    let Some(value) = value.filter(|value| !value.is_empty()) else {
        return (default(), None);
    };
    let Some(value) = value.to_str() else {
        return (default(), Some("value is not valid UTF-8".to_owned()));
    };
    match value.parse::<Targets>() {
        Ok(targets) => (with_own_errors(targets), None),
        Err(error) => (default(), Some(error.to_string())),
    }
}

/// Errors reported by buildtest itself are shown whatever the filter says.
fn with_own_errors(targets: Targets) -> Targets {
    if targets.would_enable(CRATE_TARGET, &Level::ERROR) {
        targets
    } else {
        targets.with_target(CRATE_TARGET, LevelFilter::ERROR)
    }
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    trace: Style,
    field: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.info = style().bold();
        self.debug = style().bold();
        self.trace = style().dimmed();
        self.field = style().dimmed();
    }
}

/// Styles for error messages printed to stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
}

impl StderrStyles {
    fn colorize(&mut self) {
        self.bold = style().bold();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_filter_defaults() {
        let (targets, error) = parse_log_filter(None, LevelFilter::INFO);
        assert_eq!(targets.default_level(), Some(LevelFilter::INFO));
        assert_eq!(error, None);

        let (targets, error) = parse_log_filter(Some("".into()), LevelFilter::DEBUG);
        assert_eq!(targets.default_level(), Some(LevelFilter::DEBUG));
        assert_eq!(error, None);
    }

    #[test]
    fn log_filter_parses_targets() {
        let (targets, error) =
            parse_log_filter(Some("buildtest_runner=trace".into()), LevelFilter::INFO);
        assert_eq!(error, None);
        assert!(targets.would_enable("buildtest_runner::runner", &Level::TRACE));
        assert!(!targets.would_enable("other", &Level::ERROR));
    }

    #[test]
    fn log_filter_keeps_own_errors() {
        let (targets, error) =
            parse_log_filter(Some("buildtest_runner=debug".into()), LevelFilter::INFO);
        assert_eq!(error, None);
        assert!(targets.would_enable("buildtest_runner::builder", &Level::DEBUG));
        assert!(targets.would_enable("buildtest::errors", &Level::ERROR));
        assert!(targets.would_enable(NO_HEADING_TARGET, &Level::ERROR));
        assert!(!targets.would_enable("buildtest::dispatch", &Level::WARN));
        assert!(!targets.would_enable("other", &Level::ERROR));

        let (targets, _) = parse_log_filter(Some("buildtest=debug".into()), LevelFilter::INFO);
        assert!(targets.would_enable("buildtest::dispatch", &Level::DEBUG));
    }

    #[test]
    fn log_filter_invalid() {
        let (targets, error) =
            parse_log_filter(Some("buildtest=notalevel".into()), LevelFilter::INFO);
        assert!(error.is_some());
        assert_eq!(targets.default_level(), Some(LevelFilter::INFO));
    }

    #[test]
    fn never_colorize() {
        assert!(!Color::Never.should_colorize(supports_color::Stream::Stdout));
        assert!(Color::Always.should_colorize(supports_color::Stream::Stderr));
    }
}
