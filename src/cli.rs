//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::http_adapter::HttpApiAdapter;
use crate::adapters::log_surface::{LogSurface, format_time};
use crate::adapters::ws_adapter::WsTickAdapter;
use crate::controller::ChartController;
use crate::domain::candle::{Interval, SubscriptionKey};
use crate::domain::error::ChartdeskError;
use crate::domain::feed_config::{DEFAULT_LOG_FILTER, FeedConfig, FeedMode, build_feed_config};
use crate::domain::session::{Applied, Delivery};
use crate::domain::trade::{Action, TradeId};
use crate::feed::UpdateSource;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "chartdesk", about = "Live candle chart with paper positions")]
pub struct Cli {
    /// INI file with [api], [feed] and [log] sections
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate the configuration
    Validate,
    /// Fetch the latest candle once
    Quote {
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long, default_value = "5m")]
        interval: String,
    },
    /// Follow a live chart and trade it from stdin
    Watch {
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long, default_value = "5m")]
        interval: String,
        /// poll or push; overrides [feed] mode
        #[arg(long)]
        mode: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let config_path = cli.config.as_ref();
    match cli.command {
        Command::Validate => run_validate(config_path),
        Command::Quote { ticker, interval } => run_quote(config_path, &ticker, &interval),
        Command::Watch {
            ticker,
            interval,
            mode,
        } => run_watch(config_path, &ticker, &interval, mode.as_deref()),
    }
}

fn fail(err: ChartdeskError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_feed_config(path: Option<&PathBuf>) -> Result<FeedConfig, ChartdeskError> {
    let adapter = match path {
        Some(path) => FileConfigAdapter::from_file(path)?,
        None => FileConfigAdapter::empty(),
    };
    build_feed_config(&adapter)
}

/// `RUST_LOG` wins over the configured filter. Safe to call more than once.
pub fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn runtime() -> Result<tokio::runtime::Runtime, ChartdeskError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn parse_key(ticker: &str, interval: &str) -> Result<SubscriptionKey, ChartdeskError> {
    SubscriptionKey::new(ticker, interval.parse()?)
}

fn run_validate(config_path: Option<&PathBuf>) -> ExitCode {
    if let Some(path) = config_path {
        eprintln!("Loading config from {}", path.display());
    }
    let config = match load_feed_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    println!("api base:        {}", config.api_base);
    println!("ws base:         {}", config.ws_base);
    println!("feed mode:       {}", config.mode);
    println!("poll interval:   {} ms", config.poll_interval.as_millis());
    println!("request timeout: {} ms", config.request_timeout.as_millis());
    println!("log filter:      {}", config.log_filter);
    eprintln!("Config validated successfully");
    ExitCode::SUCCESS
}

fn run_quote(config_path: Option<&PathBuf>, ticker: &str, interval: &str) -> ExitCode {
    let result = load_feed_config(config_path).and_then(|config| {
        init_logging(&config.log_filter);
        let key = parse_key(ticker, interval)?;
        let http = HttpApiAdapter::from_config(&config)?;
        let candle = runtime()?.block_on(http.fetch_latest(&key))?;
        Ok((key, candle))
    });
    match result {
        Ok((key, c)) => {
            let buy = c
                .usable_buy_price()
                .map(|p| format!(" buy {p:.2}"))
                .unwrap_or_default();
            println!(
                "{key} {} o {:.2} h {:.2} l {:.2} c {:.2}{buy}",
                format_time(c.time),
                c.open,
                c.high,
                c.low,
                c.close
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_watch(
    config_path: Option<&PathBuf>,
    ticker: &str,
    interval: &str,
    mode: Option<&str>,
) -> ExitCode {
    let prepared = load_feed_config(config_path).and_then(|config| {
        let key = parse_key(ticker, interval)?;
        let mode = match mode {
            Some(m) => m.parse::<FeedMode>()?,
            None => config.mode,
        };
        Ok((config, key, mode))
    });
    let (config, key, mode) = match prepared {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    init_logging(&config.log_filter);

    let result = runtime().and_then(|rt| rt.block_on(watch_session(&config, key, mode)));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

type LiveController = ChartController<HttpApiAdapter, WsTickAdapter, HttpApiAdapter, LogSurface>;

enum WatchEvent {
    Quit,
    Delivery(Delivery),
    Line(Option<String>),
}

async fn watch_session(
    config: &FeedConfig,
    key: SubscriptionKey,
    mode: FeedMode,
) -> Result<(), ChartdeskError> {
    let http = HttpApiAdapter::from_config(config)?;
    let market = Arc::new(http.clone());
    let stream = Arc::new(WsTickAdapter::from_config(config));
    let source = UpdateSource::new(mode, Arc::clone(&market), stream, config.poll_interval);
    let mut controller: LiveController =
        ChartController::new(market, source, http, LogSurface::new());

    controller.subscribe(key).await;
    eprintln!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let event = tokio::select! {
            _ = &mut ctrl_c => WatchEvent::Quit,
            Some(delivery) = controller.next_delivery() => WatchEvent::Delivery(delivery),
            line = lines.next_line(), if stdin_open => WatchEvent::Line(line?),
        };
        match event {
            WatchEvent::Quit => break,
            WatchEvent::Delivery(delivery) => {
                if controller.handle(delivery) == Applied::Stopped {
                    eprintln!("live updates stopped; switch ticker or interval to resubscribe");
                }
            }
            WatchEvent::Line(None) => stdin_open = false,
            WatchEvent::Line(Some(line)) => match SessionCommand::parse(&line) {
                Ok(None) => {}
                Ok(Some(SessionCommand::Quit)) => break,
                Ok(Some(command)) => {
                    if let Err(e) = execute(&mut controller, command).await {
                        eprintln!("error: {e}");
                    }
                }
                Err(msg) => eprintln!("{msg}"),
            },
        }
    }

    let surface = controller.shutdown().await;
    tracing::debug!("session ended with {} candles drawn", surface.len());
    Ok(())
}

async fn execute(
    controller: &mut LiveController,
    command: SessionCommand,
) -> Result<(), ChartdeskError> {
    match command {
        SessionCommand::Open(action) => {
            let trade = controller.open_trade(action).await?;
            println!(
                "opened #{} {} {} at {:.2}",
                trade.id,
                trade.action.label(),
                trade.ticker,
                trade.entry_price
            );
        }
        SessionCommand::Close(id) => {
            let trade = controller.close_trade(id).await?;
            println!("closed #{} {} {}", trade.id, trade.action.label(), trade.ticker);
        }
        SessionCommand::Positions => print_positions(controller),
        SessionCommand::Interval(interval) => controller.switch_interval(interval).await?,
        SessionCommand::Ticker(ticker) => controller.switch_ticker(&ticker).await?,
        SessionCommand::Help => eprintln!("{HELP}"),
        SessionCommand::Quit => {}
    }
    Ok(())
}

fn print_positions(controller: &LiveController) {
    let ledger = controller.session().ledger();
    if ledger.is_empty() {
        println!("no open positions");
        return;
    }
    let positions = controller.positions();
    if positions.is_empty() {
        println!("{} open position(s), waiting for a price", ledger.len());
        return;
    }
    for position in &positions {
        println!("{position}");
    }
    if let Some(total) = ledger.total_unrealized() {
        println!("total pnl {total:.2}");
    }
}

const HELP: &str = "commands: buy | sell | close <id> | positions | interval <iv> | ticker <sym> | help | quit";

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Open(Action),
    Close(TradeId),
    Positions,
    Interval(Interval),
    Ticker(String),
    Help,
    Quit,
}

impl SessionCommand {
    /// Blank lines parse to `None`. Errors are ready to show to the user.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        let command = match (verb.to_lowercase().as_str(), arg) {
            ("buy", None) => SessionCommand::Open(Action::Buy),
            ("sell", None) => SessionCommand::Open(Action::Sell),
            ("close", Some(id)) => SessionCommand::Close(
                id.trim_start_matches('#')
                    .parse()
                    .map_err(|_| format!("not a trade id: {id}"))?,
            ),
            ("positions" | "pos", None) => SessionCommand::Positions,
            ("interval", Some(iv)) => {
                SessionCommand::Interval(iv.parse().map_err(|e: ChartdeskError| e.to_string())?)
            }
            ("ticker", Some(sym)) => SessionCommand::Ticker(sym.to_string()),
            ("help" | "?", None) => SessionCommand::Help,
            ("quit" | "exit" | "q", None) => SessionCommand::Quit,
            _ => return Err(format!("unrecognized command: {}\n{HELP}", line.trim())),
        };
        if words.next().is_some() {
            return Err(format!("too many arguments: {}", line.trim()));
        }
        Ok(Some(command))
    }
}

impl fmt::Display for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionCommand::Open(action) => write!(f, "{action}"),
            SessionCommand::Close(id) => write!(f, "close {id}"),
            SessionCommand::Positions => f.write_str("positions"),
            SessionCommand::Interval(iv) => write!(f, "interval {iv}"),
            SessionCommand::Ticker(sym) => write!(f, "ticker {sym}"),
            SessionCommand::Help => f.write_str("help"),
            SessionCommand::Quit => f.write_str("quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<SessionCommand> {
        SessionCommand::parse(line).unwrap()
    }

    #[test]
    fn parses_trade_commands() {
        assert_eq!(parse("buy"), Some(SessionCommand::Open(Action::Buy)));
        assert_eq!(parse("  SELL "), Some(SessionCommand::Open(Action::Sell)));
        assert_eq!(parse("close 12"), Some(SessionCommand::Close(12)));
        assert_eq!(parse("close #7"), Some(SessionCommand::Close(7)));
    }

    #[test]
    fn parses_switches() {
        assert_eq!(
            parse("interval 1h"),
            Some(SessionCommand::Interval(Interval::OneHour))
        );
        assert_eq!(
            parse("ticker msft"),
            Some(SessionCommand::Ticker("msft".into()))
        );
    }

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(SessionCommand::parse("close").is_err());
        assert!(SessionCommand::parse("close abc").is_err());
        assert!(SessionCommand::parse("interval 7m").is_err());
        assert!(SessionCommand::parse("buy 10").is_err());
        assert!(SessionCommand::parse("dance").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for command in [
            SessionCommand::Open(Action::Buy),
            SessionCommand::Close(3),
            SessionCommand::Interval(Interval::OneDay),
            SessionCommand::Positions,
        ] {
            assert_eq!(parse(&command.to_string()), Some(command));
        }
    }

    #[test]
    fn cli_parses_watch() {
        let cli = Cli::try_parse_from([
            "chartdesk", "--config", "desk.ini", "watch", "--ticker", "AAPL", "--mode", "push",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("desk.ini")));
        match cli.command {
            Command::Watch {
                ticker,
                interval,
                mode,
            } => {
                assert_eq!(ticker, "AAPL");
                assert_eq!(interval, "5m");
                assert_eq!(mode.as_deref(), Some("push"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_key_rejects_unknown_interval() {
        assert!(matches!(
            parse_key("AAPL", "7m"),
            Err(ChartdeskError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let path = PathBuf::from("/nonexistent/chartdesk.ini");
        assert!(matches!(
            load_feed_config(Some(&path)),
            Err(ChartdeskError::ConfigParse { .. })
        ));
    }
}
