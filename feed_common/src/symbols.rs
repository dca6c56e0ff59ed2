//! Symbol universe and watchlist helpers shared between client and server.
//!
//! `Symbol` enumerates the names the synthetic side of the system knows about:
//! the fallback timer and the simulation mode pick from this set. Real upstream
//! data is not limited to it — tick records carry free-form symbol strings and
//! the server buffers whatever arrives.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::FeedError;

/// Trait providing file parsing for watchlists.
pub trait WatchlistParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Tokens may be separated by commas, spaces, or new lines. Returns an
    /// error if any token is not a known `Symbol`.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Symbol>, FeedError>;
}

impl WatchlistParser for Symbol {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, FeedError> {
        let mut symbols = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(FeedError::Io)?;
            for token in line.split([',', ' ', '\t']) {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                match token.parse::<Self>() {
                    Ok(symbol) => symbols.push(symbol),
                    Err(e) => {
                        return Err(FeedError::ParseWatchlistFile(format!("{}: {}", token, e)));
                    }
                }
            }
        }
        Ok(symbols)
    }
}

/// Known symbol universe used for synthetic generation.
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
    Hash,
    Eq,
    PartialEq,
)]
#[clap(rename_all = "lower")]
#[strum(ascii_case_insensitive)]
pub enum Symbol {
    AAPL,
    MSFT,
    GOOGL,
    AMZN,
    META,
    TSLA,
    NFLX,
    NVDA,
    PYPL,
    INTC,
    AMD,
    CSCO,
    ADBE,
    ORCL,
    IBM,
    CRM,
}

impl Symbol {
    /// All known symbols, in declaration order.
    pub fn universe() -> Vec<Symbol> {
        Symbol::iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_mixed_separators() {
        let input = Cursor::new("AAPL, MSFT\ngoogl tsla\n\n");
        let symbols = Symbol::parse_from_file(input).unwrap();
        assert_eq!(
            symbols,
            vec![Symbol::AAPL, Symbol::MSFT, Symbol::GOOGL, Symbol::TSLA]
        );
    }

    #[test]
    fn unknown_token_fails() {
        let input = Cursor::new("AAPL, WAT\n");
        let err = Symbol::parse_from_file(input).unwrap_err();
        assert!(matches!(err, FeedError::ParseWatchlistFile(_)));
    }

    #[test]
    fn universe_is_nonempty_and_stable() {
        let universe = Symbol::universe();
        assert_eq!(universe.len(), 16);
        assert_eq!(universe[0], Symbol::AAPL);
    }
}
