use logos::Logos;
use thiserror::Error;
use time::{Date, Month, PrimitiveDateTime};

#[derive(Logos, Debug, PartialEq)]
enum Token {
    #[regex("[0-9]+")]
    Digits,
    #[token(":")]
    Colon,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("Expected 8 date digits, got `{0}`")]
    BadDate(String),
    #[error("Missing colon after the date")]
    MissingColon,
    #[error("Expected 4 clock digits, got `{0}`")]
    BadClock(String),
    #[error("Unexpected trailing input `{0}`")]
    Trailing(String),
    #[error("Invalid timestamp: {0}")]
    OutOfRange(#[from] time::error::ComponentRange),
}

/// Parses a PVGIS timestamp of the form `YYYYMMDD:HHMM` (UTC, no zone marker).
pub fn parse(s: &str) -> Result<PrimitiveDateTime, TimestampError> {
    let mut lexer = Token::lexer(s);

    let date = match lexer.next() {
        Some(Ok(Token::Digits)) if lexer.slice().len() == 8 => lexer.slice(),
        _ => return Err(TimestampError::BadDate(lexer.slice().to_string())),
    };

    match lexer.next() {
        Some(Ok(Token::Colon)) => (),
        _ => return Err(TimestampError::MissingColon),
    };

    let clock = match lexer.next() {
        Some(Ok(Token::Digits)) if lexer.slice().len() == 4 => lexer.slice(),
        _ => return Err(TimestampError::BadClock(lexer.slice().to_string())),
    };

    if lexer.next().is_some() {
        return Err(TimestampError::Trailing(s[lexer.span().start..].to_string()));
    }

    let year = number(&date[..4]) as i32;
    let month = Month::try_from(number(&date[4..6]) as u8)?;
    let day = number(&date[6..]) as u8;
    let hour = number(&clock[..2]) as u8;
    let minute = number(&clock[2..]) as u8;

    Ok(Date::from_calendar_date(year, month, day)?.with_hms(hour, minute, 0)?)
}

// Only ever called on lexed ASCII digit runs of at most 4 characters.
fn number(digits: &str) -> u32 {
    digits
        .bytes()
        .fold(0, |acc, digit| acc * 10 + u32::from(digit - b'0'))
}
