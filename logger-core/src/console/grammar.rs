#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the bench console.
//!
//! `regal` turns a line into a bounded token stream and `winnow` combinators
//! walk the catalog grammar over those tokens. Nothing here allocates, so the
//! same parser runs on a host harness or next to the firmware.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, ChoiceBranch, ChoiceTag, CommandTag, Node, ValueSpec};

/// Maximum number of tokens in one console line.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Signed decimal, e.g. `-4.25`.
    #[regex(r"-?[0-9]+(?:\.[0-9]+)?")]
    Number,
    /// Keyword or topic name; case is ignored later.
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Ident,
    /// Printable text between double quotes.
    #[regex(r#""[ -!#-~]*""#)]
    Quoted,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Anything the other rules reject.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token with its byte span in the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Line produced more tokens than the buffer holds.
    TooManyTokens { processed: usize },
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidNumber {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidNumber { span } => {
                write!(f, "invalid number at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_number(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidNumber {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Bench commands produced by the parser.
#[derive(Clone, Debug, PartialEq)]
pub enum Command<'a> {
    Press,
    Release,
    Click,
    Wait(Duration),
    Sensor(SensorCommand),
    Clock(ClockCommand),
    Card(CardCommand),
    /// Text to store as the recovery record, without the quotes.
    Recovery { record: &'a str },
    Status,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorCommand {
    Reading { temperature_c: f32, humidity_pct: f32 },
    /// Subsequent reads return NaN.
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockCommand {
    Lose,
    Keep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardCommand {
    Insert,
    Eject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command().parse_next(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize one console line.
///
/// # Errors
///
/// Fails when the line holds more than [`MAX_TOKENS`] tokens.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        if buffer
            .push(Token {
                kind: record.token,
                lexeme,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    // An unterminated quote ends up here.
    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        if buffer
            .push(Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    Ok(buffer)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse one bench command; trailing line endings are accepted.
///
/// # Errors
///
/// Returns the first lexical or grammar problem in the line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let (command, rest) = parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    if let Some(token) = rest.iter().find(|token| token.kind != TokenKind::Eol) {
        return Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(token),
        )));
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let command_token = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        if let Some(spec) = catalog::find(command_token.lexeme) {
            let mut state = CommandState::new(spec.tag);
            parse_node(spec.grammar, input, &mut state)?;
            state.finish()
        } else {
            *input = snapshot;
            Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&command_token),
            )))
        }
    }
}

fn parse_node<'src, 'slice>(
    node: &'static Node,
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match node {
        Node::End => Ok(()),
        Node::Choice { choices, fallback } => parse_choice(input, choices, *fallback, state),
        Node::Value { value, next } => {
            let value = parse_value(input, *value)?;
            state.apply_value(value)?;
            parse_node(next, input, state)
        }
        Node::Topic { next } => {
            parse_topic(input, state)?;
            parse_node(next, input, state)
        }
    }
}

fn parse_choice<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    choices: &'static [ChoiceBranch],
    fallback: Option<ValueSpec>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match (input.split_first(), fallback) {
        (Some((token, rest)), _) if token.kind == TokenKind::Ident => {
            let Some(branch) = find_choice(choices, token.lexeme) else {
                return Err(ErrMode::Backtrack(GrammarError::unexpected(
                    choice_expected_label(choices),
                    Some(token),
                )));
            };
            *input = rest;
            state.apply_choice(branch.tag)?;
            parse_node(branch.next, input, state)
        }
        (_, Some(spec)) => {
            let value = parse_value(input, spec)?;
            state.apply_value(value)
        }
        (first, None) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            choice_expected_label(choices),
            first.map(|(token, _)| token),
        ))),
    }
}

fn parse_topic<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            state.set_topic(token.lexeme);
            *input = rest;
            Ok(())
        }
        Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
            GrammarError::unexpected("command name", Some(token)),
        )),
        _ => Ok(()),
    }
}

fn parse_value<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    spec: ValueSpec,
) -> Result<Value<'src>, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match spec {
        ValueSpec::None => Ok(Value::None),
        ValueSpec::Duration => {
            let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
            let duration = parse_duration(&token).map_err(ErrMode::Cut)?;
            Ok(Value::Duration(duration))
        }
        ValueSpec::Reading => {
            let temperature = expect_kind(TokenKind::Number, "temperature").parse_next(input)?;
            let humidity = expect_kind(TokenKind::Number, "humidity").parse_next(input)?;
            Ok(Value::Reading {
                temperature_c: parse_number(&temperature).map_err(ErrMode::Cut)?,
                humidity_pct: parse_number(&humidity).map_err(ErrMode::Cut)?,
            })
        }
        ValueSpec::Quoted => {
            let token = expect_kind(TokenKind::Quoted, "quoted text").parse_next(input)?;
            let text = token
                .lexeme
                .strip_prefix('"')
                .and_then(|text| text.strip_suffix('"'))
                .ok_or_else(|| ErrMode::Cut(GrammarError::invalid_token(&token)))?;
            Ok(Value::Text(text))
        }
    }
}

fn find_choice(choices: &'static [ChoiceBranch], lexeme: &str) -> Option<&'static ChoiceBranch> {
    choices
        .iter()
        .find(|choice| choice.keyword.eq_ignore_ascii_case(lexeme))
}

fn choice_expected_label(choices: &'static [ChoiceBranch]) -> &'static str {
    choices.first().map_or("keyword", |choice| choice.keyword)
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Value<'a> {
    None,
    Duration(Duration),
    Reading { temperature_c: f32, humidity_pct: f32 },
    Text(&'a str),
}

enum CommandState<'a> {
    Simple(Command<'a>),
    Wait(Option<Duration>),
    Sensor(Option<SensorCommand>),
    Clock(Option<ClockCommand>),
    Card(Option<CardCommand>),
    Recovery(Option<&'a str>),
    Help(Option<&'a str>),
}

impl<'a> CommandState<'a> {
    fn new(tag: CommandTag) -> Self {
        match tag {
            CommandTag::Press => CommandState::Simple(Command::Press),
            CommandTag::Release => CommandState::Simple(Command::Release),
            CommandTag::Click => CommandState::Simple(Command::Click),
            CommandTag::Status => CommandState::Simple(Command::Status),
            CommandTag::Wait => CommandState::Wait(None),
            CommandTag::Sensor => CommandState::Sensor(None),
            CommandTag::Clock => CommandState::Clock(None),
            CommandTag::Card => CommandState::Card(None),
            CommandTag::Recovery => CommandState::Recovery(None),
            CommandTag::Help => CommandState::Help(None),
        }
    }

    fn apply_choice(&mut self, tag: ChoiceTag) -> Result<(), ErrMode<GrammarError<'a>>> {
        match (self, tag) {
            (CommandState::Sensor(slot), ChoiceTag::SensorFail) => {
                *slot = Some(SensorCommand::Fail);
            }
            (CommandState::Clock(slot), ChoiceTag::ClockLose) => *slot = Some(ClockCommand::Lose),
            (CommandState::Clock(slot), ChoiceTag::ClockKeep) => *slot = Some(ClockCommand::Keep),
            (CommandState::Card(slot), ChoiceTag::CardInsert) => {
                *slot = Some(CardCommand::Insert);
            }
            (CommandState::Card(slot), ChoiceTag::CardEject) => *slot = Some(CardCommand::Eject),
            _ => return Err(ErrMode::Backtrack(GrammarError::unexpected("choice", None))),
        }
        Ok(())
    }

    fn apply_value(&mut self, value: Value<'a>) -> Result<(), ErrMode<GrammarError<'a>>> {
        match (self, value) {
            (_, Value::None) => {}
            (CommandState::Wait(slot), Value::Duration(duration)) => *slot = Some(duration),
            (
                CommandState::Sensor(slot),
                Value::Reading {
                    temperature_c,
                    humidity_pct,
                },
            ) => {
                *slot = Some(SensorCommand::Reading {
                    temperature_c,
                    humidity_pct,
                });
            }
            (CommandState::Recovery(slot), Value::Text(text)) => *slot = Some(text),
            _ => return Err(ErrMode::Backtrack(GrammarError::unexpected("value", None))),
        }
        Ok(())
    }

    fn set_topic(&mut self, topic: &'a str) {
        if let CommandState::Help(slot) = self {
            *slot = Some(topic);
        }
    }

    fn finish(self) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
        match self {
            CommandState::Simple(command) => Ok(command),
            CommandState::Wait(Some(duration)) => Ok(Command::Wait(duration)),
            CommandState::Sensor(Some(sensor)) => Ok(Command::Sensor(sensor)),
            CommandState::Clock(Some(clock)) => Ok(Command::Clock(clock)),
            CommandState::Card(Some(card)) => Ok(Command::Card(card)),
            CommandState::Recovery(Some(record)) => Ok(Command::Recovery { record }),
            CommandState::Help(topic) => Ok(Command::Help(HelpCommand { topic })),
            CommandState::Wait(None) => Err(missing("duration")),
            CommandState::Sensor(None) => Err(missing("sensor reading")),
            CommandState::Clock(None) => Err(missing("clock argument")),
            CommandState::Card(None) => Err(missing("card argument")),
            CommandState::Recovery(None) => Err(missing("quoted text")),
        }
    }
}

fn missing<'a>(expected: &'static str) -> ErrMode<GrammarError<'a>> {
    ErrMode::Backtrack(GrammarError::unexpected(expected, None))
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_number<'a>(token: &Token<'a>) -> Result<f32, GrammarError<'a>> {
    token
        .lexeme
        .parse::<f32>()
        .map_err(|_| GrammarError::invalid_number(token))
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}
