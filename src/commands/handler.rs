//! Command Handler Module
//!
//! Validates and executes decoded commands against the storage engine.
//!
//! ## Supported Commands
//!
//! ### Connection
//! - `PING [message]` - Test connection
//! - `ECHO message` - Echo message
//!
//! ### Strings
//! - `SET key value [PX milliseconds | EX seconds]` - Set a key
//! - `GET key` - Get a key's value
//!
//! ### Lists
//! - `RPUSH key value [value ...]` - Append values
//! - `LPUSH key value [value ...]` - Prepend values
//! - `LPOP key [count]` - Remove from the head
//! - `RPOP key [count]` - Remove from the tail
//! - `LRANGE key start stop` - Read a range
//! - `LLEN key` - Length of a list
//! - `BLPOP key timeout` - Pop from the head, waiting for data if needed
//!
//! ### Keyspace
//! - `TYPE key`, `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `DBSIZE`, `FLUSHDB`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ from_frame  │───>│  registry   │───>│  cmd_*()    │      │
//! │  │             │    │  + arity    │    │             │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                        Reply(RespValue) | Block(BlockingPop)│
//! └─────────────────────────────────────────────────────────────┘
//! ```

use super::error::{CommandError, CommandResult};
use super::registry::CommandRegistry;
use crate::blocking::{BlockingPop, Delivery};
use crate::protocol::{Command, RespValue};
use crate::storage::{ListEnd, PopOrWait, StorageEngine};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Longest command name quoted back in an unknown-command error.
const MAX_ECHOED_NAME: usize = 128;

/// What executing a command produced.
#[derive(Debug)]
pub enum CommandOutcome {
    /// Write this back right away.
    Reply(RespValue),
    /// The client is blocked; await the handle and pass the result to
    /// [`blocking_reply`].
    Block(BlockingPop),
}

impl From<RespValue> for CommandOutcome {
    fn from(value: RespValue) -> Self {
        CommandOutcome::Reply(value)
    }
}

/// Reply for a finished blocking pop: `[key, value]`, or null bulk on timeout.
pub fn blocking_reply(delivery: Option<Delivery>) -> RespValue {
    match delivery {
        Some((key, value)) => RespValue::bulk_array([key, value]),
        None => RespValue::null(),
    }
}

/// Executes commands for one client.
///
/// Cheap to clone: the store and the command table are shared.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    registry: Arc<CommandRegistry>,
    client_id: u64,
}

impl CommandHandler {
    /// Creates a handler with the built-in command table.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self::with_registry(storage, Arc::new(CommandRegistry::with_builtin_commands()))
    }

    pub fn with_registry(storage: Arc<StorageEngine>, registry: Arc<CommandRegistry>) -> Self {
        Self {
            storage,
            registry,
            client_id: 0,
        }
    }

    /// A copy of this handler acting on behalf of `client_id`.
    pub fn for_client(&self, client_id: u64) -> Self {
        Self {
            client_id,
            ..self.clone()
        }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Executes a raw request frame.
    ///
    /// Returns `None` for an empty request, which gets no reply.
    pub fn execute(&self, frame: RespValue) -> Option<CommandOutcome> {
        match Command::from_frame(frame) {
            Ok(Some(command)) => Some(self.execute_command(command)),
            Ok(None) => None,
            Err(e) => Some(RespValue::error(format!("ERR Protocol error: {}", e)).into()),
        }
    }

    /// Looks the command up, checks its arity and runs it. Every failure
    /// becomes an error reply here.
    pub fn execute_command(&self, command: Command) -> CommandOutcome {
        trace!(client = self.client_id, command = %command.name, argc = command.args.len(), "Executing");

        let result = match self.registry.get(&command.name) {
            None => Err(CommandError::UnknownCommand(
                command.name.chars().take(MAX_ECHOED_NAME).collect(),
            )),
            Some(spec) if !spec.arity.accepts(command.args.len()) => {
                Err(CommandError::wrong_arity(spec.name))
            }
            Some(spec) => (spec.handler)(self, &command.args),
        };

        result.unwrap_or_else(|e| {
            debug!(client = self.client_id, command = %command.name, error = %e, "Command rejected");
            CommandOutcome::Reply(e.into())
        })
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// PING [message]
    pub(super) fn cmd_ping(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        Ok(match args.first() {
            Some(msg) => RespValue::bulk_string(msg.clone()),
            None => RespValue::pong(),
        }
        .into())
    }

    /// ECHO message
    pub(super) fn cmd_echo(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        Ok(RespValue::bulk_string(args[0].clone()).into())
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// SET key value [PX milliseconds | EX seconds]
    pub(super) fn cmd_set(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        let key = args[0].clone();
        let value = args[1].clone();

        let mut expires_at: Option<Instant> = None;
        let mut options = args[2..].iter();
        while let Some(option) = options.next() {
            let unit_ms = if option.eq_ignore_ascii_case(b"PX") {
                1
            } else if option.eq_ignore_ascii_case(b"EX") {
                1000
            } else {
                return Err(CommandError::Syntax);
            };

            if expires_at.is_some() {
                return Err(CommandError::Syntax);
            }
            let amount = options.next().ok_or(CommandError::Syntax)?;
            expires_at = Some(expire_deadline(parse_i64(amount)?, unit_ms)?);
        }

        self.storage.set_string_until(key, value, expires_at);
        Ok(RespValue::ok().into())
    }

    /// GET key
    pub(super) fn cmd_get(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        Ok(match self.storage.get_string(&args[0])? {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        }
        .into())
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// RPUSH key value [value ...]
    pub(super) fn cmd_rpush(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        self.push(args, ListEnd::Back)
    }

    /// LPUSH key value [value ...]
    pub(super) fn cmd_lpush(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        self.push(args, ListEnd::Front)
    }

    fn push(&self, args: &[Bytes], end: ListEnd) -> CommandResult<CommandOutcome> {
        let len = self
            .storage
            .push_list(args[0].clone(), args[1..].to_vec(), end)?;
        Ok(RespValue::integer(len as i64).into())
    }

    /// LPOP key [count]
    pub(super) fn cmd_lpop(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        self.pop(args, ListEnd::Front)
    }

    /// RPOP key [count]
    pub(super) fn cmd_rpop(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        self.pop(args, ListEnd::Back)
    }

    fn pop(&self, args: &[Bytes], end: ListEnd) -> CommandResult<CommandOutcome> {
        let Some(count) = args.get(1) else {
            let popped = self.storage.pop_list(&args[0], end, 1)?;
            return Ok(match popped.and_then(|values| values.into_iter().next()) {
                Some(value) => RespValue::bulk_string(value),
                None => RespValue::null(),
            }
            .into());
        };

        let count = parse_i64(count)?;
        if count <= 0 {
            return Err(CommandError::OutOfRange);
        }
        let count = usize::try_from(count).unwrap_or(usize::MAX);

        Ok(match self.storage.pop_list(&args[0], end, count)? {
            Some(values) => RespValue::bulk_array(values),
            None => RespValue::null(),
        }
        .into())
    }

    /// LRANGE key start stop
    pub(super) fn cmd_lrange(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        let start = parse_i64(&args[1])?;
        let stop = parse_i64(&args[2])?;
        let values = self.storage.range_list(&args[0], start, stop)?;
        Ok(RespValue::bulk_array(values).into())
    }

    /// LLEN key
    pub(super) fn cmd_llen(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        let len = self.storage.length_of(&args[0])?;
        Ok(RespValue::integer(len as i64).into())
    }

    /// BLPOP key timeout
    ///
    /// `timeout` is in seconds and may be fractional; `0` waits forever.
    pub(super) fn cmd_blpop(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        let key = args[0].clone();
        let timeout = parse_timeout(&args[1])?;

        match self.storage.pop_or_wait(key.clone(), self.client_id, timeout)? {
            PopOrWait::Ready(value) => Ok(RespValue::bulk_array([key, value]).into()),
            PopOrWait::Waiting(pop) => Ok(CommandOutcome::Block(pop)),
        }
    }

    // ========================================================================
    // Keyspace
    // ========================================================================

    /// TYPE key
    pub(super) fn cmd_type(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        let kind = self.storage.type_of(&args[0]);
        Ok(RespValue::simple_string(kind.as_str()).into())
    }

    /// DEL key [key ...]
    pub(super) fn cmd_del(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        Ok(RespValue::integer(self.storage.delete(args) as i64).into())
    }

    /// EXISTS key [key ...]
    pub(super) fn cmd_exists(&self, args: &[Bytes]) -> CommandResult<CommandOutcome> {
        Ok(RespValue::integer(self.storage.exists(args) as i64).into())
    }

    /// DBSIZE
    pub(super) fn cmd_dbsize(&self, _args: &[Bytes]) -> CommandResult<CommandOutcome> {
        Ok(RespValue::integer(self.storage.len() as i64).into())
    }

    /// FLUSHDB
    pub(super) fn cmd_flushdb(&self, _args: &[Bytes]) -> CommandResult<CommandOutcome> {
        self.storage.flush();
        Ok(RespValue::ok().into())
    }
}

fn parse_i64(arg: &[u8]) -> CommandResult<i64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotInteger)
}

/// Deadline for `SET ... PX/EX`. The expiry in unix milliseconds has to fit
/// in an `i64`, otherwise the time is rejected the way Redis rejects it.
fn expire_deadline(amount: i64, unit_ms: i64) -> CommandResult<Instant> {
    let invalid = || CommandError::InvalidExpireTime("set".into());
    if amount <= 0 {
        return Err(invalid());
    }

    let millis = amount.checked_mul(unit_ms).ok_or_else(invalid)?;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|since| i64::try_from(since.as_millis()).ok())
        .unwrap_or(0);
    millis.checked_add(now_ms).ok_or_else(invalid)?;

    Instant::now()
        .checked_add(Duration::from_millis(millis as u64))
        .ok_or_else(invalid)
}

/// Seconds, fractional allowed. `0` means no timeout.
fn parse_timeout(arg: &[u8]) -> CommandResult<Option<Duration>> {
    let secs: f64 = std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|secs: &f64| secs.is_finite())
        .ok_or(CommandError::InvalidTimeout)?;

    if secs < 0.0 {
        return Err(CommandError::NegativeTimeout);
    }
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| CommandError::InvalidTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(storage)
    }

    fn make_command(args: &[&str]) -> RespValue {
        RespValue::Array(
            args.iter()
                .map(|s| RespValue::bulk_string(Bytes::from(s.to_string())))
                .collect(),
        )
    }

    /// Runs a command that must reply immediately.
    fn run(handler: &CommandHandler, args: &[&str]) -> RespValue {
        match handler.execute(make_command(args)) {
            Some(CommandOutcome::Reply(reply)) => reply,
            Some(CommandOutcome::Block(_)) => panic!("{:?} blocked", args),
            None => panic!("{:?} produced no reply", args),
        }
    }

    fn bulks(items: &[&str]) -> RespValue {
        RespValue::bulk_array(items.iter().map(|s| Bytes::from(s.to_string())))
    }

    fn is_error(reply: &RespValue, prefix: &str) -> bool {
        matches!(reply, RespValue::Error(msg) if msg.starts_with(prefix))
    }

    #[test]
    fn test_ping() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["PING"]), RespValue::simple_string("PONG"));
        assert_eq!(
            run(&handler, &["ping", "hello"]),
            RespValue::bulk_string(Bytes::from("hello"))
        );
    }

    #[test]
    fn test_echo() {
        let handler = create_handler();
        assert_eq!(
            run(&handler, &["ECHO", "hey"]),
            RespValue::bulk_string(Bytes::from("hey"))
        );
        assert_eq!(
            run(&handler, &["ECHO"]),
            RespValue::error("ERR wrong number of arguments for 'echo' command")
        );
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["SET", "key", "value"]), RespValue::ok());
        assert_eq!(
            run(&handler, &["GET", "key"]),
            RespValue::bulk_string(Bytes::from("value"))
        );

        assert_eq!(run(&handler, &["SET", "empty", ""]), RespValue::ok());
        assert_eq!(
            run(&handler, &["GET", "empty"]),
            RespValue::bulk_string(Bytes::new())
        );
    }

    #[test]
    fn test_get_nonexistent() {
        let handler = create_handler();
        assert_eq!(run(&handler, &["GET", "nonexistent"]), RespValue::null());
    }

    #[test]
    fn test_set_with_px_expires() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["SET", "k", "v", "px", "50"]), RespValue::ok());
        assert_eq!(run(&handler, &["GET", "k"]), RespValue::bulk_string(Bytes::from("v")));

        thread::sleep(Duration::from_millis(80));
        assert_eq!(run(&handler, &["GET", "k"]), RespValue::null());
        assert_eq!(run(&handler, &["TYPE", "k"]), RespValue::simple_string("none"));
    }

    #[test]
    fn test_set_option_errors_do_not_store() {
        let handler = create_handler();

        assert!(is_error(&run(&handler, &["SET", "k", "v", "PX", "0"]), "ERR invalid expire time"));
        assert!(is_error(&run(&handler, &["SET", "k", "v", "PX", "-5"]), "ERR invalid expire time"));
        assert!(is_error(&run(&handler, &["SET", "k", "v", "PX", "soon"]), "ERR value is not an integer"));
        assert!(is_error(&run(&handler, &["SET", "k", "v", "PX"]), "ERR syntax error"));
        assert!(is_error(&run(&handler, &["SET", "k", "v", "NX"]), "ERR syntax error"));
        assert!(is_error(&run(&handler, &["SET", "k", "v", "EX", "1", "PX", "1"]), "ERR syntax error"));

        assert_eq!(run(&handler, &["GET", "k"]), RespValue::null());
    }

    #[test]
    fn test_set_rejects_expire_times_past_the_clock() {
        let handler = create_handler();
        let max = i64::MAX.to_string();

        assert!(is_error(&run(&handler, &["SET", "k", "v", "EX", &max]), "ERR invalid expire time"));
        assert!(is_error(&run(&handler, &["SET", "k", "v", "PX", &max]), "ERR invalid expire time"));
        assert_eq!(run(&handler, &["GET", "k"]), RespValue::null());

        // Still serving after the rejection.
        assert_eq!(run(&handler, &["SET", "k", "v", "EX", "3600"]), RespValue::ok());
        assert_eq!(run(&handler, &["GET", "k"]), RespValue::bulk_string(Bytes::from("v")));
    }

    #[test]
    fn test_unknown_command_reply_is_one_frame() {
        let handler = create_handler();

        let reply = run(&handler, &["X\r\n+OK"]).serialize();
        let (decoded, consumed) = crate::protocol::parse_message(&reply).unwrap().unwrap();
        assert_eq!(consumed, reply.len());
        assert!(is_error(&decoded, "ERR unknown command"));

        let long = "Z".repeat(1000);
        match run(&handler, &[&long]) {
            RespValue::Error(msg) => assert!(msg.len() < 200, "name not truncated: {}", msg.len()),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_push_and_range() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["RPUSH", "l", "a", "b"]), RespValue::integer(2));
        assert_eq!(run(&handler, &["RPUSH", "l", "c"]), RespValue::integer(3));
        assert_eq!(run(&handler, &["LRANGE", "l", "0", "-1"]), bulks(&["a", "b", "c"]));

        assert_eq!(run(&handler, &["LPUSH", "r", "a", "b", "c"]), RespValue::integer(3));
        assert_eq!(run(&handler, &["LRANGE", "r", "0", "-1"]), bulks(&["c", "b", "a"]));
    }

    #[test]
    fn test_lrange_edges() {
        let handler = create_handler();
        run(&handler, &["RPUSH", "l", "a", "b", "c"]);

        assert_eq!(run(&handler, &["LRANGE", "l", "2", "1"]), RespValue::array(vec![]));
        assert_eq!(run(&handler, &["LRANGE", "missing", "0", "-1"]), RespValue::array(vec![]));
        assert_eq!(run(&handler, &["LRANGE", "l", "-2", "100"]), bulks(&["b", "c"]));
        assert!(is_error(&run(&handler, &["LRANGE", "l", "x", "1"]), "ERR value is not an integer"));
    }

    #[test]
    fn test_lpop() {
        let handler = create_handler();
        run(&handler, &["RPUSH", "l", "a", "b", "c", "d"]);

        assert_eq!(run(&handler, &["LPOP", "l"]), RespValue::bulk_string(Bytes::from("a")));
        assert_eq!(run(&handler, &["LPOP", "l", "2"]), bulks(&["b", "c"]));
        assert_eq!(run(&handler, &["LPOP", "l", "10"]), bulks(&["d"]));
        assert_eq!(run(&handler, &["LLEN", "l"]), RespValue::integer(0));
        assert_eq!(run(&handler, &["TYPE", "l"]), RespValue::simple_string("none"));

        assert_eq!(run(&handler, &["LPOP", "l"]), RespValue::null());
        assert_eq!(run(&handler, &["LPOP", "l", "3"]), RespValue::null());
    }

    #[test]
    fn test_lpop_bad_count() {
        let handler = create_handler();
        run(&handler, &["RPUSH", "l", "a"]);

        assert!(is_error(&run(&handler, &["LPOP", "l", "0"]), "ERR value is out of range"));
        assert!(is_error(&run(&handler, &["LPOP", "l", "-1"]), "ERR value is out of range"));
        assert!(is_error(&run(&handler, &["LPOP", "l", "many"]), "ERR value is not an integer"));
        assert_eq!(run(&handler, &["LLEN", "l"]), RespValue::integer(1));
    }

    #[test]
    fn test_rpop() {
        let handler = create_handler();
        run(&handler, &["RPUSH", "l", "a", "b", "c"]);

        assert_eq!(run(&handler, &["RPOP", "l"]), RespValue::bulk_string(Bytes::from("c")));
        assert_eq!(run(&handler, &["RPOP", "l", "5"]), bulks(&["b", "a"]));
        assert_eq!(run(&handler, &["RPOP", "l"]), RespValue::null());
    }

    #[test]
    fn test_wrong_type() {
        let handler = create_handler();
        run(&handler, &["SET", "s", "v"]);
        run(&handler, &["RPUSH", "l", "a"]);

        let cases: [&[&str]; 7] = [
            &["GET", "l"],
            &["RPUSH", "s", "x"],
            &["LPUSH", "s", "x"],
            &["LPOP", "s"],
            &["LRANGE", "s", "0", "-1"],
            &["LLEN", "s"],
            &["BLPOP", "s", "0"],
        ];
        for args in cases {
            assert!(is_error(&run(&handler, args), "WRONGTYPE"), "{:?}", args);
        }

        assert_eq!(run(&handler, &["GET", "s"]), RespValue::bulk_string(Bytes::from("v")));
        assert_eq!(run(&handler, &["LLEN", "l"]), RespValue::integer(1));
    }

    #[test]
    fn test_type() {
        let handler = create_handler();
        run(&handler, &["SET", "s", "v"]);
        run(&handler, &["RPUSH", "l", "a"]);

        assert_eq!(run(&handler, &["TYPE", "s"]), RespValue::simple_string("string"));
        assert_eq!(run(&handler, &["TYPE", "l"]), RespValue::simple_string("list"));
        assert_eq!(run(&handler, &["TYPE", "x"]), RespValue::simple_string("none"));
    }

    #[test]
    fn test_del() {
        let handler = create_handler();

        run(&handler, &["SET", "key1", "value1"]);
        run(&handler, &["RPUSH", "key2", "value2"]);

        assert_eq!(run(&handler, &["DEL", "key1", "key2", "key3"]), RespValue::integer(2));
    }

    #[test]
    fn test_exists() {
        let handler = create_handler();
        run(&handler, &["SET", "key1", "value1"]);

        assert_eq!(run(&handler, &["EXISTS", "key1"]), RespValue::integer(1));
        assert_eq!(run(&handler, &["EXISTS", "nonexistent"]), RespValue::integer(0));
    }

    #[test]
    fn test_dbsize_and_flushdb() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["DBSIZE"]), RespValue::integer(0));
        run(&handler, &["SET", "key1", "value1"]);
        run(&handler, &["RPUSH", "key2", "value2"]);
        assert_eq!(run(&handler, &["DBSIZE"]), RespValue::integer(2));

        assert_eq!(run(&handler, &["FLUSHDB"]), RespValue::ok());
        assert_eq!(run(&handler, &["DBSIZE"]), RespValue::integer(0));
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler();
        assert_eq!(
            run(&handler, &["frobnicate", "x"]),
            RespValue::error("ERR unknown command 'FROBNICATE'")
        );
    }

    #[test]
    fn test_arity_is_checked_before_the_store() {
        let handler = create_handler();
        assert_eq!(
            run(&handler, &["GET"]),
            RespValue::error("ERR wrong number of arguments for 'get' command")
        );
        assert!(is_error(&run(&handler, &["RPUSH", "l"]), "ERR wrong number"));
        assert_eq!(run(&handler, &["TYPE", "l"]), RespValue::simple_string("none"));
    }

    #[test]
    fn test_empty_and_malformed_requests() {
        let handler = create_handler();
        assert!(handler.execute(RespValue::array(vec![])).is_none());

        match handler.execute(RespValue::integer(7)) {
            Some(CommandOutcome::Reply(reply)) => assert!(is_error(&reply, "ERR Protocol error")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(b"0"), Ok(None));
        assert_eq!(parse_timeout(b"0.0"), Ok(None));
        assert_eq!(parse_timeout(b"1.5"), Ok(Some(Duration::from_millis(1500))));
        assert_eq!(parse_timeout(b"2"), Ok(Some(Duration::from_secs(2))));
        assert_eq!(parse_timeout(b"-1"), Err(CommandError::NegativeTimeout));
        assert_eq!(parse_timeout(b"soon"), Err(CommandError::InvalidTimeout));
        assert_eq!(parse_timeout(b"inf"), Err(CommandError::InvalidTimeout));
        assert_eq!(parse_timeout(b"NaN"), Err(CommandError::InvalidTimeout));
    }

    #[tokio::test]
    async fn test_blpop_immediate() {
        let handler = create_handler();
        run(&handler, &["RPUSH", "q", "a", "b"]);

        assert_eq!(run(&handler, &["BLPOP", "q", "0"]), bulks(&["q", "a"]));
        assert_eq!(run(&handler, &["LLEN", "q"]), RespValue::integer(1));
    }

    #[tokio::test]
    async fn test_blpop_blocks_until_push() {
        let storage = Arc::new(StorageEngine::new());
        let shared = CommandHandler::new(storage);
        let a = shared.for_client(1);
        let b = shared.for_client(2);

        let pop = match a.execute(make_command(&["BLPOP", "mylist", "0"])) {
            Some(CommandOutcome::Block(pop)) => pop,
            other => panic!("expected to block, got {:?}", other),
        };
        let waiting = tokio::spawn(async move { blocking_reply(pop.wait().await) });

        assert_eq!(run(&b, &["RPUSH", "mylist", "hello"]), RespValue::integer(1));
        assert_eq!(waiting.await.unwrap(), bulks(&["mylist", "hello"]));
        assert_eq!(run(&b, &["LLEN", "mylist"]), RespValue::integer(0));
    }

    #[tokio::test]
    async fn test_blpop_timeout_replies_null() {
        let handler = create_handler();

        let pop = match handler.execute(make_command(&["BLPOP", "q", "0.05"])) {
            Some(CommandOutcome::Block(pop)) => pop,
            other => panic!("expected to block, got {:?}", other),
        };
        assert_eq!(pop.timeout(), Some(Duration::from_millis(50)));

        let started = tokio::time::Instant::now();
        assert_eq!(blocking_reply(pop.wait().await), RespValue::null());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_blpop_bad_timeout() {
        let handler = create_handler();
        assert_eq!(
            run(&handler, &["BLPOP", "q", "-1"]),
            RespValue::error("ERR timeout is negative")
        );
        assert_eq!(
            run(&handler, &["BLPOP", "q", "later"]),
            RespValue::error("ERR timeout is not a float or out of range")
        );
        assert_eq!(handler.storage().waiting_on(b"q"), 0);
    }
}
