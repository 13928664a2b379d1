//! Logger
//!
//! Logs to stderr, filtered by `RUST_LOG`, and optionally to a file,
//! filtered by `RUST_LOG_FILE`.

// Imports
use {
	std::{fs, io, path::Path, sync::Mutex},
	tracing_subscriber::{fmt, prelude::*, EnvFilter},
};

/// Default filter for stderr
const DEFAULT_TERM_FILTER: &str = "info";

/// Default filter for the log file
const DEFAULT_FILE_FILTER: &str = "debug";

/// Initializes the logger.
///
/// Any messages queued with [`pre_init`] are emitted right after.
/// If a logger was already installed, this is a no-op apart from emitting the queue.
pub fn init(log_file: Option<&Path>, log_file_append: bool) {
	// Open the log file, if any
	let (file, file_err) = match log_file {
		Some(path) => match fs::OpenOptions::new()
			.create(true)
			.write(true)
			.append(log_file_append)
			.truncate(!log_file_append)
			.open(path)
		{
			Ok(file) => (Some(file), None),
			Err(err) => (None, Some((path, err))),
		},
		None => (None, None),
	};

	let term_layer = fmt::layer()
		.with_writer(io::stderr)
		.with_filter(self::env_filter("RUST_LOG", DEFAULT_TERM_FILTER));
	let file_layer = file.map(|file| {
		fmt::layer()
			.with_writer(Mutex::new(file))
			.with_ansi(false)
			.with_filter(self::env_filter("RUST_LOG_FILE", DEFAULT_FILE_FILTER))
	});

	if tracing_subscriber::registry()
		.with(term_layer)
		.with(file_layer)
		.try_init()
		.is_err()
	{
		tracing::trace!("Logger was already initialized");
	}

	if let Some((path, err)) = file_err {
		tracing::warn!(?path, ?err, "Unable to open log file, logging only to stderr");
	}

	pre_init::flush();
}

/// Creates an env filter from `var`, falling back to `default`
fn env_filter(var: &str, default: &str) -> EnvFilter {
	EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Messages logged before the logger is initialized
pub mod pre_init {
	// Imports
	use std::cell::RefCell;

	/// Queued message level
	#[derive(Clone, Copy, Debug)]
	enum Level {
		Debug,
		Warn,
	}

	thread_local! {
		/// Queued messages
		static QUEUE: RefCell<Vec<(Level, String)>> = const { RefCell::new(vec![]) };
	}

	/// Queues a debug message
	pub fn debug(msg: impl Into<String>) {
		QUEUE.with_borrow_mut(|queue| queue.push((Level::Debug, msg.into())));
	}

	/// Queues a warning message
	pub fn warn(msg: impl Into<String>) {
		QUEUE.with_borrow_mut(|queue| queue.push((Level::Warn, msg.into())));
	}

	/// Emits all queued messages
	pub(super) fn flush() {
		let queue = QUEUE.with_borrow_mut(std::mem::take);
		for (level, msg) in queue {
			match level {
				Level::Debug => tracing::debug!("{msg}"),
				Level::Warn => tracing::warn!("{msg}"),
			}
		}
	}
}
