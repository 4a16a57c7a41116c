// Copyright 2018-2026 the Deno authors. MIT license.

use std::net::SocketAddr;

use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use clap::value_parser;

pub const DEFAULT_INSPECTOR_ADDRESS: &str = "127.0.0.1:9229";

static DEBUGGING_HEADING: &str = "Debugging options";

/// Adds `--inspect`, `--inspect-brk` and `--inspect-wait` to `app`.
pub fn inspect_args(app: Command) -> Command {
  app
    .arg(
      Arg::new("inspect")
        .long("inspect")
        .value_name("HOST_AND_PORT")
        .default_missing_value(DEFAULT_INSPECTOR_ADDRESS)
        .help("Activate inspector on host:port [default: 127.0.0.1:9229]")
        .num_args(0..=1)
        .require_equals(true)
        .value_parser(value_parser!(SocketAddr))
        .help_heading(DEBUGGING_HEADING),
    )
    .arg(
      Arg::new("inspect-brk")
        .long("inspect-brk")
        .value_name("HOST_AND_PORT")
        .default_missing_value(DEFAULT_INSPECTOR_ADDRESS)
        .help(
          "Activate inspector on host:port, wait for debugger to connect and break at the start of user script",
        )
        .num_args(0..=1)
        .require_equals(true)
        .value_parser(value_parser!(SocketAddr))
        .help_heading(DEBUGGING_HEADING),
    )
    .arg(
      Arg::new("inspect-wait")
        .long("inspect-wait")
        .value_name("HOST_AND_PORT")
        .default_missing_value(DEFAULT_INSPECTOR_ADDRESS)
        .help(
          "Activate inspector on host:port and wait for debugger to connect before running user code",
        )
        .num_args(0..=1)
        .require_equals(true)
        .value_parser(value_parser!(SocketAddr))
        .help_heading(DEBUGGING_HEADING),
    )
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InspectFlags {
  pub inspect: Option<SocketAddr>,
  pub inspect_brk: Option<SocketAddr>,
  pub inspect_wait: Option<SocketAddr>,
}

/// What the embedder should do with the inspector, resolved from
/// [`InspectFlags`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InspectOptions {
  pub addr: SocketAddr,
  pub wait_for_session: bool,
  pub break_on_first_statement: bool,
}

impl InspectFlags {
  pub fn from_matches(matches: &mut ArgMatches) -> Self {
    Self {
      inspect: matches.remove_one::<SocketAddr>("inspect"),
      inspect_brk: matches.remove_one::<SocketAddr>("inspect-brk"),
      inspect_wait: matches.remove_one::<SocketAddr>("inspect-wait"),
    }
  }

  /// `None` when no inspect flag was passed. `--inspect` takes precedence
  /// for the listen address.
  pub fn resolve(&self) -> Option<InspectOptions> {
    let addr = self.inspect.or(self.inspect_brk).or(self.inspect_wait)?;
    Some(InspectOptions {
      addr,
      wait_for_session: self.inspect_brk.is_some()
        || self.inspect_wait.is_some(),
      break_on_first_statement: self.inspect_brk.is_some(),
    })
  }
}
