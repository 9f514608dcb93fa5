use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

/// Pure clap command definitions with zero business logic
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("matrix")
                .env("TLSINTEROP_MATRIX")
                .help("Path to the JSON matrix file")
                .long("matrix")
                .long_help(
                    "Path to the JSON matrix file describing providers, protocols,\n\
                    certificates and cert test cases.\n\n\
                    Relative certificate paths resolve against `cert_dir`, which\n\
                    resolves against the matrix file's directory."
                )
                .short('m')
                .value_name("PATH")
                .required(true),
        )
        .arg(
            Arg::new("scenario")
                .default_value("sni-match")
                .env("TLSINTEROP_SCENARIO")
                .help("Scenario to run")
                .long("scenario")
                .long_help(
                    "Scenario to run:\n\n\
                    - sni-match: multi-certificate server, client selects by SNI\n\
                    - handshake: one cipher and one certificate per case"
                )
                .short('s')
                .value_parser(["sni-match", "handshake"]),
        )
        .arg(
            Arg::new("jobs")
                .default_value("1")
                .env("TLSINTEROP_JOBS")
                .help("Number of cases to run concurrently")
                .long("jobs")
                .short('j')
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("startup-timeout")
                .default_value("2000")
                .env("TLSINTEROP_STARTUP_TIMEOUT")
                .help("Milliseconds a server may take to start listening")
                .long("startup-timeout")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("timeout")
                .default_value("5000")
                .env("TLSINTEROP_TIMEOUT")
                .help("Milliseconds each endpoint may run before it is killed")
                .long("timeout")
                .short('t')
                .value_name("MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("port-range")
                .default_value("8000-30000")
                .env("TLSINTEROP_PORT_RANGE")
                .help("Ports leased to cases, as START-END")
                .long("port-range")
                .value_name("RANGE"),
        )
        .arg(
            Arg::new("filter")
                .env("TLSINTEROP_FILTER")
                .help("Only run cases whose id contains this text")
                .long("filter")
                .short('f')
                .value_name("TEXT"),
        )
        .arg(
            Arg::new("list")
                .help("Print the planned cases and their skip decisions, then exit")
                .long("list")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("metrics-file")
                .env("TLSINTEROP_METRICS_FILE")
                .help("Write Prometheus metrics to this file when the run finishes")
                .long("metrics-file")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("no-cert-check")
                .help("Do not parse server certificates before launching")
                .long("no-cert-check")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count),
        )
}
