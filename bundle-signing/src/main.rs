// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::Result,
    bundle_signing::{
        config::Config, logging::logger_for_level, CancellationToken, CodesignInvoker,
        FailurePolicy, Signer, SigningOptions,
    },
    clap::{Arg, Command},
    slog::o,
};

const ABOUT: &str = "\
Sign files and bundles with codesign.

Bundles are signed together with every nested bundle, framework and Mach-O
binary they contain, innermost first.

The configuration file is JSON:

    {
        \"source\": [\"./MyApp.app\"],
        \"sign\": {
            \"application_identity\": \"Developer ID Application: ...\"
        }
    }
";

fn main_impl() -> Result<()> {
    let matches = Command::new("bundle-sign")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Sign Apple bundles and their nested code")
        .long_about(ABOUT)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .takes_value(true)
                .possible_values(["trace", "debug", "info", "warn", "error"])
                .help("Emit log records at or above this level to stderr"),
        )
        .arg(
            Arg::new("continue_on_error")
                .long("continue-on-error")
                .help("Keep signing later sources after one fails"),
        )
        .arg(
            Arg::new("codesign")
                .long("codesign")
                .takes_value(true)
                .help("codesign program to run"),
        )
        .arg(
            Arg::new("config")
                .required(true)
                .help("Path to JSON configuration file"),
        )
        .get_matches();

    let logger = logger_for_level(matches.value_of("log_level"))?.new(o!("scope" => "sign"));

    let config_path = matches
        .value_of("config")
        .ok_or_else(|| anyhow::anyhow!("configuration file not specified"))?;
    let config = Config::parse_file(config_path)?;
    let sign = config.sign_config()?;

    let mut invoker = CodesignInvoker::new();
    if let Some(program) = matches.value_of("codesign") {
        invoker = invoker.program(program);
    }
    if let Some(entitlements) = &sign.entitlements_file {
        invoker = invoker.entitlements(entitlements);
    }

    let policy = if matches.is_present("continue_on_error") {
        FailurePolicy::ContinueAcrossRoots
    } else {
        FailurePolicy::FailFast
    };

    let mut stdout = std::io::stdout();
    let mut options = SigningOptions::new(
        config.source.iter(),
        &sign.application_identity,
        &mut stdout,
        logger,
    )
    .policy(policy);

    Signer::new(invoker).sign(&CancellationToken::new(), &mut options)?;

    Ok(())
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {}", err);
            1
        }
    };

    std::process::exit(exit_code)
}
