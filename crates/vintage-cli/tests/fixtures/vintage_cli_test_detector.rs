//! Stand-in for the external detector: prints every `#!`-prefixed line of
//! the file given as the last argument, without the prefix.
//!
//! A file whose first line is `#!crash` makes it exit 3 without a report.

use std::{env, fs, process};

fn main() {
    let Some(path) = env::args().skip(1).last() else {
        eprintln!("usage: vintage-cli-test-detector [ARGS..] <FILE>");
        process::exit(2);
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{path}: {err}");
            process::exit(2);
        }
    };
    if text.lines().next() == Some("#!crash") {
        eprintln!("Traceback (most recent call last):");
        eprintln!("RuntimeError: simulated crash");
        process::exit(3);
    }
    for line in text.lines() {
        if let Some(report) = line.strip_prefix("#!") {
            println!("{report}");
        }
    }
}
