//! Stand-in child process for the `run` integration tests.

use std::{
    env,
    io::{self, Write},
    process, thread,
    time::Duration,
};

fn value<T: std::str::FromStr>(value: Option<String>, flag: &str) -> T {
    let Some(value) = value else {
        eprintln!("missing value for {flag}");
        process::exit(2);
    };
    value.parse().unwrap_or_else(|_| {
        eprintln!("invalid value for {flag}: {value}");
        process::exit(2);
    })
}

fn flood(mut writer: impl Write, mut bytes: usize, fill: u8) -> io::Result<()> {
    let buf = [fill; 8 * 1024];
    while bytes > 0 {
        let n = bytes.min(buf.len());
        writer.write_all(&buf[..n])?;
        bytes -= n;
    }
    writer.flush()
}

fn spawn_sleeping_child(ms: u64) {
    let exe = env::current_exe().unwrap_or_else(|err| {
        eprintln!("failed to resolve current exe: {err}");
        process::exit(2);
    });
    if let Err(err) = process::Command::new(exe)
        .args(["--sleep-ms", &ms.to_string()])
        .spawn()
    {
        eprintln!("failed to spawn child: {err}");
        process::exit(2);
    }
}

fn main() -> io::Result<()> {
    let mut args = env::args().skip(1);
    let mut exit_code = 0;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stdout-bytes" => flood(io::stdout().lock(), value(args.next(), &arg), b'a')?,
            "--stderr-bytes" => flood(io::stderr().lock(), value(args.next(), &arg), b'b')?,
            "--print" => {
                let line: String = value(args.next(), &arg);
                println!("{line}");
            }
            "--eprint" => {
                let line: String = value(args.next(), &arg);
                eprintln!("{line}");
            }
            "--sleep-ms" => thread::sleep(Duration::from_millis(value(args.next(), &arg))),
            "--spawn-child-sleep-ms" => spawn_sleeping_child(value(args.next(), &arg)),
            "--exit-code" => exit_code = value(args.next(), &arg),
            other => {
                eprintln!("unknown argument: {other}");
                process::exit(2);
            }
        }
    }
    io::stdout().flush()?;
    process::exit(exit_code)
}
